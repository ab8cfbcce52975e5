//! Terminal rendering for execution results.

use flare_common::{BatchExecutionOutcome, ExecutionOutcome};

/// Wrapper-internal marker lines are stripped before showing user stdout.
const RESULT_MARKER: &str = "__FLARE_RESULT__";
const ERROR_MARKER: &str = "__FLARE_ERROR__";

pub fn print_single_execution(function_name: &str, outcome: &ExecutionOutcome) {
    let secs = outcome.execution_time_ms as f64 / 1000.0;
    println!("> {function_name}() · {secs:.1}s · {}", outcome.session_id);
    print_stream(outcome.stdout.as_deref());
}

pub fn print_batch_execution(function_name: &str, batch: &BatchExecutionOutcome) {
    for (idx, item) in batch.results.iter().enumerate() {
        let secs = item.execution_time_ms as f64 / 1000.0;
        if item.success {
            println!("  ✓ {function_name}[{idx}] · {secs:.1}s");
        } else {
            let msg = item.error.as_deref().unwrap_or("unknown error");
            println!("  ✗ {function_name}[{idx}] · {secs:.1}s · {msg}");
        }
        print_stream(item.stdout.as_deref());
    }
    let total = batch.total_execution_time_ms as f64 / 1000.0;
    let ok = batch.results.iter().filter(|r| r.success).count();
    println!(
        "{ok}/{} items · {total:.1}s total · {} rounds at concurrency {}",
        batch.results.len(),
        batch.round_count,
        batch.max_concurrency,
    );
}

/// Print user-visible stdout, dropping the protocol marker lines the
/// execution wrapper emits.
fn print_stream(stdout: Option<&str>) {
    let Some(stdout) = stdout else { return };
    for line in stdout.lines() {
        if line.contains(RESULT_MARKER) || line.contains(ERROR_MARKER) {
            continue;
        }
        if !line.trim().is_empty() {
            println!("    {line}");
        }
    }
}

/// Mask an API key for display: first 6 and last 4 characters kept.
pub fn mask_key(key: &str) -> String {
    if key.len() <= 10 {
        return "*".repeat(key.len());
    }
    format!("{}...{}", &key[..6], &key[key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_short_keys_entirely() {
        assert_eq!(mask_key("sk_abc"), "******");
    }

    #[test]
    fn masks_long_keys_keeping_edges() {
        let masked = mask_key("sk_0123456789abcdefghij");
        assert_eq!(masked, "sk_012...ghij");
    }
}
