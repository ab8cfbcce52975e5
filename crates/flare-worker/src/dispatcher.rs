//! Batch dispatcher: many items, bounded concurrency, order-preserving
//! aggregation.
//!
//! The reference design chunked items into rounds separated by a barrier;
//! here a flat ordered pipeline (`buffered`) bounds in-flight sessions at
//! the concurrency cap without idling capacity between rounds, while
//! keeping `results[i]` aligned with `items[i]`. `round_count` is still
//! reported as `ceil(items / cap)` for response compatibility.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt};

use flare_common::{BatchExecutionOutcome, ExecuteBatchRequest};

use crate::executor::{execute_item, ItemRequest};
use crate::protocol::CallArgs;
use crate::runtime::SessionRuntime;
use crate::session::SessionPolicy;

pub async fn dispatch_batch(
    runtime: Arc<dyn SessionRuntime>,
    req: &ExecuteBatchRequest,
) -> BatchExecutionOutcome {
    let max_concurrency = req.max_concurrency();

    if req.items.is_empty() {
        return BatchExecutionOutcome {
            results: Vec::new(),
            total_execution_time_ms: 0,
            round_count: 0,
            max_concurrency,
        };
    }

    let timeout = Duration::from_secs(req.timeout_secs());
    let timer = Instant::now();

    tracing::info!(
        function_id = %req.function_id,
        items = req.items.len(),
        max_concurrency,
        "dispatching batch"
    );

    // Collected eagerly so the closure is invoked at a concrete lifetime;
    // passing the lazy iterator straight to `stream::iter` trips rustc's
    // higher-ranked lifetime check when the handler future is sent across
    // threads. The futures themselves stay lazy until `buffered` polls them.
    let futures: Vec<_> = req
        .items
        .iter()
        .map(|item| {
            let runtime = runtime.clone();
            async move {
                execute_item(
                    runtime.as_ref(),
                    ItemRequest {
                        function_id: &req.function_id,
                        code: &req.code,
                        function_name: &req.function_name,
                        call: CallArgs::Item(item),
                        env: None,
                        timeout,
                        policy: SessionPolicy::Ephemeral,
                    },
                )
                .await
            }
        })
        .collect();

    let results = stream::iter(futures)
        .buffered(max_concurrency)
        .collect::<Vec<_>>()
        .await;

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        tracing::warn!(function_id = %req.function_id, failed, total = results.len(), "batch completed with item failures");
    }

    BatchExecutionOutcome {
        results,
        total_execution_time_ms: timer.elapsed().as_millis() as u64,
        round_count: req.items.len().div_ceil(max_concurrency),
        max_concurrency,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::protocol::{ERROR_MARKER, RESULT_MARKER};
    use crate::runtime::mock::MockRuntime;
    use crate::runtime::ExecOutput;
    use flare_common::ExecError;

    /// Behavior that extracts the item payload from the wrapper script and
    /// echoes it back as the result, so tests can check index alignment.
    fn echo_item_behavior() -> crate::runtime::mock::RunBehavior {
        Arc::new(|script: &str| {
            let needle = "bytes.fromhex(\"";
            let start = script.find(needle).expect("item payload in script") + needle.len();
            let end = script[start..].find('"').unwrap();
            let payload = &script[start..start + end];
            Ok(ExecOutput {
                stdout: format!("{RESULT_MARKER}{payload}{RESULT_MARKER}"),
                stderr: String::new(),
                error: None,
            })
        })
    }

    fn batch(items: Vec<&str>, max_containers: Option<usize>) -> ExecuteBatchRequest {
        ExecuteBatchRequest {
            function_id: "double_abc12345".into(),
            code: "def double(x):\n    return x * 2".into(),
            function_name: "double".into(),
            items: items.into_iter().map(String::from).collect(),
            max_containers,
            timeout: Some(30),
        }
    }

    #[tokio::test]
    async fn results_align_with_items() {
        let runtime = Arc::new(
            MockRuntime::new(echo_item_behavior()).with_delay(Duration::from_millis(5)),
        );

        let req = batch(vec!["01", "02", "03", "04", "05"], Some(2));
        let out = dispatch_batch(runtime, &req).await;

        let results: Vec<&str> = out
            .results
            .iter()
            .map(|r| r.result.as_deref().unwrap())
            .collect();
        assert_eq!(results, vec!["01", "02", "03", "04", "05"]);
    }

    #[tokio::test]
    async fn round_count_is_ceiling_of_items_over_cap() {
        let runtime = Arc::new(MockRuntime::new(echo_item_behavior()));

        let req = batch(vec!["01", "02", "03"], Some(2));
        let out = dispatch_batch(runtime, &req).await;

        assert_eq!(out.round_count, 2);
        assert_eq!(out.max_concurrency, 2);
        assert_eq!(out.results.len(), 3);
    }

    #[tokio::test]
    async fn in_flight_sessions_never_exceed_cap() {
        let runtime = Arc::new(
            MockRuntime::new(echo_item_behavior()).with_delay(Duration::from_millis(10)),
        );

        let req = batch(vec!["01", "02", "03", "04", "05", "06", "07"], Some(3));
        let _ = dispatch_batch(runtime.clone(), &req).await;

        let max = runtime
            .recorded
            .max_in_flight
            .load(std::sync::atomic::Ordering::SeqCst);
        assert!(max <= 3, "observed {max} concurrent runs, cap was 3");
        assert!(max >= 2, "pipeline never ran items concurrently");
    }

    #[tokio::test]
    async fn each_item_gets_a_unique_session() {
        let runtime = Arc::new(MockRuntime::new(echo_item_behavior()));

        let req = batch(vec!["01", "02", "03", "04"], Some(2));
        let out = dispatch_batch(runtime.clone(), &req).await;

        let ids: HashSet<String> = out.results.iter().map(|r| r.session_id.clone()).collect();
        assert_eq!(ids.len(), 4);

        let destroyed = runtime.recorded.destroyed.lock().unwrap().clone();
        assert_eq!(destroyed.len(), 4);
    }

    #[tokio::test]
    async fn one_failure_never_cancels_siblings() {
        let behavior: crate::runtime::mock::RunBehavior = Arc::new(|script: &str| {
            if script.contains("bytes.fromhex(\"ff\")") {
                Ok(ExecOutput {
                    stdout: String::new(),
                    stderr: format!("{ERROR_MARKER}bad{ERROR_MARKER}"),
                    error: None,
                })
            } else {
                Ok(ExecOutput {
                    stdout: format!("{RESULT_MARKER}ok{RESULT_MARKER}"),
                    stderr: String::new(),
                    error: None,
                })
            }
        });
        let runtime = Arc::new(MockRuntime::new(behavior));

        let req = batch(vec!["01", "ff", "03"], Some(2));
        let out = dispatch_batch(runtime, &req).await;

        assert!(out.results[0].success);
        assert!(!out.results[1].success);
        assert_eq!(out.results[1].error.as_deref(), Some("bad"));
        assert!(out.results[2].success);
    }

    #[tokio::test]
    async fn session_error_on_one_item_keeps_batch_alive() {
        let behavior: crate::runtime::mock::RunBehavior = Arc::new(|script: &str| {
            if script.contains("bytes.fromhex(\"02\")") {
                Err(ExecError::Session("container died".into()))
            } else {
                Ok(ExecOutput {
                    stdout: format!("{RESULT_MARKER}ok{RESULT_MARKER}"),
                    stderr: String::new(),
                    error: None,
                })
            }
        });
        let runtime = Arc::new(MockRuntime::new(behavior));

        let req = batch(vec!["01", "02", "03"], Some(1));
        let out = dispatch_batch(runtime.clone(), &req).await;

        assert!(out.results[0].success);
        assert!(!out.results[1].success);
        assert!(out.results[2].success);
        // Failed item's session still torn down.
        assert_eq!(runtime.recorded.destroyed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_items_short_circuits() {
        let runtime = Arc::new(MockRuntime::new(echo_item_behavior()));

        let req = batch(vec![], None);
        let out = dispatch_batch(runtime.clone(), &req).await;

        assert!(out.results.is_empty());
        assert_eq!(out.round_count, 0);
        assert_eq!(out.total_execution_time_ms, 0);
        assert!(runtime.recorded.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn defaults_applied_when_unspecified() {
        let runtime = Arc::new(MockRuntime::new(echo_item_behavior()));

        let req = batch(vec!["01"], None);
        let out = dispatch_batch(runtime, &req).await;

        assert_eq!(
            out.max_concurrency,
            flare_common::DEFAULT_MAX_CONCURRENCY
        );
        assert_eq!(out.round_count, 1);
    }
}
