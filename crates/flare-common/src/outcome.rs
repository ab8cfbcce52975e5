use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-item record of one execution: exactly one of `result` (success) or
/// `error` (failure) is meaningful; stdout/stderr are attached best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Timing and identity fields shared by both outcome constructors.
#[derive(Debug, Clone)]
pub struct OutcomeTiming {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl ExecutionOutcome {
    pub fn success(
        result: String,
        stdout: Option<String>,
        stderr: Option<String>,
        timing: OutcomeTiming,
    ) -> Self {
        Self {
            success: true,
            result: Some(result),
            stdout,
            stderr,
            error: None,
            execution_time_ms: timing.execution_time_ms,
            session_id: timing.session_id,
            started_at: timing.started_at,
            completed_at: timing.completed_at,
        }
    }

    pub fn failure(
        error: impl Into<String>,
        stdout: Option<String>,
        stderr: Option<String>,
        timing: OutcomeTiming,
    ) -> Self {
        Self {
            success: false,
            result: None,
            stdout,
            stderr,
            error: Some(error.into()),
            execution_time_ms: timing.execution_time_ms,
            session_id: timing.session_id,
            started_at: timing.started_at,
            completed_at: timing.completed_at,
        }
    }
}

/// Aggregate of a batch dispatch. `results` preserves the order of the
/// request's `items`; individual failures live inside their outcome and do
/// not change the batch-level shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchExecutionOutcome {
    pub results: Vec<ExecutionOutcome>,
    pub total_execution_time_ms: u64,
    pub round_count: usize,
    pub max_concurrency: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> OutcomeTiming {
        let now = Utc::now();
        OutcomeTiming {
            session_id: "item-1".into(),
            started_at: now,
            completed_at: now,
            execution_time_ms: 42,
        }
    }

    #[test]
    fn success_carries_result_not_error() {
        let out = ExecutionOutcome::success("deadbeef".into(), None, None, timing());
        assert!(out.success);
        assert_eq!(out.result.as_deref(), Some("deadbeef"));
        assert!(out.error.is_none());
    }

    #[test]
    fn failure_carries_error_not_result() {
        let out = ExecutionOutcome::failure("boom", Some("partial".into()), None, timing());
        assert!(!out.success);
        assert!(out.result.is_none());
        assert_eq!(out.error.as_deref(), Some("boom"));
        assert_eq!(out.stdout.as_deref(), Some("partial"));
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let out = ExecutionOutcome::success("ff".into(), None, None, timing());
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("stdout").is_none());
        assert_eq!(json["session_id"], "item-1");
    }
}
