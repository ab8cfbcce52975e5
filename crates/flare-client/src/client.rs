//! Typed HTTP client for the flare worker API.

use std::time::Duration;

use flare_common::{
    BatchExecutionOutcome, ExecuteBatchRequest, ExecuteRequest, ExecutionOutcome,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS,
};

use crate::error::ClientError;

pub struct FlareClient {
    worker_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl FlareClient {
    pub fn new(worker_url: &str, api_key: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            worker_url: worker_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    /// Execute a single function call and return the decoded result bytes
    /// together with the full outcome (timing, streams, session id).
    pub async fn execute(
        &self,
        req: &ExecuteRequest,
    ) -> Result<(Vec<u8>, ExecutionOutcome), ClientError> {
        let url = format!("{}/execute", self.worker_url);
        let timeout = req.timeout_secs() + 10; // network overhead buffer

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(req)
            .timeout(Duration::from_secs(timeout))
            .send()
            .await?;

        let status = resp.status();
        let outcome: ExecutionOutcome = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("invalid worker response ({status}): {e}")))?;

        if !outcome.success {
            return Err(execution_error(&outcome));
        }

        let payload = outcome
            .result
            .as_deref()
            .ok_or_else(|| ClientError::Decode("success outcome without result".into()))?;
        let bytes =
            hex::decode(payload).map_err(|e| ClientError::Decode(format!("bad hex result: {e}")))?;

        Ok((bytes, outcome))
    }

    /// Dispatch a batch and return the aggregate outcome. Item failures do
    /// not error here; use [`decode_results`] to fail on the first bad item.
    pub async fn execute_batch(
        &self,
        req: &ExecuteBatchRequest,
    ) -> Result<BatchExecutionOutcome, ClientError> {
        let url = format!("{}/execute-batch", self.worker_url);
        let timeout = batch_timeout_secs(
            req.items.len(),
            req.max_containers.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            req.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(req)
            .timeout(Duration::from_secs(timeout))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Execution(format!(
                "worker returned {status}: {text}"
            )));
        }

        let outcome: BatchExecutionOutcome = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("invalid batch response: {e}")))?;
        Ok(outcome)
    }

    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = format!("{}/healthz", self.worker_url);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

/// Decode every item's result payload, failing on the first item that did
/// not succeed.
pub fn decode_results(batch: &BatchExecutionOutcome) -> Result<Vec<Vec<u8>>, ClientError> {
    let mut out = Vec::with_capacity(batch.results.len());
    for (idx, item) in batch.results.iter().enumerate() {
        if !item.success {
            let msg = item.error.as_deref().unwrap_or("unknown error");
            return Err(ClientError::Execution(format!("item {idx} failed: {msg}")));
        }
        let payload = item
            .result
            .as_deref()
            .ok_or_else(|| ClientError::Decode(format!("item {idx}: missing result")))?;
        let bytes = hex::decode(payload)
            .map_err(|e| ClientError::Decode(format!("item {idx}: bad hex result: {e}")))?;
        out.push(bytes);
    }
    Ok(out)
}

/// Worst-case wall time for a batch: full rounds of per-item timeouts plus
/// a fixed network buffer.
fn batch_timeout_secs(items: usize, max_concurrency: usize, timeout_secs: u64) -> u64 {
    let rounds = items.div_ceil(max_concurrency.max(1)) as u64;
    rounds * timeout_secs + 30
}

fn execution_error(outcome: &ExecutionOutcome) -> ClientError {
    let msg = outcome.error.as_deref().unwrap_or("Unknown error");
    match outcome.stderr.as_deref().filter(|s| !s.is_empty()) {
        Some(stderr) => {
            ClientError::Execution(format!("{msg}\n\nRemote stderr:\n{stderr}"))
        }
        None => ClientError::Execution(msg.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use flare_common::OutcomeTiming;

    use super::*;

    fn timing(id: &str) -> OutcomeTiming {
        let now = Utc::now();
        OutcomeTiming {
            session_id: id.into(),
            started_at: now,
            completed_at: now,
            execution_time_ms: 1,
        }
    }

    #[test]
    fn batch_timeout_covers_all_rounds() {
        assert_eq!(batch_timeout_secs(0, 10, 300), 30);
        assert_eq!(batch_timeout_secs(1, 10, 300), 330);
        assert_eq!(batch_timeout_secs(25, 10, 300), 3 * 300 + 30);
    }

    #[test]
    fn decode_results_happy_path() {
        let batch = BatchExecutionOutcome {
            results: vec![
                ExecutionOutcome::success("01".into(), None, None, timing("a")),
                ExecutionOutcome::success("0203".into(), None, None, timing("b")),
            ],
            total_execution_time_ms: 5,
            round_count: 1,
            max_concurrency: 10,
        };
        let decoded = decode_results(&batch).unwrap();
        assert_eq!(decoded, vec![vec![0x01], vec![0x02, 0x03]]);
    }

    #[test]
    fn decode_results_fails_on_failed_item() {
        let batch = BatchExecutionOutcome {
            results: vec![
                ExecutionOutcome::success("01".into(), None, None, timing("a")),
                ExecutionOutcome::failure("bad", None, None, timing("b")),
            ],
            total_execution_time_ms: 5,
            round_count: 1,
            max_concurrency: 10,
        };
        let err = decode_results(&batch).unwrap_err();
        assert!(matches!(err, ClientError::Execution(msg) if msg.contains("item 1 failed: bad")));
    }

    #[test]
    fn execution_error_includes_remote_stderr() {
        let outcome = ExecutionOutcome::failure(
            "boom",
            None,
            Some("Traceback ...".into()),
            timing("a"),
        );
        let err = execution_error(&outcome);
        let msg = err.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.contains("Remote stderr"));
    }
}
