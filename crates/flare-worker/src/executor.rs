//! Single-item execution handler.
//!
//! Runs exactly one item through one session end-to-end and always returns
//! an `ExecutionOutcome`; every failure path is folded into a
//! `success: false` record with best-effort timing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;

use flare_common::{ExecError, ExecutionOutcome, OutcomeTiming};

use crate::protocol::{self, CallArgs};
use crate::runtime::{Session, SessionRuntime};
use crate::session::SessionPolicy;

const SESSION_LANGUAGE: &str = "python";

/// One item to execute, borrowed from the inbound request.
pub struct ItemRequest<'a> {
    pub function_id: &'a str,
    pub code: &'a str,
    pub function_name: &'a str,
    pub call: CallArgs<'a>,
    pub env: Option<&'a HashMap<String, String>>,
    pub timeout: Duration,
    pub policy: SessionPolicy,
}

struct RunSuccess {
    result: String,
    stdout: String,
    stderr: String,
}

struct RunFailure {
    error: ExecError,
    stdout: Option<String>,
    stderr: Option<String>,
}

impl RunFailure {
    fn bare(error: ExecError) -> Self {
        Self {
            error,
            stdout: None,
            stderr: None,
        }
    }
}

pub async fn execute_item(runtime: &dyn SessionRuntime, req: ItemRequest<'_>) -> ExecutionOutcome {
    let started_at = Utc::now();
    let timer = Instant::now();
    let session_id = req.policy.session_id(req.function_id);

    let run = match runtime.create_session(&session_id).await {
        Ok(session) => {
            let run = run_once(session.as_ref(), &req).await;

            // Teardown is unconditional for ephemeral sessions: success,
            // decode failure, and runtime errors all reach this point. A
            // destroy failure is logged, never escalated.
            if req.policy.owns_teardown() {
                if let Err(err) = session.destroy().await {
                    tracing::warn!(session_id=%session_id, error=%err, "session teardown failed");
                }
            }
            run
        }
        Err(err) => Err(RunFailure::bare(err)),
    };

    let timing = OutcomeTiming {
        session_id,
        started_at,
        completed_at: Utc::now(),
        execution_time_ms: timer.elapsed().as_millis() as u64,
    };

    match run {
        Ok(run) => {
            ExecutionOutcome::success(run.result, Some(run.stdout), Some(run.stderr), timing)
        }
        Err(fail) => {
            ExecutionOutcome::failure(fail.error.to_string(), fail.stdout, fail.stderr, timing)
        }
    }
}

async fn run_once(session: &dyn Session, req: &ItemRequest<'_>) -> Result<RunSuccess, RunFailure> {
    let context = session
        .create_context(SESSION_LANGUAGE)
        .await
        .map_err(RunFailure::bare)?;

    let script = protocol::build_script(req.code, req.function_name, req.call, req.env);

    let output = session
        .run(&script, &context, req.timeout)
        .await
        .map_err(RunFailure::bare)?;

    match protocol::decode_output(&output.stdout, &output.stderr, output.error.as_deref()) {
        Ok(result) => Ok(RunSuccess {
            result,
            stdout: output.stdout,
            stderr: output.stderr,
        }),
        Err(error) => Err(RunFailure {
            error,
            stdout: Some(output.stdout),
            stderr: Some(output.stderr),
        }),
    }
}
