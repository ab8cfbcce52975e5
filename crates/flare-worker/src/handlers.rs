use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;

use flare_common::{ExecuteBatchRequest, ExecuteRequest};

use crate::dispatcher::dispatch_batch;
use crate::executor::{execute_item, ItemRequest};
use crate::protocol::CallArgs;
use crate::session::SessionPolicy;
use crate::state::AppState;

/// POST /execute — run one function call in a warm session.
///
/// 200 with the outcome on success, 500 with the outcome on execution
/// failure, 400 on malformed or invalid requests.
pub async fn execute(State(st): State<AppState>, body: Bytes) -> Response {
    let req: ExecuteRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error=%e, "malformed execute request");
            return bad_request("Invalid JSON in request body");
        }
    };

    if let Err(e) = req.validate() {
        return bad_request(&e.to_string());
    }

    let outcome = execute_item(
        st.runtime.as_ref(),
        ItemRequest {
            function_id: &req.function_id,
            code: &req.code,
            function_name: &req.function_name,
            call: CallArgs::ArgsKwargs {
                args: &req.args,
                kwargs: &req.kwargs,
            },
            env: req.env.as_ref(),
            timeout: Duration::from_secs(req.timeout_secs()),
            policy: SessionPolicy::Warm,
        },
    )
    .await;

    st.metrics.executions_total.fetch_add(1, Ordering::Relaxed);
    let status = if outcome.success {
        StatusCode::OK
    } else {
        st.metrics
            .execution_failures_total
            .fetch_add(1, Ordering::Relaxed);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(outcome)).into_response()
}

/// POST /execute-batch — dispatch many items with bounded concurrency.
///
/// Always 200 once dispatch completes; per-item failures live inside their
/// outcomes. 400 on malformed or invalid requests, including a
/// non-positive concurrency cap.
pub async fn execute_batch(State(st): State<AppState>, body: Bytes) -> Response {
    let req: ExecuteBatchRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error=%e, "malformed execute-batch request");
            return bad_request("Invalid JSON in request body");
        }
    };

    if let Err(e) = req.validate() {
        return bad_request(&e.to_string());
    }

    let outcome = dispatch_batch(st.runtime.clone(), &req).await;

    st.metrics
        .executions_total
        .fetch_add(outcome.results.len() as u64, Ordering::Relaxed);
    let failed = outcome.results.iter().filter(|r| !r.success).count() as u64;
    st.metrics
        .execution_failures_total
        .fetch_add(failed, Ordering::Relaxed);
    st.metrics
        .batches_total
        .fetch_add(1, Ordering::Relaxed);

    (StatusCode::OK, Json(outcome)).into_response()
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn bad_request(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": msg})),
    )
        .into_response()
}
