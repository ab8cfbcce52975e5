use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
    pub status_2xx: AtomicU64,
    pub status_4xx: AtomicU64,
    pub status_5xx: AtomicU64,
    pub executions_total: AtomicU64,
    pub execution_failures_total: AtomicU64,
    pub batches_total: AtomicU64,
}

pub fn render_metrics(metrics: &Metrics) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "# HELP flare_worker_requests_total Total HTTP requests handled.\n\
         # TYPE flare_worker_requests_total counter\n\
         flare_worker_requests_total {}\n",
        metrics.requests_total.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_requests_inflight Currently in-flight HTTP requests.\n\
         # TYPE flare_worker_requests_inflight gauge\n\
         flare_worker_requests_inflight {}\n",
        metrics.requests_inflight.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_responses_2xx Total 2xx responses.\n\
         # TYPE flare_worker_responses_2xx counter\n\
         flare_worker_responses_2xx {}\n",
        metrics.status_2xx.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_responses_4xx Total 4xx responses.\n\
         # TYPE flare_worker_responses_4xx counter\n\
         flare_worker_responses_4xx {}\n",
        metrics.status_4xx.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_responses_5xx Total 5xx responses.\n\
         # TYPE flare_worker_responses_5xx counter\n\
         flare_worker_responses_5xx {}\n",
        metrics.status_5xx.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_executions_total Total item executions, single and batch.\n\
         # TYPE flare_worker_executions_total counter\n\
         flare_worker_executions_total {}\n",
        metrics.executions_total.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_execution_failures_total Item executions that ended in a failed outcome.\n\
         # TYPE flare_worker_execution_failures_total counter\n\
         flare_worker_execution_failures_total {}\n",
        metrics.execution_failures_total.load(Ordering::Relaxed),
    ));
    body.push_str(&format!(
        "# HELP flare_worker_batches_total Total batch dispatches.\n\
         # TYPE flare_worker_batches_total counter\n\
         flare_worker_batches_total {}\n",
        metrics.batches_total.load(Ordering::Relaxed),
    ));

    body
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    let body = render_metrics(&st.metrics);
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

pub async fn track_requests(
    State(st): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, std::convert::Infallible> {
    st.metrics.requests_inflight.fetch_add(1, Ordering::Relaxed);
    let resp = next.run(req).await;
    st.metrics.requests_inflight.fetch_sub(1, Ordering::Relaxed);
    st.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let status = resp.status().as_u16();
    if status >= 500 {
        st.metrics.status_5xx.fetch_add(1, Ordering::Relaxed);
    } else if status >= 400 {
        st.metrics.status_4xx.fetch_add(1, Ordering::Relaxed);
    } else if status >= 200 {
        st.metrics.status_2xx.fetch_add(1, Ordering::Relaxed);
    }

    Ok(resp)
}
