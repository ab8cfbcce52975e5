mod args;
mod dispatcher;
mod executor;
mod handlers;
mod metrics;
mod protocol;
mod runtime;
mod session;
mod state;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;

use flare_common::auth::auth_middleware;
use flare_common::{telemetry, AuthConfig};

use crate::args::Args;
use crate::handlers::{execute, execute_batch, healthz};
use crate::metrics::{metrics_handler, track_requests, Metrics};
use crate::runtime::{HttpSandboxRuntime, SessionRuntime};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let provider = telemetry::init_tracing(
        "flare-worker",
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );

    tracing::info!(sandbox_url=%args.sandbox_url, "worker starting");

    let runtime: Arc<dyn SessionRuntime> =
        Arc::new(HttpSandboxRuntime::new(args.sandbox_url.clone()));

    // Fail closed: a worker without a credential is an open code-execution
    // endpoint. Opting out takes the explicit dev-only flag.
    let auth = match args.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => AuthConfig::new(key),
        None if args.insecure_no_auth => {
            tracing::warn!("auth disabled: serving without credential checks");
            AuthConfig::disabled()
        }
        None => {
            tracing::error!(
                "no API key configured; set FLARE_API_KEY or pass --insecure-no-auth for local development"
            );
            std::process::exit(1);
        }
    };
    let metrics = Arc::new(Metrics::default());

    let st = AppState {
        runtime,
        auth,
        metrics,
    };

    // Credential check runs before any dispatch logic; health and metrics
    // stay open.
    let exec_routes = Router::new()
        .route("/execute", post(execute))
        .route("/execute-batch", post(execute_batch))
        .layer(middleware::from_fn_with_state(
            st.clone(),
            auth_middleware::<AppState>,
        ));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(healthz))
        .route("/metrics", get(metrics_handler))
        .merge(exec_routes)
        .layer(middleware::from_fn_with_state(st.clone(), track_requests))
        .with_state(st);

    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .expect("bind");
    tracing::info!(addr=%args.listen_addr, "worker listening");

    axum::serve(listener, app).await.expect("serve");

    if let Some(provider) = provider {
        let _ = provider.shutdown();
    }
}
