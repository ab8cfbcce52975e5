use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// Single shared-secret credential for the worker API.
///
/// Construction is fail-closed: `new` always enforces the given secret.
/// The only way to serve without credential checks is the explicit
/// [`AuthConfig::disabled`] constructor, which the worker gates behind a
/// dev-only flag.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    secret: Arc<String>,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            enabled: true,
            secret: Arc::new(secret.into()),
        }
    }

    /// Explicit opt-out for local development; every request passes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            secret: Arc::new(String::new()),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        constant_time_eq(presented.as_bytes(), self.secret.as_bytes())
    }
}

/// Comparison whose duration depends only on the presented length, never on
/// where the first mismatching byte sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Axum middleware validating the bearer credential before any dispatch
/// logic runs. Generic over any state that exposes an `AuthConfig`, so the
/// worker can layer it with `middleware::from_fn_with_state`.
pub async fn auth_middleware<S>(
    State(state): State<S>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, std::convert::Infallible>
where
    S: AsRef<AuthConfig> + Clone + Send + Sync + 'static,
{
    let auth = state.as_ref();

    if !auth.enabled {
        return Ok(next.run(req).await);
    }

    let Some(token) = extract_token(&req) else {
        return Ok(unauthorized("missing API key"));
    };

    if !auth.verify(&token) {
        return Ok(unauthorized("invalid API key"));
    }

    Ok(next.run(req).await)
}

fn extract_token(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| {
            req.headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
}

pub fn unauthorized(msg: &str) -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"success": false, "error": msg})),
    )
        .into_response()
}
