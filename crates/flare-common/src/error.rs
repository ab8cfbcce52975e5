use axum::http::StatusCode;
use thiserror::Error;

/// Failure taxonomy for the execution pipeline.
///
/// Item-level variants (`Session`, `ProtocolExtraction`, `UserCode`) are
/// always folded into a failed `ExecutionOutcome` and never abort a batch;
/// only request validation, auth, and worker-internal failures surface as
/// HTTP-level errors.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid request: {0}")]
    RequestMalformed(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Session creation, run, or teardown failed at the runtime layer.
    #[error("session error: {0}")]
    Session(String),

    /// The result marker was absent from the captured output, meaning user
    /// code never returned through the wrapper's success path.
    #[error("result marker not found in output")]
    ProtocolExtraction,

    /// Exception raised inside the executed function, message taken verbatim
    /// from the error sentinel.
    #[error("{0}")]
    UserCode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecError {
    /// HTTP status for the single-execution path, where an execution failure
    /// maps to 500. Batch item failures never reach this mapping.
    pub fn status(&self) -> StatusCode {
        match self {
            ExecError::RequestMalformed(_) => StatusCode::BAD_REQUEST,
            ExecError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ExecError::Session(_)
            | ExecError::ProtocolExtraction
            | ExecError::UserCode(_)
            | ExecError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
