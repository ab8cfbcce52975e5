pub mod auth;
pub mod error;
pub mod outcome;
pub mod request;
pub mod telemetry;

pub use auth::AuthConfig;
pub use error::ExecError;
pub use outcome::{BatchExecutionOutcome, ExecutionOutcome, OutcomeTiming};
pub use request::{
    ExecuteBatchRequest, ExecuteRequest, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS,
    MAX_TIMEOUT_SECS,
};
