use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The worker reported a failed execution; carries the remote error
    /// message and, when present, the remote stderr for diagnosis.
    #[error("remote execution failed: {0}")]
    Execution(String),

    #[error("failed to decode result payload: {0}")]
    Decode(String),
}
