use thiserror::Error;

pub type CybsResult<T> = Result<T, CybsError>;

#[derive(Debug, Error)]
pub enum CybsError {
    /// Malformed mnemonic or configuration. Fatal; the operation aborts
    /// before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Authenticated-decryption failure or other cryptographic failure.
    /// Fatal for the stream and never retried.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Single-object download/upload failure during a backup. Counted and
    /// audited by the orchestrator; never escalates to job failure.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Operation referencing an unknown job or configuration id.
    #[error("job state error: {0}")]
    JobState(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("audit error: {0}")]
    Audit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
