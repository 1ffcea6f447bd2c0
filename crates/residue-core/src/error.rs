/// Error type shared by every stage of residual program materialization.
///
/// There is no recoverable path: any error aborts the whole pass and no
/// partial output is produced.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The input program uses a construct this stage cannot represent.
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// The heap graph references something that does not exist.
    #[error("invalid heap graph: {0}")]
    InvalidInput(String),

    /// A cross-reference that an earlier phase should have produced is missing.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        CoreError::Unsupported(message.into())
    }
}
