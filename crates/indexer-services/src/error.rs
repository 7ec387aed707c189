//! Error types for the external service clients.

use thiserror::Error;

/// Errors from the chunking and embedding service clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection-level failure (refused, reset, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered but the body violated the contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Whether a retry can plausibly succeed.
    ///
    /// Transport failures and server-side errors are transient; a
    /// contract-violating body is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport(_) => true,
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            ServiceError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Transport(err.to_string())
    }
}
