use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl BridgeError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Http { status, .. } => *status >= 500 || *status == 429,
            BridgeError::OperationFailed(_) => true,
            BridgeError::NotFound(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
