//! Error type shared by the quiz and profile stores.

use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by collaborator stores regardless of the underlying backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed mid-request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was attempted.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The referenced record does not exist in the backend.
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend answered but refused the operation.
    #[error("storage rejected the operation: {message}")]
    Rejected {
        /// Reason given by the backend.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejection carrying a backend-provided explanation.
    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }
}
