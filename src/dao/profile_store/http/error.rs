//! Error types of the HTTP profile store.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`ProfileServiceError`] failures.
pub type ProfileServiceResult<T> = Result<T, ProfileServiceError>;

/// Failures that can occur while talking to the profile service.
#[derive(Debug, Error)]
pub enum ProfileServiceError {
    /// Required environment variable is missing.
    #[error("missing profile service environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build profile service client")]
    ClientBuilder {
        /// Underlying failure.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send profile service request to `{path}`")]
    RequestSend {
        /// Request path.
        path: String,
        /// Underlying failure.
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with an unexpected status code.
    #[error("unexpected profile service response status {status} for `{path}`")]
    RequestStatus {
        /// Request path.
        path: String,
        /// Status returned.
        status: StatusCode,
    },
    /// Response payload could not be decoded.
    #[error("failed to decode profile service response for `{path}`")]
    DecodeResponse {
        /// Request path.
        path: String,
        /// Underlying failure.
        #[source]
        source: reqwest::Error,
    },
}

impl From<ProfileServiceError> for StorageError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::RequestStatus { path, status } if status == StatusCode::NOT_FOUND => {
                StorageError::NotFound(path)
            }
            ProfileServiceError::RequestStatus { path, status } if status.is_client_error() => {
                StorageError::rejected(format!("{path} answered {status}"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
