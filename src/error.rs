//! Error types for room actions, services and HTTP responses.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Coarse error category reported to WebSocket clients alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, duplicate join, full room.
    Validation,
    /// Non-host attempting a host-only action.
    Authorization,
    /// Action not allowed in the room's current status.
    State,
    /// Room or quiz reference missing.
    NotFound,
    /// A collaborator (quiz store, identity provider) could not be reached.
    Unavailable,
}

/// Errors produced while applying a player action to a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The room already holds `capacity` players.
    #[error("room is full ({capacity} players)")]
    RoomFull {
        /// Configured player limit of the room.
        capacity: usize,
    },
    /// The identity is already a member of the room.
    #[error("player is already in this room")]
    AlreadyMember,
    /// The identity is not a member of the room.
    #[error("player is not in this room")]
    NotMember,
    /// Host-only action attempted by somebody else.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Action invalid for the current room status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Start preconditions that are not met, one entry per reason.
    #[error("cannot start quiz: {}", .0.join(", "))]
    StartRejected(Vec<String>),
    /// Room or quiz reference missing.
    #[error("not found: {0}")]
    NotFound(String),
    /// A collaborator needed to serve the action is unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl RoomError {
    /// Category used for the `error` event sent back to the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::Validation(_)
            | RoomError::RoomFull { .. }
            | RoomError::AlreadyMember
            | RoomError::NotMember => ErrorKind::Validation,
            RoomError::Unauthorized(_) => ErrorKind::Authorization,
            RoomError::InvalidState(_) | RoomError::StartRejected(_) => ErrorKind::State,
            RoomError::NotFound(_) => ErrorKind::NotFound,
            RoomError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<InvalidTransition> for RoomError {
    fn from(err: InvalidTransition) -> Self {
        RoomError::InvalidState(err.to_string())
    }
}

impl From<StorageError> for RoomError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => RoomError::NotFound(what),
            other => RoomError::Unavailable(other.to_string()),
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
