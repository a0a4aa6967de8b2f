//! Server error types.

use nekara_core::{ErrorKind, SchedulerError};
use nekara_types::SessionId;
use nekara_wire::ErrorCode;
use thiserror::Error;

/// Result type for router operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while routing a call.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Raised by the session's scheduler.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// No session with this ID is registered.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// A session operation arrived without a session ID.
    #[error("{function} requires a session id")]
    MissingSession { function: String },

    /// The session finished and the operation is not allowed afterwards.
    #[error("session {session} has already finished; {function} is not allowed")]
    SessionFinished { session: SessionId, function: String },

    /// No operation with this name is registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Wrong argument count or types.
    #[error("invalid arguments for {function}: {message}")]
    InvalidArguments { function: String, message: String },

    /// Session metadata failed validation.
    #[error("invalid session metadata: {0}")]
    InvalidMetadata(String),

    /// A result could not be encoded.
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    /// A handler panicked.
    #[error("operation {function} panicked: {message}")]
    Panic { function: String, message: String },
}

impl ServerError {
    /// Returns true for failures of the service itself, which are logged.
    pub fn is_internal(&self) -> bool {
        matches!(error_to_wire(self).0, ErrorCode::InternalError)
    }
}

/// Maps a server error to its wire code and message.
pub fn error_to_wire(error: &ServerError) -> (ErrorCode, String) {
    match error {
        ServerError::Scheduler(e) => {
            let code = match e.kind() {
                ErrorKind::AssertionFailure => ErrorCode::AssertionFailure,
                ErrorKind::ProtocolMisuse => ErrorCode::ProtocolMisuse,
                ErrorKind::InactivityTimeout => ErrorCode::InactivityTimeout,
                ErrorKind::ReplayDivergence => ErrorCode::ReplayDivergence,
                ErrorKind::Internal => ErrorCode::InternalError,
            };
            (code, e.to_string())
        }
        ServerError::SessionNotFound(_) => (ErrorCode::SessionNotFound, error.to_string()),
        ServerError::SessionFinished { .. } => (ErrorCode::ProtocolMisuse, error.to_string()),
        ServerError::UnknownOperation(_) => (ErrorCode::UnknownOperation, error.to_string()),
        ServerError::MissingSession { .. }
        | ServerError::InvalidArguments { .. }
        | ServerError::InvalidMetadata(_) => (ErrorCode::InvalidRequest, error.to_string()),
        ServerError::Encode(_) | ServerError::Panic { .. } => {
            (ErrorCode::InternalError, error.to_string())
        }
    }
}
