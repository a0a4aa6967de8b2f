//! Client error types.

use nekara_types::TaskId;
use nekara_wire::{ErrorCode, ErrorResponse};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to the program under test.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with an error.
    #[error("{function} failed: {source}")]
    Remote {
        function: String,
        #[source]
        source: ErrorResponse,
    },

    /// The service answered with a value of the wrong shape.
    #[error("unexpected result from {function}: {source}")]
    Decode {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    /// The OS refused to start a task thread.
    #[error("failed to spawn thread for task {task}: {source}")]
    Spawn {
        task: TaskId,
        #[source]
        source: std::io::Error,
    },

    /// A task thread panicked.
    #[error("task {0} panicked")]
    TaskPanicked(TaskId),
}

impl ClientError {
    /// The wire code of a remote error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Remote { source, .. } => Some(source.code),
            _ => None,
        }
    }

    /// Returns true if the program under test, rather than the
    /// instrumentation, caused this error.
    pub fn is_program_failure(&self) -> bool {
        self.code().is_some_and(|code| code.is_program_failure())
    }
}
