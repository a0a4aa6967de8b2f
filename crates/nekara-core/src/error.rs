//! Scheduler error types.

use nekara_types::{ResourceId, SessionId, TaskId, TestResult};
use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised by the registry and the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The program under test violated an invariant, or the scheduler found
    /// a structural bug such as a deadlock.
    #[error("{0}")]
    AssertionFailure(String),

    /// A task with this ID is already registered.
    #[error("duplicate declaration of task {0}")]
    DuplicateTask(TaskId),

    /// No live task has this ID.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// A resource with this ID is already declared.
    #[error("duplicate declaration of resource {0}")]
    DuplicateResource(ResourceId),

    /// No declared resource has this ID.
    #[error("resource {0} has not been declared")]
    UnknownResource(ResourceId),

    /// The task is already waiting on a set of resources.
    #[error("task {0} is already blocked on a resource")]
    AlreadyBlocked(TaskId),

    /// `StartTask` arrived without a matching `CreateTask`.
    #[error("StartTask({0}) called without calling CreateTask")]
    UnexpectedStart(TaskId),

    /// An argument is outside its accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs a finished session.
    #[error("session {session} is still running")]
    SessionRunning { session: SessionId },

    /// The session finished; the caller must unwind.
    #[error("session {session} has already finished ({result}): {reason}")]
    SessionFinished {
        session: SessionId,
        result: TestResult,
        reason: String,
    },

    /// Anything else: thread spawn failures and the like.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of errors, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tested program is wrong.
    AssertionFailure,
    /// The instrumentation is wrong.
    ProtocolMisuse,
    /// No scheduling activity within the watchdog window.
    InactivityTimeout,
    /// A replay did not reproduce the recorded run.
    ReplayDivergence,
    /// Unexpected failure inside the service.
    Internal,
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AssertionFailure(_) => ErrorKind::AssertionFailure,
            Self::DuplicateTask(_)
            | Self::UnknownTask(_)
            | Self::DuplicateResource(_)
            | Self::UnknownResource(_)
            | Self::AlreadyBlocked(_)
            | Self::UnexpectedStart(_)
            | Self::InvalidArgument(_)
            | Self::SessionRunning { .. } => ErrorKind::ProtocolMisuse,
            Self::SessionFinished { result, .. } => match result {
                TestResult::Fail => ErrorKind::AssertionFailure,
                TestResult::InactivityTimeout => ErrorKind::InactivityTimeout,
                TestResult::ReplayDivergence => ErrorKind::ReplayDivergence,
                TestResult::Error => ErrorKind::Internal,
                TestResult::Pass
                | TestResult::MaxDecisionsReached
                | TestResult::FaultyProgram => ErrorKind::ProtocolMisuse,
            },
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailure(_))
    }

    pub fn is_session_finished(&self) -> bool {
        matches!(self, Self::SessionFinished { .. })
    }
}
