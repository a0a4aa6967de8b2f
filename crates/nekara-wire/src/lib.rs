//! # nekara-wire: Envelope protocol for `Nekara`
//!
//! Every call into the testing service is a [`Request`] naming a remote
//! operation and carrying positional JSON arguments; every answer is a
//! [`Response`] carrying either a JSON value or an [`ErrorResponse`].
//!
//! The envelope is transport-agnostic. A transport only has to move
//! requests to something implementing [`Service`] and move responses back.
//! [`Request::to_json`] and [`Response::from_json`] give the canonical
//! encoding for transports that frame JSON documents.

pub mod ops;

use std::fmt::{self, Display};

use nekara_types::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Envelope encoding errors.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type WireResult<T> = Result<T, WireError>;

// ============================================================================
// Request
// ============================================================================

/// Caller-chosen correlation ID, echoed in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A call to a named remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Target session. Absent only for operations that create sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Operation name, e.g. `ContextSwitch`.
    pub function: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(id: RequestId, function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id,
            session_id: None,
            function: function.into(),
            args,
        }
    }

    pub fn for_session(
        id: RequestId,
        session: SessionId,
        function: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            id,
            session_id: Some(session),
            function: function.into(),
            args,
        }
    }

    pub fn to_json(&self) -> WireResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> WireResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Response
// ============================================================================

/// Error codes returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The program under test failed an assertion or deadlocked.
    AssertionFailure,
    /// The instrumentation broke the protocol: unknown IDs, duplicates,
    /// calls after the session finished.
    ProtocolMisuse,
    /// The session watchdog fired.
    InactivityTimeout,
    /// A replay did not reproduce the recorded trace.
    ReplayDivergence,
    /// No session with the requested ID.
    SessionNotFound,
    /// No operation with the requested name.
    UnknownOperation,
    /// Argument count or types do not match the operation.
    InvalidRequest,
    /// Unexpected failure inside the service.
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssertionFailure => "assertion_failure",
            Self::ProtocolMisuse => "protocol_misuse",
            Self::InactivityTimeout => "inactivity_timeout",
            Self::ReplayDivergence => "replay_divergence",
            Self::SessionNotFound => "session_not_found",
            Self::UnknownOperation => "unknown_operation",
            Self::InvalidRequest => "invalid_request",
            Self::InternalError => "internal_error",
        }
    }

    /// Returns true if the error reports a bug in the program under test
    /// rather than in its instrumentation or in the service.
    pub fn is_program_failure(&self) -> bool {
        matches!(
            self,
            Self::AssertionFailure | Self::InactivityTimeout | Self::ReplayDivergence
        )
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePayload {
    Ok(Value),
    Error(ErrorResponse),
}

/// Answer to a [`Request`] with the same ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub payload: ResponsePayload,
}

impl Response {
    pub fn ok(id: RequestId, value: Value) -> Self {
        Self {
            id,
            payload: ResponsePayload::Ok(value),
        }
    }

    pub fn error(id: RequestId, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            payload: ResponsePayload::Error(ErrorResponse {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.payload, ResponsePayload::Ok(_))
    }

    /// Converts into the carried value or error.
    pub fn into_result(self) -> Result<Value, ErrorResponse> {
        match self.payload {
            ResponsePayload::Ok(value) => Ok(value),
            ResponsePayload::Error(error) => Err(error),
        }
    }

    pub fn to_json(&self) -> WireResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> WireResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Service
// ============================================================================

/// Anything that answers envelope requests.
///
/// Implementations must be callable from many threads at once: a program
/// under test issues calls from every one of its tasks, and most of those
/// calls block until the scheduler resumes the calling task.
pub trait Service: Send + Sync {
    fn call(&self, request: Request) -> Response;
}

impl<S: Service + ?Sized> Service for std::sync::Arc<S> {
    fn call(&self, request: Request) -> Response {
        (**self).call(request)
    }
}
