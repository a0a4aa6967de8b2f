//! Session-bound client handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nekara_types::{ProgramIdentity, ResourceId, SessionId, SessionInfo, SessionReport, TaskId};
use nekara_wire::{Request, RequestId, Service, ops};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::trace;

use crate::error::{ClientError, ClientResult};

/// Optional per-session limits; unset fields use the service defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub timeout_ms: Option<u64>,
    pub max_decisions: Option<usize>,
}

/// Counters shared by every clone of one client.
#[derive(Debug)]
struct Counters {
    next_request: AtomicU64,
    next_id: AtomicU64,
}

impl Counters {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_request: AtomicU64::new(1),
            next_id: AtomicU64::new(1),
        })
    }
}

/// Handle to one session of a [`Service`].
///
/// Clones share the session, the request counter and the ID allocator, so
/// a clone can be moved into every task thread of the program under test.
#[derive(Clone)]
pub struct SessionClient {
    service: Arc<dyn Service>,
    session: SessionId,
    counters: Arc<Counters>,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("session", &self.session)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Starts a new session and binds a client to it.
    pub fn initialize(
        service: Arc<dyn Service>,
        program: &ProgramIdentity,
        scheduling_seed: u64,
        settings: SessionSettings,
    ) -> ClientResult<Self> {
        let mut args = vec![
            json!(program.program),
            json!(program.module),
            json!(program.entry),
            json!(scheduling_seed),
        ];
        if settings.timeout_ms.is_some() || settings.max_decisions.is_some() {
            args.push(json!(settings.timeout_ms));
        }
        if settings.max_decisions.is_some() {
            args.push(json!(settings.max_decisions));
        }

        let request = Request::new(RequestId::new(0), ops::INITIALIZE_TEST_SESSION, args);
        let value = service
            .call(request)
            .into_result()
            .map_err(|source| ClientError::Remote {
                function: ops::INITIALIZE_TEST_SESSION.to_string(),
                source,
            })?;
        let session = decode(ops::INITIALIZE_TEST_SESSION, value)?;
        Ok(Self::attach(service, session))
    }

    /// Binds a client with fresh counters to an existing session.
    ///
    /// Replays must use a freshly attached client so that task and
    /// resource IDs are allocated exactly as in the first run.
    pub fn attach(service: Arc<dyn Service>, session: SessionId) -> Self {
        Self {
            service,
            session,
            counters: Counters::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    /// Allocates an ID for a new task or resource. Never returns `0`.
    pub fn reserve_id(&self) -> u64 {
        self.counters.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Sends one call to the session and returns the raw result.
    pub fn call(&self, function: &str, args: Vec<Value>) -> ClientResult<Value> {
        let id = RequestId::new(self.counters.next_request.fetch_add(1, Ordering::SeqCst));
        trace!(session = %self.session, request_id = %id, function, "call");
        self.service
            .call(Request::for_session(id, self.session, function, args))
            .into_result()
            .map_err(|source| ClientError::Remote {
                function: function.to_string(),
                source,
            })
    }

    fn call_unit(&self, function: &str, args: Vec<Value>) -> ClientResult<()> {
        self.call(function, args).map(|_| ())
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Starts a replay of the finished session.
    pub fn replay(&self) -> ClientResult<SessionInfo> {
        let value = self.call(ops::REPLAY_TEST_SESSION, vec![])?;
        decode(ops::REPLAY_TEST_SESSION, value)
    }

    pub fn session_info(&self) -> ClientResult<SessionReport> {
        let value = self.call(ops::GET_SESSION_INFO, vec![])?;
        decode(ops::GET_SESSION_INFO, value)
    }

    pub fn teardown(&self) -> ClientResult<()> {
        self.call_unit(ops::TEARDOWN_TEST_SESSION, vec![])
    }

    /// Ends the main task and waits for the run to finish.
    ///
    /// Returns the failure reason, or `None` if the run passed.
    pub fn wait_for_main_task(&self) -> ClientResult<Option<String>> {
        let value = self.call(ops::WAIT_FOR_MAIN_TASK, vec![])?;
        let reason: String = decode(ops::WAIT_FOR_MAIN_TASK, value)?;
        Ok(Some(reason).filter(|r| !r.is_empty()))
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    pub fn create_task(&self) -> ClientResult<()> {
        self.call_unit(ops::CREATE_TASK, vec![])
    }

    pub fn start_task(&self, task: TaskId) -> ClientResult<()> {
        self.call_unit(ops::START_TASK, vec![json!(task)])
    }

    pub fn end_task(&self, task: TaskId) -> ClientResult<()> {
        self.call_unit(ops::END_TASK, vec![json!(task)])
    }

    pub fn context_switch(&self) -> ClientResult<()> {
        self.call_unit(ops::CONTEXT_SWITCH, vec![])
    }

    // ------------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------------

    pub fn create_resource(&self, resource: ResourceId) -> ClientResult<()> {
        self.call_unit(ops::CREATE_RESOURCE, vec![json!(resource)])
    }

    pub fn delete_resource(&self, resource: ResourceId) -> ClientResult<()> {
        self.call_unit(ops::DELETE_RESOURCE, vec![json!(resource)])
    }

    pub fn blocked_on_resource(&self, resource: ResourceId) -> ClientResult<()> {
        self.call_unit(ops::BLOCKED_ON_RESOURCE, vec![json!(resource)])
    }

    pub fn blocked_on_any_resource(&self, resources: &[ResourceId]) -> ClientResult<()> {
        self.call_unit(ops::BLOCKED_ON_ANY_RESOURCE, vec![json!(resources)])
    }

    pub fn signal_updated_resource(&self, resource: ResourceId) -> ClientResult<()> {
        self.call_unit(ops::SIGNAL_UPDATED_RESOURCE, vec![json!(resource)])
    }

    // ------------------------------------------------------------------------
    // Nondeterminism and assertions
    // ------------------------------------------------------------------------

    pub fn create_nondet_bool(&self) -> ClientResult<bool> {
        let value = self.call(ops::CREATE_NONDET_BOOL, vec![])?;
        decode(ops::CREATE_NONDET_BOOL, value)
    }

    /// Draws an integer in `[0, max)`.
    pub fn create_nondet_integer(&self, max: u64) -> ClientResult<u64> {
        let value = self.call(ops::CREATE_NONDET_INTEGER, vec![json!(max)])?;
        decode(ops::CREATE_NONDET_INTEGER, value)
    }

    pub fn assert(&self, predicate: bool, message: &str) -> ClientResult<()> {
        self.call_unit(ops::ASSERT, vec![json!(predicate), json!(message)])
    }
}

fn decode<T: DeserializeOwned>(function: &str, value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|source| ClientError::Decode {
        function: function.to_string(),
        source,
    })
}
