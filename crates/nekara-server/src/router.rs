//! Session router.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use nekara_config::NekaraConfig;
use nekara_core::{
    DEFAULT_MAX_DECISIONS, DEFAULT_TIMEOUT_MS, FinishHook, SessionOptions, TestingSession,
};
use nekara_types::{ProgramIdentity, SessionId, SessionInfo, SessionRecord, TestResult};
use nekara_wire::{Request, Response, Service, ops};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::args::Args;
use crate::error::{ServerError, ServerResult, error_to_wire};
use crate::operations::{self, Handler};
use crate::summary::SummaryLog;

/// Reason recorded for sessions torn down while still running.
pub const TEARDOWN_REASON: &str = "session torn down";

/// Router settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Directory for persisted decision traces; in-memory when unset.
    pub trace_dir: Option<PathBuf>,
    /// CSV summary log; disabled when unset.
    pub summary_path: Option<PathBuf>,
    pub default_timeout_ms: u64,
    pub default_max_decisions: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            trace_dir: None,
            summary_path: None,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            default_max_decisions: DEFAULT_MAX_DECISIONS,
        }
    }
}

impl From<&NekaraConfig> for ServerOptions {
    fn from(config: &NekaraConfig) -> Self {
        Self {
            trace_dir: config.trace_dir().map(PathBuf::from),
            summary_path: config.summary_path().map(PathBuf::from),
            default_timeout_ms: config.session.timeout_ms,
            default_max_decisions: config.session.max_decisions,
        }
    }
}

/// Pass/total counters across every run the router has seen.
#[derive(Debug, Default)]
struct Tally {
    passed: AtomicU64,
    total: AtomicU64,
}

/// A call being dispatched to a registered operation.
pub(crate) struct Call<'a> {
    pub(crate) function: &'a str,
    pub(crate) session_id: Option<SessionId>,
    pub(crate) args: Args<'a>,
}

impl Call<'_> {
    pub(crate) fn session_id(&self) -> ServerResult<SessionId> {
        self.session_id.ok_or_else(|| ServerError::MissingSession {
            function: self.function.to_string(),
        })
    }
}

/// Maps session IDs to live sessions and dispatches calls to them.
///
/// The session map sits behind its own mutex, which is held only for map
/// lookups and updates; calls into a session never hold it. Unrelated
/// sessions therefore never contend.
pub struct NekaraServer {
    options: ServerOptions,
    sessions: Mutex<HashMap<SessionId, Arc<TestingSession>>>,
    next_session: AtomicU64,
    operations: HashMap<&'static str, Handler>,
    finish_hook: FinishHook,
}

impl NekaraServer {
    pub fn new(options: ServerOptions) -> Self {
        let summary = options.summary_path.clone().map(SummaryLog::new);
        let tally = Arc::new(Tally::default());
        let finish_hook: FinishHook = Arc::new(move |info: &SessionInfo, record: &SessionRecord| {
            let total = tally.total.fetch_add(1, Ordering::SeqCst) + 1;
            let passed = if record.passed() {
                tally.passed.fetch_add(1, Ordering::SeqCst) + 1
            } else {
                tally.passed.load(Ordering::SeqCst)
            };
            info!(session = %info.id, result = %record.result, "Results: {passed}/{total}");

            if let Some(log) = &summary
                && let Err(e) = log.append(info, record)
            {
                warn!(path = %log.path().display(), error = %e, "failed to append summary row");
            }
        });

        Self {
            options,
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            operations: operations::registry(),
            finish_hook,
        }
    }

    pub fn from_config(config: &NekaraConfig) -> Self {
        Self::new(ServerOptions::from(config))
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<TestingSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// IDs of every registered session, ascending.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn session(&self, id: SessionId) -> ServerResult<Arc<TestingSession>> {
        self.sessions()
            .get(&id)
            .cloned()
            .ok_or(ServerError::SessionNotFound(id))
    }

    // ------------------------------------------------------------------------
    // Session management
    // ------------------------------------------------------------------------

    /// Validates the metadata, starts a session and registers it.
    pub fn initialize_session(
        &self,
        program: ProgramIdentity,
        scheduling_seed: u64,
        timeout_ms: Option<u64>,
        max_decisions: Option<usize>,
    ) -> ServerResult<SessionId> {
        if !program.is_complete() {
            return Err(ServerError::InvalidMetadata(format!(
                "program identity must name a program, module and entry point (got {program})"
            )));
        }
        let timeout_ms = timeout_ms.unwrap_or(self.options.default_timeout_ms);
        let max_decisions = max_decisions.unwrap_or(self.options.default_max_decisions);
        if timeout_ms == 0 || max_decisions == 0 {
            return Err(ServerError::InvalidMetadata(
                "timeout and decision budget must be positive".to_string(),
            ));
        }

        let id = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
        let info = SessionInfo {
            id,
            program,
            scheduling_seed,
            timeout_ms,
            max_decisions,
        };
        let mut options = SessionOptions::new().with_finish_hook(Arc::clone(&self.finish_hook));
        if let Some(dir) = &self.options.trace_dir {
            options = options.with_trace_dir(dir);
        }

        let session = TestingSession::start(info, options)?;
        self.sessions().insert(id, session);
        Ok(id)
    }

    /// Finishes the session if it is still running and forgets it.
    pub fn teardown(&self, id: SessionId) -> ServerResult<()> {
        let session = self
            .sessions()
            .remove(&id)
            .ok_or(ServerError::SessionNotFound(id))?;
        if !session.is_finished() {
            session.finish(TestResult::Error, TEARDOWN_REASON);
        }
        info!(session = %id, "session torn down");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Dispatches `function` to its registered operation.
    pub fn route(
        &self,
        session_id: Option<SessionId>,
        function: &str,
        args: &[Value],
    ) -> ServerResult<Value> {
        let handler = self
            .operations
            .get(function)
            .ok_or_else(|| ServerError::UnknownOperation(function.to_string()))?;
        let call = Call {
            function,
            session_id,
            args: Args::new(function, args),
        };

        let session = session_id.and_then(|id| self.session(id).ok());
        if let Some(session) = &session {
            session.begin_request();
        }
        let started = Instant::now();
        let result = handler(self, &call);
        if let Some(session) = &session {
            session.end_request(started.elapsed());
        }
        result
    }

    /// Looks up the call's session, rejecting finished sessions unless the
    /// operation is allowed after finishing.
    pub(crate) fn target(&self, call: &Call<'_>) -> ServerResult<Arc<TestingSession>> {
        let id = call.session_id()?;
        let session = self.session(id)?;
        if session.is_finished() && !ops::ALLOWED_AFTER_FINISH.contains(&call.function) {
            return Err(ServerError::SessionFinished {
                session: id,
                function: call.function.to_string(),
            });
        }
        Ok(session)
    }

    /// Handles a request and returns a response.
    ///
    /// Errors and panics raised while handling are converted into error
    /// responses; neither escapes to the caller.
    #[instrument(skip_all, fields(request_id = request.id.0, op = %request.function))]
    pub fn handle(&self, request: Request) -> Response {
        let Request {
            id,
            session_id,
            function,
            args,
        } = request;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.route(session_id, &function, &args)
        }))
        .unwrap_or_else(|payload| {
            Err(ServerError::Panic {
                function: function.clone(),
                message: panic_message(payload.as_ref()),
            })
        });

        match outcome {
            Ok(value) => Response::ok(id, value),
            Err(e) => {
                if e.is_internal() {
                    error!(session = ?session_id, error = %e, "request failed");
                }
                let (code, message) = error_to_wire(&e);
                Response::error(id, code, message)
            }
        }
    }
}

impl Default for NekaraServer {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

impl Service for NekaraServer {
    fn call(&self, request: Request) -> Response {
        self.handle(request)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
