//! The testing session: cooperative scheduling, finishing and replay.
//!
//! A session serializes the program under test. Exactly one registered task
//! holds control at any time; every other task is parked on its continue
//! signal. Each `context_switch` draws the next task from the session's
//! seeded randomizer and records the choice in the decision trace.
//!
//! # Lifecycle
//!
//! ```text
//!   start() ──► Running ──finish──► FinishedFirstRun ──reset()──► Running (replay)
//!                                                                   │
//!                                   FinishedReplay ◄────finish──────┘
//! ```
//!
//! A run finishes when every task has ended (pass), on an assertion failure
//! or deadlock (fail), when the decision budget is spent, or when the
//! inactivity watchdog fires. Finishing cancels every outstanding continue
//! signal so parked callers unwind.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nekara_types::{
    ResourceId, SessionId, SessionInfo, SessionRecord, SessionReport, TaskId, TestResult,
};
use tracing::{debug, info, trace, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::program_state::ProgramState;
use crate::rng::SeededRandomizer;
use crate::trace::{DecisionRecord, DecisionTrace};
use crate::watchdog;

/// Failure reason when tasks remain but none of them is enabled.
pub const DEADLOCK_REASON: &str = "Deadlock detected";

/// Failure reason when the decision budget is exhausted.
pub const MAX_DECISIONS_REASON: &str =
    "Maximum steps reached; the program may be in a live-lock state!";

/// Reason attached to runs that made no scheduling decision at all.
pub const NO_CONCURRENCY_REASON: &str =
    "No decisions were recorded; the program does not model any concurrency";

/// Callback invoked once per finished run, outside the session lock.
pub type FinishHook = Arc<dyn Fn(&SessionInfo, &SessionRecord) + Send + Sync>;

/// Options that do not belong to the session's identity.
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Directory that receives `session-<id>-trace.txt`. Traces stay in
    /// memory when unset.
    pub trace_dir: Option<PathBuf>,
    pub on_finish: Option<FinishHook>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = Some(dir.into());
        self
    }

    pub fn with_finish_hook(mut self, hook: FinishHook) -> Self {
        self.on_finish = Some(hook);
        self
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("trace_dir", &self.trace_dir)
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    FinishedFirstRun,
    FinishedReplay,
}

impl SessionStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    FirstRun,
    Replay,
}

#[derive(Debug)]
struct RunStats {
    started_at: Instant,
    num_requests: u64,
    time_in_calls: Duration,
}

impl RunStats {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            num_requests: 0,
            time_in_calls: Duration::ZERO,
        }
    }

    fn avg_invoke_ms(&self) -> f64 {
        if self.num_requests == 0 {
            return 0.0;
        }
        self.time_in_calls.as_secs_f64() * 1000.0 / self.num_requests as f64
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    program: ProgramState,
    rng: SeededRandomizer,
    trace: DecisionTrace,
    status: SessionStatus,
    mode: RunMode,
    /// Incremented on every reset; stale watchdogs compare against it.
    pub(crate) epoch: u64,
    /// When the watchdog fires unless another decision is made.
    pub(crate) deadline: Option<Instant>,
    stats: RunStats,
    outcome: Option<SessionRecord>,
    /// The first accepted run followed by every faithfully reproduced replay.
    records: Vec<SessionRecord>,
    /// In-memory copy of the first run's trace, used without a trace directory.
    baseline: Option<DecisionTrace>,
}

impl SessionState {
    fn fresh_run(seed: u64, timeout: Duration) -> Self {
        Self {
            program: ProgramState::new(),
            rng: SeededRandomizer::new(seed),
            trace: DecisionTrace::new(),
            status: SessionStatus::Running,
            mode: RunMode::FirstRun,
            epoch: 0,
            deadline: Some(Instant::now() + timeout),
            stats: RunStats::new(),
            outcome: None,
            records: Vec::new(),
            baseline: None,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }
}

// ============================================================================
// Testing Session
// ============================================================================

/// One logical test session.
///
/// All mutable state sits behind a single mutex. The `changed` condition
/// variable is notified whenever a pending task creation is resolved, the
/// session finishes, or a replay starts.
pub struct TestingSession {
    info: SessionInfo,
    trace_dir: Option<PathBuf>,
    on_finish: Option<FinishHook>,
    state: Mutex<SessionState>,
    pub(crate) changed: Condvar,
}

impl fmt::Debug for TestingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestingSession")
            .field("info", &self.info)
            .field("trace_dir", &self.trace_dir)
            .finish_non_exhaustive()
    }
}

impl TestingSession {
    /// Creates a session and starts its first run.
    pub fn start(info: SessionInfo, options: SessionOptions) -> SchedulerResult<Arc<Self>> {
        if info.timeout_ms == 0 {
            return Err(SchedulerError::InvalidArgument(
                "timeout must be positive".to_string(),
            ));
        }
        if info.max_decisions == 0 {
            return Err(SchedulerError::InvalidArgument(
                "decision budget must be positive".to_string(),
            ));
        }

        let timeout = Duration::from_millis(info.timeout_ms);
        let session = Arc::new(Self {
            state: Mutex::new(SessionState::fresh_run(info.scheduling_seed, timeout)),
            info,
            trace_dir: options.trace_dir,
            on_finish: options.on_finish,
            changed: Condvar::new(),
        });

        info!(
            session = %session.id(),
            program = %session.info.program,
            seed = session.info.scheduling_seed,
            "test session started"
        );
        watchdog::spawn(&session, 0)?;
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.info.timeout_ms)
    }

    /// Path of the persisted trace, if traces are written to disk.
    pub fn trace_path(&self) -> Option<PathBuf> {
        self.trace_dir
            .as_deref()
            .map(|dir| trace_file_path(dir, self.id()))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Whether the current or next run is compared against a recording.
    pub fn is_replay(&self) -> bool {
        self.lock().mode == RunMode::Replay
    }

    /// Record of the last finished run.
    pub fn outcome(&self) -> Option<SessionRecord> {
        self.lock().outcome.clone()
    }

    /// The first accepted run followed by every reproduced replay.
    pub fn records(&self) -> Vec<SessionRecord> {
        self.lock().records.clone()
    }

    /// Snapshot of the metadata, status and records, taken under one lock.
    pub fn report(&self) -> SessionReport {
        let state = self.lock();
        SessionReport {
            info: self.info.clone(),
            finished: state.status.is_finished(),
            replay: state.mode == RunMode::Replay,
            outcome: state.outcome.clone(),
            records: state.records.clone(),
        }
    }

    /// Copy of the trace recorded so far in the current run.
    pub fn trace(&self) -> DecisionTrace {
        self.lock().trace.clone()
    }

    pub fn current_task(&self) -> TaskId {
        self.lock().program.current_task()
    }

    /// Compact description of the registry for diagnostics.
    pub fn describe_state(&self) -> String {
        self.lock().program.describe()
    }

    /// Counts a routed call before it is dispatched, so the call that ends a
    /// run is part of that run's record.
    pub fn begin_request(&self) {
        self.lock().stats.num_requests += 1;
    }

    /// Adds the wall-clock time a routed call took once it returns.
    pub fn end_request(&self, elapsed: Duration) {
        self.lock().stats.time_in_calls += elapsed;
    }

    // ------------------------------------------------------------------------
    // Program-facing operations
    // ------------------------------------------------------------------------

    /// Announces a task that will call `start_task` shortly.
    pub fn create_task(&self) -> SchedulerResult<()> {
        let mut state = self.lock();
        self.ensure_running(&state)?;
        state.program.declare_pending_task();
        Ok(())
    }

    /// Registers `task` and parks the caller until the scheduler picks it.
    pub fn start_task(&self, task: TaskId) -> SchedulerResult<()> {
        let result = self.start_task_inner(task);
        self.checked(result)
    }

    fn start_task_inner(&self, task: TaskId) -> SchedulerResult<()> {
        let mut state = self.lock();
        self.ensure_running(&state)?;
        let started = state.program.start_task(task);
        self.changed.notify_all();
        let signal = started?;
        trace!(session = %self.id(), task = %task, "task started");
        drop(state);
        signal.wait()
    }

    /// Unregisters `task`, which must be the caller, and schedules the next one.
    pub fn end_task(&self, task: TaskId) -> SchedulerResult<()> {
        let result = self.end_task_inner(task);
        self.checked(result)
    }

    fn end_task_inner(&self, task: TaskId) -> SchedulerResult<()> {
        let mut state = self.await_pending_creations(self.lock())?;
        Self::ensure_in_control(&state, task, "EndTask")?;
        state.program.end_task(task)?;
        trace!(session = %self.id(), task = %task, "task ended");
        self.switch_from(state)
    }

    pub fn create_resource(&self, resource: ResourceId) -> SchedulerResult<()> {
        let mut state = self.lock();
        self.ensure_running(&state)?;
        state.program.create_resource(resource)
    }

    pub fn delete_resource(&self, resource: ResourceId) -> SchedulerResult<()> {
        let result = {
            let mut state = self.lock();
            self.ensure_running(&state)
                .and_then(|()| state.program.delete_resource(resource))
        };
        self.checked(result)
    }

    /// Blocks the current task on `resource` and yields.
    pub fn blocked_on_resource(&self, resource: ResourceId) -> SchedulerResult<()> {
        self.blocked_on_any_resource(&[resource])
    }

    /// Blocks the current task until any of `resources` is signaled, and yields.
    pub fn blocked_on_any_resource(&self, resources: &[ResourceId]) -> SchedulerResult<()> {
        let result = self.blocked_on_inner(resources);
        self.checked(result)
    }

    fn blocked_on_inner(&self, resources: &[ResourceId]) -> SchedulerResult<()> {
        let mut state = self.lock();
        self.ensure_running(&state)?;
        let current = state.program.current_task();
        state.program.block_on(current, resources)?;
        trace!(session = %self.id(), task = %current, ?resources, "task blocked");
        self.switch_from(state)
    }

    /// Unblocks every task waiting on `resource`. Does not yield.
    pub fn signal_updated_resource(&self, resource: ResourceId) -> SchedulerResult<()> {
        let mut state = self.lock();
        self.ensure_running(&state)?;
        let unblocked = state.program.signal(resource)?;
        if !unblocked.is_empty() {
            trace!(session = %self.id(), resource = %resource, ?unblocked, "resource signaled");
        }
        Ok(())
    }

    /// Draws a boolean from the session's randomizer and records it.
    ///
    /// Like a context switch, waits for announced tasks to start first so
    /// that the recorded snapshot does not depend on thread timing.
    pub fn create_nondet_bool(&self) -> SchedulerResult<bool> {
        let mut state = self.await_pending_creations(self.lock())?;
        let value = state.rng.next_bool();
        let record = DecisionRecord::nondet_bool(
            value,
            state.program.current_task(),
            state.program.snapshot(),
        );
        state.trace.push(record);
        Ok(value)
    }

    /// Draws an integer in `[0, max)` and records it.
    pub fn create_nondet_integer(&self, max: u64) -> SchedulerResult<u64> {
        if max == 0 {
            return Err(SchedulerError::InvalidArgument(
                "upper bound of a nondeterministic integer must be positive".to_string(),
            ));
        }
        let mut state = self.await_pending_creations(self.lock())?;
        let value = state.rng.next_int(max);
        let record = DecisionRecord::nondet_int(
            value,
            state.program.current_task(),
            state.program.snapshot(),
        );
        state.trace.push(record);
        Ok(value)
    }

    /// Fails the run with `message` unless `predicate` holds.
    pub fn assert(&self, predicate: bool, message: &str) -> SchedulerResult<()> {
        let result = self.ensure_running(&self.lock()).and_then(|()| {
            if predicate {
                Ok(())
            } else {
                Err(SchedulerError::AssertionFailure(message.to_string()))
            }
        });
        self.checked(result)
    }

    /// Yields control to a task chosen by the randomizer, possibly the caller.
    pub fn context_switch(&self) -> SchedulerResult<()> {
        let result = {
            let state = self.lock();
            let current = state.program.current_task();
            match self
                .ensure_running(&state)
                .and_then(|()| Self::ensure_in_control(&state, current, "ContextSwitch"))
            {
                Ok(()) => self.switch_from(state),
                Err(e) => Err(e),
            }
        };
        self.checked(result)
    }

    /// Ends the main task and waits until the run finishes.
    ///
    /// Returns the record of the run. Misuse detected while ending the main
    /// task finishes the run as failed rather than leaving it hanging.
    pub fn wait_for_main_task(&self) -> SchedulerResult<SessionRecord> {
        if !self.is_finished() {
            match self.end_task(TaskId::MAIN) {
                Ok(()) => {}
                Err(e) if e.is_assertion() || e.is_session_finished() => {}
                Err(e) => self.finish(TestResult::Fail, e.to_string()),
            }
        }

        let mut state = self.lock();
        loop {
            if let (false, Some(record)) = (state.is_running(), &state.outcome) {
                return Ok(record.clone());
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    // ------------------------------------------------------------------------
    // Session control
    // ------------------------------------------------------------------------

    /// Finishes the current run. Has no effect on a finished session.
    pub fn finish(&self, result: TestResult, reason: impl Into<String>) {
        let record = {
            let mut state = self.lock();
            self.finish_locked(&mut state, result, reason.into())
        };
        self.emit(record);
    }

    /// Starts a replay of a finished session with the same seed.
    pub fn reset(self: &Arc<Self>) -> SchedulerResult<()> {
        let epoch = {
            let mut state = self.lock();
            if state.is_running() {
                return Err(SchedulerError::SessionRunning { session: self.id() });
            }

            state.program = ProgramState::new();
            state.rng = SeededRandomizer::new(self.info.scheduling_seed);
            state.trace = DecisionTrace::new();
            state.status = SessionStatus::Running;
            state.mode = if state.records.is_empty() {
                RunMode::FirstRun
            } else {
                RunMode::Replay
            };
            state.epoch += 1;
            state.deadline = Some(Instant::now() + self.timeout());
            state.stats = RunStats::new();
            state.outcome = None;
            self.changed.notify_all();

            debug!(session = %self.id(), mode = ?state.mode, epoch = state.epoch, "session reset");
            state.epoch
        };
        watchdog::spawn(self, epoch)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_running(&self, state: &SessionState) -> SchedulerResult<()> {
        if state.is_running() {
            return Ok(());
        }
        Err(self.finished_error(state))
    }

    /// `task` must be registered and hold control before `op` may act for it.
    fn ensure_in_control(state: &SessionState, task: TaskId, op: &str) -> SchedulerResult<()> {
        match state.program.signal_of(task) {
            None => Err(SchedulerError::UnknownTask(task)),
            Some(signal) if signal.is_granted() => Ok(()),
            Some(_) => Err(SchedulerError::AssertionFailure(format!(
                "{op} called but task ({task}) did not receive control before; \
                 maybe {op} is called from an unmodelled task?"
            ))),
        }
    }

    fn finished_error(&self, state: &SessionState) -> SchedulerError {
        let (result, reason) = state.outcome.as_ref().map_or_else(
            || (TestResult::Error, String::new()),
            |record| (record.result, record.reason.clone()),
        );
        SchedulerError::SessionFinished {
            session: self.id(),
            result,
            reason,
        }
    }

    /// Finishes the run as failed when `result` carries an assertion failure.
    fn checked<T>(&self, result: SchedulerResult<T>) -> SchedulerResult<T> {
        if let Err(SchedulerError::AssertionFailure(reason)) = &result {
            self.finish(TestResult::Fail, reason.clone());
        }
        result
    }

    /// Waits until every announced task has called `start_task`.
    fn await_pending_creations<'a>(
        &'a self,
        mut state: MutexGuard<'a, SessionState>,
    ) -> SchedulerResult<MutexGuard<'a, SessionState>> {
        loop {
            self.ensure_running(&state)?;
            if state.program.pending_creations() == 0 {
                return Ok(state);
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Picks the next task and hands control to it.
    ///
    /// Consumes the caller's guard. If the current task is still live and
    /// loses control, the caller is parked on its renewed signal.
    fn switch_from(&self, state: MutexGuard<'_, SessionState>) -> SchedulerResult<()> {
        let mut state = self.await_pending_creations(state)?;
        let current = state.program.current_task();
        let enabled = state.program.enabled_tasks();

        if enabled.is_empty() {
            if state.program.task_count() == 0 {
                let record = self.finish_locked(&mut state, TestResult::Pass, String::new());
                drop(state);
                self.emit(record);
                return Ok(());
            }
            warn!(
                session = %self.id(),
                state = %state.program.describe(),
                "deadlock detected"
            );
            let record =
                self.finish_locked(&mut state, TestResult::Fail, DEADLOCK_REASON.to_string());
            drop(state);
            self.emit(record);
            return Err(SchedulerError::AssertionFailure(DEADLOCK_REASON.to_string()));
        }

        if state.trace.len() >= self.info.max_decisions {
            let record = self.finish_locked(
                &mut state,
                TestResult::MaxDecisionsReached,
                MAX_DECISIONS_REASON.to_string(),
            );
            let error = self.finished_error(&state);
            drop(state);
            self.emit(record);
            return Err(error);
        }

        let next = enabled[state.rng.next_index(enabled.len())];
        let record = DecisionRecord::context_switch(next, current, state.program.snapshot());
        trace!(session = %self.id(), decision = %record.to_readable(), "context switch");
        state.trace.push(record);
        state.deadline = Some(Instant::now() + self.timeout());

        if next == current {
            return Ok(());
        }

        let resume = state
            .program
            .signal_of(next)
            .cloned()
            .ok_or(SchedulerError::UnknownTask(next))?;
        let park_on = state.program.renew_signal(current);
        state.program.set_current(next);
        resume.grant();
        drop(state);

        match park_on {
            Some(signal) => signal.wait(),
            None => Ok(()),
        }
    }

    /// Ends the run. Returns the record to emit, or `None` if the session
    /// had already finished.
    pub(crate) fn finish_locked(
        &self,
        state: &mut SessionState,
        result: TestResult,
        reason: String,
    ) -> Option<SessionRecord> {
        if !state.is_running() {
            return None;
        }
        state.deadline = None;

        let released = state.program.release_all(&SchedulerError::SessionFinished {
            session: self.id(),
            result,
            reason: reason.clone(),
        });
        if released > 0 {
            debug!(session = %self.id(), released, "released parked tasks");
        }

        let (result, reason, accepted) = self.judge_run(state, result, reason);
        let elapsed_ms = u64::try_from(state.stats.started_at.elapsed().as_millis())
            .unwrap_or(u64::MAX);
        let record = SessionRecord {
            session_id: self.id(),
            scheduling_seed: self.info.scheduling_seed,
            result,
            reason,
            elapsed_ms,
            num_decisions: state.trace.len(),
            num_requests: state.stats.num_requests,
            avg_invoke_ms: state.stats.avg_invoke_ms(),
        };
        if accepted {
            state.records.push(record.clone());
        }

        state.status = match state.mode {
            RunMode::FirstRun => SessionStatus::FinishedFirstRun,
            RunMode::Replay => SessionStatus::FinishedReplay,
        };
        state.outcome = Some(record.clone());
        self.changed.notify_all();

        if record.passed() {
            info!(
                session = %self.id(),
                decisions = record.num_decisions,
                elapsed_ms = record.elapsed_ms,
                replay = state.mode == RunMode::Replay,
                "session passed"
            );
        } else {
            info!(
                session = %self.id(),
                result = %record.result,
                reason = %record.reason,
                decisions = record.num_decisions,
                replay = state.mode == RunMode::Replay,
                "session failed"
            );
        }
        Some(record)
    }

    /// Decides the final outcome of a run and whether it joins the record list.
    fn judge_run(
        &self,
        state: &mut SessionState,
        result: TestResult,
        reason: String,
    ) -> (TestResult, String, bool) {
        if state.trace.is_empty() {
            let reason = if result.is_failure() {
                format!("{NO_CONCURRENCY_REASON}; the run ended with {result}: {reason}")
            } else {
                NO_CONCURRENCY_REASON.to_string()
            };
            return (TestResult::FaultyProgram, reason, false);
        }

        match state.mode {
            RunMode::FirstRun => {
                if let Some(path) = self.trace_path()
                    && let Err(e) = state.trace.save(&path)
                {
                    warn!(session = %self.id(), path = %path.display(), error = %e, "failed to persist trace");
                    return (
                        TestResult::Error,
                        format!("could not persist the decision trace: {e}"),
                        false,
                    );
                }
                state.baseline = Some(state.trace.clone());
                (result, reason, true)
            }
            RunMode::Replay => self.judge_replay(state, result, reason),
        }
    }

    fn judge_replay(
        &self,
        state: &SessionState,
        result: TestResult,
        reason: String,
    ) -> (TestResult, String, bool) {
        let Some(first) = state.records.first() else {
            return (result, reason, true);
        };

        if first.result != result || first.reason != reason {
            warn!(
                session = %self.id(),
                expected = %first.result,
                actual = %result,
                "replay produced a different outcome"
            );
            let detail = format!(
                "expected {} ({:?}) but the replay ended with {} ({:?})",
                first.result, first.reason, result, reason
            );
            return (
                TestResult::ReplayDivergence,
                self.divergence_reason(&detail),
                false,
            );
        }

        let expected = match self.trace_path() {
            Some(path) => match DecisionTrace::load(&path) {
                Ok(trace) => trace,
                Err(e) => {
                    return (
                        TestResult::Error,
                        format!("could not read the recorded trace: {e}"),
                        false,
                    );
                }
            },
            None => state.baseline.clone().unwrap_or_default(),
        };

        match state.trace.compare(&expected) {
            Ok(()) => (result, reason, true),
            Err(divergence) => {
                warn!(session = %self.id(), %divergence, "replay diverged from the recorded trace");
                (
                    TestResult::ReplayDivergence,
                    self.divergence_reason(&divergence.to_string()),
                    false,
                )
            }
        }
    }

    fn divergence_reason(&self, detail: &str) -> String {
        format!(
            "Could not reproduce the trace for session {}: {detail}\n\
             Possible reasons:\n\t- Some tasks not being modelled",
            self.id()
        )
    }

    /// Builds the inactivity report from the locked state.
    pub(crate) fn inactivity_reason(&self, state: &SessionState) -> String {
        let current = state.program.current_task();
        let mut reason = format!(
            "No activity for {} ms!\n  Program State: [ {} ]",
            self.info.timeout_ms,
            state.program.describe()
        );
        let pending = state.program.pending_creations();
        if pending > 0 {
            reason.push_str(&format!(
                "\n  {pending} created task(s) never called StartTask"
            ));
        }
        reason.push_str(&format!(
            "\n  Possible reasons:\n\t- Not calling EndTask({current})\n\t\
             - Calling ContextSwitch from an undeclared task\n\t\
             - Some tasks not being modelled"
        ));
        reason
    }

    pub(crate) fn emit(&self, record: Option<SessionRecord>) {
        if let (Some(record), Some(hook)) = (record, &self.on_finish) {
            hook(&self.info, &record);
        }
    }
}

/// File name of a persisted trace inside `dir`.
pub fn trace_file_path(dir: &Path, session: SessionId) -> PathBuf {
    dir.join(format!("session-{session}-trace.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nekara_types::ProgramIdentity;

    fn session() -> Arc<TestingSession> {
        let info = SessionInfo {
            id: SessionId::new(3),
            program: ProgramIdentity::new("core", "session", "unit"),
            scheduling_seed: 0,
            timeout_ms: 2_000,
            max_decisions: 100,
        };
        TestingSession::start(info, SessionOptions::new()).unwrap()
    }

    #[test]
    fn context_switch_without_control_fails_the_run() {
        let session = session();
        session.lock().program.renew_signal(TaskId::MAIN);

        let err = session.context_switch().unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("ContextSwitch called but task (0)"));

        let record = session.outcome().unwrap();
        assert_eq!(record.result, TestResult::Fail);
        assert!(record.reason.contains("unmodelled task"));
    }

    #[test]
    fn end_task_of_unknown_task_is_misuse() {
        let session = session();
        let err = session.end_task(TaskId::new(8)).unwrap_err();
        assert_eq!(err, SchedulerError::UnknownTask(TaskId::new(8)));
        assert!(!session.is_finished());
    }
}
