//! # nekara-types: Core types for `Nekara`
//!
//! This crate contains the value types shared by the scheduler, the router,
//! the wire envelope and the client library:
//! - Entity IDs ([`TaskId`], [`ResourceId`], [`SessionId`])
//! - Session metadata ([`ProgramIdentity`], [`SessionInfo`])
//! - Session outcomes ([`TestResult`], [`SessionRecord`], [`SessionReport`])

use std::fmt::{self, Display};
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs - All Copy (cheap 8-byte values)
// ============================================================================

/// Identifier of a task in the program under test.
///
/// Unique among the live tasks of one session. Task `0` is the main task,
/// registered and running from the moment a session starts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// The main task every session starts with.
    pub const MAIN: TaskId = TaskId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_main(&self) -> bool {
        *self == Self::MAIN
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

/// Identifier of a resource: a name tasks can block on and signal.
///
/// Resources are not locks. They only express "task T waits until R is
/// signaled".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for ResourceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ResourceId> for u64 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Identifier of a test session, allocated by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Session Metadata
// ============================================================================

/// Names the program under test and the entry point that was invoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramIdentity {
    /// The program (binary, library or test suite) being exercised.
    pub program: String,
    /// The module or type declaring the entry point.
    pub module: String,
    /// The entry point itself.
    pub entry: String,
}

impl ProgramIdentity {
    pub fn new(
        program: impl Into<String>,
        module: impl Into<String>,
        entry: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            module: module.into(),
            entry: entry.into(),
        }
    }

    /// Returns true if every component is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.program.is_empty() && !self.module.is_empty() && !self.entry.is_empty()
    }
}

impl Display for ProgramIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.program, self.module, self.entry)
    }
}

/// Immutable metadata of a session.
///
/// Replays reuse the same metadata, in particular the same scheduling seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub program: ProgramIdentity,
    /// Seed of the session's pseudo-random source.
    pub scheduling_seed: u64,
    /// Inactivity window before the watchdog force-finishes the session.
    pub timeout_ms: u64,
    /// Upper bound on recorded decisions before the run counts as a live-lock.
    pub max_decisions: usize,
}

// ============================================================================
// Session Outcomes
// ============================================================================

/// Outcome of one run of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestResult {
    /// Every task ended and no assertion failed.
    Pass,
    /// An assertion failed or a deadlock was found.
    Fail,
    /// The watchdog saw no scheduling activity within the session timeout.
    InactivityTimeout,
    /// The decision budget was exhausted.
    MaxDecisionsReached,
    /// The run made no scheduling decisions, so nothing was actually tested.
    FaultyProgram,
    /// A replay did not reproduce the recorded trace or outcome.
    ReplayDivergence,
    /// The session ended for a reason unrelated to the program under test.
    Error,
}

impl TestResult {
    /// Every outcome, in reporting order.
    pub const ALL: [TestResult; 7] = [
        Self::Pass,
        Self::Fail,
        Self::InactivityTimeout,
        Self::MaxDecisionsReached,
        Self::FaultyProgram,
        Self::ReplayDivergence,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::InactivityTimeout => "inactivity-timeout",
            Self::MaxDecisionsReached => "max-decisions-reached",
            Self::FaultyProgram => "faulty-program",
            Self::ReplayDivergence => "replay-divergence",
            Self::Error => "error",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns true for outcomes that point at a bug worth stopping for.
    ///
    /// Exhausting the decision budget is reported but does not count.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Pass | Self::MaxDecisionsReached)
    }
}

impl Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result and statistics of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub scheduling_seed: u64,
    pub result: TestResult,
    /// Failure reason, empty when the run passed.
    pub reason: String,
    pub elapsed_ms: u64,
    pub num_decisions: usize,
    /// Routed calls of the run, including the one that finished it.
    pub num_requests: u64,
    /// Mean wall-clock time spent inside routed calls. Calls still in flight
    /// when the run finished are counted without their duration.
    pub avg_invoke_ms: f64,
}

impl SessionRecord {
    pub fn passed(&self) -> bool {
        self.result.is_pass()
    }

    /// Returns the failure reason, or `None` if the run passed.
    pub fn failure_reason(&self) -> Option<&str> {
        if self.passed() {
            None
        } else {
            Some(&self.reason)
        }
    }
}

impl Display for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session Record {} ({})", self.session_id, self.result)
    }
}

/// Everything the router knows about a session, as returned by `GetSessionInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub info: SessionInfo,
    /// False while a run is in progress.
    pub finished: bool,
    /// True once the session has an accepted first run to compare against.
    pub replay: bool,
    /// Record of the last finished run.
    pub outcome: Option<SessionRecord>,
    /// The first accepted run followed by every reproduced replay.
    pub records: Vec<SessionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn main_task_is_zero() {
        assert_eq!(TaskId::MAIN, TaskId::new(0));
        assert!(TaskId::MAIN.is_main());
        assert!(!TaskId::new(7).is_main());
    }

    #[test]
    fn ids_parse_from_decimal() {
        assert_eq!("42".parse::<TaskId>().unwrap(), TaskId::new(42));
        assert_eq!("3".parse::<ResourceId>().unwrap(), ResourceId::new(3));
        assert_eq!("11".parse::<SessionId>().unwrap(), SessionId::new(11));
        assert!("x".parse::<TaskId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&TaskId::new(5)).unwrap();
        assert_eq!(json, "5");
        let id: SessionId = serde_json::from_str("9").unwrap();
        assert_eq!(id, SessionId::new(9));
    }

    #[test_case(TestResult::Pass, false; "pass")]
    #[test_case(TestResult::Fail, true; "fail")]
    #[test_case(TestResult::InactivityTimeout, true; "timeout")]
    #[test_case(TestResult::MaxDecisionsReached, false; "budget")]
    #[test_case(TestResult::FaultyProgram, true; "faulty")]
    #[test_case(TestResult::ReplayDivergence, true; "divergence")]
    fn failure_classification(result: TestResult, failure: bool) {
        assert_eq!(result.is_failure(), failure);
    }

    #[test]
    fn record_reports_reason_only_on_failure() {
        let mut record = SessionRecord {
            session_id: SessionId::new(1),
            scheduling_seed: 42,
            result: TestResult::Pass,
            reason: String::new(),
            elapsed_ms: 3,
            num_decisions: 10,
            num_requests: 20,
            avg_invoke_ms: 0.1,
        };
        assert_eq!(record.failure_reason(), None);

        record.result = TestResult::Fail;
        record.reason = "Race!".to_string();
        assert_eq!(record.failure_reason(), Some("Race!"));
    }

    #[test]
    fn program_identity_completeness() {
        assert!(ProgramIdentity::new("bench", "Deadlock", "execute").is_complete());
        assert!(!ProgramIdentity::new("bench", "", "execute").is_complete());
    }

    #[test]
    fn result_display_is_kebab_case() {
        assert_eq!(TestResult::MaxDecisionsReached.to_string(), "max-decisions-reached");
        let json = serde_json::to_string(&TestResult::InactivityTimeout).unwrap();
        assert_eq!(json, "\"inactivity-timeout\"");
    }
}
