//! Decision traces.
//!
//! A trace is the ordered list of every scheduling and nondeterministic
//! choice made during one run of a session. It is persisted after the first
//! run and compared against the trace of every replay.
//!
//! # Text format
//!
//! One record per line:
//!
//! ```text
//! <kind>,<value>,<current>,<tasks>
//! ```
//!
//! where `kind` is `cs`, `bool` or `int`, and `tasks` is a `;`-separated
//! list of `task:r1|r2` entries (resources the task is blocked on, possibly
//! none). An empty `tasks` field means no task was registered.

use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use nekara_types::{ResourceId, TaskId};
use thiserror::Error;

// ============================================================================
// Records
// ============================================================================

/// What kind of choice a record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    /// The scheduler picked the next task to run.
    ContextSwitch,
    /// A nondeterministic boolean was drawn.
    NondetBool,
    /// A nondeterministic bounded integer was drawn.
    NondetInt,
}

impl DecisionKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContextSwitch => "cs",
            Self::NondetBool => "bool",
            Self::NondetInt => "int",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "cs" => Some(Self::ContextSwitch),
            "bool" => Some(Self::NondetBool),
            "int" => Some(Self::NondetInt),
            _ => None,
        }
    }
}

impl Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A live task and the resources it is blocked on at the time of a decision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskSnapshot {
    pub task: TaskId,
    /// Sorted; empty when the task is enabled.
    pub blocked_on: Vec<ResourceId>,
}

impl TaskSnapshot {
    pub fn new(task: TaskId, mut blocked_on: Vec<ResourceId>) -> Self {
        blocked_on.sort_unstable();
        blocked_on.dedup();
        Self { task, blocked_on }
    }

    pub fn is_blocked(&self) -> bool {
        !self.blocked_on.is_empty()
    }
}

impl Display for TaskSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.task)?;
        for (i, resource) in self.blocked_on.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{resource}")?;
        }
        Ok(())
    }
}

/// One recorded choice.
///
/// Two records are equal when kind, value and current task are equal and the
/// task snapshots describe the same set of tasks and blocked resources,
/// regardless of the order they were listed in.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub kind: DecisionKind,
    /// Chosen task ID for context switches; `0`/`1` for booleans; the drawn
    /// value for integers.
    pub value: u64,
    /// The task that was current when the choice was made.
    pub current_task: TaskId,
    pub tasks: Vec<TaskSnapshot>,
}

impl DecisionRecord {
    pub fn context_switch(next: TaskId, current: TaskId, tasks: Vec<TaskSnapshot>) -> Self {
        Self {
            kind: DecisionKind::ContextSwitch,
            value: next.as_u64(),
            current_task: current,
            tasks,
        }
    }

    pub fn nondet_bool(value: bool, current: TaskId, tasks: Vec<TaskSnapshot>) -> Self {
        Self {
            kind: DecisionKind::NondetBool,
            value: u64::from(value),
            current_task: current,
            tasks,
        }
    }

    pub fn nondet_int(value: u64, current: TaskId, tasks: Vec<TaskSnapshot>) -> Self {
        Self {
            kind: DecisionKind::NondetInt,
            value,
            current_task: current,
            tasks,
        }
    }

    fn normalized_tasks(&self) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<TaskSnapshot> = self
            .tasks
            .iter()
            .map(|s| TaskSnapshot::new(s.task, s.blocked_on.clone()))
            .collect();
        tasks.sort();
        tasks.dedup();
        tasks
    }

    /// Human-readable form used in logs and divergence reports.
    ///
    /// For example `Picked Task 2 from [ 0, 1 |3 ]`.
    pub fn to_readable(&self) -> String {
        let tasks = self
            .normalized_tasks()
            .iter()
            .map(|s| {
                if s.is_blocked() {
                    let resources: Vec<String> =
                        s.blocked_on.iter().map(ToString::to_string).collect();
                    format!("{} |{}", s.task, resources.join("|"))
                } else {
                    s.task.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            DecisionKind::ContextSwitch => {
                format!("Picked Task {} from [ {} ]", self.value, tasks)
            }
            DecisionKind::NondetBool => format!(
                "Task {} drew {} from [ {} ]",
                self.current_task,
                self.value != 0,
                tasks
            ),
            DecisionKind::NondetInt => format!(
                "Task {} drew {} from [ {} ]",
                self.current_task, self.value, tasks
            ),
        }
    }
}

impl PartialEq for DecisionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.value == other.value
            && self.current_task == other.current_task
            && self.normalized_tasks() == other.normalized_tasks()
    }
}

impl Eq for DecisionRecord {}

impl Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},", self.kind, self.value, self.current_task)?;
        for (i, snapshot) in self.tasks.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{snapshot}")?;
        }
        Ok(())
    }
}

impl FromStr for DecisionRecord {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.splitn(4, ',');
        let kind = fields.next().unwrap_or_default();
        let kind = DecisionKind::from_code(kind)
            .ok_or_else(|| format!("unknown decision kind {kind:?}"))?;
        let value = fields
            .next()
            .ok_or("missing value")?
            .parse::<u64>()
            .map_err(|e| format!("invalid value: {e}"))?;
        let current_task = fields
            .next()
            .ok_or("missing current task")?
            .parse::<TaskId>()
            .map_err(|e| format!("invalid current task: {e}"))?;
        let tasks_field = fields.next().ok_or("missing task list")?;

        let mut tasks = Vec::new();
        for entry in tasks_field.split(';').filter(|e| !e.is_empty()) {
            let (task, resources) = entry
                .split_once(':')
                .ok_or_else(|| format!("task entry {entry:?} lacks ':'"))?;
            let task = task
                .parse::<TaskId>()
                .map_err(|e| format!("invalid task {task:?}: {e}"))?;
            let blocked_on = resources
                .split('|')
                .filter(|r| !r.is_empty())
                .map(|r| {
                    r.parse::<ResourceId>()
                        .map_err(|e| format!("invalid resource {r:?}: {e}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            tasks.push(TaskSnapshot::new(task, blocked_on));
        }

        Ok(Self {
            kind,
            value,
            current_task,
            tasks,
        })
    }
}

// ============================================================================
// Trace
// ============================================================================

/// A malformed line in a persisted trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct TraceParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

/// Failure to load a persisted trace.
#[derive(Debug, Error)]
pub enum TraceFileError {
    #[error("failed to read trace file: {0}")]
    Io(#[from] io::Error),

    #[error("malformed trace file: {0}")]
    Parse(#[from] TraceParseError),
}

/// Where a replay first departed from the recorded trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceDivergence {
    /// The runs made a different number of decisions.
    Length { expected: usize, actual: usize },
    /// The decisions at `index` differ.
    Decision {
        index: usize,
        expected: DecisionRecord,
        actual: DecisionRecord,
    },
}

impl Display for TraceDivergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { expected, actual } => write!(
                f,
                "expected {expected} decisions but the replay made {actual}"
            ),
            Self::Decision {
                index,
                expected,
                actual,
            } => write!(
                f,
                "decision {index} differs: expected \"{}\" but got \"{}\"",
                expected.to_readable(),
                actual.to_readable()
            ),
        }
    }
}

/// Ordered sequence of decisions made during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionTrace {
    records: Vec<DecisionRecord>,
}

impl DecisionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.records.iter()
    }

    /// Serializes the trace, one record per line.
    pub fn to_text(&self) -> String {
        self.records
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses the text form. Blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, TraceParseError> {
        let mut records = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = line.parse().map_err(|message| TraceParseError {
                line: i + 1,
                message,
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_text())
    }

    pub fn load(path: &Path) -> Result<Self, TraceFileError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    /// Compares this (replayed) trace against the `expected` recording.
    ///
    /// Lengths are checked first, then records in order.
    pub fn compare(&self, expected: &DecisionTrace) -> Result<(), TraceDivergence> {
        if self.len() != expected.len() {
            return Err(TraceDivergence::Length {
                expected: expected.len(),
                actual: self.len(),
            });
        }
        for (index, (want, got)) in expected.iter().zip(self.iter()).enumerate() {
            if want != got {
                return Err(TraceDivergence::Decision {
                    index,
                    expected: want.clone(),
                    actual: got.clone(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<DecisionRecord> for DecisionTrace {
    fn from_iter<I: IntoIterator<Item = DecisionRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
