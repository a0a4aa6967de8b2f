//! # nekara-core: Deterministic scheduling engine
//!
//! The engine behind the Nekara testing service. A program under test
//! reports its tasks, resources and yield points to a [`TestingSession`];
//! the session lets exactly one task run at a time and picks the next one
//! with a seeded randomizer. Every choice is recorded in a
//! [`DecisionTrace`] so that a failing run can be replayed and checked
//! decision by decision.
//!
//! # Modules
//!
//! - [`program_state`]: live tasks, resources and blocking relations
//! - [`signal`]: one-shot continue signals tasks park on
//! - [`rng`]: the seeded randomizer
//! - [`trace`]: decision records, their text form, replay comparison
//! - [`session`]: scheduling, finishing, replay

pub mod error;
pub mod program_state;
pub mod rng;
pub mod session;
pub mod signal;
pub mod trace;
mod watchdog;

pub use error::{ErrorKind, SchedulerError, SchedulerResult};
pub use program_state::ProgramState;
pub use rng::SeededRandomizer;
pub use session::{
    DEADLOCK_REASON, FinishHook, MAX_DECISIONS_REASON, NO_CONCURRENCY_REASON, SessionOptions,
    SessionStatus, TestingSession, trace_file_path,
};
pub use signal::ContinueSignal;
pub use trace::{
    DecisionKind, DecisionRecord, DecisionTrace, TaskSnapshot, TraceDivergence, TraceFileError,
    TraceParseError,
};

/// Inactivity window used when a session does not specify one.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Decision budget used when a session does not specify one.
pub const DEFAULT_MAX_DECISIONS: usize = 10_000;
