//! # nekara-client: Instrumentation client for `Nekara`
//!
//! Programs under test use this crate to report their concurrency to a
//! Nekara [`Service`]. Every call is tied to an explicit [`SessionClient`];
//! there is no ambient "current session".
//!
//! ## Usage
//!
//! ```ignore
//! use nekara_client::{ControlledLock, SessionClient, SessionSettings};
//!
//! let client = SessionClient::initialize(service, &program, 42, SessionSettings::default())?;
//! let lock = ControlledLock::new(&client)?;
//!
//! let worker = {
//!     let lock = lock.clone();
//!     client.spawn(move |c| {
//!         lock.acquire()?;
//!         c.context_switch()?;
//!         lock.release()
//!     })?
//! };
//! worker.wait()?;
//!
//! let failure = client.wait_for_main_task()?;
//! ```
//!
//! [`TestRunner`] wraps this in a loop over seeds and replays every run.
//!
//! [`Service`]: nekara_wire::Service

mod client;
mod error;
mod runner;
mod task;

pub use client::{SessionClient, SessionSettings};
pub use error::{ClientError, ClientResult};
pub use runner::{IterationOutcome, RunnerOptions, TestRunner, TestSummary};
pub use task::{ControlledLock, ControlledTask};

// Re-export useful types from dependencies
pub use nekara_types::{ProgramIdentity, ResourceId, SessionId, TaskId, TestResult};
pub use nekara_wire::{ErrorCode, Service};
