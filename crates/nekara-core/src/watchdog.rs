//! Inactivity watchdog.
//!
//! One watchdog thread runs per session run. It sleeps on the session's
//! condition variable until the current deadline and finishes the run with
//! [`TestResult::InactivityTimeout`] if no decision pushed the deadline back
//! in the meantime. The thread exits when the run finishes or a reset bumps
//! the epoch it was started for.

use std::sync::{Arc, PoisonError, Weak};
use std::thread;
use std::time::Instant;

use nekara_types::TestResult;
use tracing::{trace, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::session::TestingSession;

pub(crate) fn spawn(session: &Arc<TestingSession>, epoch: u64) -> SchedulerResult<()> {
    let weak = Arc::downgrade(session);
    thread::Builder::new()
        .name(format!("nekara-watchdog-{}", session.id()))
        .spawn(move || watch(&weak, epoch))
        .map(|_| ())
        .map_err(|e| SchedulerError::Internal(format!("failed to spawn watchdog: {e}")))
}

fn watch(session: &Weak<TestingSession>, epoch: u64) {
    let Some(session) = session.upgrade() else {
        return;
    };

    let mut state = session.lock();
    loop {
        if state.epoch != epoch || !state.is_running() {
            trace!(session = %session.id(), epoch, "watchdog retired");
            return;
        }
        let Some(deadline) = state.deadline else {
            return;
        };

        let now = Instant::now();
        if now >= deadline {
            let reason = session.inactivity_reason(&state);
            warn!(session = %session.id(), timeout_ms = session.info().timeout_ms, "inactivity timeout");
            let record = session.finish_locked(&mut state, TestResult::InactivityTimeout, reason);
            drop(state);
            session.emit(record);
            return;
        }

        state = session
            .changed
            .wait_timeout(state, deadline - now)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}
