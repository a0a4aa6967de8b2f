//! One-shot continue signals.
//!
//! Every live task owns exactly one signal. The task parks on it and the
//! scheduler grants it when the task is chosen to run next. Finishing a
//! session cancels every outstanding signal so parked callers unwind with
//! the session's error instead of waiting forever.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SignalState {
    Pending,
    Granted,
    Cancelled(SchedulerError),
}

#[derive(Debug)]
struct SignalInner {
    state: Mutex<SignalState>,
    ready: Condvar,
}

/// A one-shot permission to continue, shared between the scheduler and the
/// parked caller.
///
/// A signal completes at most once: the first `grant` or `cancel` wins and
/// later calls are ignored.
#[derive(Debug, Clone)]
pub struct ContinueSignal {
    inner: Arc<SignalInner>,
}

impl ContinueSignal {
    /// Creates a signal that has not been granted yet.
    pub fn new() -> Self {
        Self::with_state(SignalState::Pending)
    }

    /// Creates a signal that is already granted, used for the main task.
    pub fn granted() -> Self {
        Self::with_state(SignalState::Granted)
    }

    fn with_state(state: SignalState) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                state: Mutex::new(state),
                ready: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grants the signal. Returns false if it had already completed.
    pub fn grant(&self) -> bool {
        self.complete(SignalState::Granted)
    }

    /// Cancels the signal with `error`. Returns false if it had already completed.
    pub fn cancel(&self, error: SchedulerError) -> bool {
        self.complete(SignalState::Cancelled(error))
    }

    fn complete(&self, next: SignalState) -> bool {
        let mut state = self.lock();
        if *state != SignalState::Pending {
            return false;
        }
        *state = next;
        self.inner.ready.notify_all();
        true
    }

    pub fn is_granted(&self) -> bool {
        *self.lock() == SignalState::Granted
    }

    pub fn is_pending(&self) -> bool {
        *self.lock() == SignalState::Pending
    }

    /// Parks the caller until the signal completes.
    pub fn wait(&self) -> SchedulerResult<()> {
        let mut state = self.lock();
        loop {
            match &*state {
                SignalState::Pending => {
                    state = self
                        .inner
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                SignalState::Granted => return Ok(()),
                SignalState::Cancelled(error) => return Err(error.clone()),
            }
        }
    }
}

impl Default for ContinueSignal {
    fn default() -> Self {
        Self::new()
    }
}
