//! Repeated testing with replay verification.

use std::sync::Arc;

use nekara_types::{ProgramIdentity, SessionId, SessionRecord, TestResult};
use nekara_wire::{ErrorCode, ErrorResponse, Service, ops};
use tracing::{debug, info, warn};

use crate::client::{SessionClient, SessionSettings};
use crate::error::{ClientError, ClientResult};

/// How many iterations to run and with which seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub iterations: u64,
    /// Seed of the first iteration; iteration `i` uses `start_seed + i`.
    pub start_seed: u64,
    /// Stop after the first iteration that found a bug.
    pub terminate_on_first_fail: bool,
    pub settings: SessionSettings,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            iterations: 100,
            start_seed: 0,
            terminate_on_first_fail: false,
            settings: SessionSettings::default(),
        }
    }
}

/// One iteration: a first run and its replay.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub session: SessionId,
    pub seed: u64,
    pub first: SessionRecord,
    pub replay: SessionRecord,
}

impl IterationOutcome {
    /// The iteration's verdict: the first run's result, unless the replay
    /// could not reproduce it.
    pub fn result(&self) -> TestResult {
        match self.replay.result {
            TestResult::ReplayDivergence | TestResult::Error => self.replay.result,
            _ => self.first.result,
        }
    }

    pub fn reason(&self) -> &str {
        if self.result() == self.first.result {
            &self.first.reason
        } else {
            &self.replay.reason
        }
    }

    pub fn is_failure(&self) -> bool {
        self.result().is_failure()
    }
}

/// Outcomes of every iteration a [`TestRunner`] executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSummary {
    pub iterations: Vec<IterationOutcome>,
}

impl TestSummary {
    pub fn total(&self) -> usize {
        self.iterations.len()
    }

    pub fn count(&self, result: TestResult) -> usize {
        self.iterations
            .iter()
            .filter(|it| it.result() == result)
            .count()
    }

    /// Non-zero counts per result, in [`TestResult::ALL`] order.
    pub fn counts(&self) -> Vec<(TestResult, usize)> {
        TestResult::ALL
            .into_iter()
            .map(|result| (result, self.count(result)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &IterationOutcome> {
        self.iterations.iter().filter(|it| it.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Mean decision count of the first runs.
    pub fn avg_decisions(&self) -> f64 {
        self.mean(|it| it.first.num_decisions as f64)
    }

    /// Mean wall-clock time of the first runs.
    pub fn avg_elapsed_ms(&self) -> f64 {
        self.mean(|it| it.first.elapsed_ms as f64)
    }

    fn mean(&self, f: impl Fn(&IterationOutcome) -> f64) -> f64 {
        if self.iterations.is_empty() {
            return 0.0;
        }
        self.iterations.iter().map(f).sum::<f64>() / self.iterations.len() as f64
    }
}

/// Runs a program repeatedly, each time under a new seed, and replays every
/// run to check it is reproducible.
pub struct TestRunner {
    service: Arc<dyn Service>,
    program: ProgramIdentity,
    options: RunnerOptions,
}

impl TestRunner {
    pub fn new(service: Arc<dyn Service>, program: ProgramIdentity, options: RunnerOptions) -> Self {
        Self {
            service,
            program,
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Runs `test` on the main task of every iteration.
    ///
    /// Errors returned by `test` end the main task early; the session
    /// decides the outcome. Only failures to talk to the service abort
    /// the whole run.
    pub fn run<F>(&self, test: F) -> ClientResult<TestSummary>
    where
        F: Fn(&SessionClient) -> ClientResult<()>,
    {
        let mut summary = TestSummary::default();
        for i in 0..self.options.iterations {
            let seed = self.options.start_seed.wrapping_add(i);
            let outcome = self.iteration(seed, &test)?;
            info!(
                iteration = i,
                seed,
                session = %outcome.session,
                result = %outcome.result(),
                decisions = outcome.first.num_decisions,
                "iteration finished"
            );
            let stop = self.options.terminate_on_first_fail && outcome.is_failure();
            summary.iterations.push(outcome);
            if stop {
                warn!(seed, "stopping at the first failure");
                break;
            }
        }
        Ok(summary)
    }

    fn iteration<F>(&self, seed: u64, test: &F) -> ClientResult<IterationOutcome>
    where
        F: Fn(&SessionClient) -> ClientResult<()>,
    {
        let client = SessionClient::initialize(
            Arc::clone(&self.service),
            &self.program,
            seed,
            self.options.settings,
        )?;
        let session = client.session_id();
        let first = run_once(&client, test)?;

        client.replay()?;
        let replay = run_once(&SessionClient::attach(Arc::clone(&self.service), session), test)?;
        client.teardown()?;

        Ok(IterationOutcome {
            session,
            seed,
            first,
            replay,
        })
    }
}

/// Executes one run of the program and returns its record.
fn run_once<F>(client: &SessionClient, test: &F) -> ClientResult<SessionRecord>
where
    F: Fn(&SessionClient) -> ClientResult<()>,
{
    if let Err(e) = test(client) {
        debug!(session = %client.session_id(), error = %e, "program returned early");
    }
    client.wait_for_main_task()?;
    client
        .session_info()?
        .outcome
        .ok_or_else(|| ClientError::Remote {
            function: ops::GET_SESSION_INFO.to_string(),
            source: ErrorResponse {
                code: ErrorCode::InternalError,
                message: format!("session {} finished without a record", client.session_id()),
            },
        })
}
