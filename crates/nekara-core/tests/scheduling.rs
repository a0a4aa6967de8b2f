//! End-to-end scheduling scenarios driven directly against `TestingSession`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nekara_core::{
    DEADLOCK_REASON, DecisionKind, DecisionTrace, MAX_DECISIONS_REASON, SchedulerError,
    SchedulerResult, SessionOptions, SessionStatus, TestingSession,
};
use nekara_types::{
    ProgramIdentity, ResourceId, SessionId, SessionInfo, SessionRecord, TaskId, TestResult,
};

// ============================================================================
// Harness
// ============================================================================

fn info(seed: u64) -> SessionInfo {
    SessionInfo {
        id: SessionId::new(1),
        program: ProgramIdentity::new("core-tests", "scheduling", "scenario"),
        scheduling_seed: seed,
        timeout_ms: 2_000,
        max_decisions: 10_000,
    }
}

fn start(seed: u64) -> Arc<TestingSession> {
    TestingSession::start(info(seed), SessionOptions::new()).unwrap()
}

/// Declares task `id` and runs `body` on a new thread once it is scheduled.
fn spawn_task<F>(session: &Arc<TestingSession>, id: u64, body: F) -> JoinHandle<()>
where
    F: FnOnce(&TestingSession) -> SchedulerResult<()> + Send + 'static,
{
    session.create_task().unwrap();
    let session = Arc::clone(session);
    thread::spawn(move || {
        let task = TaskId::new(id);
        let _ = session
            .start_task(task)
            .and_then(|()| body(&session))
            .and_then(|()| session.end_task(task));
    })
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        handle.join().unwrap();
    }
}

/// Lock modeled on a resource: acquire spins through `blocked_on_resource`.
struct ModelLock {
    resource: ResourceId,
    held: AtomicBool,
}

impl ModelLock {
    fn new(session: &TestingSession, id: u64) -> Arc<Self> {
        let resource = ResourceId::new(id);
        session.create_resource(resource).unwrap();
        Arc::new(Self {
            resource,
            held: AtomicBool::new(false),
        })
    }

    fn acquire(&self, session: &TestingSession) -> SchedulerResult<()> {
        session.context_switch()?;
        while self.held.swap(true, Ordering::SeqCst) {
            session.blocked_on_resource(self.resource)?;
        }
        Ok(())
    }

    fn release(&self, session: &TestingSession) -> SchedulerResult<()> {
        session.assert(self.held.load(Ordering::SeqCst), "release of a free lock")?;
        self.held.store(false, Ordering::SeqCst);
        session.signal_updated_resource(self.resource)
    }
}

/// Task 1 reads a shared value twice under a lock; task 2 writes it without
/// taking the lock.
fn racy_program(session: &Arc<TestingSession>) -> SessionRecord {
    let x = Arc::new(AtomicU64::new(0));
    let lock = ModelLock::new(session, 0);

    let reader = {
        let (x, lock) = (Arc::clone(&x), Arc::clone(&lock));
        spawn_task(session, 1, move |s| {
            lock.acquire(s)?;
            s.context_switch()?;
            let first = x.load(Ordering::SeqCst);
            s.context_switch()?;
            let second = x.load(Ordering::SeqCst);
            lock.release(s)?;
            s.assert(first == second, "Race!")
        })
    };
    let writer = {
        let x = Arc::clone(&x);
        spawn_task(session, 2, move |s| {
            s.context_switch()?;
            x.store(1, Ordering::SeqCst);
            Ok(())
        })
    };

    let record = session.wait_for_main_task().unwrap();
    join_all(vec![reader, writer]);
    record
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn main_task_alone_is_a_faulty_program() {
    let session = start(0);
    let record = session.wait_for_main_task().unwrap();
    assert_eq!(record.result, TestResult::FaultyProgram);
    assert_eq!(record.num_decisions, 0);
    assert!(session.records().is_empty());
    assert!(!session.is_replay());
}

#[test]
fn single_task_passes_with_recorded_decisions() {
    let session = start(7);
    let handle = spawn_task(&session, 1, |s| s.context_switch());
    let record = session.wait_for_main_task().unwrap();
    handle.join().unwrap();

    assert_eq!(record.result, TestResult::Pass);
    assert!(record.reason.is_empty());
    assert!(record.num_decisions >= 2);
    assert_eq!(session.status(), SessionStatus::FinishedFirstRun);
    assert_eq!(session.records(), vec![record]);
}

#[test]
fn only_one_task_runs_at_a_time() {
    let session = start(3);
    let inside = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (1..=4)
        .map(|id| {
            let (inside, overlap) = (Arc::clone(&inside), Arc::clone(&overlap));
            spawn_task(&session, id, move |s| {
                for _ in 0..5 {
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlap.store(true, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(1));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    s.context_switch()?;
                }
                Ok(())
            })
        })
        .collect();

    let record = session.wait_for_main_task().unwrap();
    join_all(handles);
    assert_eq!(record.result, TestResult::Pass);
    assert!(!overlap.load(Ordering::SeqCst));
}

#[test]
fn same_seed_yields_the_same_trace() {
    let traces: Vec<DecisionTrace> = (0..2)
        .map(|_| {
            let session = start(42);
            racy_program(&session);
            session.trace()
        })
        .collect();
    assert!(!traces[0].is_empty());
    assert_eq!(traces[0], traces[1]);
}

#[test]
fn some_seed_exposes_the_race_and_replay_reproduces_it() {
    let (session, record) = (0..64)
        .map(|seed| {
            let session = start(seed);
            let record = racy_program(&session);
            (session, record)
        })
        .find(|(_, record)| record.result == TestResult::Fail)
        .expect("no seed exposed the race");
    assert_eq!(record.reason, "Race!");

    session.reset().unwrap();
    assert!(session.is_replay());
    let replayed = racy_program(&session);
    assert_eq!(replayed.result, TestResult::Fail);
    assert_eq!(replayed.reason, "Race!");
    assert_eq!(replayed.num_decisions, record.num_decisions);
    assert_eq!(session.status(), SessionStatus::FinishedReplay);
    assert_eq!(session.records().len(), 2);
}

#[test]
fn blocked_tasks_with_no_signal_deadlock() {
    let session = start(5);
    let (r1, r2) = (ResourceId::new(1), ResourceId::new(2));
    session.create_resource(r1).unwrap();
    session.create_resource(r2).unwrap();

    let outcome = Arc::new(Mutex::new(None));
    let handle = {
        let outcome = Arc::clone(&outcome);
        spawn_task(&session, 1, move |s| {
            let result = s.blocked_on_resource(r1);
            *outcome.lock().unwrap() = Some(result.clone());
            result
        })
    };

    let blocked = session.blocked_on_resource(r2);
    let record = session.wait_for_main_task().unwrap();
    handle.join().unwrap();

    assert_eq!(record.result, TestResult::Fail);
    assert_eq!(record.reason, DEADLOCK_REASON);
    assert!(blocked.is_err());
    assert!(outcome.lock().unwrap().as_ref().unwrap().is_err());
}

#[test]
fn signal_on_any_resource_unblocks() {
    let session = start(11);
    let (r1, r2) = (ResourceId::new(1), ResourceId::new(2));
    session.create_resource(r1).unwrap();
    session.create_resource(r2).unwrap();
    let ready = Arc::new(AtomicBool::new(false));

    let waiter = {
        let ready = Arc::clone(&ready);
        spawn_task(&session, 1, move |s| {
            while !ready.load(Ordering::SeqCst) {
                s.blocked_on_any_resource(&[r1, r2])?;
            }
            Ok(())
        })
    };
    let notifier = {
        let ready = Arc::clone(&ready);
        spawn_task(&session, 2, move |s| {
            s.context_switch()?;
            ready.store(true, Ordering::SeqCst);
            s.signal_updated_resource(r2)
        })
    };

    let record = session.wait_for_main_task().unwrap();
    join_all(vec![waiter, notifier]);
    assert_eq!(record.result, TestResult::Pass);
}

#[test]
fn unstarted_tasks_trip_the_watchdog() {
    let mut info = info(1);
    info.timeout_ms = 200;
    let session = TestingSession::start(info, SessionOptions::new()).unwrap();
    session.context_switch().unwrap();
    for _ in 0..3 {
        session.create_task().unwrap();
    }

    let err = session.context_switch().unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::SessionFinished {
            result: TestResult::InactivityTimeout,
            ..
        }
    ));

    let record = session.outcome().unwrap();
    assert_eq!(record.result, TestResult::InactivityTimeout);
    assert!(record.reason.contains("No activity for 200 ms"));
    assert!(record.reason.contains("3 created task(s) never called StartTask"));
}

#[test]
fn three_unstarted_tasks_before_any_decision_name_the_stuck_state() {
    let mut info = info(1);
    info.timeout_ms = 200;
    let session = TestingSession::start(info, SessionOptions::new()).unwrap();
    for _ in 0..3 {
        session.create_task().unwrap();
    }

    let err = session.context_switch().unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::SessionFinished {
            result: TestResult::FaultyProgram,
            ..
        }
    ));

    let record = session.outcome().unwrap();
    assert_eq!(record.result, TestResult::FaultyProgram);
    assert_eq!(record.num_decisions, 0);
    assert!(record.reason.contains("inactivity-timeout"));
    assert!(record.reason.contains("No activity for 200 ms"));
    assert!(record.reason.contains("3 created task(s) never called StartTask"));
}

#[test]
fn rejected_duplicate_start_does_not_stall_the_session() {
    let mut info = info(4);
    info.timeout_ms = 5_000;
    let session = TestingSession::start(info, SessionOptions::new()).unwrap();
    session.create_task().unwrap();

    let err = session.start_task(TaskId::MAIN).unwrap_err();
    assert_eq!(err, SchedulerError::DuplicateTask(TaskId::MAIN));

    let began = Instant::now();
    session.context_switch().unwrap();
    assert!(began.elapsed() < Duration::from_secs(2));
    assert!(!session.is_finished());

    let record = session.wait_for_main_task().unwrap();
    assert_eq!(record.result, TestResult::Pass);
    assert_eq!(record.num_decisions, 1);
}

#[test]
fn decision_budget_ends_a_live_lock() {
    let mut info = info(9);
    info.max_decisions = 5;
    let session = TestingSession::start(info, SessionOptions::new()).unwrap();

    let mut switches = 0;
    let err = loop {
        match session.context_switch() {
            Ok(()) => switches += 1,
            Err(e) => break e,
        }
    };
    assert_eq!(switches, 5);
    assert!(err.is_session_finished());

    let record = session.outcome().unwrap();
    assert_eq!(record.result, TestResult::MaxDecisionsReached);
    assert_eq!(record.reason, MAX_DECISIONS_REASON);
    assert_eq!(record.num_decisions, 5);
}

#[test]
fn nondeterministic_values_are_recorded_and_replayed() {
    let session = start(21);
    let draw = |s: &TestingSession| {
        let b = s.create_nondet_bool().unwrap();
        let n = s.create_nondet_integer(100).unwrap();
        s.context_switch().unwrap();
        (b, n)
    };

    let first = draw(&session);
    session.wait_for_main_task().unwrap();
    let kinds: Vec<DecisionKind> = session.trace().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DecisionKind::NondetBool,
            DecisionKind::NondetInt,
            DecisionKind::ContextSwitch
        ]
    );

    session.reset().unwrap();
    assert_eq!(draw(&session), first);
    let record = session.wait_for_main_task().unwrap();
    assert_eq!(record.result, TestResult::Pass);
    assert_eq!(session.records().len(), 2);
}

#[test]
fn nondeterministic_choice_waits_for_announced_tasks() {
    let session = start(4);
    session.create_task().unwrap();
    let late = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let task = TaskId::new(1);
            let _ = session
                .start_task(task)
                .and_then(|()| session.end_task(task));
        })
    };

    session.create_nondet_bool().unwrap();
    let trace = session.trace();
    let first = trace.iter().next().unwrap();
    assert_eq!(first.kind, DecisionKind::NondetBool);
    assert_eq!(first.tasks.len(), 2);

    session.wait_for_main_task().unwrap();
    late.join().unwrap();
}

#[test]
fn replay_taking_another_path_diverges() {
    let session = start(4);
    let run = |s: &TestingSession, extra: bool| {
        s.context_switch().unwrap();
        if extra {
            s.context_switch().unwrap();
        }
        s.wait_for_main_task().unwrap()
    };

    let first = run(&session, false);
    assert_eq!(first.result, TestResult::Pass);

    session.reset().unwrap();
    let replay = run(&session, true);
    assert_eq!(replay.result, TestResult::ReplayDivergence);
    assert!(replay.reason.contains("Could not reproduce the trace for session 1"));
    assert!(replay.reason.contains("expected 1 decisions but the replay made 2"));
    assert_eq!(session.records().len(), 1);
}

#[test]
fn persisted_trace_is_used_for_replay() {
    let dir = tempfile::tempdir().unwrap();
    let options = SessionOptions::new().with_trace_dir(dir.path());
    let session = TestingSession::start(info(8), options).unwrap();

    session.context_switch().unwrap();
    session.wait_for_main_task().unwrap();

    let path = session.trace_path().unwrap();
    assert!(path.ends_with("session-1-trace.txt"));
    assert_eq!(DecisionTrace::load(&path).unwrap(), session.trace());

    session.reset().unwrap();
    session.context_switch().unwrap();
    let replay = session.wait_for_main_task().unwrap();
    assert_eq!(replay.result, TestResult::Pass);
}

#[test]
fn finish_hook_sees_every_run() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hook = {
        let seen = Arc::clone(&seen);
        Arc::new(move |_: &SessionInfo, record: &SessionRecord| {
            seen.lock().unwrap().push(record.result);
        })
    };
    let session =
        TestingSession::start(info(2), SessionOptions::new().with_finish_hook(hook)).unwrap();
    session.context_switch().unwrap();
    session.wait_for_main_task().unwrap();
    session.finish(TestResult::Error, "ignored after finish");

    assert_eq!(*seen.lock().unwrap(), vec![TestResult::Pass]);
}

#[test]
fn calls_after_finish_are_rejected() {
    let session = start(6);
    session.context_switch().unwrap();
    session.wait_for_main_task().unwrap();

    let err = session.create_resource(ResourceId::new(1)).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::SessionFinished {
            result: TestResult::Pass,
            ..
        }
    ));
    assert!(session.context_switch().is_err());
}

#[test]
fn reset_requires_a_finished_session() {
    let session = start(6);
    assert!(matches!(
        session.reset().unwrap_err(),
        SchedulerError::SessionRunning { .. }
    ));
    session.finish(TestResult::Error, "torn down");
}

#[test]
fn assertion_failure_finishes_the_run() {
    let session = start(6);
    session.context_switch().unwrap();
    let err = session.assert(false, "invariant broken").unwrap_err();
    assert!(err.is_assertion());

    let record = session.wait_for_main_task().unwrap();
    assert_eq!(record.result, TestResult::Fail);
    assert_eq!(record.reason, "invariant broken");
}

#[test]
fn end_task_from_an_unscheduled_task_is_an_assertion() {
    let session = start(6);
    session.context_switch().unwrap();
    session.create_task().unwrap();
    let parked = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.start_task(TaskId::new(1)))
    };

    // Wait for the task to register before impersonating it.
    while session.describe_state() == "*0" {
        thread::sleep(Duration::from_millis(1));
    }
    let err = session.end_task(TaskId::new(1)).unwrap_err();
    assert!(err.is_assertion());
    assert!(parked.join().unwrap().is_err());

    let record = session.outcome().unwrap();
    assert_eq!(record.result, TestResult::Fail);
    assert!(record.reason.contains("did not receive control"));
}
