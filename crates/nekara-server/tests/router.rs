//! Router behaviour, driven through the request/response envelope.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use nekara_core::trace_file_path;
use nekara_server::{NekaraServer, SUMMARY_HEADER, ServerOptions, TEARDOWN_REASON};
use nekara_types::{SessionId, SessionInfo, SessionReport, TestResult};
use nekara_wire::{ErrorCode, Request, RequestId, Response, ResponsePayload, ops};
use serde_json::{Value, json};

struct Harness {
    server: Arc<NekaraServer>,
    next_request: AtomicU64,
}

impl Harness {
    fn new(options: ServerOptions) -> Arc<Self> {
        Arc::new(Self {
            server: Arc::new(NekaraServer::new(options)),
            next_request: AtomicU64::new(1),
        })
    }

    fn send(&self, session: Option<SessionId>, function: &str, args: Vec<Value>) -> Response {
        let id = RequestId(self.next_request.fetch_add(1, Ordering::SeqCst));
        let mut request = Request::new(id, function, args);
        request.session_id = session;
        let response = self.server.handle(request);
        assert_eq!(response.id, id);
        response
    }

    fn ok(&self, session: SessionId, function: &str, args: Vec<Value>) -> Value {
        match self.send(Some(session), function, args).payload {
            ResponsePayload::Ok(value) => value,
            ResponsePayload::Error(e) => panic!("{function} failed: {e}"),
        }
    }

    fn error(&self, session: Option<SessionId>, function: &str, args: Vec<Value>) -> ErrorCode {
        match self.send(session, function, args).payload {
            ResponsePayload::Ok(value) => panic!("{function} unexpectedly returned {value}"),
            ResponsePayload::Error(e) => e.code,
        }
    }

    fn init(&self, seed: u64) -> SessionId {
        let value = match self
            .send(
                None,
                ops::INITIALIZE_TEST_SESSION,
                vec![json!("router-tests"), json!("Router"), json!("run"), json!(seed)],
            )
            .payload
        {
            ResponsePayload::Ok(value) => value,
            ResponsePayload::Error(e) => panic!("initialize failed: {e}"),
        };
        serde_json::from_value(value).unwrap()
    }

    fn report(&self, session: SessionId) -> SessionReport {
        serde_json::from_value(self.ok(session, ops::GET_SESSION_INFO, vec![])).unwrap()
    }

    /// Main task plus one worker that yields once; always passes.
    fn run_two_tasks(self: &Arc<Self>, session: SessionId) -> String {
        self.ok(session, ops::CREATE_TASK, vec![]);
        let this = Arc::clone(self);
        let worker = thread::spawn(move || {
            this.ok(session, ops::START_TASK, vec![json!(1)]);
            this.ok(session, ops::CONTEXT_SWITCH, vec![]);
            this.ok(session, ops::END_TASK, vec![json!(1)]);
        });
        self.ok(session, ops::CONTEXT_SWITCH, vec![]);
        let reason = self.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]);
        worker.join().unwrap();
        reason.as_str().unwrap().to_string()
    }
}

#[test]
fn unknown_session_is_reported() {
    let h = Harness::new(ServerOptions::default());
    let code = h.error(Some(SessionId::new(99)), ops::CONTEXT_SWITCH, vec![]);
    assert_eq!(code, ErrorCode::SessionNotFound);
}

#[test]
fn unknown_operation_is_reported() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(1);
    assert_eq!(
        h.error(Some(session), "Frobnicate", vec![]),
        ErrorCode::UnknownOperation
    );
}

#[test]
fn malformed_calls_are_invalid_requests() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(1);

    assert_eq!(
        h.error(Some(session), ops::START_TASK, vec![json!("one")]),
        ErrorCode::InvalidRequest
    );
    assert_eq!(
        h.error(Some(session), ops::CREATE_RESOURCE, vec![]),
        ErrorCode::InvalidRequest
    );
    assert_eq!(
        h.error(None, ops::CONTEXT_SWITCH, vec![]),
        ErrorCode::InvalidRequest
    );
    assert_eq!(
        h.error(
            None,
            ops::INITIALIZE_TEST_SESSION,
            vec![json!(""), json!("Router"), json!("run"), json!(1)]
        ),
        ErrorCode::InvalidRequest
    );
    assert_eq!(
        h.error(
            None,
            ops::INITIALIZE_TEST_SESSION,
            vec![json!("p"), json!("m"), json!("e"), json!(1), json!(0)]
        ),
        ErrorCode::InvalidRequest
    );
}

#[test]
fn passing_run_is_recorded() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(3);

    assert_eq!(h.run_two_tasks(session), "");

    let report = h.report(session);
    assert!(report.finished);
    assert_eq!(report.info.scheduling_seed, 3);
    let outcome = report.outcome.unwrap();
    assert_eq!(outcome.result, TestResult::Pass);
    assert!(outcome.num_decisions >= 2);
    assert!(outcome.num_requests > 0);
    assert_eq!(report.records.len(), 1);
}

#[test]
fn finishing_call_is_counted_in_the_run() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(2);
    h.ok(session, ops::CONTEXT_SWITCH, vec![]);
    h.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]);

    let outcome = h.report(session).outcome.unwrap();
    assert_eq!(outcome.result, TestResult::Pass);
    assert_eq!(outcome.num_decisions, 1);
    assert_eq!(outcome.num_requests, 2);
}

#[test]
fn finished_sessions_reject_program_calls() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(1);
    h.ok(session, ops::CONTEXT_SWITCH, vec![]);
    h.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]);

    assert_eq!(
        h.error(Some(session), ops::CREATE_TASK, vec![]),
        ErrorCode::ProtocolMisuse
    );
    assert_eq!(
        h.error(Some(session), ops::CREATE_NONDET_BOOL, vec![]),
        ErrorCode::ProtocolMisuse
    );
    // Still answered after the run.
    assert_eq!(h.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]), json!(""));
    assert!(h.report(session).finished);
}

#[test]
fn misuse_keeps_the_session_running() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(1);
    h.ok(session, ops::CREATE_RESOURCE, vec![json!(5)]);

    assert_eq!(
        h.error(Some(session), ops::CREATE_RESOURCE, vec![json!(5)]),
        ErrorCode::ProtocolMisuse
    );
    assert_eq!(
        h.error(Some(session), ops::SIGNAL_UPDATED_RESOURCE, vec![json!(6)]),
        ErrorCode::ProtocolMisuse
    );
    assert_eq!(
        h.error(Some(session), ops::CREATE_NONDET_INTEGER, vec![json!(0)]),
        ErrorCode::ProtocolMisuse
    );
    assert_eq!(
        h.error(Some(session), ops::REPLAY_TEST_SESSION, vec![]),
        ErrorCode::ProtocolMisuse
    );
    assert!(!h.report(session).finished);

    h.ok(session, ops::DELETE_RESOURCE, vec![json!(5)]);
    h.ok(session, ops::CONTEXT_SWITCH, vec![]);
    assert_eq!(h.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]), json!(""));
}

#[test]
fn failed_assertion_is_the_failure_reason() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(1);
    h.ok(session, ops::CONTEXT_SWITCH, vec![]);

    h.ok(session, ops::ASSERT, vec![json!(true), json!("fine")]);
    assert_eq!(
        h.error(Some(session), ops::ASSERT, vec![json!(false), json!("boom")]),
        ErrorCode::AssertionFailure
    );
    assert_eq!(h.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]), json!("boom"));
    assert_eq!(
        h.report(session).outcome.unwrap().result,
        TestResult::Fail
    );
}

#[test]
fn nondeterministic_values_are_in_range() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(11);
    for _ in 0..20 {
        let value = h.ok(session, ops::CREATE_NONDET_INTEGER, vec![json!(4)]);
        assert!(value.as_u64().unwrap() < 4);
        assert!(h.ok(session, ops::CREATE_NONDET_BOOL, vec![]).is_boolean());
    }
    assert_eq!(h.ok(session, ops::WAIT_FOR_MAIN_TASK, vec![]), json!(""));
}

#[test]
fn teardown_finishes_and_forgets_the_session() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(1);
    h.ok(session, ops::CONTEXT_SWITCH, vec![]);
    let live = h.server.session(session).unwrap();

    assert_eq!(h.ok(session, ops::TEARDOWN_TEST_SESSION, vec![]), Value::Null);
    assert_eq!(h.server.session_count(), 0);
    let outcome = live.outcome().unwrap();
    assert_eq!(outcome.result, TestResult::Error);
    assert_eq!(outcome.reason, TEARDOWN_REASON);

    assert_eq!(
        h.error(Some(session), ops::GET_SESSION_INFO, vec![]),
        ErrorCode::SessionNotFound
    );
}

#[test]
fn replay_reproduces_the_first_run() {
    let h = Harness::new(ServerOptions::default());
    let session = h.init(8);
    assert_eq!(h.run_two_tasks(session), "");

    let info: SessionInfo =
        serde_json::from_value(h.ok(session, ops::REPLAY_TEST_SESSION, vec![])).unwrap();
    assert_eq!(info.id, session);
    assert_eq!(info.scheduling_seed, 8);
    assert!(!h.report(session).finished);

    assert_eq!(h.run_two_tasks(session), "");
    let report = h.report(session);
    assert!(report.replay);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].num_decisions, report.records[1].num_decisions);
}

#[test]
fn traces_and_summary_rows_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let options = ServerOptions {
        trace_dir: Some(dir.path().join("traces")),
        summary_path: Some(dir.path().join("summary.csv")),
        ..ServerOptions::default()
    };
    let h = Harness::new(options);
    let session = h.init(5);
    assert_eq!(h.run_two_tasks(session), "");
    h.ok(session, ops::REPLAY_TEST_SESSION, vec![]);
    assert_eq!(h.run_two_tasks(session), "");

    let trace = fs::read_to_string(trace_file_path(&dir.path().join("traces"), session)).unwrap();
    assert!(trace.starts_with("cs,"));

    let summary = fs::read_to_string(dir.path().join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], SUMMARY_HEADER);
    assert!(lines[1].starts_with(&format!("router-tests,Router,run,{session},5,pass,")));
}

#[test]
fn sessions_are_independent() {
    let h = Harness::new(ServerOptions::default());
    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                let session = h.init(seed);
                h.run_two_tasks(session)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), "");
    }
    assert_eq!(h.server.session_count(), 4);
}
