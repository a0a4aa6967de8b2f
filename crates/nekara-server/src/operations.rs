//! Operation table: one typed handler per remote operation.

use std::collections::HashMap;

use nekara_types::{ProgramIdentity, SessionId};
use nekara_wire::ops;
use serde_json::{Value, json};

use crate::error::{ServerError, ServerResult};
use crate::router::{Call, NekaraServer};

/// A registered operation.
pub(crate) type Handler = fn(&NekaraServer, &Call<'_>) -> ServerResult<Value>;

/// Builds the operation table.
pub(crate) fn registry() -> HashMap<&'static str, Handler> {
    let entries: [(&'static str, Handler); 17] = [
        (ops::INITIALIZE_TEST_SESSION, initialize_test_session),
        (ops::REPLAY_TEST_SESSION, replay_test_session),
        (ops::GET_SESSION_INFO, get_session_info),
        (ops::TEARDOWN_TEST_SESSION, teardown_test_session),
        (ops::WAIT_FOR_MAIN_TASK, wait_for_main_task),
        (ops::CREATE_TASK, create_task),
        (ops::START_TASK, start_task),
        (ops::END_TASK, end_task),
        (ops::CONTEXT_SWITCH, context_switch),
        (ops::CREATE_RESOURCE, create_resource),
        (ops::DELETE_RESOURCE, delete_resource),
        (ops::BLOCKED_ON_RESOURCE, blocked_on_resource),
        (ops::BLOCKED_ON_ANY_RESOURCE, blocked_on_any_resource),
        (ops::SIGNAL_UPDATED_RESOURCE, signal_updated_resource),
        (ops::CREATE_NONDET_BOOL, create_nondet_bool),
        (ops::CREATE_NONDET_INTEGER, create_nondet_integer),
        (ops::ASSERT, assert),
    ];
    entries.into_iter().collect()
}

// ============================================================================
// Session lifecycle
// ============================================================================

fn initialize_test_session(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    let args = &call.args;
    args.expect_between(4, 6)?;
    let program = ProgramIdentity::new(args.str(0)?, args.str(1)?, args.str(2)?);
    let seed = args.u64(3)?;
    let timeout_ms = args.opt_u64(4)?;
    let max_decisions = args
        .opt_u64(5)?
        .map(|n| {
            usize::try_from(n).map_err(|_| {
                ServerError::InvalidMetadata(format!("decision budget {n} is too large"))
            })
        })
        .transpose()?;

    let id: SessionId = server.initialize_session(program, seed, timeout_ms, max_decisions)?;
    Ok(json!(id))
}

fn replay_test_session(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    let session = server.target(call)?;
    session.reset()?;
    Ok(serde_json::to_value(session.info())?)
}

fn get_session_info(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    let session = server.target(call)?;
    Ok(serde_json::to_value(session.report())?)
}

fn teardown_test_session(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    server.teardown(call.session_id()?)?;
    Ok(Value::Null)
}

fn wait_for_main_task(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    let record = server.target(call)?.wait_for_main_task()?;
    Ok(json!(record.failure_reason().unwrap_or_default()))
}

// ============================================================================
// Tasks
// ============================================================================

fn create_task(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    server.target(call)?.create_task()?;
    Ok(Value::Null)
}

fn start_task(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let task = call.args.task(0)?;
    server.target(call)?.start_task(task)?;
    Ok(Value::Null)
}

fn end_task(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let task = call.args.task(0)?;
    server.target(call)?.end_task(task)?;
    Ok(Value::Null)
}

fn context_switch(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    server.target(call)?.context_switch()?;
    Ok(Value::Null)
}

// ============================================================================
// Resources
// ============================================================================

fn create_resource(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let resource = call.args.resource(0)?;
    server.target(call)?.create_resource(resource)?;
    Ok(Value::Null)
}

fn delete_resource(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let resource = call.args.resource(0)?;
    server.target(call)?.delete_resource(resource)?;
    Ok(Value::Null)
}

fn blocked_on_resource(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let resource = call.args.resource(0)?;
    server.target(call)?.blocked_on_resource(resource)?;
    Ok(Value::Null)
}

fn blocked_on_any_resource(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let resources = call.args.resources(0)?;
    server.target(call)?.blocked_on_any_resource(&resources)?;
    Ok(Value::Null)
}

fn signal_updated_resource(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let resource = call.args.resource(0)?;
    server.target(call)?.signal_updated_resource(resource)?;
    Ok(Value::Null)
}

// ============================================================================
// Nondeterminism and assertions
// ============================================================================

fn create_nondet_bool(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(0)?;
    let value = server.target(call)?.create_nondet_bool()?;
    Ok(json!(value))
}

fn create_nondet_integer(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(1)?;
    let max = call.args.u64(0)?;
    let value = server.target(call)?.create_nondet_integer(max)?;
    Ok(json!(value))
}

fn assert(server: &NekaraServer, call: &Call<'_>) -> ServerResult<Value> {
    call.args.expect_len(2)?;
    let predicate = call.args.bool(0)?;
    let message = call.args.str(1)?;
    server.target(call)?.assert(predicate, message)?;
    Ok(Value::Null)
}
