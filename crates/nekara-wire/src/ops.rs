//! Names of the remote operations.

// Session lifecycle
pub const INITIALIZE_TEST_SESSION: &str = "InitializeTestSession";
pub const REPLAY_TEST_SESSION: &str = "ReplayTestSession";
pub const GET_SESSION_INFO: &str = "GetSessionInfo";
pub const TEARDOWN_TEST_SESSION: &str = "TeardownTestSession";
pub const WAIT_FOR_MAIN_TASK: &str = "WaitForMainTask";

// Tasks
pub const CREATE_TASK: &str = "CreateTask";
pub const START_TASK: &str = "StartTask";
pub const END_TASK: &str = "EndTask";
pub const CONTEXT_SWITCH: &str = "ContextSwitch";

// Resources
pub const CREATE_RESOURCE: &str = "CreateResource";
pub const DELETE_RESOURCE: &str = "DeleteResource";
pub const BLOCKED_ON_RESOURCE: &str = "BlockedOnResource";
pub const BLOCKED_ON_ANY_RESOURCE: &str = "BlockedOnAnyResource";
pub const SIGNAL_UPDATED_RESOURCE: &str = "SignalUpdatedResource";

// Nondeterminism and assertions
pub const CREATE_NONDET_BOOL: &str = "CreateNondetBool";
pub const CREATE_NONDET_INTEGER: &str = "CreateNondetInteger";
pub const ASSERT: &str = "Assert";

/// Operations that stay available after a session finished.
pub const ALLOWED_AFTER_FINISH: &[&str] = &[
    WAIT_FOR_MAIN_TASK,
    GET_SESSION_INFO,
    REPLAY_TEST_SESSION,
    TEARDOWN_TEST_SESSION,
];
