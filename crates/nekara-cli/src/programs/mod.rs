//! Programs bundled with the CLI.
//!
//! Each program runs on the main task of a session and reports its
//! concurrency through the client it is handed.

mod deadlock;
mod nondet;
mod philosophers;
mod racy_counter;

use nekara_client::{ClientResult, ProgramIdentity, SessionClient};

/// A runnable program.
pub struct Program {
    pub name: &'static str,
    pub description: &'static str,
    /// Whether some schedule is expected to fail.
    pub buggy: bool,
    pub run: fn(&SessionClient) -> ClientResult<()>,
}

impl Program {
    pub fn identity(&self) -> ProgramIdentity {
        ProgramIdentity::new("nekara-cli", self.name, "run")
    }
}

pub const PROGRAMS: &[Program] = &[
    Program {
        name: "racy-counter",
        description: "Task A reads a value twice under a lock; task B writes it without the lock",
        buggy: true,
        run: racy_counter::run,
    },
    Program {
        name: "deadlock",
        description: "Two tasks take two locks in opposite order",
        buggy: true,
        run: deadlock::run,
    },
    Program {
        name: "philosophers",
        description: "Three dining philosophers picking up forks in a global order",
        buggy: false,
        run: philosophers::run,
    },
    Program {
        name: "nondet",
        description: "Draws nondeterministic values and checks their range",
        buggy: false,
        run: nondet::run,
    },
];

pub fn find(name: &str) -> Option<&'static Program> {
    PROGRAMS.iter().find(|p| p.name == name)
}
