//! Version command implementation.

use nekara_config::SessionConfig;

use crate::programs::PROGRAMS;
use crate::style::print_labeled;

pub fn run() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("Deterministic testing of concurrent programs.");
    println!();

    let defaults = SessionConfig::default();
    print_labeled("rustc", concat!(env!("CARGO_PKG_RUST_VERSION"), "+"));
    print_labeled(
        "platform",
        &format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
    );
    print_labeled("programs", &PROGRAMS.len().to_string());
    print_labeled("timeout", &format!("{} ms", defaults.timeout_ms));
    print_labeled("budget", &format!("{} decisions", defaults.max_decisions));
}
