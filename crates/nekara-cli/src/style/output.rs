//! Status lines printed around tables.

use super::colors::SemanticStyle;

/// Labels are right-aligned to this width so values line up.
const LABEL_WIDTH: usize = 10;

pub fn print_success(msg: &str) {
    println!("{} {msg}", "✓".success());
}

/// Goes to stderr, next to the error `main` reports.
pub fn print_error(msg: &str) {
    eprintln!("{} {msg}", "✗".error());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", "!".warning(), msg.warning());
}

pub fn print_hint(msg: &str) {
    println!("{}", format!("hint: {msg}").muted());
}

pub fn print_labeled(key: &str, value: &str) {
    let label = format!("{key:>LABEL_WIDTH$}");
    println!("{} {value}", label.muted());
}

pub fn print_spacer() {
    println!();
}
