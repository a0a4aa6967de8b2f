//! List command implementation.

use crate::programs::PROGRAMS;
use crate::style::{print_spacer, table::program_table};

pub fn run() {
    println!("{}", program_table(PROGRAMS));
    print_spacer();
    crate::style::print_hint("Run one with: nekara run <program> --seed 42");
}
