//! Table formatting using comfy-table.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use nekara_client::{IterationOutcome, TestSummary};
use nekara_types::TestResult;

use crate::programs::Program;

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(columns: &[&str]) -> Vec<Cell> {
    columns
        .iter()
        .map(|col| {
            if super::no_color() {
                Cell::new(col)
            } else {
                Cell::new(col).add_attribute(Attribute::Bold).fg(Color::Cyan)
            }
        })
        .collect()
}

fn result_cell(result: TestResult) -> Cell {
    let cell = Cell::new(result);
    if super::no_color() {
        return cell;
    }
    match result {
        TestResult::Pass => cell.fg(Color::Green),
        TestResult::MaxDecisionsReached => cell.fg(Color::Yellow),
        _ => cell.fg(Color::Red),
    }
}

/// Bundled programs, one per row.
pub fn program_table(programs: &[Program]) -> Table {
    let mut table = styled_table();
    table.set_header(header(&["Program", "Expected", "Description"]));
    for program in programs {
        let expected = if program.buggy { "finds a bug" } else { "passes" };
        table.add_row(vec![
            Cell::new(program.name),
            Cell::new(expected),
            Cell::new(program.description),
        ]);
    }
    table
}

/// Counts per outcome, followed by averages.
pub fn summary_table(summary: &TestSummary) -> Table {
    let mut table = styled_table();
    table.set_header(header(&["Result", "Iterations"]));
    for (result, count) in summary.counts() {
        table.add_row(vec![
            result_cell(result),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("avg decisions"),
        Cell::new(format!("{:.1}", summary.avg_decisions())).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("avg elapsed ms"),
        Cell::new(format!("{:.1}", summary.avg_elapsed_ms())).set_alignment(CellAlignment::Right),
    ]);
    table
}

/// Failing iterations with their seeds, so they can be rerun.
pub fn failure_table<'a>(failures: impl Iterator<Item = &'a IterationOutcome>) -> Table {
    let mut table = styled_table();
    table.set_header(header(&["Seed", "Session", "Result", "Decisions", "Reason"]));
    for outcome in failures {
        table.add_row(vec![
            Cell::new(outcome.seed),
            Cell::new(outcome.session),
            result_cell(outcome.result()),
            Cell::new(outcome.first.num_decisions),
            Cell::new(outcome.reason()),
        ]);
    }
    table
}
