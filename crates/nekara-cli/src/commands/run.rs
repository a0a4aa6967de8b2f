//! Run command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use nekara_client::{RunnerOptions, SessionSettings, TestResult, TestRunner};
use nekara_config::NekaraConfig;
use nekara_server::NekaraServer;

use crate::programs::{self, PROGRAMS};
use crate::style::colors::{SemanticStyle, styled_result};
use crate::style::table::{failure_table, summary_table};
use crate::style::{print_error, print_labeled, print_spacer, print_success, print_warn};

/// Command-line settings of one `nekara run`.
pub struct RunRequest {
    pub program: String,
    pub seed: Option<u64>,
    pub iterations: Option<u32>,
    pub fail_fast: bool,
    pub timeout_ms: Option<u64>,
    pub max_decisions: Option<usize>,
    pub trace_dir: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub ephemeral: bool,
    pub project: PathBuf,
}

/// Loads the project configuration and layers the command-line flags on top.
pub fn effective_config(request: &RunRequest) -> Result<NekaraConfig> {
    let mut config =
        NekaraConfig::load_from_dir(&request.project).context("Failed to load configuration")?;

    if let Some(seed) = request.seed {
        config.runner.start_seed = seed;
    }
    if let Some(iterations) = request.iterations {
        config.runner.iterations = iterations;
    }
    if request.fail_fast {
        config.runner.terminate_on_first_fail = true;
    }
    if let Some(timeout_ms) = request.timeout_ms {
        config.session.timeout_ms = timeout_ms;
    }
    if let Some(max_decisions) = request.max_decisions {
        config.session.max_decisions = max_decisions;
    }
    if let Some(dir) = &request.trace_dir {
        config.server.persist_traces = true;
        config.server.trace_dir.clone_from(dir);
    }
    if let Some(path) = &request.summary {
        config.server.write_summary = true;
        config.server.summary_path.clone_from(path);
    }
    if request.ephemeral {
        config.server.persist_traces = false;
        config.server.write_summary = false;
    }

    config.validate()?;
    Ok(config)
}

pub fn run(request: &RunRequest) -> Result<()> {
    let Some(program) = programs::find(&request.program) else {
        let known: Vec<&str> = PROGRAMS.iter().map(|p| p.name).collect();
        anyhow::bail!(
            "Unknown program '{}'. Available programs: {}",
            request.program,
            known.join(", ")
        );
    };
    let config = effective_config(request)?;

    println!("{}", format!("Testing {}", program.name).header());
    print_labeled(
        "Seeds",
        &format!(
            "{} (+{} iterations)",
            config.runner.start_seed, config.runner.iterations
        ),
    );
    if let Some(dir) = config.trace_dir() {
        print_labeled("Traces", &dir.display().to_string());
    }
    if let Some(path) = config.summary_path() {
        print_labeled("Summary", &path.display().to_string());
    }
    print_spacer();

    let server = Arc::new(NekaraServer::from_config(&config));
    let options = RunnerOptions {
        iterations: u64::from(config.runner.iterations),
        start_seed: config.runner.start_seed,
        terminate_on_first_fail: config.runner.terminate_on_first_fail,
        settings: SessionSettings {
            timeout_ms: Some(config.session.timeout_ms),
            max_decisions: Some(config.session.max_decisions),
        },
    };
    let summary = TestRunner::new(server, program.identity(), options)
        .run(program.run)
        .context("Lost contact with the scheduler")?;

    println!("{}", summary_table(&summary));

    let live_locks = summary.count(TestResult::MaxDecisionsReached);
    if live_locks > 0 {
        print_warn(&format!(
            "{live_locks} iteration(s) exhausted the decision budget of {}",
            config.session.max_decisions
        ));
    }

    if summary.is_success() {
        print_success(&format!(
            "{} iteration(s) finished without finding a bug",
            summary.total()
        ));
        return Ok(());
    }

    print_spacer();
    println!("{}", failure_table(summary.failures()));
    let failed = summary.failures().count();
    if let Some(first) = summary.failures().next() {
        print_error(&format!(
            "First failure: seed {} ended with {}",
            first.seed,
            styled_result(first.result())
        ));
    }
    anyhow::bail!("{failed} of {} iterations failed", summary.total());
}
