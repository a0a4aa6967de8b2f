//! Nekara CLI.
//!
//! Runs bundled concurrent programs under the deterministic scheduler,
//! replays every run and reports the outcomes.
//!
//! # Quick Start
//!
//! ```bash
//! # See what can be run
//! nekara list
//!
//! # Hunt for the race in the two-task counter, starting at seed 42
//! nekara run racy-counter --seed 42 --iterations 50
//!
//! # Show the effective configuration
//! nekara config show
//! ```

mod commands;
mod programs;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Nekara - deterministic testing of concurrent programs.
#[derive(Parser)]
#[command(name = "nekara")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Log scheduling activity (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// List the bundled programs.
    List,

    /// Run a bundled program for a number of seeds, replaying every run.
    Run(RunArgs),

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Name of the program (see `nekara list`).
    program: String,

    /// Seed of the first iteration.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of iterations.
    #[arg(short, long)]
    iterations: Option<u32>,

    /// Stop at the first failing iteration.
    #[arg(long)]
    fail_fast: bool,

    /// Inactivity window per session, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Decision budget per run.
    #[arg(long)]
    max_decisions: Option<usize>,

    /// Directory for decision traces.
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Path of the CSV summary log.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Keep traces in memory and skip the summary log.
    #[arg(long, conflicts_with_all = ["trace_dir", "summary"])]
    ephemeral: bool,

    /// Project directory holding nekara.toml.
    #[arg(short, long, default_value = ".")]
    project: PathBuf,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Project directory holding nekara.toml.
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    style::set_no_color(cli.no_color);

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::List => {
            commands::list::run();
            Ok(())
        }
        Commands::Run(args) => commands::run::run(&commands::run::RunRequest {
            program: args.program,
            seed: args.seed,
            iterations: args.iterations,
            fail_fast: args.fail_fast,
            timeout_ms: args.timeout_ms,
            max_decisions: args.max_decisions,
            trace_dir: args.trace_dir,
            summary: args.summary,
            ephemeral: args.ephemeral,
            project: args.project,
        }),
        Commands::Config(ConfigCommands::Show { project, format }) => {
            commands::config::show(&project, &format)
        }
    }
}
