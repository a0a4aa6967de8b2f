//! Configuration management commands.

use std::path::Path;

use anyhow::{Context, Result};
use nekara_config::{NekaraConfig, Paths};

use crate::style::colors::SemanticStyle;
use crate::style::print_labeled;

/// Show current configuration.
pub fn show(project: &Path, format: &str) -> Result<()> {
    let config = NekaraConfig::load_from_dir(project).context("Failed to load configuration")?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        "toml" => {
            println!("{}", config.to_toml()?);
        }
        "text" => print_text(project, &config),
        other => anyhow::bail!("Unknown format '{other}'. Use text, json or toml."),
    }
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn print_text(project: &Path, config: &NekaraConfig) {
    println!("{}", "Nekara Configuration".header());
    println!(
        "{}",
        format!("project file: {}", Paths::project_config_file(project).display()).muted()
    );
    println!();

    println!("Server:");
    print_labeled("Persist traces", on_off(config.server.persist_traces));
    print_labeled("Trace directory", &config.server.trace_dir.display().to_string());
    print_labeled("Write summary", on_off(config.server.write_summary));
    print_labeled("Summary log", &config.server.summary_path.display().to_string());
    println!();

    println!("Session:");
    print_labeled("Timeout (ms)", &config.session.timeout_ms.to_string());
    print_labeled("Max decisions", &config.session.max_decisions.to_string());
    println!();

    println!("Runner:");
    print_labeled("Iterations", &config.runner.iterations.to_string());
    print_labeled("Start seed", &config.runner.start_seed.to_string());
    print_labeled(
        "Stop at first failure",
        on_off(config.runner.terminate_on_first_fail),
    );
}
