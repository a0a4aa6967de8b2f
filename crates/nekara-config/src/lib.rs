//! Configuration management for Nekara
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by the caller)
//! 2. Environment variables (`NEKARA_<SECTION>__<KEY>`)
//! 3. nekara.local.toml (gitignored, local overrides)
//! 4. nekara.toml (git-tracked, project config)
//! 5. ~/.config/nekara/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Nekara configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NekaraConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub runner: RunnerConfig,
}

/// Where the router persists its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Write decision traces to disk. When false, replay baselines are
    /// kept in memory only.
    pub persist_traces: bool,
    pub trace_dir: PathBuf,
    /// Append a CSV row per finished run. Disabled when false.
    pub write_summary: bool,
    pub summary_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            persist_traces: true,
            trace_dir: Paths::default_trace_dir(),
            write_summary: true,
            summary_path: Paths::default_summary_file(),
        }
    }
}

/// Defaults applied to sessions that do not specify their own limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_ms: u64,
    pub max_decisions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_decisions: 10_000,
        }
    }
}

/// Test runner defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub iterations: u32,
    pub start_seed: u64,
    pub terminate_on_first_fail: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            start_seed: 0,
            terminate_on_first_fail: false,
        }
    }
}

impl NekaraConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Configuration for throwaway runs: nothing touches the disk.
    pub fn ephemeral() -> Self {
        Self {
            server: ServerConfig {
                persist_traces: false,
                write_summary: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Directory for decision traces, if traces are persisted.
    pub fn trace_dir(&self) -> Option<&Path> {
        self.server
            .persist_traces
            .then_some(self.server.trace_dir.as_path())
    }

    /// Path of the summary log, if it is written.
    pub fn summary_path(&self) -> Option<&Path> {
        self.server
            .write_summary
            .then_some(self.server.summary_path.as_path())
    }

    /// Checks limits that would make every session fail immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "session.timeout_ms",
                problem: "must be positive",
            });
        }
        if self.session.max_decisions == 0 {
            return Err(ConfigError::Invalid {
                key: "session.max_decisions",
                problem: "must be positive",
            });
        }
        if self.runner.iterations == 0 {
            return Err(ConfigError::Invalid {
                key: "runner.iterations",
                problem: "must be positive",
            });
        }
        Ok(())
    }

    /// Anchors relative artifact paths at `project_dir`.
    pub fn resolve_paths(&mut self, project_dir: impl AsRef<Path>) {
        let project_dir = project_dir.as_ref();
        Paths::anchor(project_dir, &mut self.server.trace_dir);
        Paths::anchor(project_dir, &mut self.server.summary_path);
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
