//! Where Nekara looks for configuration and keeps its artifacts.
//!
//! ```text
//! ~/.config/nekara/config.toml     user defaults
//! <project>/nekara.toml            project settings
//! <project>/nekara.local.toml      uncommitted overrides
//! <project>/.nekara/traces/        one decision trace per session
//! <project>/.nekara/summary.csv    one row per finished run
//! ```

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Per-project directory holding traces and the summary log.
pub const STATE_DIR: &str = ".nekara";

const PROJECT_FILE: &str = "nekara.toml";
const LOCAL_FILE: &str = "nekara.local.toml";
const USER_FILE: &str = "config.toml";

/// Locations of configuration files and run artifacts.
pub struct Paths {
    dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            dirs: ProjectDirs::from("dev", "Nekara", "nekara"),
        }
    }

    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        self.dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().join(USER_FILE))
            .ok_or(ConfigError::NoUserDirectory)
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_FILE)
    }

    /// Trace directory relative to the project root.
    pub fn default_trace_dir() -> PathBuf {
        Path::new(STATE_DIR).join("traces")
    }

    /// Summary log relative to the project root.
    pub fn default_summary_file() -> PathBuf {
        Path::new(STATE_DIR).join("summary.csv")
    }

    /// Anchors a relative artifact path at the project root.
    pub fn anchor(project_dir: &Path, path: &mut PathBuf) {
        if path.is_relative() {
            *path = project_dir.join(&*path);
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
