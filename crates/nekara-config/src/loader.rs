//! Layered configuration loading.

use crate::{NekaraConfig, Paths};
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};

/// Builds a [`NekaraConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "NEKARA".to_string(),
            include_user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Prefix of environment overrides, `NEKARA` by default.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Configuration files that exist, lowest precedence first.
    fn files(&self) -> Vec<PathBuf> {
        let user = self
            .include_user_config
            .then(|| Paths::new().user_config_file().ok())
            .flatten();

        user.into_iter()
            .chain([
                Paths::project_config_file(&self.project_dir),
                Paths::local_config_file(&self.project_dir),
            ])
            .filter(|path| path.exists())
            .collect()
    }

    /// Merges every source, later ones overriding earlier ones, then
    /// anchors artifact paths at the project root and validates limits.
    pub fn load(self) -> Result<NekaraConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&NekaraConfig::default())?);

        for path in self.files() {
            tracing::debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        // NEKARA_SESSION__TIMEOUT_MS: keys contain underscores, so sections
        // are split on a double one.
        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: NekaraConfig = builder
            .build()
            .context("Failed to merge configuration sources")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.resolve_paths(&self.project_dir);
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults on any error.
    pub fn load_or_default(self) -> NekaraConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("NEKARA_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn empty_project_gets_defaults_anchored_at_the_root() {
        let dir = tempdir().unwrap();
        let config = loader(dir.path()).load().unwrap();

        assert_eq!(config.session.timeout_ms, 5_000);
        assert_eq!(config.runner.iterations, 100);
        assert_eq!(config.server.trace_dir, dir.path().join(".nekara/traces"));
        assert!(loader(dir.path()).files().is_empty());
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("nekara.toml"),
            r#"
[session]
timeout_ms = 250
max_decisions = 64

[runner]
iterations = 7
terminate_on_first_fail = true

[server]
trace_dir = "/var/tmp/nekara-traces"
"#,
        )
        .unwrap();

        let config = loader(dir.path()).load().unwrap();

        assert_eq!(config.session.timeout_ms, 250);
        assert_eq!(config.session.max_decisions, 64);
        assert_eq!(config.runner.iterations, 7);
        assert!(config.runner.terminate_on_first_fail);
        assert_eq!(config.runner.start_seed, 0);
        assert_eq!(config.server.trace_dir, PathBuf::from("/var/tmp/nekara-traces"));
    }

    #[test]
    fn local_file_wins_over_project_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("nekara.toml"), "[runner]\nstart_seed = 10\n").unwrap();
        fs::write(dir.path().join("nekara.local.toml"), "[runner]\nstart_seed = 42\n").unwrap();

        let config = loader(dir.path()).load().unwrap();
        assert_eq!(config.runner.start_seed, 42);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("nekara.toml"), "[session]\ntimeout_ms = 0\n").unwrap();

        let err = loader(dir.path()).load().unwrap_err();
        assert!(format!("{err:#}").contains("timeout_ms"));
        assert_eq!(loader(dir.path()).load_or_default(), NekaraConfig::default());
    }
}
