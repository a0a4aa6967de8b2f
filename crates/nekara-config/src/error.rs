//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting would make every session fail before it starts.
    #[error("Invalid configuration: {key} {problem}")]
    Invalid { key: &'static str, problem: &'static str },

    #[error("Failed to render configuration as TOML: {0}")]
    Render(#[from] toml::ser::Error),

    /// The platform reports no home directory, so there is no user config.
    #[error("Cannot locate the user configuration directory")]
    NoUserDirectory,
}
