//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The rules file does not exist.
    #[error("rules file not found at {path}. Pass --rules or create granted.toml")]
    RulesNotFound { path: PathBuf },

    /// `--options` was not valid JSON.
    #[error("invalid --options: {0}")]
    Options(#[from] serde_json::Error),

    /// The rules file is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The evaluation did not grant access.
    #[error(transparent)]
    Granted(#[from] granted::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
