use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The only way a gate run fails: one of its checks terminated non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("check '{name}' failed with exit code {exit_code}")]
    CheckFailed { name: String, exit_code: i32 },
}

impl GateError {
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::CheckFailed { exit_code, .. } => *exit_code,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid lint rule id '{0}' (expected e.g. `dead_code` or `clippy::unwrap_used`)")]
    InvalidRule(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("check plan is empty")]
    EmptyPlan,
    #[error("duplicate check name '{0}'")]
    DuplicateCheck(String),
    #[error("check '{0}' has an empty command")]
    EmptyCommand(String),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("could not locate git hooks directory: {0}")]
    HooksDir(String),
    #[error("{0} already exists and was not written by gate (use --force to replace it)")]
    Foreign(PathBuf),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors outside the gate itself. The binary maps all of these to exit code 2.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
