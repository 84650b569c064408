use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{parse_rules, timeout_from_secs, GateConfig};
use crate::error::ConfigError;

/// Run format, lint and test checks in order, stopping at the first failure.
#[derive(Debug, Parser)]
#[command(name = "gate", version)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the gate (the default when no subcommand is given).
    Run,
    /// Print each check and the command line it runs.
    List,
    /// Check that every tool the gate needs is on the search path.
    Doctor,
    /// Install a pre-push hook that runs the gate.
    InstallHook {
        /// Replace an existing hook that was not written by gate.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Repository root (default: nearest ancestor with gate.toml or .git).
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file, relative to the current directory
    /// (default: $GATE_CONFIG, or <root>/gate.toml).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress the dead_code lint.
    #[arg(long, global = true)]
    pub allow_dead_code: bool,

    /// Deny clippy::unwrap_used.
    #[arg(long, global = true)]
    pub forbid_unwrap: bool,

    /// Suppress an additional lint rule (repeatable).
    #[arg(long = "suppress", global = true, value_name = "RULE")]
    pub suppress: Vec<String>,

    /// Deny an additional lint rule (repeatable).
    #[arg(long = "deny", global = true, value_name = "RULE")]
    pub deny: Vec<String>,

    /// Kill a check that runs longer than this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print a pass/fail summary after the run.
    #[arg(long, global = true)]
    pub summary: bool,

    /// Append a JSON record of each run to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub timing_file: Option<PathBuf>,
}

impl Overrides {
    /// Flags win over both the file and the environment. Boolean flags only
    /// ever switch a setting on.
    pub fn apply(&self, config: &mut GateConfig) -> Result<(), ConfigError> {
        if self.allow_dead_code {
            config.policy.allow_dead_code = true;
        }
        if self.forbid_unwrap {
            config.policy.forbid_unwrap = true;
        }
        config.policy.suppressions.extend(parse_rules(&self.suppress)?);
        config.policy.denials.extend(parse_rules(&self.deny)?);
        if let Some(secs) = self.timeout {
            config.timeout = timeout_from_secs(secs);
        }
        if self.summary {
            config.summary = true;
        }
        if let Some(path) = &self.timing_file {
            config.timing_file = Some(config.root.join(path));
        }
        Ok(())
    }
}
