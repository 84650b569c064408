//! Wires configuration, the execution environment and the runner together for
//! each subcommand.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cli::{Cli, Commands, Overrides};
use crate::config::{discover_root, GateConfig};
use crate::doctor;
use crate::env::ProcessEnvironment;
use crate::error::{AppError, ConfigError};
use crate::gate::{GateResult, GateRunner};
use crate::hook::{self, InstallOutcome};
use crate::reporter;
use crate::timing::{self, RunRecord, Stopwatch};

/// Resolve the root, then layer `gate.toml`, `GATE_*` variables and flags.
///
/// A `--config` path is relative to `cwd`; `GATE_CONFIG` is relative to the root.
pub fn load_config<F>(
    overrides: &Overrides,
    cwd: &Path,
    lookup: F,
) -> Result<GateConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let root = match &overrides.root {
        Some(root) => cwd.join(root),
        None => discover_root(cwd),
    };
    let explicit = match &overrides.config {
        Some(path) => Some(cwd.join(path)),
        None => lookup("GATE_CONFIG")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from),
    };

    let mut config = GateConfig::load(&root, explicit.as_deref())?;
    config.apply_env(&lookup)?;
    overrides.apply(&mut config)?;
    debug!(root = %config.root.display(), policy = ?config.policy, "configuration loaded");
    Ok(config)
}

/// Run the subcommand in `cli` and return the process exit code.
pub fn execute<W, F>(
    cli: &Cli,
    cwd: &Path,
    lookup: F,
    interrupt: Option<Arc<AtomicBool>>,
    out: &mut W,
) -> Result<i32, AppError>
where
    W: Write,
    F: Fn(&str) -> Option<String>,
{
    let config = load_config(&cli.overrides, cwd, lookup)?;

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => {
            let result = run_gate(&config, interrupt, out)?;
            Ok(result.exit_code())
        }
        Commands::List => {
            reporter::print_plan(out, &config.plan()?)?;
            Ok(0)
        }
        Commands::Doctor => {
            let plan = config.plan()?;
            let environment = config.environment();
            let tools = config.manifest_tools(&plan);
            Ok(doctor::run(out, &tools, |tool| doctor::probe_tool(&environment, tool))?)
        }
        Commands::InstallHook { force } => {
            let hooks_dir = hook::hooks_dir(&config.root)?;
            let binary = std::env::current_exe()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|_| "gate".to_string());
            match hook::install(&hooks_dir, &binary, force)? {
                InstallOutcome::Installed(path) => writeln!(out, "Installed {}", path.display())?,
                InstallOutcome::Replaced(path) => writeln!(out, "Replaced {}", path.display())?,
            }
            Ok(0)
        }
    }
}

/// Build the plan and environment from `config` and run the gate once.
pub fn run_gate<W: Write>(
    config: &GateConfig,
    interrupt: Option<Arc<AtomicBool>>,
    out: &mut W,
) -> Result<GateResult, AppError> {
    let mut plan = config.plan()?;
    let environment: ProcessEnvironment = config.environment();

    let mut runner = GateRunner::new().with_timeout(config.timeout);
    if let Some(interrupt) = interrupt {
        runner = runner.with_interrupt(interrupt);
    }

    let stopwatch = Stopwatch::start();
    let result = runner.run(&mut plan, &environment, Some(&config.root));
    let total = stopwatch.elapsed();

    if config.summary {
        reporter::print_summary(out, &result)?;
    }

    if let Some(path) = &config.timing_file {
        let record = RunRecord::from_result(&result, &config.root, total);
        if let Err(error) = timing::append_run(path, &record) {
            warn!(path = %path.display(), %error, "could not append run record");
        }
    }

    Ok(result)
}
