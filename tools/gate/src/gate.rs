//! The sequential, fail-fast gate runner.
//!
//! Checks run one at a time in plan order. The first check that does not exit
//! zero fails the gate; every check after it is marked skipped and never
//! spawned.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::check::{CheckPlan, Outcome};
use crate::env::{CommandCall, ExecutionEnvironment, RunControls};
use crate::error::GateError;
use crate::timing::Stopwatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Overall {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub executed: Vec<StepRecord>,
    pub overall: Overall,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.overall == Overall::Passed
    }

    /// The step that stopped the gate, if any.
    pub fn failure(&self) -> Option<GateError> {
        self.executed.iter().find_map(|step| match step.outcome {
            Outcome::Failed(exit_code) => Some(GateError::CheckFailed {
                name: step.name.clone(),
                exit_code,
            }),
            _ => None,
        })
    }

    /// 0 when the gate passed, otherwise the failing check's exit code.
    pub fn exit_code(&self) -> i32 {
        self.failure().map_or(0, |failure| failure.exit_code())
    }

    /// Name/outcome pairs without timings, for comparing runs.
    pub fn outcomes(&self) -> Vec<(&str, Outcome)> {
        self.executed
            .iter()
            .map(|step| (step.name.as_str(), step.outcome))
            .collect()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.executed.iter().map(|step| step.elapsed).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GateRunner {
    controls: RunControls,
}

impl GateRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.controls.timeout = timeout;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.controls.interrupt = Some(interrupt);
        self
    }

    /// Run every check in `plan` against `environment`, stopping at the first failure.
    pub fn run<E>(
        &self,
        plan: &mut CheckPlan,
        environment: &E,
        working_dir: Option<&Path>,
    ) -> GateResult
    where
        E: ExecutionEnvironment + ?Sized,
    {
        for check in plan.checks_mut() {
            check.outcome = Outcome::Pending;
        }

        let mut executed = Vec::with_capacity(plan.len());
        let mut failed = false;

        for check in plan.checks_mut() {
            if failed {
                check.outcome = Outcome::Skipped;
                executed.push(StepRecord {
                    name: check.name.clone(),
                    outcome: Outcome::Skipped,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            debug!(check = %check.name, command = %check.command_line(), "starting");
            let mut call = CommandCall::for_check(check);
            call.current_dir = working_dir.map(Path::to_path_buf);

            let stopwatch = Stopwatch::start();
            let termination = environment.execute(&call, &self.controls);
            let elapsed = stopwatch.elapsed();

            check.outcome = if termination.success() {
                Outcome::Passed
            } else {
                failed = true;
                Outcome::Failed(termination.exit_code())
            };
            info!(
                check = %check.name,
                outcome = %check.outcome,
                ?termination,
                elapsed_ms = elapsed.as_millis() as u64,
                "finished"
            );

            executed.push(StepRecord {
                name: check.name.clone(),
                outcome: check.outcome,
                elapsed,
            });
        }

        GateResult {
            executed,
            overall: if failed { Overall::Failed } else { Overall::Passed },
        }
    }
}
