pub mod app;
pub mod check;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod env;
pub mod error;
pub mod gate;
pub mod hook;
pub mod logging;
pub mod reporter;
pub mod timing;

pub use check::{Check, CheckPlan, LintPolicy, LintRuleId, Outcome};
pub use env::{CommandCall, ExecutionEnvironment, ProcessEnvironment, RunControls, Termination};
pub use error::{AppError, ConfigError, GateError};
pub use gate::{GateResult, GateRunner, Overall, StepRecord};
