use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;

pub const FORMAT: &str = "format";
pub const LINT: &str = "lint";
pub const TEST: &str = "test";

const DEAD_CODE: &str = "dead_code";
const UNWRAP_USED: &str = "clippy::unwrap_used";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Passed,
    Failed(i32),
    Skipped,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Passed => "passed",
            Outcome::Failed(_) => "failed",
            Outcome::Skipped => "skipped",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Outcome::Passed => Some(0),
            Outcome::Failed(code) => Some(*code),
            Outcome::Pending | Outcome::Skipped => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failed(code) => write!(f, "failed({code})"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub outcome: Outcome,
}

impl Check {
    pub fn new<I, S>(name: impl Into<String>, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            outcome: Outcome::Pending,
        }
    }

    /// The full command line, as a shell user would type it.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len());
        parts.push(self.command.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// A non-empty, uniquely named, ordered list of checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPlan {
    checks: Vec<Check>,
}

impl CheckPlan {
    pub fn new(checks: Vec<Check>) -> Result<Self, ConfigError> {
        if checks.is_empty() {
            return Err(ConfigError::EmptyPlan);
        }
        let mut seen = HashSet::new();
        for check in &checks {
            if check.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(check.name.clone()));
            }
            if !seen.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateCheck(check.name.clone()));
            }
        }
        Ok(Self { checks })
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn checks_mut(&mut self) -> &mut [Check] {
        &mut self.checks
    }

    pub fn get(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Distinct commands in plan order.
    pub fn commands(&self) -> Vec<&str> {
        let mut commands: Vec<&str> = Vec::new();
        for check in &self.checks {
            if !commands.contains(&check.command.as_str()) {
                commands.push(&check.command);
            }
        }
        commands
    }
}

fn rule_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([a-z][a-z0-9_]*::)?[a-z][a-z0-9_]*$").ok())
        .as_ref()
}

/// A rustc or tool-scoped lint name such as `dead_code` or `clippy::unwrap_used`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LintRuleId(String);

impl LintRuleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LintRuleId {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace('-', "_");
        if rule_pattern().is_some_and(|re| re.is_match(&normalized)) {
            Ok(Self(normalized))
        } else {
            Err(ConfigError::InvalidRule(raw.to_string()))
        }
    }
}

impl fmt::Display for LintRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintPolicy {
    pub allow_dead_code: bool,
    pub forbid_unwrap: bool,
    pub suppressions: BTreeSet<LintRuleId>,
    pub denials: BTreeSet<LintRuleId>,
}

impl LintPolicy {
    pub fn effective_suppressions(&self) -> BTreeSet<LintRuleId> {
        let mut rules = self.suppressions.clone();
        if self.allow_dead_code {
            rules.insert(LintRuleId(DEAD_CODE.to_string()));
        }
        rules
    }

    pub fn effective_denials(&self) -> BTreeSet<LintRuleId> {
        let mut rules = self.denials.clone();
        if self.forbid_unwrap {
            rules.insert(LintRuleId(UNWRAP_USED.to_string()));
        }
        rules
    }

    /// Arguments passed to the linter after `--`. Warnings are always errors.
    pub fn lint_flags(&self) -> Vec<String> {
        let mut flags = vec!["-D".to_string(), "warnings".to_string()];
        for rule in self.effective_suppressions() {
            flags.push("-A".to_string());
            flags.push(rule.to_string());
        }
        for rule in self.effective_denials() {
            flags.push("-D".to_string());
            flags.push(rule.to_string());
        }
        flags
    }
}

pub fn format_check() -> Check {
    Check::new(FORMAT, "cargo", ["fmt", "--all", "--", "--check"])
}

pub fn lint_check(policy: &LintPolicy) -> Check {
    let mut args = vec!["clippy".to_string(), "--all-targets".to_string(), "--".to_string()];
    args.extend(policy.lint_flags());
    Check::new(LINT, "cargo", args)
}

pub fn test_check() -> Check {
    Check::new(TEST, "cargo", ["test"])
}

/// format, then lint, then test: cheap failures surface before expensive ones.
pub fn standard_plan(policy: &LintPolicy) -> CheckPlan {
    CheckPlan {
        checks: vec![format_check(), lint_check(policy), test_check()],
    }
}

/// Tools the standard plan needs beyond `cargo` itself.
pub fn standard_tools() -> Vec<String> {
    ["cargo", "rustfmt", "cargo-clippy"]
        .iter()
        .map(ToString::to_string)
        .collect()
}
