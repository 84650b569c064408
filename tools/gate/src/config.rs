use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::check::{standard_plan, standard_tools, Check, CheckPlan, LintPolicy, LintRuleId};
use crate::env::ProcessEnvironment;
use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "gate.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    lint: LintSection,
    #[serde(default)]
    run: RunSection,
    #[serde(default)]
    environment: EnvironmentSection,
    #[serde(default, rename = "check")]
    checks: Vec<CheckEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LintSection {
    #[serde(default)]
    allow_dead_code: bool,
    #[serde(default)]
    forbid_unwrap: bool,
    #[serde(default)]
    suppress: Vec<String>,
    #[serde(default)]
    deny: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunSection {
    timeout_secs: Option<u64>,
    #[serde(default)]
    summary: bool,
    timing_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentSection {
    #[serde(default)]
    path: Vec<PathBuf>,
    #[serde(default)]
    library_path: Vec<PathBuf>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    vars: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckEntry {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub root: PathBuf,
    pub policy: LintPolicy,
    pub timeout: Option<Duration>,
    pub summary: bool,
    pub timing_file: Option<PathBuf>,
    pub path: Vec<PathBuf>,
    pub library_path: Vec<PathBuf>,
    pub vars: BTreeMap<String, String>,
    pub tools: Vec<String>,
    /// Replaces the standard plan when non-empty.
    pub checks: Vec<Check>,
}

/// Walk up from `start` to the first directory holding `gate.toml` or `.git`.
pub fn discover_root(start: &Path) -> PathBuf {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(CONFIG_FILE).is_file() || dir.join(".git").exists() {
            return dir;
        }
        if !dir.pop() {
            return start.to_path_buf();
        }
    }
}

impl GateConfig {
    pub fn defaults(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Load `explicit`, or `<root>/gate.toml` when present, or defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => root.join(path),
            None => {
                let path = root.join(CONFIG_FILE);
                if !path.is_file() {
                    return Ok(Self::defaults(root));
                }
                path
            }
        };
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(root, &text, &path)
    }

    pub fn from_toml(root: &Path, text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let policy = LintPolicy {
            allow_dead_code: file.lint.allow_dead_code,
            forbid_unwrap: file.lint.forbid_unwrap,
            suppressions: parse_rules(&file.lint.suppress)?.into_iter().collect(),
            denials: parse_rules(&file.lint.deny)?.into_iter().collect(),
        };

        Ok(Self {
            root: root.to_path_buf(),
            policy,
            timeout: file.run.timeout_secs.and_then(timeout_from_secs),
            summary: file.run.summary,
            timing_file: file.run.timing_file.map(|path| root.join(path)),
            path: file.environment.path.iter().map(|p| root.join(p)).collect(),
            library_path: file
                .environment
                .library_path
                .iter()
                .map(|p| root.join(p))
                .collect(),
            vars: file.environment.vars,
            tools: file.environment.tools,
            checks: file
                .checks
                .into_iter()
                .map(|entry| Check::new(entry.name, entry.command, entry.args))
                .collect(),
        })
    }

    /// Layer `GATE_*` variables from `lookup` over the file settings.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("GATE_ALLOW_DEAD_CODE") {
            self.policy.allow_dead_code = parse_bool("GATE_ALLOW_DEAD_CODE", &value)?;
        }
        if let Some(value) = lookup("GATE_FORBID_UNWRAP") {
            self.policy.forbid_unwrap = parse_bool("GATE_FORBID_UNWRAP", &value)?;
        }
        if let Some(value) = lookup("GATE_SUMMARY") {
            self.summary = parse_bool("GATE_SUMMARY", &value)?;
        }
        if let Some(value) = lookup("GATE_TIMEOUT_SECS") {
            self.timeout = parse_timeout("GATE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("GATE_TIMING_FILE").filter(|v| !v.is_empty()) {
            self.timing_file = Some(self.root.join(value));
        }
        Ok(())
    }

    pub fn plan(&self) -> Result<CheckPlan, ConfigError> {
        if self.checks.is_empty() {
            Ok(standard_plan(&self.policy))
        } else {
            CheckPlan::new(self.checks.clone())
        }
    }

    pub fn environment(&self) -> ProcessEnvironment {
        ProcessEnvironment::inherit(&self.root)
            .with_path_prepend(self.path.clone())
            .with_library_paths(self.library_path.clone())
            .with_vars(self.vars.clone())
    }

    /// Everything `gate doctor` probes: plan commands, standard tools, manifest tools.
    pub fn manifest_tools(&self, plan: &CheckPlan) -> Vec<String> {
        let mut tools: Vec<String> = plan.commands().into_iter().map(String::from).collect();
        let standard = if self.checks.is_empty() {
            standard_tools()
        } else {
            Vec::new()
        };
        for tool in standard.into_iter().chain(self.tools.iter().cloned()) {
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }
        tools
    }
}

pub fn parse_rules(raw: &[String]) -> Result<Vec<LintRuleId>, ConfigError> {
    raw.iter().map(|rule| rule.parse()).collect()
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// `0` means no timeout.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn parse_timeout(key: &str, value: &str) -> Result<Option<Duration>, ConfigError> {
    let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })?;
    Ok(timeout_from_secs(secs))
}
