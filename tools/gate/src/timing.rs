use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::gate::{GateResult, Overall};

#[derive(Clone)]
pub struct Stopwatch {
    started_at: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub outcome: &'static str,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
}

/// One line of the run log.
#[derive(Debug, Serialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub root: String,
    pub overall: Overall,
    pub exit_code: i32,
    pub total_ms: u64,
    pub steps: Vec<StepTiming>,
}

impl RunRecord {
    pub fn from_result(result: &GateResult, root: &Path, total: Duration) -> Self {
        Self {
            timestamp: utc_now_rfc3339(),
            root: root.display().to_string(),
            overall: result.overall,
            exit_code: result.exit_code(),
            total_ms: total.as_millis() as u64,
            steps: result
                .executed
                .iter()
                .map(|step| StepTiming {
                    name: step.name.clone(),
                    outcome: step.outcome.label(),
                    exit_code: step.outcome.exit_code(),
                    elapsed_ms: step.elapsed.as_millis() as u64,
                })
                .collect(),
        }
    }
}

pub fn utc_now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Append `record` as a single JSON line, creating parent directories as needed.
pub fn append_run(path: &Path, record: &RunRecord) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record).map_err(io::Error::other)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Outcome;
    use crate::gate::StepRecord;

    fn failed_result() -> GateResult {
        GateResult {
            executed: vec![
                StepRecord {
                    name: "format".to_string(),
                    outcome: Outcome::Passed,
                    elapsed: Duration::from_millis(120),
                },
                StepRecord {
                    name: "lint".to_string(),
                    outcome: Outcome::Failed(101),
                    elapsed: Duration::from_millis(900),
                },
                StepRecord {
                    name: "test".to_string(),
                    outcome: Outcome::Skipped,
                    elapsed: Duration::ZERO,
                },
            ],
            overall: Overall::Failed,
        }
    }

    #[test]
    fn append_run_writes_one_json_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cache/gate-runs.jsonl");
        let record =
            RunRecord::from_result(&failed_result(), dir.path(), Duration::from_secs(1));

        append_run(&path, &record).unwrap();
        append_run(&path, &record).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["overall"], "failed");
        assert_eq!(value["exit_code"], 101);
        assert_eq!(value["total_ms"], 1000);
        assert_eq!(value["steps"][1]["name"], "lint");
        assert_eq!(value["steps"][1]["outcome"], "failed");
        assert_eq!(value["steps"][1]["exit_code"], 101);
        assert_eq!(value["steps"][2]["outcome"], "skipped");
        assert!(value["steps"][2]["exit_code"].is_null());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn stopwatch_elapsed_is_monotonic() {
        let stopwatch = Stopwatch::start();
        let first = stopwatch.elapsed();
        assert!(stopwatch.elapsed() >= first);
    }
}
