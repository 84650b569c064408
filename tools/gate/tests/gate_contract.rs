#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

fn gate_binary() -> &'static str {
    env!("CARGO_BIN_EXE_gate")
}

const FAKE_CARGO: &str = r#"#!/bin/sh
echo "$*" >> "$GATE_FAKE_LOG"
case "$1" in
  --version) echo "cargo 1.82.0 (fake)"; exit 0 ;;
  fmt)
    if [ "${FAKE_FMT_EXIT:-0}" != 0 ]; then echo "Diff in src/main.rs at line 3:"; fi
    exit "${FAKE_FMT_EXIT:-0}" ;;
  clippy)
    prev=""
    for arg in "$@"; do
      if [ "$prev" = "-A" ] && [ "$arg" = "$FAKE_LINT_VIOLATION" ]; then exit 0; fi
      prev="$arg"
    done
    if [ -n "$FAKE_LINT_VIOLATION" ]; then echo "error: lint $FAKE_LINT_VIOLATION" >&2; exit 101; fi
    exit 0 ;;
  test) exit "${FAKE_TEST_EXIT:-0}" ;;
esac
exit 0
"#;

struct Fixture {
    repo: TempDir,
    bin: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            repo: tempdir().unwrap(),
            bin: tempdir().unwrap(),
        };
        write_script(fixture.bin.path(), "cargo", FAKE_CARGO);
        fixture
    }

    fn log_path(&self) -> PathBuf {
        self.repo.path().join("invocations.log")
    }

    fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn run(&self, args: &[&str], env: &[(&str, &str)]) -> (String, String, i32) {
        let mut cmd = Command::new(gate_binary());
        cmd.args(args)
            .arg("--root")
            .arg(self.repo.path())
            .current_dir(self.repo.path())
            .env(
                "PATH",
                format!(
                    "{}:{}",
                    self.bin.path().display(),
                    std::env::var("PATH").unwrap_or_default()
                ),
            )
            .env("GATE_FAKE_LOG", self.log_path())
            .env_remove("GATE_LOG");
        for key in [
            "GATE_CONFIG",
            "GATE_ALLOW_DEAD_CODE",
            "GATE_FORBID_UNWRAP",
            "GATE_TIMEOUT_SECS",
            "GATE_SUMMARY",
            "GATE_TIMING_FILE",
        ] {
            cmd.env_remove(key);
        }
        for (k, v) in env {
            cmd.env(k, v);
        }
        let output = cmd.output().expect("failed to run gate");
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(1),
        )
    }
}

fn write_script(dir: &Path, name: &str, content: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

fn version_script(version: &str) -> String {
    format!("#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo \"{version}\"; fi\n")
}

#[test]
fn clean_tree_passes_all_three_checks() {
    let fixture = Fixture::new();
    let (_stdout, _stderr, code) = fixture.run(&[], &[]);

    assert_eq!(code, 0);
    assert_eq!(
        fixture.invocations(),
        vec!["fmt --all -- --check", "clippy --all-targets -- -D warnings", "test"]
    );
}

#[test]
fn format_violation_stops_before_lint_and_test() {
    let fixture = Fixture::new();
    let (stdout, stderr, code) = fixture.run(&[], &[("FAKE_FMT_EXIT", "1")]);

    assert_eq!(code, 1);
    assert_eq!(fixture.invocations(), vec!["fmt --all -- --check"]);
    assert!(stdout.contains("Diff in src/main.rs at line 3:"));
    assert!(stderr.is_empty(), "gate adds no decoration: {stderr}");
}

#[test]
fn failing_test_propagates_its_exit_code() {
    let fixture = Fixture::new();
    let (_stdout, _stderr, code) = fixture.run(&[], &[("FAKE_TEST_EXIT", "101")]);

    assert_eq!(code, 101);
    assert_eq!(fixture.invocations().len(), 3);
}

#[test]
fn unusual_exit_codes_pass_through_verbatim() {
    let fixture = Fixture::new();
    let (_stdout, _stderr, code) = fixture.run(&["run"], &[("FAKE_FMT_EXIT", "3")]);
    assert_eq!(code, 3);
}

#[test]
fn suppressed_rule_lets_lint_pass() {
    let fixture = Fixture::new();
    let violation = [("FAKE_LINT_VIOLATION", "dead_code")];

    let (_stdout, stderr, code) = fixture.run(&[], &violation);
    assert_eq!(code, 101);
    assert!(stderr.contains("error: lint dead_code"));
    assert_eq!(fixture.invocations().len(), 2, "test step must not run");

    fs::remove_file(fixture.log_path()).unwrap();
    let (_stdout, _stderr, code) = fixture.run(&["--allow-dead-code"], &violation);
    assert_eq!(code, 0);
    assert_eq!(
        fixture.invocations()[1],
        "clippy --all-targets -- -D warnings -A dead_code"
    );
}

#[test]
fn suppression_can_come_from_gate_toml() {
    let fixture = Fixture::new();
    fs::write(
        fixture.repo.path().join("gate.toml"),
        "[lint]\nallow_dead_code = true\nforbid_unwrap = true\n",
    )
    .unwrap();
    let (_stdout, _stderr, code) = fixture.run(&[], &[("FAKE_LINT_VIOLATION", "dead_code")]);

    assert_eq!(code, 0);
    assert_eq!(
        fixture.invocations()[1],
        "clippy --all-targets -- -D warnings -A dead_code -D clippy::unwrap_used"
    );
}

#[test]
fn summary_is_opt_in() {
    let fixture = Fixture::new();
    let (stdout, _stderr, _code) = fixture.run(&[], &[]);
    assert!(!stdout.contains("PASS"));

    let (stdout, _stderr, code) = fixture.run(&["--summary"], &[("FAKE_TEST_EXIT", "2")]);
    assert_eq!(code, 2);
    assert!(stdout.contains("FAIL"));
    assert!(stdout.contains("exit 2"));
}

#[test]
fn timing_file_records_each_run() {
    let fixture = Fixture::new();
    let log = ("GATE_TIMING_FILE", ".cache/gate-runs.jsonl");
    let (_stdout, _stderr, _code) = fixture.run(&[], &[log]);
    let (_stdout, _stderr, _code) = fixture.run(&[], &[log, ("FAKE_FMT_EXIT", "1")]);

    let content = fs::read_to_string(fixture.repo.path().join(".cache/gate-runs.jsonl")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"overall\":\"passed\""));
    assert!(lines[1].contains("\"overall\":\"failed\""));
    assert!(lines[1].contains("\"outcome\":\"skipped\""));
}

#[test]
fn list_prints_the_plan_without_running_it() {
    let fixture = Fixture::new();
    let (stdout, _stderr, code) = fixture.run(&["list", "--forbid-unwrap"], &[]);

    assert_eq!(code, 0);
    assert!(stdout.contains("cargo fmt --all -- --check"));
    assert!(stdout.contains("-D clippy::unwrap_used"));
    assert!(fixture.invocations().is_empty());
}

#[test]
fn doctor_passes_when_toolchain_resolves() {
    let fixture = Fixture::new();
    write_script(fixture.bin.path(), "rustfmt", &version_script("rustfmt 1.7.1-stable"));
    write_script(fixture.bin.path(), "cargo-clippy", &version_script("clippy 0.1.82"));

    let (stdout, _stderr, code) = fixture.run(&["doctor"], &[]);

    assert_eq!(code, 0);
    assert!(stdout.contains("v1.82.0"));
    assert!(stdout.contains("v1.7.1"));
    assert!(stdout.contains("All tools resolvable."));
}

#[test]
fn doctor_fails_for_missing_manifest_tool() {
    let fixture = Fixture::new();
    write_script(fixture.bin.path(), "rustfmt", &version_script("rustfmt 1.7.1"));
    write_script(fixture.bin.path(), "cargo-clippy", &version_script("clippy 0.1.82"));
    fs::write(
        fixture.repo.path().join("gate.toml"),
        "[environment]\ntools = [\"gate-missing-debugger\"]\n",
    )
    .unwrap();

    let (stdout, _stderr, code) = fixture.run(&["doctor"], &[]);

    assert_eq!(code, 1);
    assert!(stdout.contains("FAIL"));
    assert!(stdout.contains("gate-missing-debugger"));
}

#[test]
fn invalid_configuration_exits_with_two() {
    let fixture = Fixture::new();
    let (_stdout, stderr, code) = fixture.run(&["--suppress", "Not A Rule"], &[]);

    assert_eq!(code, 2);
    assert!(stderr.contains("invalid lint rule id"));
    assert!(fixture.invocations().is_empty());
}

#[test]
fn install_hook_writes_pre_push() {
    let fixture = Fixture::new();
    let status = Command::new("git")
        .args(["init", "-q"])
        .current_dir(fixture.repo.path())
        .status()
        .expect("failed to run git init");
    assert!(status.success());

    let (stdout, _stderr, code) = fixture.run(&["install-hook"], &[]);

    assert_eq!(code, 0);
    assert!(stdout.contains("Installed"));
    let hook = fs::read_to_string(fixture.repo.path().join(".git/hooks/pre-push")).unwrap();
    assert!(hook.contains(" run\n"));
}
