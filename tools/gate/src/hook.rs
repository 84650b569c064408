use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::HookError;

pub const HOOK_NAME: &str = "pre-push";
const MARKER: &str = "# installed by gate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(PathBuf),
    Replaced(PathBuf),
}

pub fn hook_script(binary: &str) -> String {
    format!(
        "#!/bin/sh\n{MARKER}\n# A non-zero exit aborts the push.\nexec {} run\n",
        shell_quote(binary)
    )
}

/// Ask git where hooks live for the repository at `root` (honors `core.hooksPath`).
pub fn hooks_dir(root: &Path) -> Result<PathBuf, HookError> {
    let output = Command::new("git")
        .args(["rev-parse", "--git-path", "hooks"])
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|error| HookError::HooksDir(error.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(HookError::HooksDir(stderr));
    }

    let relative = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(root.join(relative))
}

/// Write the pre-push hook into `hooks_dir`. A hook that gate did not write is
/// only replaced when `force` is set.
pub fn install(hooks_dir: &Path, binary: &str, force: bool) -> Result<InstallOutcome, HookError> {
    let path = hooks_dir.join(HOOK_NAME);
    let existed = path.exists();
    if existed && !force {
        let current = fs::read_to_string(&path).unwrap_or_default();
        if !current.contains(MARKER) {
            return Err(HookError::Foreign(path));
        }
    }

    let write_error = |source| HookError::Write {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(hooks_dir).map_err(write_error)?;
    fs::write(&path, hook_script(binary)).map_err(write_error)?;
    make_executable(&path).map_err(write_error)?;

    Ok(if existed {
        InstallOutcome::Replaced(path)
    } else {
        InstallOutcome::Installed(path)
    })
}

fn shell_quote(raw: &str) -> String {
    let plain = raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+".contains(c));
    if plain && !raw.is_empty() {
        raw.to_string()
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_execs_gate_run() {
        let script = hook_script("/usr/local/bin/gate");
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains(MARKER));
        assert!(script.ends_with("exec /usr/local/bin/gate run\n"));
    }

    #[test]
    fn script_quotes_paths_with_spaces() {
        let script = hook_script("/Users/me/My Tools/gate");
        assert!(script.contains("exec '/Users/me/My Tools/gate' run"));
    }

    #[test]
    fn install_writes_executable_hook() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = dir.path().join("hooks");
        let outcome = install(&hooks, "gate", false).unwrap();

        let path = hooks.join(HOOK_NAME);
        assert_eq!(outcome, InstallOutcome::Installed(path.clone()));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("exec gate run"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn install_replaces_its_own_hook() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "gate", false).unwrap();
        let outcome = install(dir.path(), "/opt/gate", false).unwrap();
        let path = dir.path().join(HOOK_NAME);
        assert_eq!(outcome, InstallOutcome::Replaced(path.clone()));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("exec /opt/gate run"));
    }

    #[test]
    fn install_refuses_foreign_hook_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HOOK_NAME);
        fs::write(&path, "#!/bin/sh\n./scripts/check.sh\n").unwrap();

        let error = install(dir.path(), "gate", false).unwrap_err();
        assert!(matches!(error, HookError::Foreign(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\n./scripts/check.sh\n");

        let outcome = install(dir.path(), "gate", true).unwrap();
        assert!(matches!(outcome, InstallOutcome::Replaced(_)));
    }

    fn git(root: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(root)
            .status()
            .expect("failed to run git");
        assert!(status.success());
    }

    #[test]
    fn hooks_dir_defaults_inside_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q"]);
        assert_eq!(hooks_dir(dir.path()).unwrap(), dir.path().join(".git/hooks"));
    }

    #[test]
    fn hooks_dir_honors_core_hooks_path() {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q"]);
        git(dir.path(), &["config", "core.hooksPath", "hooks"]);
        assert_eq!(hooks_dir(dir.path()).unwrap(), dir.path().join("hooks"));
    }
}
