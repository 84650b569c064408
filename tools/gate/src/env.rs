use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::check::Check;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported when a tool's own code is unavailable.
pub const SENTINEL_EXIT: i32 = 1;

#[cfg(target_os = "macos")]
pub const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(not(target_os = "macos"))]
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandCall {
    pub fn for_check(check: &Check) -> Self {
        Self {
            program: check.command.clone(),
            args: check.args.clone(),
            current_dir: None,
        }
    }
}

/// How an executed command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    TimedOut,
    Interrupted,
    SpawnFailed(io::ErrorKind),
}

impl Termination {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Termination::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Termination::Signaled(signal);
            }
        }
        Termination::Exited(SENTINEL_EXIT)
    }

    /// Shell-convention exit code for this termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::Exited(code) => *code,
            Termination::Signaled(signal) => 128 + signal,
            Termination::TimedOut => 124,
            Termination::Interrupted => 130,
            Termination::SpawnFailed(io::ErrorKind::NotFound) => 127,
            Termination::SpawnFailed(io::ErrorKind::PermissionDenied) => 126,
            Termination::SpawnFailed(_) => SENTINEL_EXIT,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Termination::Exited(0))
    }
}

/// Optional bounds on a single execution. Both default to absent, which
/// blocks until the tool exits.
#[derive(Debug, Clone, Default)]
pub struct RunControls {
    pub timeout: Option<Duration>,
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl RunControls {
    pub fn is_unbounded(&self) -> bool {
        self.timeout.is_none() && self.interrupt.is_none()
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// The provisioned toolchain the gate runs against.
pub trait ExecutionEnvironment {
    /// Run `call` to completion with stdout/stderr going straight to the terminal.
    fn execute(&self, call: &CommandCall, controls: &RunControls) -> Termination;

    /// Locate `program` on this environment's search path.
    fn resolve(&self, program: &str) -> Option<PathBuf>;
}

/// Real child processes, with extra search and library paths layered over
/// whatever the parent process inherited.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    working_dir: PathBuf,
    path_prepend: Vec<PathBuf>,
    library_paths: Vec<PathBuf>,
    vars: BTreeMap<String, String>,
    base_path: Option<OsString>,
    base_library_path: Option<OsString>,
}

impl ProcessEnvironment {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    /// Start from the current process's `PATH` and library path.
    pub fn inherit(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_path: env::var_os("PATH"),
            base_library_path: env::var_os(LIBRARY_PATH_VAR),
            ..Self::new(working_dir)
        }
    }

    pub fn with_base_path(mut self, path: Option<OsString>) -> Self {
        self.base_path = path;
        self
    }

    pub fn with_path_prepend(mut self, dirs: Vec<PathBuf>) -> Self {
        self.path_prepend = dirs;
        self
    }

    pub fn with_library_paths(mut self, dirs: Vec<PathBuf>) -> Self {
        self.library_paths = dirs;
        self
    }

    pub fn with_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn search_path(&self) -> Option<OsString> {
        join_layered(&self.path_prepend, self.base_path.as_deref())
    }

    pub fn library_path(&self) -> Option<OsString> {
        join_layered(&self.library_paths, self.base_library_path.as_deref())
    }

    fn command(&self, call: &CommandCall) -> Command {
        let program = self
            .resolve(&call.program)
            .map(PathBuf::into_os_string)
            .unwrap_or_else(|| OsString::from(&call.program));
        let mut command = Command::new(program);
        command
            .args(&call.args)
            .current_dir(call.current_dir.as_deref().unwrap_or(self.working_dir.as_path()))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }
        if let Some(path) = self.library_path() {
            command.env(LIBRARY_PATH_VAR, path);
        }
        for (key, value) in &self.vars {
            command.env(key, value);
        }
        command
    }
}

impl ExecutionEnvironment for ProcessEnvironment {
    fn execute(&self, call: &CommandCall, controls: &RunControls) -> Termination {
        if controls.interrupted() {
            return Termination::Interrupted;
        }

        let mut child = match self.command(call).spawn() {
            Ok(child) => child,
            Err(error) => {
                debug!(program = %call.program, %error, "spawn failed");
                return Termination::SpawnFailed(error.kind());
            }
        };

        if controls.is_unbounded() {
            return match child.wait() {
                Ok(status) => Termination::from_status(status),
                Err(_) => Termination::Exited(SENTINEL_EXIT),
            };
        }

        wait_bounded(&mut child, controls)
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        if program.contains(std::path::MAIN_SEPARATOR) {
            let candidate = self.working_dir.join(program);
            return is_executable(&candidate).then_some(candidate);
        }
        let search_path = self.search_path()?;
        env::split_paths(&search_path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

fn wait_bounded(child: &mut Child, controls: &RunControls) -> Termination {
    let started = Instant::now();
    loop {
        if controls.interrupted() {
            stop(child);
            return Termination::Interrupted;
        }
        if controls
            .timeout
            .is_some_and(|timeout| started.elapsed() >= timeout)
        {
            stop(child);
            return Termination::TimedOut;
        }

        match child.try_wait() {
            Ok(Some(status)) => return Termination::from_status(status),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => {
                stop(child);
                return Termination::Exited(SENTINEL_EXIT);
            }
        }
    }
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn join_layered(front: &[PathBuf], base: Option<&OsStr>) -> Option<OsString> {
    if front.is_empty() {
        return base.map(OsStr::to_os_string);
    }
    let mut dirs: Vec<PathBuf> = front.to_vec();
    if let Some(base) = base {
        dirs.extend(env::split_paths(base));
    }
    env::join_paths(dirs).ok()
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
