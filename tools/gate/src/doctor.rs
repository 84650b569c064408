use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use owo_colors::OwoColorize;
use regex::Regex;

use crate::env::{ExecutionEnvironment, ProcessEnvironment};

const LABEL_WIDTH: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub installed: bool,
    pub version: Option<String>,
}

impl ProbeResult {
    pub fn missing() -> Self {
        Self {
            installed: false,
            version: None,
        }
    }
}

/// Report whether every tool resolves. Returns the process exit code.
pub fn run<W, P>(writer: &mut W, tools: &[String], probe_tool: P) -> io::Result<i32>
where
    W: Write,
    P: Fn(&str) -> ProbeResult,
{
    let mut missing: Vec<&str> = Vec::new();

    writeln!(writer)?;
    for tool in tools {
        let probe = probe_tool(tool);
        if !probe.installed {
            missing.push(tool);
            print_line(writer, false, tool, "not found")?;
            continue;
        }
        let detail = match probe.version {
            Some(version) => format!("v{version}"),
            None => "installed".to_string(),
        };
        print_line(writer, true, tool, &detail)?;
    }
    writeln!(writer)?;

    if missing.is_empty() {
        writeln!(
            writer,
            "  {}  {}",
            "PASS".green().bold(),
            "All tools resolvable.".dimmed()
        )?;
        writeln!(writer)?;
        return Ok(0);
    }

    writeln!(
        writer,
        "  {}  {}",
        "FAIL".red().bold(),
        format!("{} tool(s) missing from the environment:", missing.len()).dimmed()
    )?;
    for tool in &missing {
        writeln!(writer, "    {tool}")?;
    }
    writeln!(
        writer,
        "    {}",
        "Provision them in the development shell or list their directories under [environment] path."
            .dimmed()
    )?;
    writeln!(writer)?;

    Ok(1)
}

/// Resolve `tool` on the environment's search path and ask it for a version.
pub fn probe_tool(environment: &ProcessEnvironment, tool: &str) -> ProbeResult {
    let Some(path) = environment.resolve(tool) else {
        return ProbeResult::missing();
    };

    let mut command = Command::new(&path);
    command
        .arg("--version")
        .current_dir(environment.working_dir())
        .stdin(Stdio::null());
    if let Some(search_path) = environment.search_path() {
        command.env("PATH", search_path);
    }
    let version = command.output().ok().and_then(|output| {
        let text = String::from_utf8_lossy(&output.stdout).to_string()
            + &String::from_utf8_lossy(&output.stderr);
        parse_version(&text)
    });

    ProbeResult {
        installed: true,
        version,
    }
}

pub fn parse_version(output: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"\d+\.\d+\.\d+").ok())
        .as_ref()?;
    re.find(output).map(|m| m.as_str().to_string())
}

fn print_line(writer: &mut dyn Write, ok: bool, name: &str, detail: &str) -> io::Result<()> {
    if ok {
        writeln!(
            writer,
            "  {} {:<width$} {}",
            "✓".green(),
            name,
            detail.dimmed(),
            width = LABEL_WIDTH
        )
    } else {
        writeln!(
            writer,
            "  {} {:<width$} {}",
            "✗".red(),
            name,
            detail.dimmed(),
            width = LABEL_WIDTH
        )
    }
}
