use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::check::{CheckPlan, Outcome};
use crate::gate::GateResult;

const NAME_WIDTH: usize = 15;

/// Print the per-step summary after a run. Returns true if the gate passed.
pub fn print_summary<W: Write>(out: &mut W, result: &GateResult) -> io::Result<bool> {
    writeln!(out)?;
    for step in &result.executed {
        let elapsed = format!("{:.1}s", step.elapsed.as_secs_f64());
        match step.outcome {
            Outcome::Passed => writeln!(
                out,
                "  {} {:<width$} {}",
                "\u{2713}".green(),
                step.name,
                elapsed.dimmed(),
                width = NAME_WIDTH
            )?,
            Outcome::Failed(code) => writeln!(
                out,
                "  {} {:<width$} {}",
                "\u{2717}".red(),
                step.name,
                format!("{elapsed}  exit {code}").dimmed(),
                width = NAME_WIDTH
            )?,
            Outcome::Skipped | Outcome::Pending => writeln!(
                out,
                "  {} {:<width$} {}",
                "-".dimmed(),
                step.name,
                "skipped".dimmed(),
                width = NAME_WIDTH
            )?,
        }
    }

    writeln!(out)?;
    let total = format!("({:.1}s)", result.total_elapsed().as_secs_f64());
    if result.passed() {
        writeln!(out, "  {} {}", "PASS".green().bold(), total.dimmed())?;
    } else {
        writeln!(out, "  {} {}", "FAIL".red().bold(), total.dimmed())?;
    }
    writeln!(out)?;

    Ok(result.passed())
}

/// One line per check: name, then the exact command line it runs.
pub fn print_plan<W: Write>(out: &mut W, plan: &CheckPlan) -> io::Result<()> {
    for check in plan.checks() {
        writeln!(out, "{:<width$} {}", check.name, check.command_line(), width = NAME_WIDTH)?;
    }
    Ok(())
}
