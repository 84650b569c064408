use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use gate::{app, cli::Cli, logging};

fn main() {
    logging::init();
    let cli = Cli::parse();

    let interrupt = Arc::new(AtomicBool::new(false));
    let interrupt_for_signal = interrupt.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        interrupt_for_signal.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(%error, "unable to register signal handler");
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(error) => {
            eprintln!("gate: cannot read current directory: {error}");
            process::exit(2);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let lookup = |key: &str| std::env::var(key).ok();
    let code = match app::execute(&cli, &cwd, lookup, Some(interrupt), &mut out) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("gate: {error}");
            2
        }
    };

    let _ = out.flush();
    process::exit(code);
}
