use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "GATE_LOG";

static INIT: Once = Once::new();

/// Install the stderr subscriber. Filter comes from `GATE_LOG`
/// (e.g. `GATE_LOG=gate=debug`) and defaults to `warn`, so a normal run
/// prints nothing beyond the tools' own output.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .with(filter)
            .try_init();
    });
}
