//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Logs go to stderr so command output on stdout stays clean.
//! `RUST_LOG` takes precedence over the verbosity flag.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map the number of `-v` flags to a level: warn, info, debug, trace.
pub fn level_from_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!("warn,lexis={level}"))
    })
}

/// Install the global subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_logging(verbosity: u8) {
    let filter = build_env_filter(level_from_verbosity(verbosity));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
