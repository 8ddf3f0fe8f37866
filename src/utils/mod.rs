//! Utilities: diagnostic logging setup (tracing), formatting primitives,
//! the output sink capability and interactive prompts.
//!
//! Key items:
//!   init_logging / derive_level
//!   format::*  (color, table, fixed)
//!   output::OutputSink / TerminalSink / BufferSink
//!   prompt::Prompter / StdinPrompter / ScriptedPrompter

pub mod format;
pub mod output;
pub mod prompt;

use tracing::Level;

/// Map `--verbose` count and `--quiet` to a diagnostic level.
pub fn derive_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the derived level.
/// Calling twice is harmless (the second install is ignored).
pub fn init_logging(level: Level) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level.as_str().to_ascii_lowercase()))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
