//! Logging setup
//!
//! `RUST_LOG` overrides the level given on the command line. Output goes to
//! stderr in both modes.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::error::{SnifferError, SnifferResult};

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Interactive run: timestamps, colors when stderr is a terminal
    Foreground,
    /// Background service: plain lines, the service manager adds timestamps
    Daemon,
}

impl LoggingMode {
    /// Pick the mode for the `-d` flag
    pub fn from_daemon_flag(daemon: bool) -> Self {
        if daemon {
            LoggingMode::Daemon
        } else {
            LoggingMode::Foreground
        }
    }
}

/// Build the level filter from `RUST_LOG`, falling back to `default_level`
pub fn build_filter(default_level: &str) -> SnifferResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| {
            SnifferError::configuration(format!("invalid log level `{}`: {}", default_level, e))
        }),
    }
}

/// Install the global subscriber
pub fn init_logging(mode: LoggingMode, default_level: &str) -> SnifferResult<()> {
    let filter = build_filter(default_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match mode {
        LoggingMode::Foreground => builder
            .with_ansi(std::io::stderr().is_terminal())
            .try_init(),
        LoggingMode::Daemon => builder.with_ansi(false).without_time().try_init(),
    };

    result.map_err(|e| SnifferError::configuration(format!("logging init failed: {}", e)))
}
