//! Log output shared between the console and the log file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Local wall-clock timestamp in `[YYYY-MM-DD HH:MM:SS]` form.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Install the global subscriber.
///
/// Every event goes to the console and is appended to `log_path`. `RUST_LOG`
/// overrides the default level.
pub fn init(log_path: &Path, verbose: bool) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_timer(LocalTimestamp)
        .compact();

    let file_layer = fmt::layer()
        .with_target(false)
        .with_timer(LocalTimestamp)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}
