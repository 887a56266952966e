//! Log setup: stdout plus an append-only file under `<exe_dir>/logs/`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::paths;

const LOG_FILE: &str = "score_reader.log";

pub fn init(verbose: bool) -> Result<()> {
    init_in(&paths::get_logs_dir(), verbose)
}

/// Installs the global subscriber, logging to `logs_dir`. Fails if one is already installed.
pub fn init_in(logs_dir: &Path, verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let log_path = logs_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(level)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("a global log subscriber is already installed")?;
    Ok(())
}
