use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::run_context::RunContext;

/// Default directives when `RUST_LOG` is unset; HTTP internals stay quiet
const DEFAULT_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Keeps the background log writer alive; dropping it flushes pending lines
pub struct LogHandle {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

/// Install the global subscriber: stdout plus the per-run log file in `log_dir`.
///
/// File writes go through a non-blocking worker so transfer tasks never wait
/// on disk for a log line. Hold the returned handle for the whole run.
pub fn init_logging(context: &RunContext, log_dir: &Path) -> Result<LogHandle> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_name = context.log_file_name();
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&file_name)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogHandle {
        path: log_dir.join(file_name),
        _guard: guard,
    })
}
