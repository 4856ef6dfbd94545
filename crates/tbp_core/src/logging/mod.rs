//! Logging infrastructure for the pipeline.
//!
//! This module provides:
//! - Per-run loggers with file + callback dual output and stage banners
//! - Tail buffer of captured command output for failure diagnosis
//! - Process-wide `tracing` subscriber setup, optionally teeing to a
//!   daily log file
//!
//! # Example
//!
//! ```no_run
//! use tbp_core::logging::{LogConfig, RunLogger, StageStatus};
//!
//! let logger = RunLogger::new("run-20250131-140211", ".logs", LogConfig::default(), None).unwrap();
//! logger.stage(1, "Resolve work items", StageStatus::Started);
//! logger.command("squeue --job 4242");
//! logger.stage(1, "Resolve work items", StageStatus::Completed);
//! ```

mod run_logger;
mod types;

use std::path::Path;

pub use run_logger::RunLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix, StageStatus};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// Respects `RUST_LOG`, falling back to `default_level`, and writes to
/// stderr. Should be called once at startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Initialize tracing to stderr plus a daily-rolling file in `logs_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes the file writer.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!(
            "Warning: cannot create logs folder {}: {}",
            logs_dir.display(),
            e
        );
        init_tracing(default_level);
        return None;
    }

    let appender = tracing_appender::rolling::daily(logs_dir, "tbp.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .try_init();

    Some(guard)
}
