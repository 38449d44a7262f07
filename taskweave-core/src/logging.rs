//! Tracing setup: compact stdout plus a daily rotated log file
//!
//! # Example
//!
//! ```no_run
//! use taskweave_core::logging::init_logging;
//!
//! init_logging("logs", "taskweave.log", "info").unwrap();
//! ```

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber with a plain text log file.
///
/// - `directory`: Directory to store logs
/// - `filename_prefix`: Prefix for log files (e.g. "taskweave.log")
/// - `level`: Default filter when `RUST_LOG` is unset (e.g. "info", "debug")
pub fn init_logging(directory: &str, filename_prefix: &str, level: &str) -> Result<()> {
    install(directory, filename_prefix, level, false)
}

/// Install the global subscriber from the `logging` settings section
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    install(&config.directory, &config.filename_prefix, &config.level, config.json)
}

/// Stdout-only subscriber for tests and short demos. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

fn install(directory: &str, filename_prefix: &str, level: &str, json: bool) -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(filename_prefix)
        .build(directory)
        .map_err(|e| Error::Internal(format!("Failed to create log appender: {}", e)))?;

    let (text_file, json_file) = if json {
        (None, Some(fmt::layer().json().with_writer(file_appender)))
    } else {
        (Some(fmt::layer().with_writer(file_appender).with_ansi(false)), None)
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(text_file)
        .with(json_file)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to init tracing: {}", e)))
}
