//! Subscriber setup for the binary. The library only emits `tracing` events.
//!
//! Logs never go to the terminal: a file when configured, `kconduit-debug.log`
//! when debugging without a file, otherwise nowhere.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::{KconduitError, Result};

pub const DEBUG_LOG_FILE: &str = "kconduit-debug.log";

pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| KconduitError::Config(format!("invalid log level '{}': {}", config.level, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer(config)?)
        .with_ansi(false)
        .try_init()
        .map_err(|e| KconduitError::Config(format!("failed to initialize logger: {}", e)))
}

pub fn make_writer(config: &LogConfig) -> Result<BoxMakeWriter> {
    if let Some(path) = &config.file {
        return open_log_file(Path::new(path));
    }
    if config.level.eq_ignore_ascii_case("debug") {
        // Fall back to discarding if the debug file cannot be created
        return Ok(open_log_file(Path::new(DEBUG_LOG_FILE))
            .unwrap_or_else(|_| BoxMakeWriter::new(std::io::sink)));
    }
    Ok(BoxMakeWriter::new(std::io::sink))
}

fn open_log_file(path: &Path) -> Result<BoxMakeWriter> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| KconduitError::Config(format!("failed to open log file {:?}: {}", path, e)))?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}
