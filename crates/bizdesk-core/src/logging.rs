//! Tracing subscriber setup.
//!
//! Logs go to a daily-rolled file under `<base>/logs/` so command output on
//! stdout stays machine-readable. `BIZDESK_LOG` takes precedence over the
//! configured level and accepts full `EnvFilter` directives.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "BIZDESK_LOG";

const LOG_FILE_PREFIX: &str = "bizdesk.log";

/// Installs the global subscriber writing to `dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the background writer.
///
/// # Errors
/// Returns an error if the directory cannot be created, the filter is
/// invalid, or a global subscriber is already installed.
pub fn init(config: &LogConfig, dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let filter = build_filter(&config.level)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}

fn build_filter(default_level: &str) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid {LOG_ENV} directives '{directives}'"));
    }
    EnvFilter::try_new(default_level)
        .with_context(|| format!("Invalid log level '{default_level}' in config"))
}
