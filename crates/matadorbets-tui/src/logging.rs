use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "matadorbets.log";
const DEFAULT_FILTER: &str = "matadorbets=info,matadorbets_core=info";

/// Install the file logger. The terminal owns stderr, so everything goes to
/// `<log_dir>/matadorbets.log`. Keep the returned guard alive until exit or
/// buffered lines are lost.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);

    // Only readable and writable by the current user
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }

    let log_path = log_dir.join(LOG_FILE_NAME);
    let log_file = log_file_opts
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let (writer, guard) = non_blocking(log_file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();

    Ok(guard)
}
