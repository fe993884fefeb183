//! Tracing subscriber setup for the binary.

use crate::error::{CommandError, IoError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the file writer flushing until dropped.
#[derive(Debug, Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Default filter; `RUST_LOG` takes precedence.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "tailwatch=debug,info" } else { "tailwatch=warn" }
}

/// Installs a compact stderr layer and, with `log_file`, a plain-text
/// append-only file layer at the same level.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<LogGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
    };

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(filter());

    let (file, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|e| CommandError::ExecutionFailed(format!("failed to initialise logging: {e}")))?;

    Ok(LogGuard { _file: guard })
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path.file_name().ok_or_else(|| {
        CommandError::InvalidArgument(format!("log file has no name: {}", path.display()))
    })?;
    std::fs::create_dir_all(dir).map_err(|e| IoError::DirectoryFailed {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name)))
}
