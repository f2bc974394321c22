//! Tracing setup for the command-line host

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "citebib=info";
const LOG_FILE_PREFIX: &str = "citebib.log";

/// Default log directory under the platform data dir
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("citebib").join("logs"))
}

/// Install the global subscriber
///
/// Logs go to stderr, and additionally to a daily-rolling file when a log
/// directory is given. Keep the returned guard alive for the lifetime of
/// the process so buffered file output gets flushed.
pub fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Keeps an already-installed subscriber
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
