//! Logging setup.
//!
//! Console output always, plus a daily rolling file when a log directory is
//! configured. Timestamps use the local timezone.

use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default log filter directive, overridden by `RUST_LOG`.
pub const DEFAULT_LOG_FILTER: &str = "live_notify=info,reqwest=warn";

/// File name prefix for the rolling log file.
const LOG_FILE_PREFIX: &str = "live-notify.log";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize the global subscriber.
///
/// # Arguments
/// * `log_dir` - Directory for the rolling log file; `None` logs to the console only
///
/// # Returns
/// The file writer's guard when file logging is enabled; keep it alive for the
/// app lifetime so buffered lines are flushed.
pub fn init_logging(log_dir: Option<&Path>) -> crate::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer)) // Console output with local time
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}
