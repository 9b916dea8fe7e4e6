pub mod calendar;
pub mod config;
#[cfg(feature = "desktop")]
mod desktop;
pub mod entries;
pub mod errors;
pub mod models;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod tracker;

pub use crate::config::AppConfig;
#[cfg(feature = "desktop")]
pub use crate::desktop::run;
pub use crate::errors::{AppError, AppResult};
pub use crate::tracker::TimeTracker;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs the global JSON subscriber writing to a daily rolling file in `log_dir`.
pub fn init_tracing(log_dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "time-tracker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}

pub fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
