use crate::errors::{AppError, AppResult};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

pub const STORE_FILE_NAME: &str = "time-tracker-data.json";
pub const DEFAULT_CALENDAR_TIMEOUT_MS: u64 = 15_000;

const ENV_DATA_DIR: &str = "TIME_TRACKER_DATA_DIR";
const ENV_CALENDAR_HELPER: &str = "TIME_TRACKER_CALENDAR_HELPER";
const ENV_CALENDAR_TIMEOUT_MS: &str = "TIME_TRACKER_CALENDAR_TIMEOUT_MS";

/// Process-level configuration. User-facing settings (reminders) live in
/// the store document, not here.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub store_file_name: String,
    pub calendar_helper: Option<PathBuf>,
    pub calendar_timeout: Duration,
}

impl AppConfig {
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            store_file_name: STORE_FILE_NAME.to_string(),
            calendar_helper: None,
            calendar_timeout: Duration::from_millis(DEFAULT_CALENDAR_TIMEOUT_MS),
        }
    }

    /// Resolves the per-user data directory and applies `TIME_TRACKER_*`
    /// overrides from the process environment.
    pub fn from_env() -> AppResult<Self> {
        let data_dir = match std::env::var_os(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("com", "kiingo", "time-tracker")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    AppError::Internal("could not resolve a per-user data directory".to_string())
                })?,
        };
        Self::for_data_dir(data_dir).apply_env(|key| std::env::var(key).ok())
    }

    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|value| !value.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(helper) = lookup(ENV_CALENDAR_HELPER).filter(|value| !value.trim().is_empty()) {
            self.calendar_helper = Some(PathBuf::from(helper));
        }
        if let Some(raw) = lookup(ENV_CALENDAR_TIMEOUT_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|_| {
                AppError::Invalid(format!(
                    "{} must be a number of milliseconds, got {:?}",
                    ENV_CALENDAR_TIMEOUT_MS, raw
                ))
            })?;
            self.calendar_timeout = Duration::from_millis(millis);
        }
        Ok(self)
    }

    pub fn with_calendar_helper(mut self, helper: impl Into<PathBuf>) -> Self {
        self.calendar_helper = Some(helper.into());
        self
    }

    pub fn with_calendar_timeout(mut self, timeout: Duration) -> Self {
        self.calendar_timeout = timeout;
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file_name)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
