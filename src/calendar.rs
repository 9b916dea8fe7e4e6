use crate::config::AppConfig;
use crate::models::{parse_iso_date, CalendarEvent, CalendarResult, CalendarStatus};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempPath;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Duration};

const TERMINATE_GRACE: Duration = Duration::from_millis(1500);
const KILL_GRACE: Duration = Duration::from_secs(2);
const MAX_EVENT_MINUTES: u32 = 1440;

/// Runs the external calendar helper for one date and collects its JSON output.
#[derive(Debug, Clone)]
pub struct CalendarBridge {
    helper: Option<PathBuf>,
    timeout: Duration,
    scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct HelperOutput {
    status: Option<CalendarStatus>,
    #[serde(default)]
    events: serde_json::Value,
    message: Option<String>,
}

impl CalendarBridge {
    pub fn new(helper: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            helper,
            timeout,
            scratch_dir: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.calendar_helper.clone(), config.calendar_timeout)
    }

    /// Directory for the helper's output file; the system temp dir when unset.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub async fn events_for(&self, date: &str) -> CalendarResult {
        let result = self.collect(date).await;
        match result.status {
            CalendarStatus::Ok => {
                tracing::debug!(
                    date = %date,
                    events = result.events.len(),
                    "calendar events loaded"
                );
            }
            status => {
                tracing::warn!(
                    date = %date,
                    status = status.as_str(),
                    message = result.message.as_deref().unwrap_or(""),
                    "calendar unavailable"
                );
            }
        }
        result
    }

    async fn collect(&self, date: &str) -> CalendarResult {
        let Some(helper) = self.helper.as_deref() else {
            return CalendarResult::failure(
                CalendarStatus::NotRunning,
                "Calendar helper is not configured",
            );
        };
        if parse_iso_date(date).is_none() {
            return CalendarResult::failure(
                CalendarStatus::Error,
                format!("Calendar date must be YYYY-MM-DD, got {:?}", date),
            );
        }
        if is_app_bundle(helper) && !helper.exists() {
            return CalendarResult::failure(
                CalendarStatus::NotRunning,
                format!("Calendar helper not found at {}", helper.display()),
            );
        }

        // Removed on drop, whichever way the helper run ends.
        let output = match self.allocate_output() {
            Ok(output) => output,
            Err(error) => {
                return CalendarResult::failure(
                    CalendarStatus::Error,
                    format!("Failed to allocate calendar output file: {}", error),
                )
            }
        };

        match self.run_helper(helper, date, &output).await {
            Ok(()) => normalize(read_output(&output)),
            Err(result) => result,
        }
    }

    fn allocate_output(&self) -> std::io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("calendar-").suffix(".json");
        let file = match self.scratch_dir.as_deref() {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }

    async fn run_helper(
        &self,
        helper: &Path,
        date: &str,
        output: &Path,
    ) -> Result<(), CalendarResult> {
        let mut command = helper_command(helper, date, output);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(CalendarResult::failure(
                    CalendarStatus::NotRunning,
                    format!("Calendar helper not found at {}", helper.display()),
                ))
            }
            Err(error) => {
                return Err(CalendarResult::failure(
                    CalendarStatus::Error,
                    error.to_string(),
                ))
            }
        };

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(error)) => {
                return Err(CalendarResult::failure(
                    CalendarStatus::Error,
                    error.to_string(),
                ))
            }
            Err(_) => {
                terminate_then_kill(&mut child).await;
                return Err(CalendarResult::failure(
                    CalendarStatus::Error,
                    "Calendar helper timed out",
                ));
            }
        };

        if !status.success() {
            return Err(CalendarResult::failure(
                CalendarStatus::Error,
                format!("Calendar helper exited with {}", status),
            ));
        }
        Ok(())
    }
}

fn is_app_bundle(helper: &Path) -> bool {
    helper.extension().map_or(false, |ext| ext == "app")
}

/// `.app` bundles go through `open -W -a` so macOS attributes the calendar
/// permission prompt to the helper bundle instead of this process.
fn helper_command(helper: &Path, date: &str, output: &Path) -> Command {
    if is_app_bundle(helper) {
        let mut command = Command::new("open");
        command
            .arg("-W")
            .arg("-a")
            .arg(helper)
            .arg("--args")
            .arg(date)
            .arg(output);
        command
    } else {
        let mut command = Command::new(helper);
        command.arg(date).arg(output);
        command
    }
}

async fn terminate_then_kill(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if let Some(pid) = child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }

    if timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
        return;
    }

    let _ = child.start_kill();
    let _ = timeout(KILL_GRACE, child.wait()).await;
}

fn read_output(path: &Path) -> CalendarResult {
    let parsed = std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<HelperOutput>(&raw).ok());
    let Some(output) = parsed else {
        return CalendarResult::failure(CalendarStatus::Error, "Failed to read calendar output");
    };

    let events = if output.events.is_array() {
        match serde_json::from_value::<Vec<CalendarEvent>>(output.events) {
            Ok(events) => events,
            Err(_) => {
                return CalendarResult::failure(
                    CalendarStatus::Error,
                    "Failed to read calendar output",
                )
            }
        }
    } else {
        Vec::new()
    };

    CalendarResult {
        status: output.status.unwrap_or(CalendarStatus::Error),
        events,
        message: output.message,
    }
}

/// Non-ok results carry no events; ok results drop all-day length events and
/// are ordered by start time.
fn normalize(mut result: CalendarResult) -> CalendarResult {
    if result.status != CalendarStatus::Ok {
        result.events.clear();
        return result;
    }
    result.events.retain(|event| event.duration_minutes < MAX_EVENT_MINUTES);
    result.events.sort_by(|a, b| a.start_date.cmp(&b.start_date));
    result
}

#[cfg(test)]
mod tests {
    use super::{helper_command, normalize, read_output};
    use crate::models::{CalendarEvent, CalendarResult, CalendarStatus};
    use chrono::DateTime;
    use std::ffi::OsStr;
    use std::path::Path;

    fn event(title: &str, start: &str, minutes: u32) -> CalendarEvent {
        let start_date = DateTime::parse_from_rfc3339(start).expect("start");
        CalendarEvent {
            title: title.to_string(),
            start_date,
            end_date: start_date + chrono::Duration::minutes(i64::from(minutes)),
            calendar: "Work".to_string(),
            duration_minutes: minutes,
        }
    }

    #[test]
    fn app_bundles_launch_through_open() {
        let command = helper_command(
            Path::new("/Apps/CalendarHelper.app"),
            "2024-06-03",
            Path::new("/tmp/out.json"),
        );
        let std_command = command.as_std();
        assert_eq!(std_command.get_program(), OsStr::new("open"));
        let args = std_command.get_args().collect::<Vec<_>>();
        assert_eq!(
            args,
            vec!["-W", "-a", "/Apps/CalendarHelper.app", "--args", "2024-06-03", "/tmp/out.json"]
                .into_iter()
                .map(OsStr::new)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn plain_binaries_run_directly() {
        let command = helper_command(
            Path::new("/usr/local/bin/calendar-helper"),
            "2024-06-03",
            Path::new("/tmp/out.json"),
        );
        let std_command = command.as_std();
        assert_eq!(std_command.get_program(), OsStr::new("/usr/local/bin/calendar-helper"));
        assert_eq!(std_command.get_args().count(), 2);
    }

    #[test]
    fn normalize_filters_and_sorts_ok_results() {
        let result = normalize(CalendarResult {
            status: CalendarStatus::Ok,
            events: vec![
                event("standup", "2024-06-03T09:30:00-04:00", 15),
                event("offsite", "2024-06-03T00:00:00-04:00", 1440),
                event("early", "2024-06-03T12:00:00Z", 30),
            ],
            message: None,
        });

        let titles = result.events.iter().map(|event| event.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["early", "standup"]);
    }

    #[test]
    fn normalize_clears_events_on_failure_statuses() {
        let result = normalize(CalendarResult {
            status: CalendarStatus::NoPermission,
            events: vec![event("leak", "2024-06-03T09:30:00Z", 15)],
            message: Some("denied".to_string()),
        });
        assert!(result.events.is_empty());
        assert_eq!(result.message.as_deref(), Some("denied"));
    }

    #[test]
    fn output_without_status_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.json");
        std::fs::write(&path, r#"{"events": "nope"}"#).expect("write output");

        let result = read_output(&path);
        assert_eq!(result.status, CalendarStatus::Error);
        assert!(result.events.is_empty());
    }
}
