use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TEAMS: &[(&str, &str)] = &[
    ("3D", "#6366f1"),
    ("Editing", "#ec4899"),
    ("Front-End Development", "#f59e0b"),
    ("Graphic Design", "#10b981"),
    ("Photography", "#8b5cf6"),
    ("Product Design", "#3b82f6"),
    ("Social Media", "#f97316"),
    ("Styling & Videography", "#14b8a6"),
    ("WebstaurantPlus", "#ef4444"),
    ("Webstaurant App", "#06b6d4"),
    ("Leadership/General", "#6b7280"),
];

const DEFAULT_ACTIVITIES: &[(&str, &str)] = &[
    ("Meetings", "#6366f1"),
    ("1:1s", "#ec4899"),
    ("Reviews/Feedback", "#f59e0b"),
    ("Strategy/Planning", "#10b981"),
    ("Deep Work", "#3b82f6"),
    ("Admin", "#6b7280"),
    ("Communication", "#8b5cf6"),
    ("Presentations", "#f97316"),
];

pub const REMINDER_TITLE: &str = "Time Tracker";
pub const REMINDER_BODY: &str = "How are you spending your time? Log an entry!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub team: String,
    pub activity: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub notes: String,
    /// Calendar day the entry is logged against, `YYYY-MM-DD`.
    pub date: String,
    pub created_at: DateTime<Utc>,
}

/// Entry draft as submitted by the UI; id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub team: String,
    pub activity: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub notes: String,
    pub date: String,
}

impl NewTimeEntry {
    pub fn into_entry(self, id: String, created_at: DateTime<Utc>) -> TimeEntry {
        TimeEntry {
            id,
            team: self.team,
            activity: self.activity,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            date: self.date,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    pub name: String,
    pub color: String,
}

impl CategoryItem {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

pub fn default_teams() -> Vec<CategoryItem> {
    DEFAULT_TEAMS
        .iter()
        .map(|(name, color)| CategoryItem::new(*name, *color))
        .collect()
}

pub fn default_activities() -> Vec<CategoryItem> {
    DEFAULT_ACTIVITIES
        .iter()
        .map(|(name, color)| CategoryItem::new(*name, *color))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    #[serde(default = "default_interval_minutes")]
    pub notification_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications_enabled: default_notifications_enabled(),
            notification_interval_minutes: default_interval_minutes(),
        }
    }
}

impl Settings {
    /// Reminder period; never shorter than one minute.
    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.notification_interval_minutes.max(1)) * 60)
    }
}

/// Strict zero-padded `YYYY-MM-DD`. Entry dates are range-filtered as strings,
/// so forms chrono tolerates (`2024-1-5`, leading spaces) are refused.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    (date.format("%Y-%m-%d").to_string() == value).then_some(date)
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_interval_minutes() -> u32 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    pub entries: Vec<TimeEntry>,
    pub settings: Settings,
    pub teams: Vec<CategoryItem>,
    pub activities: Vec<CategoryItem>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            settings: Settings::default(),
            teams: default_teams(),
            activities: default_activities(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarStatus {
    Ok,
    NoPermission,
    Error,
    NotRunning,
}

impl CalendarStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NoPermission => "no-permission",
            Self::Error => "error",
            Self::NotRunning => "not-running",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    pub start_date: DateTime<FixedOffset>,
    pub end_date: DateTime<FixedOffset>,
    pub calendar: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResult {
    pub status: CalendarStatus,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CalendarResult {
    pub fn failure(status: CalendarStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            events: Vec::new(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub title: String,
    pub body: String,
    pub fired_at: DateTime<Utc>,
}

impl Reminder {
    pub fn now() -> Self {
        Self {
            title: REMINDER_TITLE.to_string(),
            body: REMINDER_BODY.to_string(),
            fired_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_iso_date;
    use chrono::NaiveDate;

    #[test]
    fn iso_dates_must_be_zero_padded() {
        assert_eq!(parse_iso_date("2024-01-15"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parse_iso_date("2024-1-15"), None);
        assert_eq!(parse_iso_date("2024-01-5"), None);
        assert_eq!(parse_iso_date(" 2024-01-20"), None);
        assert_eq!(parse_iso_date("2024-02-30"), None);
    }
}
