use crate::errors::{AppError, AppResult};
use crate::models::{default_activities, default_teams, Settings, StoreDocument};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Outcome of a read-modify-write closure passed to [`JsonStore::modify`].
pub enum Commit<T> {
    Write(T),
    Discard(T),
}

/// Single-file JSON store. Every operation goes back to disk; nothing is
/// cached between calls.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: an unreadable or malformed file yields the default document.
    pub fn read(&self) -> StoreDocument {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.load()
    }

    pub fn write(&self, document: &StoreDocument) -> AppResult<()> {
        let _guard = self.acquire()?;
        self.commit(document)
    }

    /// Runs one read-modify-write cycle under the store lock. The document is
    /// only rewritten when the closure returns [`Commit::Write`].
    pub fn modify<T>(
        &self,
        apply: impl FnOnce(&mut StoreDocument) -> AppResult<Commit<T>>,
    ) -> AppResult<T> {
        let _guard = self.acquire()?;
        let mut document = self.load();
        match apply(&mut document)? {
            Commit::Write(value) => {
                self.commit(&document)?;
                Ok(value)
            }
            Commit::Discard(value) => Ok(value),
        }
    }

    fn acquire(&self) -> AppResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| AppError::Internal("store mutex poisoned".to_string()))
    }

    fn load(&self) -> StoreDocument {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "store file missing; starting from defaults"
                );
                return StoreDocument::default();
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to read store; starting from defaults"
                );
                return StoreDocument::default();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(sections)) => decode_document(sections),
            Ok(_) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "store file is not a JSON object; starting from defaults"
                );
                StoreDocument::default()
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "store file is malformed; starting from defaults"
                );
                StoreDocument::default()
            }
        }
    }

    fn commit(&self, document: &StoreDocument) -> AppResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let body = serde_json::to_vec_pretty(document)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".time-tracker-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        staged.write_all(&body)?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path)?;

        tracing::debug!(path = %self.path.display(), bytes = body.len(), "store committed");
        Ok(())
    }
}

/// Sections are decoded independently so an off-type value only costs itself.
/// Absent or null sections take their defaults.
fn decode_document(mut sections: Map<String, Value>) -> StoreDocument {
    StoreDocument {
        entries: decode_list(&mut sections, "entries").unwrap_or_default(),
        settings: decode_settings(sections.remove("settings")),
        teams: decode_list(&mut sections, "teams").unwrap_or_else(default_teams),
        activities: decode_list(&mut sections, "activities").unwrap_or_else(default_activities),
    }
}

fn decode_list<T: DeserializeOwned>(
    sections: &mut Map<String, Value>,
    section: &str,
) -> Option<Vec<T>> {
    match sections.remove(section)? {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .into_iter()
                .enumerate()
                .filter_map(|(index, item)| match serde_json::from_value(item) {
                    Ok(decoded) => Some(decoded),
                    Err(error) => {
                        tracing::warn!(section, index, error = %error, "skipping malformed record");
                        None
                    }
                })
                .collect(),
        ),
        _ => {
            tracing::warn!(section, "store section is not a list; using defaults");
            None
        }
    }
}

fn decode_settings(section: Option<Value>) -> Settings {
    let fields = match section {
        None | Some(Value::Null) => return Settings::default(),
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            tracing::warn!("stored settings are not an object; using defaults");
            return Settings::default();
        }
    };

    // Field by field, so one bad value falls back alone.
    let mut settings = Settings::default();
    for (field, value) in fields {
        let Ok(mut candidate) = serde_json::to_value(&settings) else {
            break;
        };
        candidate[field.as_str()] = value;
        match serde_json::from_value::<Settings>(candidate) {
            Ok(next) => settings = next,
            Err(error) => {
                tracing::warn!(field = %field, error = %error, "ignoring malformed setting");
            }
        }
    }
    settings
}

pub(crate) fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_json, Commit, JsonStore};
    use crate::models::{CategoryItem, Settings, StoreDocument, TimeEntry};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_entry(id: &str, date: &str) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            team: "Editing".to_string(),
            activity: "Deep Work".to_string(),
            duration_minutes: 45,
            notes: "cut the trailer".to_string(),
            date: date.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path().join("data.json"));
        let document = StoreDocument {
            entries: vec![sample_entry("a", "2024-01-02")],
            settings: Settings {
                notifications_enabled: false,
                notification_interval_minutes: 15,
            },
            teams: vec![CategoryItem::new("Ops", "#000000")],
            activities: vec![],
        };

        store.write(&document).expect("write");
        assert_eq!(store.read(), document);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path().join("absent.json"));

        let document = store.read();
        assert!(document.entries.is_empty());
        assert!(!document.teams.is_empty());
        assert!(!document.activities.is_empty());
        assert!(document.settings.notifications_enabled);
        assert_eq!(document.settings.notification_interval_minutes, 60);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{\"entries\": [ truncated").expect("seed corrupt file");

        let document = JsonStore::new(&path).read();
        assert_eq!(document, StoreDocument::default());
    }

    #[test]
    fn older_document_gets_taxonomies_backfilled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        let legacy = json!({
            "entries": [sample_entry("legacy", "2023-12-31")],
            "settings": { "notificationsEnabled": false, "notificationIntervalMinutes": 20 },
            "activities": null
        });
        std::fs::write(&path, legacy.to_string()).expect("seed legacy file");

        let document = JsonStore::new(&path).read();
        assert_eq!(document.entries, vec![sample_entry("legacy", "2023-12-31")]);
        assert_eq!(
            document.settings,
            Settings {
                notifications_enabled: false,
                notification_interval_minutes: 20,
            }
        );
        assert_eq!(document.teams, StoreDocument::default().teams);
        assert_eq!(document.activities, StoreDocument::default().activities);
    }

    #[test]
    fn missing_settings_fields_default_individually() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"entries": [], "settings": {"notificationsEnabled": false}}"#)
            .expect("seed partial file");

        let settings = JsonStore::new(&path).read().settings;
        assert!(!settings.notifications_enabled);
        assert_eq!(settings.notification_interval_minutes, 60);
    }

    #[test]
    fn stray_temp_files_do_not_affect_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        let store = JsonStore::new(&path);
        let committed = StoreDocument {
            entries: vec![sample_entry("kept", "2024-01-02")],
            ..StoreDocument::default()
        };
        store.write(&committed).expect("write");

        // A crash after staging but before the rename leaves only a stray temp file behind.
        let stray = dir.path().join(".time-tracker-crashed.tmp");
        std::fs::write(&stray, "{\"entries\": [{\"id\": \"half").expect("stage partial");

        assert_eq!(store.read(), committed);
    }

    #[test]
    fn failed_rename_keeps_target_and_removes_staged_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("data.json");
        std::fs::create_dir(&target).expect("occupy target with a directory");
        std::fs::write(target.join("previous.json"), "kept").expect("seed target contents");
        let store = JsonStore::new(&target);

        let err = store
            .modify(|document| {
                document.entries.push(sample_entry("lost", "2024-01-03"));
                Ok(Commit::Write(()))
            })
            .expect_err("rename onto a non-empty directory should fail");
        assert!(err.to_string().starts_with("IO_FAILURE"));

        assert_eq!(
            std::fs::read_to_string(target.join("previous.json")).expect("target untouched"),
            "kept"
        );
        let names = std::fs::read_dir(dir.path())
            .expect("list dir")
            .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["data.json".to_string()]);
    }

    #[test]
    fn malformed_records_are_skipped_without_losing_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        let mut fractional = json!(sample_entry("bad", "2024-01-03"));
        fractional["durationMinutes"] = json!(12.5);
        let seeded = json!({
            "entries": [
                sample_entry("a", "2024-01-02"),
                fractional,
                sample_entry("c", "2024-01-04")
            ],
            "settings": { "notificationsEnabled": false, "notificationIntervalMinutes": "30" },
            "teams": [{ "name": "Ops", "color": "#000000" }, { "name": 7 }]
        });
        std::fs::write(&path, seeded.to_string()).expect("seed file");
        let store = JsonStore::new(&path);

        let document = store.read();
        let ids = document.entries.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(!document.settings.notifications_enabled);
        assert_eq!(document.settings.notification_interval_minutes, 60);
        assert_eq!(document.teams, vec![CategoryItem::new("Ops", "#000000")]);

        store
            .modify(|document| {
                document.entries.push(sample_entry("d", "2024-01-05"));
                Ok(Commit::Write(()))
            })
            .expect("modify");
        let reread = store.read();
        assert_eq!(reread.entries.len(), 3);
        assert_eq!(reread.entries[0].id, "a");
        assert!(!reread.settings.notifications_enabled);
    }

    #[test]
    fn write_creates_missing_directories_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("deeper").join("data.json");
        let store = JsonStore::new(&path);

        store.write(&StoreDocument::default()).expect("write");

        let names = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list dir")
            .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["data.json".to_string()]);
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").expect("seed blocker");
        let store = JsonStore::new(blocker.join("data.json"));

        let err = store
            .write(&StoreDocument::default())
            .expect_err("write should fail");
        assert!(err.to_string().starts_with("IO_FAILURE"));
    }

    #[test]
    fn discarded_modification_does_not_touch_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        let store = JsonStore::new(&path);

        let seen = store
            .modify(|document| {
                document.entries.push(sample_entry("ghost", "2024-01-01"));
                Ok(Commit::Discard(document.entries.len()))
            })
            .expect("modify");

        assert_eq!(seen, 1);
        assert!(!path.exists());
    }

    #[test]
    fn merge_json_only_replaces_provided_keys() {
        let mut target = json!({ "a": 1, "nested": { "b": 2, "c": 3 } });
        merge_json(&mut target, json!({ "nested": { "c": 4 } }));
        assert_eq!(target, json!({ "a": 1, "nested": { "b": 2, "c": 4 } }));
    }
}
