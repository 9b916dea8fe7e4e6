use crate::errors::{AppError, AppResult};
use crate::models::{parse_iso_date, NewTimeEntry, TimeEntry};
use crate::store::{Commit, JsonStore};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EntryRepository {
    store: Arc<JsonStore>,
}

impl EntryRepository {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    /// Entries whose `date` falls inside the inclusive range, newest record first.
    /// Empty bounds are treated as absent.
    pub fn list(&self, start_date: Option<&str>, end_date: Option<&str>) -> Vec<TimeEntry> {
        let start_date = start_date.filter(|value| !value.is_empty());
        let end_date = end_date.filter(|value| !value.is_empty());
        let mut entries = self
            .store
            .read()
            .entries
            .into_iter()
            .rev()
            .filter(|entry| start_date.map_or(true, |start| entry.date.as_str() >= start))
            .filter(|entry| end_date.map_or(true, |end| entry.date.as_str() <= end))
            .collect::<Vec<_>>();
        // Stable sort over the reversed list: equal timestamps keep the later insert first.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    pub fn add(&self, draft: NewTimeEntry) -> AppResult<TimeEntry> {
        if parse_iso_date(&draft.date).is_none() {
            return Err(AppError::Invalid(format!(
                "Entry date must be YYYY-MM-DD, got {:?}",
                draft.date
            )));
        }

        let entry = self.store.modify(|document| {
            let mut id = Uuid::new_v4().to_string();
            while document.entries.iter().any(|existing| existing.id == id) {
                id = Uuid::new_v4().to_string();
            }
            let entry = draft.into_entry(id, Utc::now());
            document.entries.push(entry.clone());
            Ok(Commit::Write(entry))
        })?;

        tracing::info!(
            entry_id = %entry.id,
            date = %entry.date,
            minutes = entry.duration_minutes,
            "time entry added"
        );
        Ok(entry)
    }

    /// `Ok(false)` when no entry has this id; the store is left untouched.
    pub fn delete(&self, id: &str) -> AppResult<bool> {
        let removed = self.store.modify(|document| {
            match document.entries.iter().position(|entry| entry.id == id) {
                Some(index) => {
                    document.entries.remove(index);
                    Ok(Commit::Write(true))
                }
                None => Ok(Commit::Discard(false)),
            }
        })?;

        if removed {
            tracing::info!(entry_id = %id, "time entry deleted");
        } else {
            tracing::debug!(entry_id = %id, "delete requested for unknown entry");
        }
        Ok(removed)
    }
}
