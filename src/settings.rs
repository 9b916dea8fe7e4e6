use crate::errors::{AppError, AppResult};
use crate::models::{CategoryItem, Settings};
use crate::store::{merge_json, Commit, JsonStore};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Teams,
    Activities,
}

impl Taxonomy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teams => "teams",
            Self::Activities => "activities",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    store: Arc<JsonStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    pub fn get_settings(&self) -> Settings {
        self.store.read().settings
    }

    /// Merges `update` (a partial settings object) onto the stored settings.
    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<Settings> {
        if !update.is_object() {
            return Err(AppError::Invalid("Settings update must be a JSON object".to_string()));
        }

        let settings = self.store.modify(|document| {
            let mut merged = serde_json::to_value(&document.settings)?;
            merge_json(&mut merged, update);
            let settings: Settings = serde_json::from_value(merged)
                .map_err(|error| AppError::Invalid(format!("Invalid settings update: {}", error)))?;
            if settings.notification_interval_minutes == 0 {
                return Err(AppError::Invalid(
                    "notificationIntervalMinutes must be at least 1".to_string(),
                ));
            }
            document.settings = settings.clone();
            Ok(Commit::Write(settings))
        })?;

        tracing::info!(
            notifications_enabled = settings.notifications_enabled,
            interval_minutes = settings.notification_interval_minutes,
            "settings updated"
        );
        Ok(settings)
    }

    pub fn get_teams(&self) -> Vec<CategoryItem> {
        self.get_taxonomy(Taxonomy::Teams)
    }

    pub fn update_teams(&self, teams: Vec<CategoryItem>) -> AppResult<Vec<CategoryItem>> {
        self.replace_taxonomy(Taxonomy::Teams, teams)
    }

    pub fn get_activities(&self) -> Vec<CategoryItem> {
        self.get_taxonomy(Taxonomy::Activities)
    }

    pub fn update_activities(&self, activities: Vec<CategoryItem>) -> AppResult<Vec<CategoryItem>> {
        self.replace_taxonomy(Taxonomy::Activities, activities)
    }

    pub fn get_taxonomy(&self, taxonomy: Taxonomy) -> Vec<CategoryItem> {
        let document = self.store.read();
        match taxonomy {
            Taxonomy::Teams => document.teams,
            Taxonomy::Activities => document.activities,
        }
    }

    /// Replaces the whole list; names and colors are stored as given.
    pub fn replace_taxonomy(
        &self,
        taxonomy: Taxonomy,
        items: Vec<CategoryItem>,
    ) -> AppResult<Vec<CategoryItem>> {
        let count = items.len();
        let items = self.store.modify(|document| {
            let slot = match taxonomy {
                Taxonomy::Teams => &mut document.teams,
                Taxonomy::Activities => &mut document.activities,
            };
            *slot = items;
            Ok(Commit::Write(slot.clone()))
        })?;

        tracing::info!(taxonomy = taxonomy.as_str(), count, "taxonomy replaced");
        Ok(items)
    }
}
