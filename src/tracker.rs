use crate::calendar::CalendarBridge;
use crate::config::AppConfig;
use crate::entries::EntryRepository;
use crate::errors::AppResult;
use crate::models::{CalendarResult, CategoryItem, NewTimeEntry, Reminder, Settings, TimeEntry};
use crate::scheduler::{NotificationScheduler, SchedulerState};
use crate::settings::SettingsRepository;
use crate::store::JsonStore;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything the UI boundary talks to: entry and settings repositories over
/// one JSON store, the reminder scheduler, and the calendar bridge.
#[derive(Clone)]
pub struct TimeTracker {
    store: Arc<JsonStore>,
    entries: EntryRepository,
    settings: SettingsRepository,
    scheduler: NotificationScheduler,
    calendar: CalendarBridge,
}

impl TimeTracker {
    pub fn new(config: &AppConfig) -> Arc<Self> {
        let store = Arc::new(JsonStore::new(config.store_path()));
        let settings = SettingsRepository::new(store.clone());
        let scheduler = NotificationScheduler::new(Arc::new(settings.clone()));

        tracing::info!(
            store = %store.path().display(),
            calendar_helper = config.calendar_helper.is_some(),
            "time tracker initialised"
        );

        Arc::new(Self {
            entries: EntryRepository::new(store.clone()),
            settings,
            scheduler,
            calendar: CalendarBridge::from_config(config),
            store,
        })
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    // ─── Entries ────────────────────────────────────────────────────────────

    pub fn get_entries(&self, start_date: Option<&str>, end_date: Option<&str>) -> Vec<TimeEntry> {
        self.entries.list(start_date, end_date)
    }

    pub fn add_entry(&self, draft: NewTimeEntry) -> AppResult<TimeEntry> {
        self.entries.add(draft)
    }

    pub fn delete_entry(&self, id: &str) -> AppResult<bool> {
        self.entries.delete(id)
    }

    // ─── Settings & taxonomies ─────────────────────────────────────────────

    pub fn get_settings(&self) -> Settings {
        self.settings.get_settings()
    }

    /// Does not reschedule reminders; see `reschedule_reminders`.
    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<Settings> {
        self.settings.update_settings(update)
    }

    pub fn get_teams(&self) -> Vec<CategoryItem> {
        self.settings.get_teams()
    }

    pub fn update_teams(&self, teams: Vec<CategoryItem>) -> AppResult<Vec<CategoryItem>> {
        self.settings.update_teams(teams)
    }

    pub fn get_activities(&self) -> Vec<CategoryItem> {
        self.settings.get_activities()
    }

    pub fn update_activities(&self, activities: Vec<CategoryItem>) -> AppResult<Vec<CategoryItem>> {
        self.settings.update_activities(activities)
    }

    // ─── Calendar ───────────────────────────────────────────────────────────

    pub async fn calendar_events(&self, date: &str) -> CalendarResult {
        self.calendar.events_for(date).await
    }

    // ─── Reminders ──────────────────────────────────────────────────────────

    pub fn start_reminders(&self) {
        self.scheduler.start();
    }

    pub fn reschedule_reminders(&self) {
        self.scheduler.reschedule();
    }

    pub fn stop_reminders(&self) {
        self.scheduler.stop();
    }

    pub fn subscribe_reminders(&self) -> broadcast::Receiver<Reminder> {
        self.scheduler.subscribe()
    }

    pub fn reminder_state(&self) -> SchedulerState {
        self.scheduler.state()
    }
}
