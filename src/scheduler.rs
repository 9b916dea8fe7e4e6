use crate::models::{Reminder, Settings};
use crate::settings::SettingsRepository;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

const REMINDER_CHANNEL_CAPACITY: usize = 16;

/// Where the scheduler reads its settings from on every (re)schedule and firing.
pub trait SettingsSource: Send + Sync {
    fn current_settings(&self) -> Settings;
}

impl SettingsSource for SettingsRepository {
    fn current_settings(&self) -> Settings {
        self.get_settings()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    NotStarted,
    /// Started while notifications were disabled; no timer armed.
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
struct TimerSlot {
    state: SchedulerState,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct NotificationScheduler {
    settings: Arc<dyn SettingsSource>,
    slot: Arc<Mutex<TimerSlot>>,
    reminders: broadcast::Sender<Reminder>,
}

impl NotificationScheduler {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        let (reminders, _) = broadcast::channel(REMINDER_CHANNEL_CAPACITY);
        Self {
            settings,
            slot: Arc::new(Mutex::new(TimerSlot {
                state: SchedulerState::NotStarted,
                generation: 0,
                timer: None,
            })),
            reminders,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Reminder> {
        self.reminders.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        lock_slot(&self.slot).state
    }

    pub fn is_armed(&self) -> bool {
        lock_slot(&self.slot).timer.is_some()
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.state() == SchedulerState::Running {
            tracing::debug!("reminder scheduler already running");
            return;
        }
        self.reschedule();
    }

    /// Drops any armed timer and arms a new one from the current settings.
    pub fn reschedule(&self) {
        let settings = self.settings.current_settings();
        let mut slot = lock_slot(&self.slot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation += 1;

        if !settings.notifications_enabled {
            slot.state = SchedulerState::Idle;
            tracing::info!("notifications disabled; reminder timer not armed");
            return;
        }

        let period = settings.reminder_interval();
        let generation = slot.generation;
        slot.timer = Some(tokio::spawn(run_timer(
            self.settings.clone(),
            Arc::downgrade(&self.slot),
            self.reminders.clone(),
            period,
            generation,
        )));
        slot.state = SchedulerState::Running;
        tracing::info!(
            interval_minutes = settings.notification_interval_minutes,
            "reminder timer armed"
        );
    }

    pub fn stop(&self) {
        let mut slot = lock_slot(&self.slot);
        slot.generation += 1;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
            tracing::info!("reminder timer stopped");
        }
        slot.state = SchedulerState::Stopped;
    }
}

async fn run_timer(
    settings: Arc<dyn SettingsSource>,
    slot: Weak<Mutex<TimerSlot>>,
    reminders: broadcast::Sender<Reminder>,
    period: Duration,
    generation: u64,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(slot) = slot.upgrade() else {
            return;
        };
        let current = settings.current_settings();

        let mut guard = lock_slot(&slot);
        if guard.generation != generation {
            return;
        }
        if !current.notifications_enabled {
            guard.timer = None;
            guard.state = SchedulerState::Stopped;
            tracing::info!("notifications disabled since last firing; reminder timer stopped");
            return;
        }
        drop(guard);

        match reminders.send(Reminder::now()) {
            Ok(receivers) => tracing::debug!(receivers, "reminder fired"),
            Err(_) => tracing::debug!("reminder fired with no subscribers"),
        }
    }
}

fn lock_slot(slot: &Mutex<TimerSlot>) -> MutexGuard<'_, TimerSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
