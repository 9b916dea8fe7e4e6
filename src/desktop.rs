use crate::config::AppConfig;
use crate::models::{CalendarResult, CategoryItem, NewTimeEntry, Settings, TimeEntry};
use crate::tracker::TimeTracker;
use crate::{init_tracing, to_client_error};
use std::sync::Arc;
use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{AppHandle, Emitter, Manager, RunEvent, WindowEvent};
use tokio::sync::broadcast::error::RecvError;

const MAIN_WINDOW: &str = "main";
const REMINDER_EVENT: &str = "reminder";
const CALENDAR_HELPER_BUNDLE: &str = "CalendarHelper.app";

#[derive(Clone)]
struct AppState {
    tracker: Arc<TimeTracker>,
}

#[tauri::command]
fn entries_get_all(
    state: tauri::State<'_, AppState>,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<Vec<TimeEntry>, String> {
    Ok(state
        .tracker
        .get_entries(start_date.as_deref(), end_date.as_deref()))
}

#[tauri::command]
fn entries_add(
    state: tauri::State<'_, AppState>,
    entry: NewTimeEntry,
) -> Result<TimeEntry, String> {
    state.tracker.add_entry(entry).map_err(to_client_error)
}

#[tauri::command]
fn entries_delete(state: tauri::State<'_, AppState>, id: String) -> Result<bool, String> {
    state.tracker.delete_entry(&id).map_err(to_client_error)
}

#[tauri::command]
fn settings_get(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    Ok(state.tracker.get_settings())
}

#[tauri::command]
fn settings_update(
    state: tauri::State<'_, AppState>,
    settings: serde_json::Value,
) -> Result<Settings, String> {
    state.tracker.update_settings(settings).map_err(to_client_error)
}

#[tauri::command]
fn teams_get_all(state: tauri::State<'_, AppState>) -> Result<Vec<CategoryItem>, String> {
    Ok(state.tracker.get_teams())
}

#[tauri::command]
fn teams_update(
    state: tauri::State<'_, AppState>,
    teams: Vec<CategoryItem>,
) -> Result<Vec<CategoryItem>, String> {
    state.tracker.update_teams(teams).map_err(to_client_error)
}

#[tauri::command]
fn activities_get_all(state: tauri::State<'_, AppState>) -> Result<Vec<CategoryItem>, String> {
    Ok(state.tracker.get_activities())
}

#[tauri::command]
fn activities_update(
    state: tauri::State<'_, AppState>,
    activities: Vec<CategoryItem>,
) -> Result<Vec<CategoryItem>, String> {
    state
        .tracker
        .update_activities(activities)
        .map_err(to_client_error)
}

#[tauri::command]
async fn calendar_get_today(
    state: tauri::State<'_, AppState>,
    date: String,
) -> Result<CalendarResult, String> {
    Ok(state.tracker.calendar_events(&date).await)
}

/// Called by the UI when the user clicks a reminder.
#[tauri::command]
fn show_window(app: AppHandle) -> Result<(), String> {
    show_main_window(&app).map_err(to_client_error)
}

fn show_main_window(app: &AppHandle) -> tauri::Result<()> {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        window.show()?;
        window.set_focus()?;
    }
    Ok(())
}

fn toggle_main_window(app: &AppHandle) -> tauri::Result<()> {
    let Some(window) = app.get_webview_window(MAIN_WINDOW) else {
        return Ok(());
    };
    if window.is_visible()? {
        window.hide()
    } else {
        window.show()?;
        window.set_focus()
    }
}

fn build_tray(app: &AppHandle) -> tauri::Result<()> {
    let open = MenuItem::with_id(app, "open", "Open Time Tracker", true, None::<&str>)?;
    let separator = PredefinedMenuItem::separator(app)?;
    let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&open, &separator, &quit])?;

    let mut builder = TrayIconBuilder::with_id("main-tray")
        .tooltip("Time Tracker")
        .menu(&menu)
        .menu_on_left_click(false)
        .on_menu_event(|app, event| match event.id.as_ref() {
            "open" => {
                if let Err(error) = show_main_window(app) {
                    tracing::warn!(error = %error, "failed to show main window");
                }
            }
            "quit" => app.exit(0),
            _ => {}
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                if let Err(error) = toggle_main_window(tray.app_handle()) {
                    tracing::warn!(error = %error, "failed to toggle main window");
                }
            }
        });

    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone()).icon_as_template(true);
    }
    builder.build(app)?;
    Ok(())
}

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
            std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
            let mut config = AppConfig::for_data_dir(app_data_dir)
                .apply_env(|key| std::env::var(key).ok())
                .map_err(|error| error.to_string())?;
            init_tracing(&config.log_dir()).map_err(|error| error.to_string())?;

            if config.calendar_helper.is_none() {
                if let Ok(resources) = app.path().resource_dir() {
                    let bundled = resources.join(CALENDAR_HELPER_BUNDLE);
                    if bundled.exists() {
                        config = config.with_calendar_helper(bundled);
                    }
                }
            }

            let tracker = TimeTracker::new(&config);
            let mut reminders = tracker.subscribe_reminders();
            let handle = app.handle().clone();

            tauri::async_runtime::spawn({
                let tracker = tracker.clone();
                async move {
                    tracker.start_reminders();
                }
            });

            tauri::async_runtime::spawn(async move {
                loop {
                    match reminders.recv().await {
                        Ok(reminder) => {
                            if let Err(error) = handle.emit(REMINDER_EVENT, &reminder) {
                                tracing::warn!(
                                    error = %error,
                                    "failed to deliver reminder to window"
                                );
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "reminder forwarder lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            build_tray(app.handle())?;
            app.manage(AppState { tracker });
            tracing::info!("time tracker ready");
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::Focused(false) = event {
                if window.label() == MAIN_WINDOW {
                    let _ = window.hide();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            entries_get_all,
            entries_add,
            entries_delete,
            settings_get,
            settings_update,
            teams_get_all,
            teams_update,
            activities_get_all,
            activities_update,
            calendar_get_today,
            show_window
        ])
        .build(tauri::generate_context!())
        .expect("failed to build tauri app")
        .run(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<AppState>() {
                    state.tracker.stop_reminders();
                }
            }
        });
}
