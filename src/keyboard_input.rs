use crate::error::Result;
use crate::events::{EventBus, SnapcamEvent};
use crate::settings::SettingsUpdate;
use crate::view::{ViewHandle, ViewSnapshot};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EXPOSURE_STEP: f32 = 0.5;

/// What a key press asks of the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    TapPhoto,
    TapVideo,
    TapScreen,
    ToggleSettings,
    PhotoCount(i64),
    IntervalSeconds(i64),
    Exposure(f32),
    Quit,
}

/// Map a key to its action; unmapped keys yield `None`
pub fn key_action(code: KeyCode) -> Option<KeyAction> {
    match code {
        KeyCode::Char('p') => Some(KeyAction::TapPhoto),
        KeyCode::Char('v') => Some(KeyAction::TapVideo),
        KeyCode::Char(' ') | KeyCode::Enter => Some(KeyAction::TapScreen),
        KeyCode::Char('s') => Some(KeyAction::ToggleSettings),
        KeyCode::Char('-') => Some(KeyAction::PhotoCount(-1)),
        KeyCode::Char('=') => Some(KeyAction::PhotoCount(1)),
        KeyCode::Char(',') => Some(KeyAction::IntervalSeconds(-1)),
        KeyCode::Char('.') => Some(KeyAction::IntervalSeconds(1)),
        KeyCode::Char('[') => Some(KeyAction::Exposure(-EXPOSURE_STEP)),
        KeyCode::Char(']') => Some(KeyAction::Exposure(EXPOSURE_STEP)),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

/// Settings change implied by an adjustment key, relative to what is shown.
/// Adjustments only apply while the settings panel is open.
pub fn settings_update(action: KeyAction, snapshot: &ViewSnapshot) -> Option<SettingsUpdate> {
    if !snapshot.settings_open {
        return None;
    }
    let settings = snapshot.settings;
    match action {
        KeyAction::PhotoCount(delta) => Some(SettingsUpdate::PhotoCount(
            i64::from(settings.photo_count) + delta,
        )),
        KeyAction::IntervalSeconds(delta) => Some(SettingsUpdate::IntervalSeconds(
            i64::from(settings.interval_seconds) + delta,
        )),
        KeyAction::Exposure(delta) => Some(SettingsUpdate::ExposureCompensation(
            settings.exposure_compensation + delta,
        )),
        _ => None,
    }
}

/// Terminal stand-in for the touch targets
pub struct KeyboardInputHandler {
    view: ViewHandle,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(view: ViewHandle, event_bus: Arc<EventBus>) -> Self {
        Self {
            view,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input: p photo, v video, space/enter tap, s settings, q quit");

        let (action_tx, action_rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_actions(
            action_rx,
            self.view.clone(),
            Arc::clone(&self.event_bus),
            self.cancellation_token.clone(),
        ));

        let cancellation_token = self.cancellation_token.clone();
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled");

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        let Some(action) = key_action(key_event.code) else {
                            debug!("Unmapped key: {:?}", key_event.code);
                            continue;
                        };
                        if action_tx.send(action).is_err() || action == KeyAction::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
            debug!("Keyboard input task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the blocking loop one poll interval to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

async fn dispatch_actions(
    mut actions: mpsc::UnboundedReceiver<KeyAction>,
    view: ViewHandle,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
) {
    loop {
        let action = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            action = actions.recv() => match action {
                Some(action) => action,
                None => break,
            },
        };

        if let Err(e) = dispatch(action, &view, &event_bus).await {
            warn!("Key action {:?} not delivered: {}", action, e);
        }
    }
}

async fn dispatch(action: KeyAction, view: &ViewHandle, event_bus: &EventBus) -> Result<()> {
    match action {
        KeyAction::TapPhoto => view.tap_photo().await,
        KeyAction::TapVideo => view.tap_video().await,
        KeyAction::TapScreen => view.tap_screen().await,
        KeyAction::ToggleSettings => {
            if view.snapshot().settings_open {
                view.close_settings().await
            } else {
                view.tap_settings().await
            }
        }
        KeyAction::PhotoCount(_) | KeyAction::IntervalSeconds(_) | KeyAction::Exposure(_) => {
            match settings_update(action, &view.snapshot()) {
                Some(update) => view.update_settings(update).await,
                None => {
                    debug!("Settings panel closed; {:?} ignored", action);
                    Ok(())
                }
            }
        }
        KeyAction::Quit => {
            info!("Quit key pressed - requesting shutdown");
            request_shutdown(event_bus)
        }
    }
}

fn request_shutdown(event_bus: &EventBus) -> Result<()> {
    event_bus.publish(SnapcamEvent::ShutdownRequested {
        timestamp: SystemTime::now(),
        reason: "User requested via keyboard".to_string(),
    })?;
    Ok(())
}
