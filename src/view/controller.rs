use super::machine::{Effect, TimerKind, Timing, ViewEvent, ViewMachine};
use super::state::{CaptureMode, ViewModel, ViewState};
use crate::config::SnapcamConfig;
use crate::error::{Result, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use crate::session::SessionHandle;
use crate::settings::{CaptureSettings, SettingsStore, SettingsUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What the presentation layer renders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSnapshot {
    pub state: ViewState,
    pub mode: CaptureMode,
    pub counter: u8,
    pub settings_open: bool,
    pub settings: CaptureSettings,
}

impl ViewSnapshot {
    fn new(model: ViewModel, settings: CaptureSettings) -> Self {
        Self {
            state: model.state,
            mode: model.mode,
            counter: model.counter,
            settings_open: model.settings_open,
            settings,
        }
    }
}

enum ViewCommand {
    Event(ViewEvent),
    UpdateSettings(SettingsUpdate),
}

/// Drives the view machine on its own task.
///
/// Owns the machine, the settings store and every pending timer. Timers of a
/// generation are cancelled as soon as the machine enters a new state.
pub struct ViewController {
    handle: ViewHandle,
    task: Option<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl ViewController {
    /// Start on the welcome screen and schedule the move to main
    pub fn new(config: &SnapcamConfig, event_bus: Arc<EventBus>, session: SessionHandle) -> Self {
        let timing = Timing::from(&config.timing);
        let settings = SettingsStore::from_config(&config.settings);
        let (machine, initial_effects) = ViewMachine::new(timing);

        let (command_tx, command_rx) = mpsc::channel(config.system.command_queue_capacity);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(ViewSnapshot::new(machine.model(), settings.current()));
        let cancellation_token = CancellationToken::new();

        let actor = ViewActor {
            machine,
            settings,
            session,
            event_bus,
            snapshot: snapshot_tx,
            timer_tx: command_tx.clone(),
            root_token: cancellation_token.clone(),
            timer_token: cancellation_token.child_token(),
        };
        let task = tokio::spawn(actor.run(command_rx, initial_effects));

        info!("View controller started on welcome screen");

        Self {
            handle: ViewHandle {
                commands: command_tx,
                snapshot: snapshot_rx,
            },
            task: Some(task),
            cancellation_token,
        }
    }

    pub fn handle(&self) -> ViewHandle {
        self.handle.clone()
    }

    /// Cancel all pending timers and stop processing input
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation_token.cancel();
        if let Some(task) = self.task.take() {
            timeout(Duration::from_secs(5), task)
                .await
                .map_err(|_| SnapcamError::component("view", "view controller stop timeout"))?
                .map_err(|e| SnapcamError::component("view".to_string(), e.to_string()))?;
            info!("View controller stopped");
        }
        Ok(())
    }
}

impl Drop for ViewController {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Cloneable input surface for the tap targets
#[derive(Clone)]
pub struct ViewHandle {
    commands: mpsc::Sender<ViewCommand>,
    snapshot: watch::Receiver<ViewSnapshot>,
}

impl ViewHandle {
    pub async fn tap_photo(&self) -> Result<()> {
        self.send_event(ViewEvent::PhotoTapped).await
    }

    pub async fn tap_video(&self) -> Result<()> {
        self.send_event(ViewEvent::VideoTapped).await
    }

    pub async fn tap_settings(&self) -> Result<()> {
        self.send_event(ViewEvent::SettingsTapped).await
    }

    pub async fn close_settings(&self) -> Result<()> {
        self.send_event(ViewEvent::SettingsClosed).await
    }

    /// Tap anywhere on the capture screen
    pub async fn tap_screen(&self) -> Result<()> {
        self.send_event(ViewEvent::ScreenTapped).await
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        self.send(ViewCommand::UpdateSettings(update)).await
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        *self.snapshot.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshot.clone()
    }

    async fn send_event(&self, event: ViewEvent) -> Result<()> {
        self.send(ViewCommand::Event(event)).await
    }

    async fn send(&self, command: ViewCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SnapcamError::component("view", "view controller stopped"))
    }
}

struct ViewActor {
    machine: ViewMachine,
    settings: SettingsStore,
    session: SessionHandle,
    event_bus: Arc<EventBus>,
    snapshot: watch::Sender<ViewSnapshot>,
    timer_tx: mpsc::Sender<ViewCommand>,
    root_token: CancellationToken,
    /// Cancelled and replaced on every state entry
    timer_token: CancellationToken,
}

impl ViewActor {
    async fn run(mut self, mut commands: mpsc::Receiver<ViewCommand>, initial_effects: Vec<Effect>) {
        self.execute(initial_effects).await;

        loop {
            let command = tokio::select! {
                _ = self.root_token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                ViewCommand::Event(event) => self.handle_event(event).await,
                ViewCommand::UpdateSettings(update) => self.update_settings(update),
            }
        }

        self.timer_token.cancel();
        debug!("View actor stopped");
    }

    async fn handle_event(&mut self, event: ViewEvent) {
        let before = self.machine.model();
        let effects = self.machine.handle(event);
        let after = self.machine.model();

        if after.generation != before.generation {
            self.timer_token.cancel();
            self.timer_token = self.root_token.child_token();
        }

        // Effects are issued before the new state becomes observable
        self.execute(effects).await;

        if after != before {
            self.publish_snapshot();
            self.publish_changes(before, after);
        }
    }

    async fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Schedule {
                    kind,
                    generation,
                    after,
                } => self.schedule(kind, generation, after),
                Effect::TakePhoto => {
                    if let Err(e) = self.session.take_photo(self.settings.current()).await {
                        error!("Failed to request photo: {}", e);
                    }
                }
                Effect::StartRecording => {
                    if let Err(e) = self.session.start_recording().await {
                        error!("Failed to request recording start: {}", e);
                    }
                }
                Effect::StopRecording => {
                    if let Err(e) = self.session.stop_recording().await {
                        error!("Failed to request recording stop: {}", e);
                    }
                }
            }
        }
    }

    fn schedule(&self, kind: TimerKind, generation: u64, after: Duration) {
        debug!(
            "Scheduling {:?} timer in {:?} (generation {})",
            kind, after, generation
        );

        let timer_tx = self.timer_tx.clone();
        let token = self.timer_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(after) => {
                    let event = ViewEvent::TimerFired { kind, generation };
                    if timer_tx.send(ViewCommand::Event(event)).await.is_err() {
                        debug!("View actor gone; dropping {:?} timer", kind);
                    }
                }
            }
        });
    }

    fn update_settings(&mut self, update: SettingsUpdate) {
        let before = self.settings.current();
        let after = self.settings.apply(update);
        if before == after {
            return;
        }
        self.publish_snapshot();
        let _ = self
            .event_bus
            .publish(SnapcamEvent::SettingsChanged { settings: after });
    }

    fn publish_snapshot(&self) {
        let snapshot = ViewSnapshot::new(self.machine.model(), self.settings.current());
        self.snapshot.send_replace(snapshot);
    }

    fn publish_changes(&self, before: ViewModel, after: ViewModel) {
        if before.state != after.state {
            let _ = self.event_bus.publish(SnapcamEvent::ViewChanged {
                from: before.state,
                to: after.state,
                mode: after.mode,
            });
        } else if after.state == ViewState::Countdown && before.counter != after.counter {
            let _ = self.event_bus.publish(SnapcamEvent::CountdownTick {
                remaining: after.counter,
            });
        }

        if before.settings_open != after.settings_open {
            debug!(
                "Settings panel {}",
                if after.settings_open { "opened" } else { "closed" }
            );
        }
    }
}
