use crate::error::EventBusError;
use crate::session::ThumbnailSource;
use crate::settings::CaptureSettings;
use crate::view::{CaptureMode, ViewState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the snapcam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SnapcamEvent {
    /// The visible screen changed
    ViewChanged {
        from: ViewState,
        to: ViewState,
        mode: CaptureMode,
    },
    /// The countdown counter moved
    CountdownTick { remaining: u8 },
    /// A settings value was changed from the panel
    SettingsChanged { settings: CaptureSettings },
    /// The hardware capture pipeline started or stopped
    SessionStateChanged { running: bool },
    /// A camera or library permission request completed
    PermissionResolved { resource: String, granted: bool },
    /// A photo was delivered by the camera
    PhotoCaptured { bytes: usize, timestamp: SystemTime },
    /// Recording to a scratch file began
    RecordingStarted { path: PathBuf },
    /// Recording stopped and the file was queued for persistence
    RecordingStopped { path: PathBuf },
    /// The most-recent-capture thumbnail was replaced
    ThumbnailUpdated { source: ThumbnailSource },
    /// A capture, persistence or thumbnail failure that was absorbed
    CaptureFault { kind: String, details: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SnapcamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SnapcamEvent::ViewChanged { from, to, mode } => {
                format!("View changed {} -> {} ({})", from, to, mode)
            }
            SnapcamEvent::CountdownTick { remaining } => {
                format!("Countdown at {}", remaining)
            }
            SnapcamEvent::SettingsChanged { settings } => format!(
                "Settings changed: {} photos, {}s interval, {:+.1} EV",
                settings.photo_count, settings.interval_seconds, settings.exposure_compensation
            ),
            SnapcamEvent::SessionStateChanged { running } => format!(
                "Capture session {}",
                if *running { "running" } else { "stopped" }
            ),
            SnapcamEvent::PermissionResolved { resource, granted } => format!(
                "{} permission {}",
                resource,
                if *granted { "granted" } else { "denied" }
            ),
            SnapcamEvent::PhotoCaptured { bytes, .. } => {
                format!("Photo captured ({} bytes)", bytes)
            }
            SnapcamEvent::RecordingStarted { path } => {
                format!("Recording started: {}", path.display())
            }
            SnapcamEvent::RecordingStopped { path } => {
                format!("Recording stopped: {}", path.display())
            }
            SnapcamEvent::ThumbnailUpdated { source } => {
                format!("Thumbnail updated from {:?}", source)
            }
            SnapcamEvent::CaptureFault { kind, details } => {
                format!("Capture fault ({}): {}", kind, details)
            }
            SnapcamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SnapcamEvent::ViewChanged { .. } => "view_changed",
            SnapcamEvent::CountdownTick { .. } => "countdown_tick",
            SnapcamEvent::SettingsChanged { .. } => "settings_changed",
            SnapcamEvent::SessionStateChanged { .. } => "session_state_changed",
            SnapcamEvent::PermissionResolved { .. } => "permission_resolved",
            SnapcamEvent::PhotoCaptured { .. } => "photo_captured",
            SnapcamEvent::RecordingStarted { .. } => "recording_started",
            SnapcamEvent::RecordingStopped { .. } => "recording_stopped",
            SnapcamEvent::ThumbnailUpdated { .. } => "thumbnail_updated",
            SnapcamEvent::CaptureFault { .. } => "capture_fault",
            SnapcamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SnapcamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SnapcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SnapcamEvent) -> Result<usize, EventBusError> {
        match &event {
            SnapcamEvent::PermissionResolved { granted: false, .. } => {
                warn!("{}", event.description());
            }
            SnapcamEvent::ViewChanged { .. } | SnapcamEvent::PermissionResolved { .. } => {
                info!("{}", event.description());
            }
            SnapcamEvent::CaptureFault { kind, details } => {
                error!("Capture fault ({}): {}", kind, details);
            }
            SnapcamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&SnapcamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SnapcamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<SnapcamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<SnapcamEvent>,
        filter: EventFilter,
        name: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            name: name.into(),
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<SnapcamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<SnapcamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(SnapcamEvent::CountdownTick { remaining: 2 })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            SnapcamEvent::CountdownTick { remaining } => assert_eq!(remaining, 2),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        let result = event_bus.publish(SnapcamEvent::SessionStateChanged { running: true });
        assert!(matches!(result, Err(EventBusError::PublishFailed { .. })));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::EventTypes(vec!["capture_fault"]),
            "test",
        );

        event_bus
            .publish(SnapcamEvent::CountdownTick { remaining: 3 })
            .unwrap();
        event_bus
            .publish(SnapcamEvent::CaptureFault {
                kind: "capture_failed".to_string(),
                details: "sensor timeout".to_string(),
            })
            .unwrap();

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            SnapcamEvent::CaptureFault { details, .. } => assert_eq!(details, "sensor timeout"),
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let event = SnapcamEvent::ViewChanged {
            from: ViewState::Main,
            to: ViewState::Countdown,
            mode: CaptureMode::Video,
        };

        assert_eq!(event.event_type(), "view_changed");
        assert_eq!(event.description(), "View changed main -> countdown (video)");
    }
}
