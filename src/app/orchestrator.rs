use super::types::{ComponentState, ShutdownReason};
use crate::config::SnapcamConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::keyboard_input::KeyboardInputHandler;
use crate::library::FilesystemLibrary;
use crate::session::mock::SimulatedCamera;
use crate::session::{CaptureDevice, MediaLibrary, SessionController, SessionHandle};
use crate::view::{ViewController, ViewHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires the capture session, the view controller and the optional
/// keyboard input together and owns their lifecycle
pub struct SnapcamApp {
    pub(super) config: SnapcamConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Components
    pub(super) session: SessionController,
    pub(super) view: Option<ViewController>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl SnapcamApp {
    /// Create the app with the simulated camera and a filesystem library
    pub async fn new(config: SnapcamConfig) -> Result<Self> {
        let library = FilesystemLibrary::new(&config.library, &config.capture);
        info!(
            "Using simulated camera with media library at {}",
            library.root().display()
        );
        Ok(Self::with_devices(
            config,
            Arc::new(SimulatedCamera::new()),
            Arc::new(library),
        ))
    }

    /// Create the app around the given capture device and media library
    pub fn with_devices(
        config: SnapcamConfig,
        device: Arc<dyn CaptureDevice>,
        library: Arc<dyn MediaLibrary>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let session = SessionController::new(&config, Arc::clone(&event_bus), device, library);

        Self {
            config,
            event_bus,
            session,
            view: None,
            keyboard_handler: None,
            keyboard_enabled: false,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Enable or disable the keyboard input handler
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &SnapcamConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session.handle()
    }

    /// Available once [`SnapcamApp::start`] has run
    pub fn view_handle(&self) -> Option<ViewHandle> {
        self.view.as_ref().map(ViewController::handle)
    }
}
