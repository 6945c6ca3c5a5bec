use super::{ComponentState, SnapcamApp};
use crate::error::Result;
use crate::keyboard_input::KeyboardInputHandler;
use crate::view::ViewController;
use std::sync::Arc;
use tracing::{error, info, warn};

impl SnapcamApp {
    /// Resolve permissions, configure the device and start the capture session
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Snapcam components");

        let mut states = self.component_states.lock().await;
        states.insert("session".to_string(), ComponentState::Stopped);
        states.insert("view".to_string(), ComponentState::Stopped);
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }
        drop(states);

        self.set_component_state("session", ComponentState::Starting)
            .await;

        let session = self.session.handle();
        let started = async {
            session.initialize().await?;
            session.start_session().await?;
            session.flush().await
        }
        .await;
        if let Err(e) = started {
            error!("Failed to initialize capture session: {}", e);
            self.set_component_state("session", ComponentState::Failed)
                .await;
            return Err(e);
        }

        let status = session.status();
        if !status.camera_permission_granted {
            warn!("Camera access denied; capture controls will be inert");
        } else if !status.configured {
            warn!("No usable capture device; capture controls will be inert");
        }
        if !status.library_permission_granted {
            warn!("Media library access denied; captures cannot be saved");
        }

        self.set_component_state("session", ComponentState::Running)
            .await;
        info!(
            "Capture session ready (running: {})",
            status.session_running
        );
        Ok(())
    }

    /// Show the welcome screen and start accepting input
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Snapcam");

        self.set_component_state("view", ComponentState::Starting)
            .await;
        let view = ViewController::new(
            &self.config,
            Arc::clone(&self.event_bus),
            self.session.handle(),
        );
        let view_handle = view.handle();
        self.view = Some(view);
        self.set_component_state("view", ComponentState::Running)
            .await;

        if self.keyboard_enabled {
            self.set_component_state("keyboard", ComponentState::Starting)
                .await;
            let keyboard_handler = KeyboardInputHandler::new(view_handle, Arc::clone(&self.event_bus));
            keyboard_handler.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;
            self.keyboard_handler = Some(keyboard_handler);
            self.set_component_state("keyboard", ComponentState::Running)
                .await;
        }

        info!("Snapcam started");
        Ok(())
    }
}
