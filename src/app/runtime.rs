use super::{ShutdownReason, SnapcamApp};
use crate::error::{EventBusError, Result, SnapcamError};
use crate::events::{EventFilter, EventReceiver, SnapcamEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info};

type SharedShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl SnapcamApp {
    /// Run until a signal or a shutdown request arrives, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Snapcam is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| SnapcamError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SnapcamError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(&shutdown_sender);
        self.setup_shutdown_listener(&shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| SnapcamError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Snapcam shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: &SharedShutdownSender) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender = Arc::clone(shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        let shutdown_sender = Arc::clone(shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });
    }

    /// Turn a `ShutdownRequested` event into a shutdown
    fn setup_shutdown_listener(&self, shutdown_sender: &SharedShutdownSender) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown_listener",
        );
        let shutdown_sender = Arc::clone(shutdown_sender);
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    event = receiver.recv() => event,
                };
                match event {
                    Ok(SnapcamEvent::ShutdownRequested { reason, .. }) => {
                        send_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason)).await;
                        break;
                    }
                    Ok(_) | Err(EventBusError::Lagged { .. }) => continue,
                    Err(e) => {
                        debug!("Shutdown listener stopped: {}", e);
                        break;
                    }
                }
            }
        });
    }
}

async fn send_shutdown(shutdown_sender: &SharedShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = shutdown_sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
