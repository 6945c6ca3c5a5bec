use super::{ComponentState, SnapcamApp};
use crate::error::{Result, SnapcamError};
use std::time::Duration;
use tokio::time::{error::Elapsed, timeout};
use tracing::{error, info};

impl SnapcamApp {
    /// Stop input first, then the view timers, then the capture session
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(keyboard_handler) = self.keyboard_handler.take() {
            self.set_component_state("keyboard", ComponentState::Stopping)
                .await;
            let result = timeout(Duration::from_secs(2), keyboard_handler.stop()).await;
            if self.record_stop("keyboard", result).await.is_err() {
                exit_code = 1;
            }
        }

        if let Some(mut view) = self.view.take() {
            self.set_component_state("view", ComponentState::Stopping)
                .await;
            let result = timeout(Duration::from_secs(5), view.stop()).await;
            if self.record_stop("view", result).await.is_err() {
                exit_code = 1;
            }
        }

        self.set_component_state("session", ComponentState::Stopping)
            .await;
        let result = timeout(Duration::from_secs(30), self.session.dispose()).await;
        if self.record_stop("session", result).await.is_err() {
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn record_stop(
        &self,
        component: &str,
        result: std::result::Result<Result<()>, Elapsed>,
    ) -> Result<()> {
        match result {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(SnapcamError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}
