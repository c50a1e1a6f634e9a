use super::types::component;
use super::{ComponentState, OnvifcamOrchestrator};
use crate::camera::Camera;
use crate::config::DeploymentMode;
use crate::error::{OnvifcamError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl OnvifcamOrchestrator {
    /// Best-effort teardown: unsubscribe every camera, interrupt live
    /// recordings, close the relay and the event server. Each step is bounded
    /// by `system.shutdown_timeout_seconds`; failures are logged and counted.
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<usize> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let wait = Duration::from_secs(self.config.system.shutdown_timeout_seconds.max(1));
        let mut failures = 0;

        if self.mode.subscribes_cameras() && !self.cameras.is_empty() {
            let cameras: Vec<Arc<Camera>> = self.cameras.iter().cloned().collect();
            let stop = async move {
                let mut stops = JoinSet::new();
                for camera in cameras {
                    stops.spawn(async move { camera.stop(wait).await });
                }
                while let Some(joined) = stops.join_next().await {
                    if let Err(e) = joined {
                        warn!("Camera stop task failed: {}", e);
                    }
                }
                Ok(())
            };
            // Each camera bounds its own unsubscribe by `wait`
            let bound = wait + Duration::from_secs(1);
            if self.stop_component(component::CAMERAS, bound, stop).await.is_err() {
                failures += 1;
            }
        }

        // The relay goes before the recorder so no late message can start a recording
        #[cfg(feature = "relay")]
        if let Some(relay) = self.relay.take() {
            let stop = async move {
                relay.shutdown(wait).await;
                Ok(())
            };
            let bound = wait + Duration::from_secs(1);
            if self.stop_component(component::RELAY, bound, stop).await.is_err() {
                failures += 1;
            }
        }
        if self.relay_transport.is_some() && self.mode != DeploymentMode::Standalone {
            self.component_states
                .set(component::RELAY, ComponentState::Stopped)
                .await;
        }

        if let Some(dispatcher) = self.dispatcher.clone() {
            let stop = async move {
                dispatcher.shutdown().await;
                Ok(())
            };
            if self.stop_component(component::RECORDER, wait, stop).await.is_err() {
                failures += 1;
            }
        } else if self.mode.records() {
            // Standalone debouncers were shut down with their cameras
            self.component_states
                .set(component::RECORDER, ComponentState::Stopped)
                .await;
        }

        if let Some(handle) = self.server_task.take() {
            let abort = handle.abort_handle();
            let stop = async move {
                match handle.await {
                    Ok(result) => result.map_err(OnvifcamError::from),
                    Err(e) if e.is_cancelled() => Ok(()),
                    Err(e) => Err(OnvifcamError::component(component::SERVER, e.to_string())),
                }
            };
            if self.stop_component(component::SERVER, wait, stop).await.is_err() {
                abort.abort();
                failures += 1;
            }
        }

        if let Some(handle) = self.sweeper_task.take() {
            let abort = handle.abort_handle();
            let stop = async move {
                handle
                    .await
                    .map_err(|e| OnvifcamError::component(component::RETENTION, e.to_string()))
            };
            if self.stop_component(component::RETENTION, wait, stop).await.is_err() {
                abort.abort();
                failures += 1;
            }
        }

        if failures == 0 {
            info!("Graceful shutdown completed");
        } else {
            warn!("Shutdown completed with {} failed step(s)", failures);
        }
        Ok(failures)
    }

    async fn stop_component<F>(&self, component: &'static str, wait: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.component_states
            .set(component, ComponentState::Stopping)
            .await;

        match timeout(wait, stop).await {
            Ok(Ok(())) => {
                self.component_states
                    .set(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.component_states
                    .set(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
            Err(_) => {
                self.component_states
                    .set(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(OnvifcamError::component(component, "stop timeout"))
            }
        }
    }
}
