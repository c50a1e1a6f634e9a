use crate::error::SubscriptionError;
use crate::motion::{MotionDebouncer, MotionStatus};
use crate::relay::MotionPublisher;
use crate::subscription::{CameraSubscription, SubscriptionStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{CameraAddress, CameraIdentity};

/// Where a camera's motion signals go
pub enum MotionSink {
    /// Debounce and record in this process
    Local(Arc<MotionDebouncer>),
    /// Publish to the relay for a recording process
    Relay(MotionPublisher),
}

/// Snapshot served by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatus {
    pub label: String,
    pub address: CameraAddress,
    pub subscription: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionStatus>,
}

/// One configured camera: its subscription plus where its motion goes.
/// The two evolve independently.
pub struct Camera {
    identity: CameraIdentity,
    subscription: CameraSubscription,
    sink: MotionSink,
}

impl Camera {
    pub fn new(identity: CameraIdentity, subscription: CameraSubscription, sink: MotionSink) -> Self {
        Self {
            identity,
            subscription,
            sink,
        }
    }

    pub fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    pub fn subscription(&self) -> &CameraSubscription {
        &self.subscription
    }

    /// Subscribe to the camera's events; relayed cameras also announce
    /// their address
    pub async fn start(&self) -> Result<(), SubscriptionError> {
        self.subscription.subscribe().await?;

        if let MotionSink::Relay(publisher) = &self.sink {
            publisher.announce(self.identity.address().ip());
        }
        Ok(())
    }

    /// Forward one classified motion notification
    pub async fn post_event(&self, active: bool) {
        debug!("[{}] Motion {}", self.identity, if active { "started" } else { "stopped" });

        match &self.sink {
            MotionSink::Local(debouncer) => {
                if active {
                    debouncer.on_motion_start().await;
                } else {
                    debouncer.on_motion_stop().await;
                }
            }
            MotionSink::Relay(publisher) => publisher.motion(active),
        }
    }

    /// Interrupt any live recording, then tear down the subscription. The
    /// unsubscribe request gets at most `unsubscribe_wait`; failures are
    /// logged by the components.
    pub async fn stop(&self, unsubscribe_wait: Duration) {
        if let MotionSink::Local(debouncer) = &self.sink {
            debouncer.shutdown().await;
        }

        match timeout(unsubscribe_wait, self.subscription.unsubscribe()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("[{}] Unsubscribe failed during stop: {}", self.identity, e),
            Err(_) => warn!(
                "[{}] Unsubscribe did not finish within {:?}, abandoning",
                self.identity, unsubscribe_wait
            ),
        }
        info!("[{}] Camera stopped", self.identity);
    }

    pub async fn status(&self) -> CameraStatus {
        let motion = match &self.sink {
            MotionSink::Local(debouncer) => Some(debouncer.status().await),
            MotionSink::Relay(_) => None,
        };

        CameraStatus {
            label: self.identity.label(),
            address: *self.identity.address(),
            subscription: self.subscription.status(),
            motion,
        }
    }
}
