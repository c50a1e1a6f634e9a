use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CameraTopics, RelayTransport};

/// Detect-side publisher for one camera. Publishing is best effort: failures
/// are logged and never reach the event receiver.
#[derive(Clone)]
pub struct MotionPublisher {
    topics: CameraTopics,
    transport: Arc<dyn RelayTransport>,
}

impl MotionPublisher {
    pub fn new(topics: CameraTopics, transport: Arc<dyn RelayTransport>) -> Self {
        Self { topics, transport }
    }

    pub fn topics(&self) -> &CameraTopics {
        &self.topics
    }

    /// Retained, so a recorder joining later still learns the address
    pub fn announce(&self, ip: IpAddr) {
        self.send(&self.topics.ip(), true, &ip.to_string());
    }

    pub fn motion(&self, active: bool) {
        self.send(&self.topics.motion(), false, if active { "true" } else { "false" });

        if active {
            let now = Utc::now().timestamp().to_string();
            self.send(&self.topics.last_motion(), true, &now);
        }
    }

    fn send(&self, topic: &str, retained: bool, payload: &str) {
        match self.transport.publish(topic, retained, payload) {
            Ok(()) => debug!("Published {}={}", topic, payload),
            Err(e) => warn!("Relay publish failed: {}", e),
        }
    }
}
