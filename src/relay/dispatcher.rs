use crate::motion::MotionState;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ArmGate, RelayMessage, TopicRegistry};

/// What a relay message led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    CameraRegistered,
    CameraKnown,
    Armed(bool),
    Motion(MotionState),
    /// Motion start discarded because recording is disarmed
    Disarmed,
    UnknownCamera,
    Advisory,
    Ignored,
}

/// Routes relay messages into the topic registry on the recording side
pub struct RecordDispatcher {
    registry: Arc<TopicRegistry>,
    gate: Arc<ArmGate>,
    arm_topic: Option<String>,
}

impl RecordDispatcher {
    pub fn new(registry: Arc<TopicRegistry>, gate: Arc<ArmGate>, arm_topic: Option<String>) -> Self {
        Self {
            registry,
            gate,
            arm_topic,
        }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<ArmGate> {
        &self.gate
    }

    pub async fn handle(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let message = match RelayMessage::parse(topic, payload, self.arm_topic.as_deref()) {
            Some(message) => message,
            None => {
                debug!("Ignoring relay message on {}", topic);
                return DispatchOutcome::Ignored;
            }
        };

        match message {
            RelayMessage::Arm(armed) => {
                if self.gate.set(armed) != armed {
                    info!("Recording {}", if armed { "armed" } else { "disarmed" });
                }
                DispatchOutcome::Armed(armed)
            }
            RelayMessage::Address { base, ip } => match self.registry.register(base, ip) {
                Some((_, true)) => DispatchOutcome::CameraRegistered,
                Some((_, false)) => DispatchOutcome::CameraKnown,
                None => DispatchOutcome::Ignored,
            },
            RelayMessage::Motion { base, active } => {
                let Some(camera) = self.registry.get(base) else {
                    warn!("[{}] Motion for a camera with no known address, dropping", base);
                    return DispatchOutcome::UnknownCamera;
                };

                if !active {
                    return DispatchOutcome::Motion(camera.on_motion_stop().await);
                }

                if !self.gate.is_armed() {
                    info!("[{}] Motion while disarmed, not recording", base);
                    return DispatchOutcome::Disarmed;
                }

                DispatchOutcome::Motion(camera.on_motion_start().await)
            }
            RelayMessage::LastMotion { base, unix_seconds } => {
                debug!("[{}] Last motion at {}", base, unix_seconds);
                DispatchOutcome::Advisory
            }
        }
    }

    /// Stop every camera's timers and recordings. Cameras announced
    /// afterwards are not created.
    pub async fn shutdown(&self) {
        for camera in self.registry.close() {
            camera.shutdown().await;
        }
    }
}
