//! Publish/subscribe bridge between a detecting process and a recording
//! process.
//!
//! Per camera base topic `T` three facts are carried: `T/ip` (retained),
//! `T/motion` (live, not retained) and `T/lastMotion` (retained, unix
//! seconds). An optional arm topic gates motion-start on the recording side.

mod dispatcher;
mod gate;
#[cfg(feature = "relay")]
mod mqtt;
mod publisher;
mod registry;
#[cfg(test)]
mod tests;

pub use dispatcher::{DispatchOutcome, RecordDispatcher};
pub use gate::ArmGate;
#[cfg(feature = "relay")]
pub use mqtt::{MqttRelay, MqttTransport};
pub use publisher::MotionPublisher;
pub use registry::TopicRegistry;

use crate::error::RelayError;
use std::net::IpAddr;

const IP_LEAF: &str = "ip";
const MOTION_LEAF: &str = "motion";
const LAST_MOTION_LEAF: &str = "lastMotion";

/// Sends relay messages. Implementations must not block the caller.
pub trait RelayTransport: Send + Sync {
    fn publish(&self, topic: &str, retained: bool, payload: &str) -> Result<(), RelayError>;
}

/// Topic names for one camera base topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraTopics {
    base: String,
}

impl CameraTopics {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn ip(&self) -> String {
        format!("{}/{}", self.base, IP_LEAF)
    }

    pub fn motion(&self) -> String {
        format!("{}/{}", self.base, MOTION_LEAF)
    }

    pub fn last_motion(&self) -> String {
        format!("{}/{}", self.base, LAST_MOTION_LEAF)
    }

    /// Subscription filter covering every fact of this camera
    pub fn filter(&self) -> String {
        format!("{}/+", self.base)
    }
}

/// A relay message understood by the recording side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage<'a> {
    Arm(bool),
    Address { base: &'a str, ip: IpAddr },
    Motion { base: &'a str, active: bool },
    LastMotion { base: &'a str, unix_seconds: i64 },
}

impl<'a> RelayMessage<'a> {
    /// Returns `None` for topics or payloads that carry nothing we act on
    pub fn parse(topic: &'a str, payload: &[u8], arm_topic: Option<&str>) -> Option<Self> {
        let payload = std::str::from_utf8(payload).ok()?.trim();

        if arm_topic == Some(topic) {
            return parse_bool(payload).map(RelayMessage::Arm);
        }

        let (base, leaf) = topic.rsplit_once('/')?;
        match leaf {
            IP_LEAF => payload
                .parse()
                .ok()
                .map(|ip| RelayMessage::Address { base, ip }),
            MOTION_LEAF => parse_bool(payload).map(|active| RelayMessage::Motion { base, active }),
            LAST_MOTION_LEAF => payload
                .parse()
                .ok()
                .map(|unix_seconds| RelayMessage::LastMotion { base, unix_seconds }),
            _ => None,
        }
    }
}

fn parse_bool(payload: &str) -> Option<bool> {
    match payload {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
