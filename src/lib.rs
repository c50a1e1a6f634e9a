pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod motion;
pub mod netif;
pub mod onvif;
pub mod receiver;
pub mod relay;
pub mod retention;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use app::{ComponentState, OnvifcamOrchestrator, ShutdownReason, ShutdownTrigger};
pub use camera::{Camera, CameraAddress, CameraIdentity, CameraRegistry};
pub use config::{DeploymentMode, OnvifcamConfig};
pub use error::{OnvifcamError, Result};
pub use motion::{FfmpegRecorder, MotionDebouncer, MotionState, Recorder};
pub use onvif::{EventService, SubscriptionClient};
pub use receiver::EventServer;
pub use relay::{RecordDispatcher, RelayTransport};
pub use retention::{RetentionSweeper, SweepResult};
pub use subscription::{CameraSubscription, SubscriptionState, SubscriptionStatus};
