mod address;
mod device;
mod registry;

pub use address::{CameraAddress, CameraIdentity};
pub use device::{Camera, CameraStatus, MotionSink};
pub use registry::CameraRegistry;
