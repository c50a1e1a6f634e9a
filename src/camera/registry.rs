use std::net::IpAddr;
use std::sync::Arc;

use super::Camera;

/// Fixed set of configured cameras, built once at startup
#[derive(Clone, Default)]
pub struct CameraRegistry {
    cameras: Arc<Vec<Arc<Camera>>>,
}

impl CameraRegistry {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self {
            cameras: Arc::new(cameras.into_iter().map(Arc::new).collect()),
        }
    }

    /// Look up the camera behind a connection's remote address. IPv4-mapped
    /// IPv6 peers match their IPv4 camera.
    pub fn find_by_ip(&self, ip: IpAddr) -> Option<&Arc<Camera>> {
        let ip = ip.to_canonical();
        self.cameras
            .iter()
            .find(|camera| camera.identity().address().ip().to_canonical() == ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Camera>> {
        self.cameras.iter()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
