use crate::camera::{CameraAddress, CameraIdentity};
use crate::config::RecordingConfig;
use crate::motion::{MotionDebouncer, Recorder};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Topic-keyed camera records on the recording side, created lazily the
/// first time an address is seen for a topic and kept for the process
/// lifetime. Once closed, no further cameras are created.
pub struct TopicRegistry {
    recorder: Arc<dyn Recorder>,
    recording: RecordingConfig,
    quiet_period: Duration,
    cameras: RwLock<HashMap<String, Arc<MotionDebouncer>>>,
    closed: AtomicBool,
}

impl TopicRegistry {
    pub fn new(recorder: Arc<dyn Recorder>, recording: RecordingConfig) -> Self {
        let quiet_period = recording.default_quiet_period();
        Self {
            recorder,
            recording,
            quiet_period,
            cameras: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn get(&self, base: &str) -> Option<Arc<MotionDebouncer>> {
        self.cameras.read().get(base).cloned()
    }

    /// Returns the camera for `base`, creating it with `ip` if unseen, and
    /// whether it was created by this call. `None` after [`close`](Self::close)
    /// for a topic that was never seen.
    pub fn register(&self, base: &str, ip: IpAddr) -> Option<(Arc<MotionDebouncer>, bool)> {
        if let Some(existing) = self.get(base) {
            if existing.camera().address().ip() != ip {
                debug!(
                    "[{}] Ignoring new address {}, keeping {}",
                    base,
                    ip,
                    existing.camera().address().ip()
                );
            }
            return Some((existing, false));
        }

        let mut cameras = self.cameras.write();
        // Another dispatch may have won the race between the read and write locks
        if let Some(existing) = cameras.get(base) {
            return Some((Arc::clone(existing), false));
        }
        if self.closed.load(Ordering::SeqCst) {
            debug!("[{}] Registry closed, not creating camera at {}", base, ip);
            return None;
        }

        let identity = CameraIdentity::new(CameraAddress::new(ip, None), Some(base.to_string()));
        let debouncer = Arc::new(MotionDebouncer::new(
            identity,
            Arc::clone(&self.recorder),
            self.recording.clone(),
            self.quiet_period,
        ));
        cameras.insert(base.to_string(), Arc::clone(&debouncer));

        info!("[{}] Found camera at {}", base, ip);
        Some((debouncer, true))
    }

    /// Stop creating cameras and return the ones that exist
    pub fn close(&self) -> Vec<Arc<MotionDebouncer>> {
        // Taken under the write lock so no registration can slip in between
        let cameras = self.cameras.write();
        self.closed.store(true, Ordering::SeqCst);
        cameras.values().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn cameras(&self) -> Vec<Arc<MotionDebouncer>> {
        self.cameras.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cameras.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.read().is_empty()
    }
}
