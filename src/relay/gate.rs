use std::sync::atomic::{AtomicBool, Ordering};

/// External arm/disarm switch for recording. Starts armed.
#[derive(Debug)]
pub struct ArmGate {
    armed: AtomicBool,
}

impl ArmGate {
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Relaxed)
    }

    /// Returns the previous value
    pub fn set(&self, armed: bool) -> bool {
        self.armed.swap(armed, Ordering::Relaxed)
    }
}

impl Default for ArmGate {
    fn default() -> Self {
        Self::new()
    }
}
