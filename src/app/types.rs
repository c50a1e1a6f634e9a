/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

/// Component names used for state tracking
pub(crate) mod component {
    pub const RELAY: &str = "relay";
    pub const SERVER: &str = "server";
    pub const CAMERAS: &str = "cameras";
    pub const RECORDER: &str = "recorder";
    pub const RETENTION: &str = "retention";
}
