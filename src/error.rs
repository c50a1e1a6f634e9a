use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnvifcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Event server error: {0}")]
    Server(#[from] ServerError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl OnvifcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures talking to a camera's event service
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("{operation} request to {address} failed: {source}")]
    Request {
        address: String,
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} request to {address} rejected with HTTP {status}")]
    Rejected {
        address: String,
        operation: &'static str,
        status: u16,
    },

    #[error("Already subscribed to {address}")]
    AlreadySubscribed { address: String },

    #[error("HTTP client setup failed: {details}")]
    Client { details: String },
}

/// Failures managing the external recording process
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Recording process for {output} has no process id")]
    NoProcessId { output: String },

    #[error("Failed to interrupt recording process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Failures on the publish/subscribe relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Publish to {topic} failed: {details}")]
    Publish { topic: String, details: String },

    #[error("Subscribe to {topic} failed: {details}")]
    Subscribe { topic: String, details: String },

    #[error("Invalid broker address {broker}: {details}")]
    Broker { broker: String, details: String },
}

/// Failures of the inbound event server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Event server failed: {details}")]
    Serve { details: String },

    #[error("Cannot determine local callback address: {details}")]
    LocalAddress { details: String },
}

pub type Result<T> = std::result::Result<T, OnvifcamError>;
