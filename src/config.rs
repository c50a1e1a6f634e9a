use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::camera::CameraAddress;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OnvifcamConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    pub subscription: SubscriptionConfig,
    pub recording: RecordingConfig,
    pub relay: RelayConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// IP address the event server binds to
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    /// Port the event server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address cameras call back to; discovered when unset
    #[serde(default)]
    pub callback_ip: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera IP, optionally with the port of its ONVIF service
    pub address: String,

    /// Human readable name, also the relay base topic
    #[serde(default)]
    pub name: Option<String>,

    /// Quiet period override for this camera
    #[serde(default)]
    pub post_motion_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SubscriptionConfig {
    /// Lifetime requested for each subscription or renewal
    #[serde(default = "default_subscription_duration")]
    pub duration_seconds: u64,

    /// How long before expiry a renewal is issued
    #[serde(default = "default_renewal_margin")]
    pub renewal_margin_seconds: u64,

    /// Delay before retrying a failed renewal
    #[serde(default = "default_retry_seconds")]
    pub retry_seconds: u64,

    /// Timeout for each request to a camera
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Directory recordings are written to
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Recording tool
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// RTSP port of the camera media stream
    #[serde(default = "default_stream_port")]
    pub stream_port: u16,

    /// RTSP path of the camera media stream
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Default quiet period after motion stops
    #[serde(default = "default_post_motion_seconds")]
    pub post_motion_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// MQTT broker as host:port
    #[serde(default = "default_broker")]
    pub broker: String,

    /// MQTT client id prefix
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Camera base topics consumed by the recording side
    #[serde(default)]
    pub topics: Vec<String>,

    /// Optional topic carrying "true"/"false" to arm or disarm recording
    #[serde(default)]
    pub arm_topic: Option<String>,

    /// MQTT keep alive interval
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Enable automatic deletion of old recordings
    #[serde(default = "default_trim_old")]
    pub trim_old: bool,

    /// Retention period in days
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Hours between retention sweeps
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_hours: u64,

    /// Upper bound for each shutdown step
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

/// Which half (or both halves) of the pipeline this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Subscribe, receive, debounce and record in one process
    Standalone,
    /// Subscribe and receive, publish motion to the relay
    Detect,
    /// Consume motion from the relay, debounce and record
    Record,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Standalone => write!(f, "standalone"),
            DeploymentMode::Detect => write!(f, "detect"),
            DeploymentMode::Record => write!(f, "record"),
        }
    }
}

impl DeploymentMode {
    pub fn subscribes_cameras(&self) -> bool {
        matches!(self, DeploymentMode::Standalone | DeploymentMode::Detect)
    }

    pub fn records(&self) -> bool {
        matches!(self, DeploymentMode::Standalone | DeploymentMode::Record)
    }
}

/// Subscription timing derived from [`SubscriptionConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionTiming {
    pub duration: Duration,
    pub margin: Duration,
    pub retry: Duration,
}

impl SubscriptionTiming {
    /// Delay between a successful request and the next renewal
    pub fn renewal_delay(&self) -> Duration {
        self.duration.saturating_sub(self.margin)
    }
}

impl SubscriptionConfig {
    pub fn timing(&self) -> SubscriptionTiming {
        SubscriptionTiming {
            duration: Duration::from_secs(self.duration_seconds),
            margin: Duration::from_secs(self.renewal_margin_seconds),
            retry: Duration::from_secs(self.retry_seconds),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl RecordingConfig {
    pub fn default_quiet_period(&self) -> Duration {
        Duration::from_secs(self.post_motion_seconds)
    }
}

impl CameraConfig {
    /// Quiet period for this camera, falling back to the recording default
    pub fn quiet_period(&self, recording: &RecordingConfig) -> Duration {
        self.post_motion_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| recording.default_quiet_period())
    }
}

/// Parses the command line form `ADDRESS` or `ADDRESS=NAME`
impl FromStr for CameraConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (address, name) = match s.split_once('=') {
            Some((address, name)) => (address.trim(), Some(name.trim())),
            None => (s, None),
        };

        address
            .parse::<CameraAddress>()
            .map_err(|e| format!("invalid camera address '{}': {}", address, e))?;

        if let Some("") = name {
            return Err(format!("empty camera name for '{}'", address));
        }

        Ok(CameraConfig {
            address: address.to_string(),
            name: name.map(str::to_string),
            post_motion_seconds: None,
        })
    }
}

impl OnvifcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("onvifcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("server.bind_ip", default_bind_ip())?
            .set_default("server.port", default_port())?
            .set_default("cameras", Vec::<String>::new())?
            .set_default("subscription.duration_seconds", default_subscription_duration())?
            .set_default("subscription.renewal_margin_seconds", default_renewal_margin())?
            .set_default("subscription.retry_seconds", default_retry_seconds())?
            .set_default("subscription.request_timeout_seconds", default_request_timeout())?
            .set_default("recording.output_path", default_output_path())?
            .set_default("recording.ffmpeg_path", default_ffmpeg_path())?
            .set_default("recording.stream_port", default_stream_port())?
            .set_default("recording.stream_path", default_stream_path())?
            .set_default("recording.post_motion_seconds", default_post_motion_seconds())?
            .set_default("relay.broker", default_broker())?
            .set_default("relay.client_id", default_client_id())?
            .set_default("relay.topics", Vec::<String>::new())?
            .set_default("relay.keep_alive_seconds", default_keep_alive())?
            .set_default("system.debug", false)?
            .set_default("system.trim_old", default_trim_old())?
            .set_default("system.retention_days", default_retention_days())?
            .set_default("system.cleanup_interval_hours", default_cleanup_interval())?
            .set_default("system.shutdown_timeout_seconds", default_shutdown_timeout())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with ONVIFCAM_ prefix
            .add_source(Environment::with_prefix("ONVIFCAM").separator("__"))
            .build()?;

        let config: OnvifcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values for the given deployment mode
    pub fn validate(&self, mode: DeploymentMode) -> Result<(), ConfigError> {
        let subscription = &self.subscription;

        if subscription.duration_seconds == 0 {
            return Err(ConfigError::Message(
                "Subscription duration_seconds must be greater than 0".to_string(),
            ));
        }

        if subscription.renewal_margin_seconds == 0
            || subscription.renewal_margin_seconds >= subscription.duration_seconds
        {
            return Err(ConfigError::Message(
                "Subscription renewal_margin_seconds must be between 1 and duration_seconds"
                    .to_string(),
            ));
        }

        if subscription.retry_seconds == 0
            || subscription.retry_seconds >= subscription.duration_seconds
        {
            return Err(ConfigError::Message(
                "Subscription retry_seconds must be between 1 and duration_seconds".to_string(),
            ));
        }

        if subscription.request_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Subscription request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.system.cleanup_interval_hours == 0 {
            return Err(ConfigError::Message(
                "System cleanup_interval_hours must be greater than 0".to_string(),
            ));
        }

        if mode.subscribes_cameras() {
            if self.cameras.is_empty() {
                return Err(ConfigError::Message("No cameras configured".to_string()));
            }

            let mut seen = HashSet::new();
            for camera in &self.cameras {
                let address = camera.address.parse::<CameraAddress>().map_err(|e| {
                    ConfigError::Message(format!(
                        "Invalid camera address '{}': {}",
                        camera.address, e
                    ))
                })?;

                if !seen.insert(address.ip()) {
                    return Err(ConfigError::Message(format!(
                        "Camera address {} configured more than once",
                        address.ip()
                    )));
                }

                if mode == DeploymentMode::Detect
                    && camera.name.as_deref().map_or(true, str::is_empty)
                {
                    return Err(ConfigError::Message(format!(
                        "Camera {} needs a name to be used as its relay topic",
                        camera.address
                    )));
                }
            }
        }

        if mode == DeploymentMode::Record && self.relay.topics.is_empty() {
            return Err(ConfigError::Message(
                "No camera topics configured".to_string(),
            ));
        }

        if mode.records() && self.recording.output_path.trim().is_empty() {
            return Err(ConfigError::Message(
                "No recording output path configured".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for OnvifcamConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_ip: default_bind_ip(),
                port: default_port(),
                callback_ip: None,
            },
            cameras: Vec::new(),
            subscription: SubscriptionConfig {
                duration_seconds: default_subscription_duration(),
                renewal_margin_seconds: default_renewal_margin(),
                retry_seconds: default_retry_seconds(),
                request_timeout_seconds: default_request_timeout(),
            },
            recording: RecordingConfig {
                output_path: default_output_path(),
                ffmpeg_path: default_ffmpeg_path(),
                stream_port: default_stream_port(),
                stream_path: default_stream_path(),
                post_motion_seconds: default_post_motion_seconds(),
            },
            relay: RelayConfig {
                broker: default_broker(),
                client_id: default_client_id(),
                topics: Vec::new(),
                arm_topic: None,
                keep_alive_seconds: default_keep_alive(),
            },
            system: SystemConfig {
                debug: false,
                trim_old: default_trim_old(),
                retention_days: default_retention_days(),
                cleanup_interval_hours: default_cleanup_interval(),
                shutdown_timeout_seconds: default_shutdown_timeout(),
            },
        }
    }
}

// Default value functions
fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

fn default_subscription_duration() -> u64 {
    600
}
fn default_renewal_margin() -> u64 {
    30
}
fn default_retry_seconds() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    15
}

fn default_output_path() -> String {
    "./recordings".to_string()
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}
fn default_stream_port() -> u16 {
    554
}
fn default_stream_path() -> String {
    "/stream0".to_string()
}
fn default_post_motion_seconds() -> u64 {
    5
}

fn default_broker() -> String {
    "127.0.0.1:1883".to_string()
}
fn default_client_id() -> String {
    "onvifcam".to_string()
}
fn default_keep_alive() -> u64 {
    5
}

fn default_trim_old() -> bool {
    true
}
fn default_retention_days() -> u32 {
    30
}
fn default_cleanup_interval() -> u64 {
    24
}
fn default_shutdown_timeout() -> u64 {
    10
}
