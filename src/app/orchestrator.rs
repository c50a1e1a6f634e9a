use super::state::ComponentStates;
use super::types::ShutdownReason;
use crate::camera::CameraRegistry;
use crate::config::{DeploymentMode, OnvifcamConfig};
use crate::error::{OnvifcamError, Result, ServerError};
use crate::motion::{FfmpegRecorder, Recorder};
use crate::onvif::EventService;
use crate::relay::{RecordDispatcher, RelayTransport};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "relay")]
use crate::relay::MqttRelay;

/// Clonable handle that asks a running orchestrator to shut down
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownTrigger {
    /// Returns false if shutdown was already requested
    pub async fn trigger(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

/// Wires cameras, the event server, the relay and the retention sweep
/// together for one deployment mode
pub struct OnvifcamOrchestrator {
    pub(super) config: OnvifcamConfig,
    pub(super) mode: DeploymentMode,

    // Collaborators
    pub(super) event_service: Option<Arc<dyn EventService>>,
    pub(super) recorder: Arc<dyn Recorder>,
    pub(super) relay_transport: Option<Arc<dyn RelayTransport>>,

    // Components
    pub(super) cameras: CameraRegistry,
    pub(super) callback_url: Option<String>,
    pub(super) dispatcher: Option<Arc<RecordDispatcher>>,
    #[cfg(feature = "relay")]
    pub(super) relay: Option<MqttRelay>,
    pub(super) server_task: Option<JoinHandle<std::result::Result<(), ServerError>>>,
    pub(super) sweeper_task: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: ComponentStates,
    pub(super) shutdown_trigger: ShutdownTrigger,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl OnvifcamOrchestrator {
    /// Create an orchestrator for `mode`. The configuration must be valid
    /// for that mode.
    pub fn new(config: OnvifcamConfig, mode: DeploymentMode) -> Result<Self> {
        config.validate(mode)?;

        let recorder: Arc<dyn Recorder> = Arc::new(FfmpegRecorder::from_config(&config.recording));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            mode,
            event_service: None,
            recorder,
            relay_transport: None,
            cameras: CameraRegistry::default(),
            callback_url: None,
            dispatcher: None,
            #[cfg(feature = "relay")]
            relay: None,
            server_task: None,
            sweeper_task: None,
            component_states: ComponentStates::default(),
            shutdown_trigger: ShutdownTrigger {
                sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            },
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Use `service` instead of the HTTP subscription client
    pub fn with_event_service(mut self, service: Arc<dyn EventService>) -> Self {
        self.event_service = Some(service);
        self
    }

    /// Use `recorder` instead of ffmpeg
    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Publish relay messages through `transport` instead of the broker
    pub fn with_relay_transport(mut self, transport: Arc<dyn RelayTransport>) -> Self {
        self.relay_transport = Some(transport);
        self
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn cameras(&self) -> &CameraRegistry {
        &self.cameras
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    /// Recording-side dispatcher, present in `record` mode after initialization
    pub fn dispatcher(&self) -> Option<&Arc<RecordDispatcher>> {
        self.dispatcher.as_ref()
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown_trigger.clone()
    }

    pub fn component_states(&self) -> &ComponentStates {
        &self.component_states
    }

    pub(super) fn missing(component: &str) -> OnvifcamError {
        OnvifcamError::component(component, "not initialized")
    }
}
