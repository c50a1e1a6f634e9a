use super::types::component;
use super::{ComponentState, OnvifcamOrchestrator};
use crate::camera::{Camera, CameraAddress, CameraIdentity, CameraRegistry, MotionSink};
use crate::config::{CameraConfig, DeploymentMode};
use crate::error::{OnvifcamError, Result};
use crate::motion::MotionDebouncer;
use crate::netif::{callback_url, resolve_callback_ip};
use crate::onvif::{EventService, SubscriptionClient};
use crate::receiver::EventServer;
use crate::relay::{ArmGate, CameraTopics, MotionPublisher, RecordDispatcher, RelayTransport, TopicRegistry};
use crate::retention::RetentionSweeper;
use crate::subscription::CameraSubscription;
use std::sync::Arc;
use tracing::{error, info, warn};

#[cfg(feature = "relay")]
use crate::relay::MqttRelay;

impl OnvifcamOrchestrator {
    /// Resolve the callback address and build the collaborators the mode
    /// needs. Nothing is contacted yet.
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing onvifcam in {} mode", self.mode);

        let mut components = Vec::new();
        if self.mode != DeploymentMode::Standalone {
            components.push(component::RELAY);
        }
        if self.mode.subscribes_cameras() {
            components.push(component::SERVER);
            components.push(component::CAMERAS);
        }
        if self.mode.records() {
            components.push(component::RECORDER);
            if self.config.system.trim_old {
                components.push(component::RETENTION);
            }
        }
        self.component_states.register(&components).await;

        if self.mode.subscribes_cameras() {
            let first = parse_address(&self.config.cameras[0])?;
            let ip = resolve_callback_ip(&self.config.server, &first).await?;
            let url = callback_url(ip, self.config.server.port);
            info!("Cameras will push events to {}", url);

            if self.event_service.is_none() {
                let client =
                    SubscriptionClient::new(url.clone(), self.config.subscription.request_timeout())?;
                self.event_service = Some(Arc::new(client));
            }
            self.callback_url = Some(url);
        }

        if self.mode == DeploymentMode::Record {
            let registry = Arc::new(TopicRegistry::new(
                Arc::clone(&self.recorder),
                self.config.recording.clone(),
            ));
            self.dispatcher = Some(Arc::new(RecordDispatcher::new(
                registry,
                Arc::new(ArmGate::new()),
                self.config.relay.arm_topic.clone(),
            )));
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start every component. An initial subscription failure tears down
    /// whatever was already started and is returned as an error.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting onvifcam in {} mode", self.mode);

        let transport = if self.mode != DeploymentMode::Standalone {
            Some(self.start_relay().await?)
        } else {
            None
        };

        if self.mode.subscribes_cameras() {
            self.cameras = self.build_cameras(transport)?;

            self.component_states
                .set(component::SERVER, ComponentState::Starting)
                .await;
            let server =
                match EventServer::bind(&self.config.server, self.cameras.clone(), self.mode).await {
                    Ok(server) => server,
                    Err(e) => {
                        error!("Failed to start event server: {}", e);
                        self.component_states
                            .set(component::SERVER, ComponentState::Failed)
                            .await;
                        self.abandon_startup().await;
                        return Err(e.into());
                    }
                };
            self.server_task = Some(tokio::spawn(
                server.serve(self.cancellation_token.child_token()),
            ));
            self.component_states
                .set(component::SERVER, ComponentState::Running)
                .await;

            if let Err(e) = self.subscribe_cameras().await {
                self.abandon_startup().await;
                return Err(e);
            }
        }

        if self.mode.records() {
            self.component_states
                .set(component::RECORDER, ComponentState::Running)
                .await;

            if self.config.system.trim_old {
                let sweeper =
                    RetentionSweeper::from_config(&self.config.recording, &self.config.system);
                self.sweeper_task = Some(sweeper.start(self.cancellation_token.child_token()));
                self.component_states
                    .set(component::RETENTION, ComponentState::Running)
                    .await;
            }
        }

        info!("All components started successfully");
        Ok(())
    }

    /// Tear down a partial start; the startup error stays the one reported
    async fn abandon_startup(&mut self) {
        match self.shutdown().await {
            Ok(0) => info!("Partial startup torn down"),
            Ok(failures) => warn!("Partial startup teardown had {} failed step(s)", failures),
            Err(e) => warn!("Partial startup teardown failed: {}", e),
        }
    }

    async fn subscribe_cameras(&self) -> Result<()> {
        self.component_states
            .set(component::CAMERAS, ComponentState::Starting)
            .await;

        for camera in self.cameras.iter() {
            if let Err(e) = camera.start().await {
                error!(
                    "[{}] Initial subscription failed, camera would never deliver events: {}",
                    camera.identity(),
                    e
                );
                self.component_states
                    .set(component::CAMERAS, ComponentState::Failed)
                    .await;
                return Err(e.into());
            }
        }

        self.component_states
            .set(component::CAMERAS, ComponentState::Running)
            .await;
        info!("Subscribed to {} camera(s)", self.cameras.len());
        Ok(())
    }

    /// Connect to the broker, or use the injected transport
    async fn start_relay(&mut self) -> Result<Arc<dyn RelayTransport>> {
        self.component_states
            .set(component::RELAY, ComponentState::Starting)
            .await;

        if let Some(transport) = &self.relay_transport {
            let transport = Arc::clone(transport);
            self.component_states
                .set(component::RELAY, ComponentState::Running)
                .await;
            return Ok(transport);
        }

        #[cfg(feature = "relay")]
        {
            let mut filters = Vec::new();
            if self.mode == DeploymentMode::Record {
                filters.extend(
                    self.config
                        .relay
                        .topics
                        .iter()
                        .map(|topic| CameraTopics::new(topic.as_str()).filter()),
                );
                filters.extend(self.config.relay.arm_topic.iter().cloned());
            }

            let relay = MqttRelay::start(
                &self.config.relay,
                &self.mode.to_string(),
                filters,
                self.dispatcher.clone(),
            )?;
            let transport = relay.transport();
            self.relay = Some(relay);
            self.component_states
                .set(component::RELAY, ComponentState::Running)
                .await;
            Ok(transport)
        }

        #[cfg(not(feature = "relay"))]
        {
            self.component_states
                .set(component::RELAY, ComponentState::Failed)
                .await;
            Err(OnvifcamError::component(
                component::RELAY,
                "built without the `relay` feature",
            ))
        }
    }

    fn build_cameras(&self, transport: Option<Arc<dyn RelayTransport>>) -> Result<CameraRegistry> {
        let service: Arc<dyn EventService> = self
            .event_service
            .clone()
            .ok_or_else(|| Self::missing("event service"))?;
        let timing = self.config.subscription.timing();
        let recording = &self.config.recording;

        let mut cameras = Vec::with_capacity(self.config.cameras.len());
        for camera_config in &self.config.cameras {
            let identity =
                CameraIdentity::new(parse_address(camera_config)?, camera_config.name.clone());

            let sink = match (&transport, self.mode) {
                (Some(transport), DeploymentMode::Detect) => MotionSink::Relay(MotionPublisher::new(
                    CameraTopics::new(identity.label()),
                    Arc::clone(transport),
                )),
                _ => MotionSink::Local(Arc::new(MotionDebouncer::new(
                    identity.clone(),
                    Arc::clone(&self.recorder),
                    recording.clone(),
                    camera_config.quiet_period(recording),
                ))),
            };

            let subscription = CameraSubscription::new(
                *identity.address(),
                identity.label(),
                Arc::clone(&service),
                timing,
            );

            info!("[{}] Configured camera at {}", identity, identity.address());
            cameras.push(Camera::new(identity, subscription, sink));
        }

        if cameras.is_empty() {
            warn!("No cameras configured");
        }
        Ok(CameraRegistry::new(cameras))
    }
}

fn parse_address(camera: &CameraConfig) -> Result<CameraAddress> {
    camera.address.parse::<CameraAddress>().map_err(|e| {
        OnvifcamError::Config(::config::ConfigError::Message(format!(
            "Invalid camera address '{}': {}",
            camera.address, e
        )))
    })
}
