use crate::config::RelayConfig;
use crate::error::RelayError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{RecordDispatcher, RelayTransport};

const DEFAULT_BROKER_PORT: u16 = 1883;
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Non-blocking publisher over an MQTT client
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl RelayTransport for MqttTransport {
    fn publish(&self, topic: &str, retained: bool, payload: &str) -> Result<(), RelayError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retained, payload.as_bytes().to_vec())
            .map_err(|e| RelayError::Publish {
                topic: topic.to_string(),
                details: e.to_string(),
            })
    }
}

/// Broker connection with its event loop task.
///
/// Topic filters are (re)subscribed on every connection acknowledgement, so
/// subscriptions survive broker restarts.
pub struct MqttRelay {
    client: AsyncClient,
    filters: Vec<String>,
    cancel: CancellationToken,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttRelay {
    /// Start the connection. `filters` are subscribed and incoming messages
    /// handed to `dispatcher` when one is given.
    pub fn start(
        config: &RelayConfig,
        client_suffix: &str,
        filters: Vec<String>,
        dispatcher: Option<Arc<RecordDispatcher>>,
    ) -> Result<Self, RelayError> {
        let (host, port) = parse_broker(&config.broker)?;
        let client_id = format!("{}-{}", config.client_id, client_suffix);

        let mut options = MqttOptions::new(client_id.clone(), host.clone(), port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.max(1)));
        options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let cancel = CancellationToken::new();

        info!("Connecting to relay broker {}:{} as {}", host, port, client_id);

        let handle = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            filters.clone(),
            dispatcher,
            cancel.clone(),
        ));

        Ok(Self {
            client,
            filters,
            cancel,
            event_loop: Mutex::new(Some(handle)),
        })
    }

    pub fn transport(&self) -> Arc<dyn RelayTransport> {
        Arc::new(MqttTransport {
            client: self.client.clone(),
        })
    }

    /// Unsubscribe, disconnect and wait up to `wait` for the event loop to
    /// flush those requests
    pub async fn shutdown(&self, wait: Duration) {
        for filter in &self.filters {
            if let Err(e) = self.client.try_unsubscribe(filter.as_str()) {
                warn!("Failed to unsubscribe {}: {}", filter, e);
            }
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to disconnect from relay broker: {}", e);
        }

        let Some(mut handle) = self.event_loop.lock().await.take() else {
            return;
        };

        if timeout(wait, &mut handle).await.is_err() {
            warn!("Relay event loop did not finish within {:?}, cancelling", wait);
            self.cancel.cancel();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Relay event loop ended abnormally: {}", e);
                }
            }
        }

        info!("Disconnected from relay broker");
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    filters: Vec<String>,
    dispatcher: Option<Arc<RecordDispatcher>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to relay broker");
                for filter in &filters {
                    match client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                        Ok(()) => debug!("Subscribed to {}", filter),
                        Err(e) => warn!("Failed to subscribe {}: {}", filter, e),
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some(dispatcher) = &dispatcher {
                    let outcome = dispatcher.handle(&publish.topic, &publish.payload).await;
                    debug!("Relay message on {}: {:?}", publish.topic, outcome);
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Relay disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Relay connection error: {}, reconnecting", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    debug!("Relay event loop stopped");
}

/// Splits `host[:port]`, defaulting to the standard MQTT port
pub fn parse_broker(broker: &str) -> Result<(String, u16), RelayError> {
    let broker = broker.trim();
    let broker = broker
        .strip_prefix("tcp://")
        .or_else(|| broker.strip_prefix("mqtt://"))
        .unwrap_or(broker);

    let (host, port) = match broker.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| RelayError::Broker {
                broker: broker.to_string(),
                details: e.to_string(),
            })?;
            (host, port)
        }
        None => (broker, DEFAULT_BROKER_PORT),
    };

    if host.is_empty() {
        return Err(RelayError::Broker {
            broker: broker.to_string(),
            details: "missing host".to_string(),
        });
    }

    Ok((host.to_string(), port))
}
