//! In-memory collaborators for unit tests.

use crate::camera::{Camera, CameraAddress, CameraIdentity, MotionSink};
use crate::config::{OnvifcamConfig, SubscriptionTiming};
use crate::error::{RecordingError, RelayError, SubscriptionError};
use crate::motion::{MotionDebouncer, Recorder, RecordingRequest, RecordingSession};
use crate::onvif::EventService;
use crate::relay::{CameraTopics, MotionPublisher, RelayTransport};
use crate::subscription::CameraSubscription;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Subscribe,
    Renew,
    Unsubscribe,
}

/// Records calls with their virtual issue time. Scripted failures are
/// consumed in order; everything else succeeds.
#[derive(Default)]
pub struct FakeEventService {
    calls: Mutex<Vec<(Call, CameraAddress, Instant)>>,
    failures: Mutex<VecDeque<Call>>,
    unsubscribe_delay: Mutex<Option<Duration>>,
    rejected: Mutex<Vec<CameraAddress>>,
}

impl FakeEventService {
    /// Reject every subscribe request for `address`
    pub fn reject_subscribe(&self, address: &CameraAddress) {
        self.rejected.lock().push(*address);
    }

    /// Make every unsubscribe request take `delay` to answer
    pub fn delay_unsubscribe(&self, delay: Duration) {
        *self.unsubscribe_delay.lock() = Some(delay);
    }

    pub fn fail_next(&self, call: Call) {
        self.failures.lock().push_back(call);
    }

    pub fn calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().iter().map(|(c, _, at)| (*c, *at)).collect()
    }

    pub fn kinds(&self) -> Vec<Call> {
        self.calls.lock().iter().map(|(c, _, _)| *c).collect()
    }

    pub fn calls_for(&self, address: &CameraAddress) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, a, _)| a == address)
            .map(|(c, _, _)| *c)
            .collect()
    }

    fn record(&self, call: Call, address: &CameraAddress) -> Result<(), SubscriptionError> {
        self.calls.lock().push((call, *address, Instant::now()));
        if call == Call::Subscribe && self.rejected.lock().contains(address) {
            return Err(SubscriptionError::Rejected {
                address: address.to_string(),
                operation: "test",
                status: 400,
            });
        }
        let mut failures = self.failures.lock();
        if failures.front() == Some(&call) {
            failures.pop_front();
            return Err(SubscriptionError::Rejected {
                address: address.to_string(),
                operation: "test",
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventService for FakeEventService {
    async fn subscribe(
        &self,
        address: &CameraAddress,
        _expiration: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.record(Call::Subscribe, address)
    }

    async fn renew(
        &self,
        address: &CameraAddress,
        _expiration: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.record(Call::Renew, address)
    }

    async fn unsubscribe(&self, address: &CameraAddress) -> Result<(), SubscriptionError> {
        let result = self.record(Call::Unsubscribe, address);
        let delay = *self.unsubscribe_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// Records start/stop calls in virtual time without spawning anything
#[derive(Default)]
pub struct FakeRecorder {
    starts: Mutex<Vec<(Instant, RecordingRequest)>>,
    stops: Mutex<Vec<(Instant, PathBuf)>>,
    fail_starts: Mutex<u32>,
}

impl FakeRecorder {
    pub fn fail_next_starts(&self, count: u32) {
        *self.fail_starts.lock() = count;
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.lock().len()
    }

    pub fn stop_times(&self) -> Vec<Instant> {
        self.stops.lock().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait::async_trait]
impl Recorder for FakeRecorder {
    async fn start(&self, request: &RecordingRequest) -> Result<RecordingSession, RecordingError> {
        {
            let mut failures = self.fail_starts.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(RecordingError::Spawn {
                    program: "ffmpeg".to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
        }

        self.starts.lock().push((Instant::now(), request.clone()));
        Ok(RecordingSession::new(request.output_path(), None))
    }

    async fn stop(&self, session: RecordingSession) -> Result<(), RecordingError> {
        self.stops
            .lock()
            .push((Instant::now(), session.output().to_path_buf()));
        Ok(())
    }
}

/// Captures published relay messages, or fails every publish
#[derive(Default)]
pub struct FakeTransport {
    messages: Mutex<Vec<(String, bool, String)>>,
    pub fail: bool,
}

impl FakeTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, bool, String)> {
        self.messages.lock().clone()
    }
}

impl RelayTransport for FakeTransport {
    fn publish(&self, topic: &str, retained: bool, payload: &str) -> Result<(), RelayError> {
        if self.fail {
            return Err(RelayError::Publish {
                topic: topic.to_string(),
                details: "broker unavailable".to_string(),
            });
        }
        self.messages
            .lock()
            .push((topic.to_string(), retained, payload.to_string()));
        Ok(())
    }
}

pub fn test_timing() -> SubscriptionTiming {
    SubscriptionTiming {
        duration: Duration::from_secs(600),
        margin: Duration::from_secs(30),
        retry: Duration::from_secs(10),
    }
}

pub fn test_identity(address: &str, name: Option<&str>) -> CameraIdentity {
    CameraIdentity::new(
        address.parse().expect("test address"),
        name.map(str::to_string),
    )
}

pub fn test_subscription(
    identity: &CameraIdentity,
    service: &Arc<FakeEventService>,
) -> CameraSubscription {
    CameraSubscription::new(
        *identity.address(),
        identity.label(),
        Arc::clone(service) as Arc<dyn EventService>,
        test_timing(),
    )
}

/// Camera recording locally through `recorder` with a 5 second quiet period
pub fn local_camera(
    address: &str,
    name: Option<&str>,
    service: &Arc<FakeEventService>,
    recorder: &Arc<FakeRecorder>,
) -> Camera {
    let identity = test_identity(address, name);
    let debouncer = MotionDebouncer::new(
        identity.clone(),
        Arc::clone(recorder) as Arc<dyn Recorder>,
        OnvifcamConfig::default().recording,
        Duration::from_secs(5),
    );
    Camera::new(
        identity.clone(),
        test_subscription(&identity, service),
        MotionSink::Local(Arc::new(debouncer)),
    )
}

/// Camera publishing its motion through `transport`
pub fn relayed_camera(
    address: &str,
    name: &str,
    service: &Arc<FakeEventService>,
    transport: &Arc<FakeTransport>,
) -> Camera {
    let identity = test_identity(address, Some(name));
    let publisher = MotionPublisher::new(
        CameraTopics::new(name),
        Arc::clone(transport) as Arc<dyn RelayTransport>,
    );
    Camera::new(
        identity.clone(),
        test_subscription(&identity, service),
        MotionSink::Relay(publisher),
    )
}
