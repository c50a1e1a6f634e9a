//! Per-camera event subscription lifecycle.
//!
//! A subscription is opened once at startup and then kept alive by a renewal
//! task that fires `margin` before each expiry. Renewal failures are degraded
//! operation, never fatal: the task retries and, once the last known expiry
//! has passed, falls back to opening a fresh subscription.

use crate::camera::CameraAddress;
use crate::config::SubscriptionTiming;
use crate::error::SubscriptionError;
use crate::onvif::EventService;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Subscription lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Unsubscribed,
    Active,
    Renewing,
}

/// Point-in-time view of a subscription
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    pub state: SubscriptionState,
    pub expires_at: Option<DateTime<Utc>>,
    pub renewals: u64,
    pub consecutive_failures: u32,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            expires_at: None,
            renewals: 0,
            consecutive_failures: 0,
        }
    }
}

struct RenewalTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared between the subscription owner and its renewal task
struct Shared {
    address: CameraAddress,
    label: String,
    service: Arc<dyn EventService>,
    timing: SubscriptionTiming,
    status: RwLock<SubscriptionStatus>,
    /// Serializes subscribe / renew / unsubscribe requests for this camera
    sequence: Mutex<()>,
}

/// Owns one camera's subscription state and its renewal task
pub struct CameraSubscription {
    shared: Arc<Shared>,
    renewal: Mutex<Option<RenewalTask>>,
}

impl CameraSubscription {
    pub fn new(
        address: CameraAddress,
        label: String,
        service: Arc<dyn EventService>,
        timing: SubscriptionTiming,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                address,
                label,
                service,
                timing,
                status: RwLock::new(SubscriptionStatus::default()),
                sequence: Mutex::new(()),
            }),
            renewal: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.status.read().state
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.shared.status.read().clone()
    }

    /// Open the subscription and start the renewal task.
    ///
    /// Failure here means the camera will never deliver events; callers treat
    /// it as a startup error.
    pub async fn subscribe(&self) -> Result<(), SubscriptionError> {
        let shared = &self.shared;
        let _sequence = shared.sequence.lock().await;

        if shared.status.read().state != SubscriptionState::Unsubscribed {
            return Err(SubscriptionError::AlreadySubscribed {
                address: shared.address.to_string(),
            });
        }

        info!("[{}] Subscribing to events from {}", shared.label, shared.address);

        let issued_at = Instant::now();
        let expiration = expiration_after(shared.timing.duration);
        shared.service.subscribe(&shared.address, expiration).await?;

        {
            let mut status = shared.status.write();
            status.state = SubscriptionState::Active;
            status.expires_at = Some(expiration);
            status.consecutive_failures = 0;
        }

        let first_renewal = issued_at + shared.timing.renewal_delay();
        let lapses_at = issued_at + shared.timing.duration;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_renewal_loop(
            Arc::clone(shared),
            cancel.clone(),
            first_renewal,
            lapses_at,
        ));

        *self.renewal.lock().await = Some(RenewalTask { cancel, handle });

        info!(
            "[{}] Subscribed until {} (renewal in {:?})",
            shared.label,
            expiration,
            shared.timing.renewal_delay()
        );
        Ok(())
    }

    /// Stop renewing and tear the subscription down.
    ///
    /// The renewal task is cancelled and awaited before the unsubscribe
    /// request goes out, so no renewal can be observed afterwards. The state
    /// is `Unsubscribed` on return whatever the request outcome.
    pub async fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        if let Some(task) = self.renewal.lock().await.take() {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    error!("[{}] Renewal task ended abnormally: {}", self.shared.label, e);
                }
            }
        }

        let shared = &self.shared;
        let _sequence = shared.sequence.lock().await;

        if shared.status.read().state == SubscriptionState::Unsubscribed {
            debug!("[{}] Not subscribed, nothing to tear down", shared.label);
            return Ok(());
        }

        info!("[{}] Unsubscribing from {}", shared.label, shared.address);
        let result = shared.service.unsubscribe(&shared.address).await;

        {
            let mut status = shared.status.write();
            status.state = SubscriptionState::Unsubscribed;
            status.expires_at = None;
        }

        if let Err(e) = &result {
            warn!("[{}] Unsubscribe failed: {}", shared.label, e);
        }
        result
    }
}

async fn run_renewal_loop(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    mut next_renewal: Instant,
    mut lapses_at: Instant,
) {
    let timing = shared.timing;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(next_renewal) => {}
        }

        let _sequence = shared.sequence.lock().await;
        if cancel.is_cancelled() {
            break;
        }

        shared.status.write().state = SubscriptionState::Renewing;

        let issued_at = Instant::now();
        let expiration = expiration_after(timing.duration);
        let lapsed = issued_at >= lapses_at;

        let result = if lapsed {
            warn!(
                "[{}] Subscription lapsed after failed renewals, subscribing again",
                shared.label
            );
            shared.service.subscribe(&shared.address, expiration).await
        } else {
            debug!("[{}] Renewing subscription", shared.label);
            shared.service.renew(&shared.address, expiration).await
        };

        let mut status = shared.status.write();
        status.state = SubscriptionState::Active;

        match result {
            Ok(()) => {
                status.expires_at = Some(expiration);
                status.renewals += 1;
                status.consecutive_failures = 0;
                lapses_at = issued_at + timing.duration;
                next_renewal = issued_at + timing.renewal_delay();
                debug!("[{}] Subscription renewed until {}", shared.label, expiration);
            }
            Err(e) => {
                status.consecutive_failures += 1;
                next_renewal = issued_at + timing.retry;
                warn!(
                    "[{}] Renewal failed ({} in a row), retrying in {:?}: {}",
                    shared.label, status.consecutive_failures, timing.retry, e
                );
            }
        }
    }

    debug!("[{}] Renewal task stopped", shared.label);
}

/// Absolute expiration requested from the camera
fn expiration_after(duration: std::time::Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}
