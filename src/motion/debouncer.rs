use crate::camera::CameraIdentity;
use crate::config::RecordingConfig;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::recording::{Recorder, RecordingRequest, RecordingSession};

/// Recording trigger states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Idle,
    Recording,
    /// Motion ceased, stop timer armed
    Draining,
}

#[derive(Debug, Clone, Serialize)]
pub struct MotionStatus {
    pub state: MotionState,
    pub last_motion_at: Option<DateTime<Utc>>,
    pub recording: Option<String>,
}

struct DebounceInner {
    state: MotionState,
    session: Option<RecordingSession>,
    stop_timer: Option<JoinHandle<()>>,
    /// Bumped whenever the stop timer is cancelled or re-armed
    timer_generation: u64,
    last_motion_at: Option<DateTime<Utc>>,
    closed: bool,
}

impl DebounceInner {
    fn cancel_stop_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(handle) = self.stop_timer.take() {
            handle.abort();
        }
    }
}

/// Turns bursty motion on/off signals into one recording per motion episode
pub struct MotionDebouncer {
    camera: CameraIdentity,
    recorder: Arc<dyn Recorder>,
    recording: RecordingConfig,
    quiet_period: Duration,
    inner: Arc<Mutex<DebounceInner>>,
}

impl MotionDebouncer {
    pub fn new(
        camera: CameraIdentity,
        recorder: Arc<dyn Recorder>,
        recording: RecordingConfig,
        quiet_period: Duration,
    ) -> Self {
        Self {
            camera,
            recorder,
            recording,
            quiet_period,
            inner: Arc::new(Mutex::new(DebounceInner {
                state: MotionState::Idle,
                session: None,
                stop_timer: None,
                timer_generation: 0,
                last_motion_at: None,
                closed: false,
            })),
        }
    }

    pub fn camera(&self) -> &CameraIdentity {
        &self.camera
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Handle a motion-start signal and return the resulting state
    pub async fn on_motion_start(&self) -> MotionState {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            debug!("[{}] Ignoring motion start after shutdown", self.camera);
            return inner.state;
        }

        inner.last_motion_at = Some(Utc::now());
        inner.cancel_stop_timer();

        match inner.state {
            MotionState::Recording => {
                debug!("[{}] Motion start while already recording", self.camera);
            }
            MotionState::Draining => {
                inner.state = MotionState::Recording;
                info!("[{}] Motion resumed, continuing recording", self.camera);
            }
            MotionState::Idle => {
                let request = RecordingRequest::for_camera(&self.camera, &self.recording, Local::now());
                match self.recorder.start(&request).await {
                    Ok(session) => {
                        info!(
                            "[{}] Motion detected, recording to {}",
                            self.camera,
                            session.output().display()
                        );
                        inner.session = Some(session);
                        inner.state = MotionState::Recording;
                    }
                    Err(e) => {
                        error!("[{}] Failed to start recording: {}", self.camera, e);
                    }
                }
            }
        }

        inner.state
    }

    /// Handle a motion-stop signal and return the resulting state
    pub async fn on_motion_stop(&self) -> MotionState {
        let mut inner = self.inner.lock().await;

        if inner.closed || inner.session.is_none() {
            debug!("[{}] Motion stop with no live recording", self.camera);
            return inner.state;
        }

        inner.cancel_stop_timer();
        let generation = inner.timer_generation;
        let shared = Arc::clone(&self.inner);
        let recorder = Arc::clone(&self.recorder);
        let camera = self.camera.clone();
        let quiet_period = self.quiet_period;

        inner.stop_timer = Some(tokio::spawn(async move {
            sleep(quiet_period).await;

            let mut inner = shared.lock().await;
            if inner.timer_generation != generation || inner.state != MotionState::Draining {
                return;
            }

            inner.stop_timer = None;
            inner.state = MotionState::Idle;
            if let Some(session) = inner.session.take() {
                info!("[{}] Quiet period elapsed, stopping recording", camera);
                if let Err(e) = recorder.stop(session).await {
                    warn!("[{}] Failed to stop recording: {}", camera, e);
                }
            }
        }));
        inner.state = MotionState::Draining;

        debug!(
            "[{}] Motion stopped, recording ends in {:?} unless motion resumes",
            self.camera, self.quiet_period
        );
        inner.state
    }

    /// Cancel the stop timer and interrupt any live recording. Later motion
    /// signals are ignored.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        inner.cancel_stop_timer();
        inner.state = MotionState::Idle;

        if let Some(session) = inner.session.take() {
            info!("[{}] Stopping recording for shutdown", self.camera);
            if let Err(e) = self.recorder.stop(session).await {
                warn!("[{}] Failed to stop recording: {}", self.camera, e);
            }
        }
    }

    pub async fn state(&self) -> MotionState {
        self.inner.lock().await.state
    }

    pub async fn last_motion_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_motion_at
    }

    pub async fn status(&self) -> MotionStatus {
        let inner = self.inner.lock().await;
        MotionStatus {
            state: inner.state,
            last_motion_at: inner.last_motion_at,
            recording: inner
                .session
                .as_ref()
                .map(|s| s.output().display().to_string()),
        }
    }
}
