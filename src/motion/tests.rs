use super::*;
use crate::config::OnvifcamConfig;
use crate::testing::{test_identity, FakeRecorder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn create_test_debouncer(quiet_seconds: u64) -> (Arc<FakeRecorder>, MotionDebouncer) {
    let recorder = Arc::new(FakeRecorder::default());
    let config = OnvifcamConfig::default();
    let camera = test_identity("192.168.1.100", Some("home/garage/camera"));
    let debouncer = MotionDebouncer::new(
        camera,
        Arc::clone(&recorder) as Arc<dyn Recorder>,
        config.recording,
        Duration::from_secs(quiet_seconds),
    );
    (recorder, debouncer)
}

async fn advance_to(origin: Instant, seconds: f64) {
    tokio::time::sleep_until(origin + Duration::from_secs_f64(seconds)).await;
}

#[tokio::test(start_paused = true)]
async fn test_bursty_motion_produces_one_recording() {
    let (recorder, debouncer) = create_test_debouncer(5);
    let origin = Instant::now();

    assert_eq!(debouncer.on_motion_start().await, MotionState::Recording);

    advance_to(origin, 2.0).await;
    assert_eq!(debouncer.on_motion_stop().await, MotionState::Draining);

    advance_to(origin, 3.0).await;
    assert_eq!(debouncer.on_motion_start().await, MotionState::Recording);

    // The stop armed at t=2 would have fired here
    advance_to(origin, 7.5).await;
    assert_eq!(debouncer.state().await, MotionState::Recording);
    assert!(recorder.stop_times().is_empty());

    advance_to(origin, 10.0).await;
    assert_eq!(debouncer.on_motion_stop().await, MotionState::Draining);

    advance_to(origin, 14.9).await;
    assert_eq!(debouncer.state().await, MotionState::Draining);
    assert!(recorder.stop_times().is_empty());

    advance_to(origin, 15.1).await;
    assert_eq!(debouncer.state().await, MotionState::Idle);

    assert_eq!(recorder.start_count(), 1);
    assert_eq!(recorder.stop_times(), vec![origin + Duration::from_secs(15)]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_recording_is_noop() {
    let (recorder, debouncer) = create_test_debouncer(5);

    assert_eq!(debouncer.on_motion_stop().await, MotionState::Idle);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(debouncer.state().await, MotionState::Idle);
    assert_eq!(recorder.start_count(), 0);
    assert!(recorder.stop_times().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_start_is_idempotent() {
    let (recorder, debouncer) = create_test_debouncer(5);

    debouncer.on_motion_start().await;
    let first = debouncer.last_motion_at().await;
    sleep(Duration::from_millis(10)).await;
    debouncer.on_motion_start().await;

    assert_eq!(recorder.start_count(), 1);
    assert_eq!(debouncer.state().await, MotionState::Recording);
    assert!(debouncer.last_motion_at().await >= first);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_stop_rearms_single_timer() {
    let (recorder, debouncer) = create_test_debouncer(5);
    let origin = Instant::now();

    debouncer.on_motion_start().await;
    debouncer.on_motion_stop().await;

    advance_to(origin, 3.0).await;
    debouncer.on_motion_stop().await;

    advance_to(origin, 20.0).await;
    assert_eq!(recorder.stop_times(), vec![origin + Duration::from_secs(8)]);
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_leaves_idle_and_retries() {
    let (recorder, debouncer) = create_test_debouncer(5);
    recorder.fail_next_starts(1);

    assert_eq!(debouncer.on_motion_start().await, MotionState::Idle);
    assert!(debouncer.status().await.recording.is_none());

    // Stop after a failed start has nothing to stop
    assert_eq!(debouncer.on_motion_stop().await, MotionState::Idle);

    assert_eq!(debouncer.on_motion_start().await, MotionState::Recording);
    assert_eq!(recorder.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_episode_after_quiet_period() {
    let (recorder, debouncer) = create_test_debouncer(5);

    debouncer.on_motion_start().await;
    debouncer.on_motion_stop().await;
    sleep(Duration::from_secs(6)).await;
    assert_eq!(debouncer.state().await, MotionState::Idle);

    debouncer.on_motion_start().await;
    assert_eq!(recorder.start_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_live_recording() {
    let (recorder, debouncer) = create_test_debouncer(5);

    debouncer.on_motion_start().await;
    debouncer.on_motion_stop().await;
    debouncer.shutdown().await;

    assert_eq!(debouncer.state().await, MotionState::Idle);
    assert_eq!(recorder.stop_count(), 1);

    // The cancelled stop timer never fires and later motion is ignored
    sleep(Duration::from_secs(10)).await;
    debouncer.on_motion_start().await;
    assert_eq!(recorder.stop_count(), 1);
    assert_eq!(recorder.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_recording_file() {
    let (_recorder, debouncer) = create_test_debouncer(5);

    debouncer.on_motion_start().await;
    let status = debouncer.status().await;

    assert_eq!(status.state, MotionState::Recording);
    assert!(status.last_motion_at.is_some());
    assert!(status
        .recording
        .unwrap()
        .ends_with("_home-garage-camera.mp4"));
}
