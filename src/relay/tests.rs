use super::*;
use crate::config::OnvifcamConfig;
use crate::motion::{MotionState, Recorder};
use crate::testing::{FakeRecorder, FakeTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn create_test_dispatcher(arm_topic: Option<&str>) -> (Arc<FakeRecorder>, RecordDispatcher) {
    let recorder = Arc::new(FakeRecorder::default());
    let registry = Arc::new(TopicRegistry::new(
        Arc::clone(&recorder) as Arc<dyn Recorder>,
        OnvifcamConfig::default().recording,
    ));
    let dispatcher = RecordDispatcher::new(
        registry,
        Arc::new(ArmGate::new()),
        arm_topic.map(str::to_string),
    );
    (recorder, dispatcher)
}

#[test]
fn test_camera_topics() {
    let topics = CameraTopics::new("home/garage/camera/");

    assert_eq!(topics.base(), "home/garage/camera");
    assert_eq!(topics.ip(), "home/garage/camera/ip");
    assert_eq!(topics.motion(), "home/garage/camera/motion");
    assert_eq!(topics.last_motion(), "home/garage/camera/lastMotion");
    assert_eq!(topics.filter(), "home/garage/camera/+");
}

#[test]
fn test_message_parsing() {
    let arm = Some("home/alarm/armed");

    assert_eq!(
        RelayMessage::parse("home/alarm/armed", b"false", arm),
        Some(RelayMessage::Arm(false))
    );
    assert_eq!(
        RelayMessage::parse("cam/ip", b"10.0.0.5", arm),
        Some(RelayMessage::Address {
            base: "cam",
            ip: "10.0.0.5".parse().unwrap()
        })
    );
    assert_eq!(
        RelayMessage::parse("a/b/cam/motion", b"true", arm),
        Some(RelayMessage::Motion {
            base: "a/b/cam",
            active: true
        })
    );
    assert_eq!(
        RelayMessage::parse("cam/lastMotion", b"1709288100", arm),
        Some(RelayMessage::LastMotion {
            base: "cam",
            unix_seconds: 1_709_288_100
        })
    );

    assert_eq!(RelayMessage::parse("cam/motion", b"yes", arm), None);
    assert_eq!(RelayMessage::parse("cam/ip", b"not-an-ip", arm), None);
    assert_eq!(RelayMessage::parse("cam/battery", b"90", arm), None);
    assert_eq!(RelayMessage::parse("toplevel", b"true", arm), None);
    assert_eq!(RelayMessage::parse("cam/motion", &[0xff], arm), None);
}

#[test]
fn test_publisher_facts() {
    let transport = Arc::new(FakeTransport::default());
    let publisher = MotionPublisher::new(
        CameraTopics::new("home/garage/camera"),
        Arc::clone(&transport) as Arc<dyn RelayTransport>,
    );

    publisher.announce("10.0.0.5".parse().unwrap());
    publisher.motion(true);
    publisher.motion(false);

    let messages = transport.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(
        messages[0],
        ("home/garage/camera/ip".to_string(), true, "10.0.0.5".to_string())
    );
    assert_eq!(
        messages[1],
        ("home/garage/camera/motion".to_string(), false, "true".to_string())
    );
    assert_eq!(messages[2].0, "home/garage/camera/lastMotion");
    assert!(messages[2].1);
    assert!(messages[2].2.parse::<i64>().is_ok());
    assert_eq!(
        messages[3],
        ("home/garage/camera/motion".to_string(), false, "false".to_string())
    );
}

#[test]
fn test_publisher_failure_is_swallowed() {
    let transport = Arc::new(FakeTransport::failing());
    let publisher = MotionPublisher::new(CameraTopics::new("cam"), transport);

    publisher.announce("10.0.0.5".parse().unwrap());
    publisher.motion(true);
}

#[tokio::test(start_paused = true)]
async fn test_camera_created_on_first_address() {
    let (_recorder, dispatcher) = create_test_dispatcher(None);

    assert_eq!(
        dispatcher.handle("cam/ip", b"10.0.0.5").await,
        DispatchOutcome::CameraRegistered
    );
    assert_eq!(
        dispatcher.handle("cam/ip", b"10.0.0.6").await,
        DispatchOutcome::CameraKnown
    );

    let registry = dispatcher.registry();
    assert_eq!(registry.len(), 1);
    let camera = registry.get("cam").unwrap();
    assert_eq!(camera.camera().address().ip().to_string(), "10.0.0.5");
    assert_eq!(camera.camera().name(), Some("cam"));
}

#[tokio::test(start_paused = true)]
async fn test_motion_before_address_is_dropped() {
    let (recorder, dispatcher) = create_test_dispatcher(None);

    assert_eq!(
        dispatcher.handle("cam/motion", b"true").await,
        DispatchOutcome::UnknownCamera
    );
    assert!(dispatcher.registry().is_empty());
    assert_eq!(recorder.start_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_motion_drives_debouncer() {
    let (recorder, dispatcher) = create_test_dispatcher(None);
    dispatcher.handle("cam/ip", b"10.0.0.5").await;

    assert_eq!(
        dispatcher.handle("cam/motion", b"true").await,
        DispatchOutcome::Motion(MotionState::Recording)
    );
    assert_eq!(
        dispatcher.handle("cam/motion", b"false").await,
        DispatchOutcome::Motion(MotionState::Draining)
    );
    assert_eq!(
        dispatcher.handle("cam/lastMotion", b"1709288100").await,
        DispatchOutcome::Advisory
    );

    sleep(Duration::from_secs(6)).await;
    assert_eq!(recorder.start_count(), 1);
    assert_eq!(recorder.stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_gate_discards_motion_start() {
    let (recorder, dispatcher) = create_test_dispatcher(Some("home/alarm/armed"));
    dispatcher.handle("cam/ip", b"10.0.0.5").await;

    assert!(dispatcher.gate().is_armed());
    assert_eq!(
        dispatcher.handle("home/alarm/armed", b"false").await,
        DispatchOutcome::Armed(false)
    );

    assert_eq!(
        dispatcher.handle("cam/motion", b"true").await,
        DispatchOutcome::Disarmed
    );
    // Stop is still processed and finds nothing to stop
    assert_eq!(
        dispatcher.handle("cam/motion", b"false").await,
        DispatchOutcome::Motion(MotionState::Idle)
    );

    sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.start_count(), 0);
    assert_eq!(recorder.stop_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disarm_lets_recording_finish() {
    let (recorder, dispatcher) = create_test_dispatcher(Some("home/alarm/armed"));
    dispatcher.handle("cam/ip", b"10.0.0.5").await;
    dispatcher.handle("cam/motion", b"true").await;

    dispatcher.handle("home/alarm/armed", b"false").await;
    assert_eq!(
        dispatcher.handle("cam/motion", b"false").await,
        DispatchOutcome::Motion(MotionState::Draining)
    );

    sleep(Duration::from_secs(6)).await;
    assert_eq!(recorder.stop_count(), 1);

    // Re-arming restores recording
    dispatcher.handle("home/alarm/armed", b"true").await;
    dispatcher.handle("cam/motion", b"true").await;
    assert_eq!(recorder.start_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_cameras() {
    let (recorder, dispatcher) = create_test_dispatcher(None);
    dispatcher.handle("a/ip", b"10.0.0.5").await;
    dispatcher.handle("b/ip", b"10.0.0.6").await;
    dispatcher.handle("a/motion", b"true").await;
    dispatcher.handle("b/motion", b"true").await;

    dispatcher.shutdown().await;

    assert_eq!(recorder.stop_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_recording_after_shutdown() {
    let (recorder, dispatcher) = create_test_dispatcher(None);
    dispatcher.handle("a/ip", b"10.0.0.5").await;
    dispatcher.shutdown().await;
    assert!(dispatcher.registry().is_closed());

    // A camera first announced after shutdown is never created
    assert_eq!(
        dispatcher.handle("b/ip", b"10.0.0.6").await,
        DispatchOutcome::Ignored
    );
    assert_eq!(
        dispatcher.handle("b/motion", b"true").await,
        DispatchOutcome::UnknownCamera
    );

    // Known cameras stay closed
    dispatcher.handle("a/motion", b"true").await;

    assert_eq!(dispatcher.registry().len(), 1);
    assert_eq!(recorder.start_count(), 0);
    assert_eq!(recorder.stop_count(), 0);
}
