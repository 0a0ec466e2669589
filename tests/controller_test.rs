//! Controller behaviour against mock backends

use clipcam::controller::{RecordingController, UiEvent};
use clipcam::permissions::{Permission, PermissionStatus};
use clipcam::storage::output_file_path;
use clipcam::testing::{MockCameraBackend, MockRecorderFactory, ScriptedPermissions};
use clipcam::{ButtonLabel, CaptureState, ClipCamConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const SETTLE: Duration = Duration::from_secs(5);

struct Harness {
    controller: RecordingController,
    events: UnboundedReceiver<UiEvent>,
    cameras: MockCameraBackend,
    recorders: MockRecorderFactory,
    dir: tempfile::TempDir,
}

fn harness(permissions: ScriptedPermissions) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ClipCamConfig::default();
    config.storage.output_directory = dir.path().to_string_lossy().to_string();
    let cameras = MockCameraBackend::new();
    let recorders = MockRecorderFactory::new();
    let (controller, events) = RecordingController::new(
        Arc::new(permissions),
        Arc::new(cameras.clone()),
        Arc::new(recorders.clone()),
        config,
    );
    Harness {
        controller,
        events,
        cameras,
        recorders,
        dir,
    }
}

fn drain(events: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn start(h: &Harness) {
    h.controller.capture_action();
    assert!(h.controller.wait_for_settled(SETTLE));
}

#[test]
fn start_stop_twice_releases_handles_each_time() {
    let h = harness(ScriptedPermissions::granted());
    h.controller.on_resume();

    for round in 1..=2 {
        start(&h);
        assert!(h.controller.is_recording(), "round {}", round);
        assert_eq!(h.cameras.live_devices(), 1);
        assert_eq!(h.recorders.live_recorders(), 1);

        h.controller.capture_action();
        assert!(!h.controller.is_recording());
        assert!(!h.controller.has_device());
        assert!(!h.controller.has_recorder());
        assert_eq!(h.cameras.live_devices(), 0, "round {}", round);
        assert_eq!(h.recorders.live_recorders(), 0, "round {}", round);
    }
    assert_eq!(h.recorders.created_count(), 2);
}

#[test]
fn denying_any_permission_acquires_nothing() {
    for denied in [Permission::WriteStorage, Permission::RecordAudio, Permission::Camera] {
        let permissions = ScriptedPermissions::granted();
        permissions.set(denied, PermissionStatus::Denied);
        let mut h = harness(permissions);

        h.controller.on_resume();
        h.controller.capture_action();
        assert!(h.controller.wait_for_settled(SETTLE));

        assert!(!h.controller.is_recording(), "{} denied", denied);
        assert_eq!(h.controller.state(), CaptureState::PermissionPending);
        assert_eq!(h.cameras.opened_count(), 0, "{} denied", denied);
        assert_eq!(h.recorders.created_count(), 0, "{} denied", denied);
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, UiEvent::Toast(_))));
    }
}

#[test]
fn pause_while_recording_releases_both_handles() {
    let h = harness(ScriptedPermissions::granted());
    h.controller.on_resume();
    start(&h);
    assert!(h.controller.is_recording());

    h.controller.on_pause();
    assert!(!h.controller.is_recording());
    assert_eq!(h.controller.state(), CaptureState::Idle);
    assert!(!h.controller.has_device());
    assert!(!h.controller.has_recorder());
    assert_eq!(h.cameras.live_devices(), 0);
    assert_eq!(h.recorders.live_recorders(), 0);
}

#[test]
fn pause_during_start_cancels_the_task() {
    let mut h = harness(ScriptedPermissions::granted());
    h.cameras.set_open_delay(Duration::from_millis(200));

    h.controller.capture_action();
    assert_eq!(h.controller.state(), CaptureState::Starting);
    h.controller.on_pause();
    assert!(h.controller.wait_for_settled(SETTLE));

    assert!(!h.controller.is_recording());
    assert_eq!(h.controller.state(), CaptureState::Idle);
    assert_eq!(h.cameras.live_devices(), 0);
    assert_eq!(h.recorders.live_recorders(), 0);
    // the stale task posts nothing
    let events = drain(&mut h.events);
    assert!(!events.contains(&UiEvent::Label(ButtonLabel::Stop)), "{:?}", events);
    // and leaves no partial clip behind
    assert_eq!(std::fs::read_dir(h.dir.path()).unwrap().count(), 0);
}

/// Wait for the start task while checking the one-camera rule on every tick
fn settle_holding_at_most_one_camera(h: &Harness) {
    let deadline = std::time::Instant::now() + SETTLE;
    while !h.controller.wait_for_settled(Duration::from_millis(10)) {
        assert!(h.cameras.live_devices() <= 1, "two cameras held during start");
        assert!(std::time::Instant::now() < deadline, "start task never settled");
    }
    assert!(h.cameras.live_devices() <= 1);
}

#[test]
fn pause_then_resume_during_start_keeps_one_device() {
    let h = harness(ScriptedPermissions::granted());
    h.cameras.set_open_delay(Duration::from_millis(300));

    h.controller.capture_action();
    std::thread::sleep(Duration::from_millis(50));
    h.controller.on_pause();
    h.controller.on_resume();
    assert_eq!(h.cameras.live_devices(), 0);
    settle_holding_at_most_one_camera(&h);

    assert_eq!(h.cameras.opened_count(), 1);
    assert_eq!(h.cameras.live_devices(), 1);
    assert!(h.controller.has_device());
    assert!(!h.controller.is_recording());
    assert_eq!(h.controller.state(), CaptureState::PreviewOnly);
    assert_eq!(h.recorders.live_recorders(), 0);
    assert_eq!(std::fs::read_dir(h.dir.path()).unwrap().count(), 0);

    // the handed-over camera is the one the next clip records with
    start(&h);
    assert!(h.controller.is_recording());
    assert_eq!(h.cameras.opened_count(), 1);
}

#[test]
fn resume_during_start_keeps_one_device() {
    let h = harness(ScriptedPermissions::granted());
    h.cameras.set_open_delay(Duration::from_millis(300));

    h.controller.capture_action();
    std::thread::sleep(Duration::from_millis(50));
    h.controller.on_resume();
    assert_eq!(h.controller.state(), CaptureState::Starting);
    settle_holding_at_most_one_camera(&h);

    assert!(h.controller.is_recording());
    assert_eq!(h.cameras.opened_count(), 1);
    assert_eq!(h.recorders.live_recorders(), 1);
}

#[test]
fn tap_while_cancelled_start_settles_is_ignored() {
    let h = harness(ScriptedPermissions::granted());
    h.cameras.set_open_delay(Duration::from_millis(300));

    h.controller.capture_action();
    h.controller.on_pause();
    h.controller.on_resume();
    h.controller.capture_action();
    settle_holding_at_most_one_camera(&h);

    assert!(!h.controller.is_recording());
    assert_eq!(h.cameras.opened_count(), 1);
    assert_eq!(h.recorders.created_count(), 1);
    assert_eq!(h.recorders.live_recorders(), 0);
}

#[test]
fn taps_while_starting_are_ignored() {
    let mut h = harness(ScriptedPermissions::granted());
    h.cameras.set_open_delay(Duration::from_millis(200));

    h.controller.capture_action();
    h.controller.capture_action();
    h.controller.capture_action();
    assert!(!h.controller.status().button_enabled);
    assert!(h.controller.wait_for_settled(SETTLE));

    assert!(h.controller.is_recording());
    assert_eq!(h.cameras.opened_count(), 1);
    assert_eq!(h.recorders.created_count(), 1);
    assert_eq!(
        drain(&mut h.events),
        vec![
            UiEvent::Enabled(false),
            UiEvent::Label(ButtonLabel::Stop),
            UiEvent::Enabled(true)
        ]
    );
}

#[test]
fn consecutive_clips_get_distinct_files() {
    let h = harness(ScriptedPermissions::granted());
    let mut outputs = HashSet::new();
    for _ in 0..3 {
        start(&h);
        h.controller.capture_action();
        outputs.insert(h.controller.last_output().unwrap());
    }
    assert_eq!(outputs.len(), 3);
}

#[test]
fn output_paths_in_immediate_succession_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let paths: HashSet<_> = (0..100)
        .map(|_| output_file_path(dir.path(), "VID_", "mp4").unwrap())
        .collect();
    assert_eq!(paths.len(), 100);
}

#[test]
fn recording_uses_configured_limits() {
    let h = harness(ScriptedPermissions::granted());
    start(&h);
    let settings = h.recorders.last_settings().unwrap();
    assert_eq!(settings.max_duration, Some(Duration::from_secs(10)));
    assert_eq!(settings.orientation_hint, 90);
    let path = settings.output_path.unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("VID_") && name.ends_with(".mp4"), "{}", name);
    assert_eq!(path.parent().unwrap(), h.dir.path());
}

#[tokio::test]
async fn start_inside_runtime_posts_events_to_async_receiver() {
    let mut h = harness(ScriptedPermissions::granted());
    h.controller.capture_action();

    let first = h.events.recv().await;
    assert_eq!(first, Some(UiEvent::Enabled(false)));
    let second = tokio::time::timeout(SETTLE, h.events.recv()).await.unwrap();
    assert_eq!(second, Some(UiEvent::Label(ButtonLabel::Stop)));
    assert!(h.controller.is_recording());

    h.controller.on_pause();
    assert_eq!(h.cameras.live_devices(), 0);
}
