//! Device router tests against the in-memory backend

mod common;

use std::sync::Arc;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use parking_lot::Mutex;

use common::{CaptureScript, FakeBackend, test_format, wait_until};
use warpboard_lib::audio::{
    AudioBackend, AudioError, DeviceRouter, EventSink, MixBuffer, RouterEvent, StatusBoard,
    StreamKind,
};
use warpboard_lib::sound::SoundId;

const WAIT: Duration = Duration::from_secs(3);

struct Rig {
    backend: Arc<FakeBackend>,
    mixer: Arc<MixBuffer>,
    status: Arc<StatusBoard>,
    router: DeviceRouter,
    events: Arc<Mutex<Vec<RouterEvent>>>,
}

fn rig() -> Rig {
    let backend = FakeBackend::new(
        &["CABLE Input (VB-Audio)", "Speakers", "Headphones"],
        &["Mic"],
    );
    backend.set_capture(
        "Mic",
        CaptureScript::Constant {
            value: 0.25,
            delay: Duration::from_millis(1),
        },
    );

    let mixer = Arc::new(MixBuffer::new(test_format().channels));
    let status = StatusBoard::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&events);
    let sink: EventSink = Arc::new(move |event| captured.lock().push(event));

    let router = DeviceRouter::new(
        Arc::clone(&backend) as Arc<dyn AudioBackend>,
        test_format(),
        3,
        Arc::clone(&mixer),
        Arc::clone(&status),
        sink,
    );

    Rig {
        backend,
        mixer,
        status,
        router,
        events,
    }
}

fn constant(value: f32) -> Arc<[f32]> {
    vec![value; 1000 * test_format().channels as usize].into()
}

#[test]
fn test_start_stream_is_idempotent() {
    let mut rig = rig();
    rig.router.start_stream(StreamKind::Main, "Speakers").unwrap();
    rig.router.start_stream(StreamKind::Main, "Speakers").unwrap();

    assert_eq!(rig.backend.open_count("Speakers"), 1);
    assert_eq!(rig.router.active_device(StreamKind::Main), Some("Speakers"));
}

#[test]
fn test_start_on_new_device_replaces_stream() {
    let mut rig = rig();
    rig.router.start_stream(StreamKind::Main, "Speakers").unwrap();
    rig.router.start_stream(StreamKind::Main, "Headphones").unwrap();

    assert_eq!(rig.backend.live_outputs(), vec!["Headphones".to_string()]);
}

#[test]
fn test_failed_open_leaves_stream_stopped() {
    let mut rig = rig();
    rig.router.start_stream(StreamKind::Main, "Speakers").unwrap();
    rig.backend.fail_device("Headphones");

    let err = rig
        .router
        .start_stream(StreamKind::Main, "Headphones")
        .unwrap_err();
    assert!(matches!(err, AudioError::DeviceUnavailable { ref device, .. } if device == "Headphones"));
    assert!(!rig.router.is_active(StreamKind::Main));
    assert!(rig.backend.live_outputs().is_empty());

    let unknown = rig.router.start_stream(StreamKind::Main, "Nowhere").unwrap_err();
    assert!(matches!(unknown, AudioError::DeviceUnavailable { .. }));
}

#[test]
fn test_select_device_restarts_only_that_stream() {
    let mut rig = rig();
    rig.router
        .select_device(StreamKind::Main, Some("CABLE Input (VB-Audio)"))
        .unwrap();
    rig.router
        .select_device(StreamKind::SoundboardMonitor, Some("Speakers"))
        .unwrap();
    rig.router
        .enable_monitor(StreamKind::SoundboardMonitor, true)
        .unwrap();

    rig.router
        .select_device(StreamKind::SoundboardMonitor, Some("Headphones"))
        .unwrap();

    assert_eq!(rig.backend.open_count("CABLE Input (VB-Audio)"), 1);
    assert_eq!(
        rig.backend.live_outputs(),
        vec!["CABLE Input (VB-Audio)".to_string(), "Headphones".to_string()]
    );

    rig.router.select_device(StreamKind::SoundboardMonitor, None).unwrap();
    assert!(!rig.router.is_active(StreamKind::SoundboardMonitor));
    assert!(rig.router.is_enabled(StreamKind::SoundboardMonitor));
}

#[test]
fn test_disabled_monitor_does_not_open() {
    let mut rig = rig();
    rig.router
        .select_device(StreamKind::SoundboardMonitor, Some("Speakers"))
        .unwrap();
    assert!(!rig.router.is_active(StreamKind::SoundboardMonitor));
    assert_eq!(rig.router.selected_device(StreamKind::SoundboardMonitor), Some("Speakers"));

    rig.router.enable_monitor(StreamKind::SoundboardMonitor, true).unwrap();
    assert!(rig.router.is_active(StreamKind::SoundboardMonitor));

    rig.router.enable_monitor(StreamKind::SoundboardMonitor, false).unwrap();
    assert!(!rig.backend.is_live("Speakers"));
}

#[test]
fn test_enable_monitor_rejects_non_monitor_stream() {
    let mut rig = rig();
    let err = rig.router.enable_monitor(StreamKind::Main, true).unwrap_err();
    assert!(matches!(err, AudioError::ConfigError(_)));
}

#[test]
fn test_main_render_mixes_and_publishes_status() {
    let mut rig = rig();
    rig.router.start_stream(StreamKind::Main, "Speakers").unwrap();
    rig.mixer.add(constant(0.4), 1.0, false, SoundId::new("tone"), "Tone");

    let block = rig.backend.render("Speakers", 4).unwrap();
    assert!(block.iter().all(|sample| (*sample - 0.4).abs() < 1e-6));
    let status = rig.status.snapshot();
    assert_eq!(status.names, vec!["Tone".to_string()]);
    assert!(!status.mic_active);

    rig.router.set_volumes(0.5, 1.0, 1.0);
    let block = rig.backend.render("Speakers", 4).unwrap();
    assert_abs_diff_eq!(block[0], 0.2, epsilon = 1e-6);

    // Stopping the main stream resets the status
    rig.router.stop_stream(StreamKind::Main);
    assert!(rig.status.snapshot().is_idle());
}

#[test]
fn test_soundboard_monitor_receives_main_mix() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::Main, Some("Speakers")).unwrap();
    rig.router
        .select_device(StreamKind::SoundboardMonitor, Some("Headphones"))
        .unwrap();
    rig.router.enable_monitor(StreamKind::SoundboardMonitor, true).unwrap();
    rig.router.set_volumes(1.0, 0.5, 1.0);

    // Nothing rendered yet: the monitor plays silence
    let silent = rig.backend.render("Headphones", 4).unwrap();
    assert!(silent.iter().all(|sample| *sample == 0.0));

    rig.mixer.add(constant(0.4), 1.0, false, SoundId::new("tone"), "Tone");
    rig.backend.render("Speakers", 4).unwrap();
    let monitored = rig.backend.render("Headphones", 4).unwrap();
    assert!(monitored.iter().all(|sample| (*sample - 0.2).abs() < 1e-6));
}

#[test]
fn test_mic_inclusion_adds_capture_to_main() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::Main, Some("Speakers")).unwrap();
    rig.router.select_device(StreamKind::MicCapture, Some("Mic")).unwrap();
    assert!(!rig.router.is_active(StreamKind::MicCapture));

    rig.router.enable_mic_inclusion(true).unwrap();
    assert!(rig.router.is_active(StreamKind::MicCapture));
    assert!(wait_until(WAIT, || rig.router.mic().taps().is_active()));
    std::thread::sleep(Duration::from_millis(20));

    let block = rig.backend.render("Speakers", 4).unwrap();
    assert!(block.iter().all(|sample| (*sample - 0.25).abs() < 1e-6));
    let status = rig.status.snapshot();
    assert!(status.mic_active);
    assert_eq!(status.summary(), "Microphone");

    rig.router.enable_mic_inclusion(false).unwrap();
    assert!(!rig.router.is_active(StreamKind::MicCapture));
}

#[test]
fn test_failed_mic_inclusion_keeps_toggle_off() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::MicCapture, Some("Mic")).unwrap();
    rig.backend.fail_device("Mic");

    let err = rig.router.enable_mic_inclusion(true).unwrap_err();
    assert!(matches!(err, AudioError::DeviceUnavailable { .. }));
    assert!(!rig.router.levels().mic_included());
    assert!(!rig.router.is_active(StreamKind::MicCapture));

    rig.backend.heal_device("Mic");
    rig.router.enable_mic_inclusion(true).unwrap();
    assert!(rig.router.levels().mic_included());
    assert!(rig.router.is_active(StreamKind::MicCapture));
}

#[test]
fn test_mic_monitor_starts_capture() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::MicMonitor, Some("Headphones")).unwrap();
    rig.router.select_device(StreamKind::MicCapture, Some("Mic")).unwrap();

    rig.router.enable_monitor(StreamKind::MicMonitor, true).unwrap();
    assert!(rig.router.is_active(StreamKind::MicMonitor));
    assert!(rig.router.is_active(StreamKind::MicCapture));
    std::thread::sleep(Duration::from_millis(20));

    let block = rig.backend.render("Headphones", 4).unwrap();
    assert!(block.iter().all(|sample| (*sample - 0.25 * 0.75).abs() < 1e-6));

    rig.router.enable_monitor(StreamKind::MicMonitor, false).unwrap();
    assert!(!rig.router.is_active(StreamKind::MicCapture));
    assert!(!rig.backend.is_live("Headphones"));
}

#[test]
fn test_disconnect_then_handle_failure() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::Main, Some("Speakers")).unwrap();

    rig.backend.disconnect("Speakers");
    let event = rig.events.lock().pop().unwrap();
    let RouterEvent::StreamFailed { kind, device_id, .. } = event;
    assert_eq!(kind, StreamKind::Main);
    assert_eq!(device_id, "Speakers");

    rig.router.handle_stream_failure(kind, &device_id);
    assert!(!rig.router.is_active(StreamKind::Main));
    assert!(!rig.backend.is_live("Speakers"));
    // The selection survives so a refresh can restart it
    assert_eq!(rig.router.selected_device(StreamKind::Main), Some("Speakers"));
}

#[test]
fn test_stale_failure_is_ignored() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::Main, Some("Speakers")).unwrap();
    rig.router.select_device(StreamKind::Main, Some("Headphones")).unwrap();

    rig.router.handle_stream_failure(StreamKind::Main, "Speakers");
    assert_eq!(rig.router.active_device(StreamKind::Main), Some("Headphones"));
}

#[test]
fn test_restart_all_reports_failures() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::Main, Some("Speakers")).unwrap();
    rig.router
        .select_device(StreamKind::SoundboardMonitor, Some("Headphones"))
        .unwrap();
    rig.router.enable_monitor(StreamKind::SoundboardMonitor, true).unwrap();

    rig.backend.fail_device("Headphones");
    let failures = rig.router.restart_all();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, StreamKind::SoundboardMonitor);
    assert_eq!(rig.backend.open_count("Speakers"), 2);
    assert!(rig.router.is_active(StreamKind::Main));
    assert!(!rig.router.is_active(StreamKind::SoundboardMonitor));
}

#[test]
fn test_stop_all_releases_everything() {
    let mut rig = rig();
    rig.router.select_device(StreamKind::Main, Some("Speakers")).unwrap();
    rig.router.select_device(StreamKind::MicCapture, Some("Mic")).unwrap();
    rig.router.enable_mic_inclusion(true).unwrap();

    rig.router.stop_all();
    assert!(rig.backend.live_outputs().is_empty());
    for kind in StreamKind::ALL {
        assert!(!rig.router.is_active(kind), "{} still active", kind);
    }
}
