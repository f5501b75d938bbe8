//! Mic capture bridge tests against a scripted capture source

mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use common::{CaptureScript, FakeBackend, test_format, wait_until};
use warpboard_lib::audio::{
    AudioBackend, AudioError, EventSink, MicCaptureBridge, MicTap, RouterEvent, StreamKind,
};

const WAIT: Duration = Duration::from_secs(3);

fn bridge(
    backend: &Arc<FakeBackend>,
    fifo_frames: usize,
) -> (MicCaptureBridge, Arc<Mutex<Vec<RouterEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&events);
    let sink: EventSink = Arc::new(move |event| captured.lock().push(event));
    let backend: Arc<dyn AudioBackend> = Arc::clone(backend) as Arc<dyn AudioBackend>;
    (
        MicCaptureBridge::new(backend, test_format(), fifo_frames, sink),
        events,
    )
}

fn block_len() -> usize {
    test_format().block_len()
}

#[test]
fn test_overflow_drops_oldest_frames() {
    let backend = FakeBackend::new(&[], &["Mic"]);
    backend.set_capture(
        "Mic",
        CaptureScript::Counter {
            delay: Duration::from_millis(1),
        },
    );
    let (mut bridge, _events) = bridge(&backend, 3);
    bridge.start("Mic").unwrap();

    // Let the capture thread run well past the FIFO capacity
    std::thread::sleep(Duration::from_millis(60));

    let mut out = vec![0.0f32; 3 * block_len()];
    let read = bridge.pull(MicTap::Mix, &mut out);
    assert_eq!(read, out.len());

    let blocks: Vec<f32> = out.chunks_exact(block_len()).map(|block| block[0]).collect();
    for block in out.chunks_exact(block_len()) {
        assert!(block.iter().all(|sample| *sample == block[0]));
    }
    assert!(blocks[0] > 1.0, "oldest frames should have been dropped");
    assert_eq!(blocks[1], blocks[0] + 1.0);
    assert_eq!(blocks[2], blocks[1] + 1.0);
}

#[test]
fn test_underflow_pads_with_silence() {
    let backend = FakeBackend::new(&[], &["Mic"]);
    backend.set_capture(
        "Mic",
        CaptureScript::Constant {
            value: 0.5,
            delay: Duration::from_millis(100),
        },
    );
    let (mut bridge, _events) = bridge(&backend, 3);
    bridge.start("Mic").unwrap();

    let mut out = vec![1.0f32; 2 * block_len()];
    assert_eq!(bridge.pull(MicTap::Monitor, &mut out), 0);
    assert!(out.iter().all(|sample| *sample == 0.0));

    let mut read = 0;
    assert!(wait_until(WAIT, || {
        out.fill(1.0);
        read = bridge.pull(MicTap::Monitor, &mut out);
        read > 0
    }));
    assert_eq!(read, block_len());
    assert!(out[..read].iter().all(|sample| *sample == 0.5));
    assert!(out[read..].iter().all(|sample| *sample == 0.0));
}

#[test]
fn test_taps_are_independent() {
    let backend = FakeBackend::new(&[], &["Mic"]);
    backend.set_capture(
        "Mic",
        CaptureScript::Constant {
            value: 0.25,
            delay: Duration::from_millis(1),
        },
    );
    let (mut bridge, _events) = bridge(&backend, 4);
    bridge.start("Mic").unwrap();
    std::thread::sleep(Duration::from_millis(30));

    // Draining one tap leaves the other untouched
    let mut drain = vec![0.0f32; 4 * block_len()];
    assert_eq!(bridge.pull(MicTap::Mix, &mut drain), drain.len());
    let mut out = vec![0.0f32; block_len()];
    assert_eq!(bridge.pull(MicTap::Monitor, &mut out), out.len());
    assert!(out.iter().all(|sample| *sample == 0.25));
}

#[test]
fn test_capture_failure_reports_event() {
    let backend = FakeBackend::new(&[], &["Mic"]);
    backend.set_capture("Mic", CaptureScript::FailAfter { frames: 3 });
    let (mut bridge, events) = bridge(&backend, 3);
    bridge.start("Mic").unwrap();

    assert!(wait_until(WAIT, || !events.lock().is_empty()));
    assert!(wait_until(WAIT, || !bridge.is_running()));
    assert!(!bridge.taps().is_active());

    let events = events.lock();
    assert_eq!(events.len(), 1);
    match &events[0] {
        RouterEvent::StreamFailed { kind, device_id, .. } => {
            assert_eq!(*kind, StreamKind::MicCapture);
            assert_eq!(device_id, "Mic");
        }
    }
}

#[test]
fn test_stop_clears_buffers() {
    let backend = FakeBackend::new(&[], &["Mic"]);
    backend.set_capture(
        "Mic",
        CaptureScript::Constant {
            value: 0.5,
            delay: Duration::from_millis(1),
        },
    );
    let (mut bridge, events) = bridge(&backend, 3);
    bridge.start("Mic").unwrap();
    assert!(bridge.is_running());
    assert_eq!(bridge.device_id(), Some("Mic"));
    std::thread::sleep(Duration::from_millis(20));

    bridge.stop();
    assert!(!bridge.is_running());
    let mut out = vec![1.0f32; block_len()];
    assert_eq!(bridge.pull(MicTap::Mix, &mut out), 0);
    assert!(out.iter().all(|sample| *sample == 0.0));

    // A requested stop is not a failure
    assert!(events.lock().is_empty());
    bridge.stop();
}

#[test]
fn test_start_is_idempotent_per_device() {
    let backend = FakeBackend::new(&[], &["Mic", "Headset"]);
    for device in ["Mic", "Headset"] {
        backend.set_capture(
            device,
            CaptureScript::Constant {
                value: 0.1,
                delay: Duration::from_millis(1),
            },
        );
    }
    let (mut bridge, _events) = bridge(&backend, 3);

    bridge.start("Mic").unwrap();
    bridge.start("Mic").unwrap();
    assert_eq!(backend.open_count("Mic"), 1);

    bridge.start("Headset").unwrap();
    assert_eq!(bridge.device_id(), Some("Headset"));
    assert_eq!(backend.open_count("Headset"), 1);
}

#[test]
fn test_open_failure_is_device_unavailable() {
    let backend = FakeBackend::new(&[], &["Mic"]);
    let (mut bridge, events) = bridge(&backend, 3);

    // No script registered means the fake cannot open the device
    let err = bridge.start("Mic").unwrap_err();
    assert!(matches!(err, AudioError::DeviceUnavailable { .. }));
    assert!(!bridge.is_running());
    assert!(events.lock().is_empty());

    backend.set_capture(
        "Mic",
        CaptureScript::Constant {
            value: 0.1,
            delay: Duration::from_millis(1),
        },
    );
    backend.fail_device("Mic");
    assert!(bridge.start("Mic").is_err());
    backend.heal_device("Mic");
    bridge.start("Mic").unwrap();
    assert!(bridge.is_running());
}
