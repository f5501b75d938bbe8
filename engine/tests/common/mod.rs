//! Shared test doubles: a scripted audio backend and a manual input hook

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use warpboard_lib::audio::backend::{
    AudioBackend, CaptureSource, ErrorCallback, OutputStream, RenderCallback, StreamFormat,
};
use warpboard_lib::audio::{AudioDevice, AudioError, AudioResult};
use warpboard_lib::hotkey::{
    HookEvent, HookMode, HookSink, HotkeyError, HotkeyResult, InputHook, MouseButton,
    RawInputEvent, RawKey,
};

/// Small format so tests can reason about individual frames
pub fn test_format() -> StreamFormat {
    StreamFormat {
        sample_rate: 44_100,
        channels: 2,
        frame_size: 4,
    }
}

/// What a fake capture device delivers
#[derive(Debug, Clone, Copy)]
pub enum CaptureScript {
    /// Frame `n` (starting at 1) is filled with `n as f32`, one frame per `delay`
    Counter { delay: Duration },
    /// Constant value, one frame per `delay`
    Constant { value: f32, delay: Duration },
    /// `frames` counter frames, then a read error
    FailAfter { frames: u64 },
}

struct LiveOutput {
    device_id: String,
    render: Arc<Mutex<RenderCallback>>,
    on_error: Arc<Mutex<ErrorCallback>>,
}

#[derive(Default)]
struct FakeState {
    outputs: HashMap<u64, LiveOutput>,
    failing: HashSet<String>,
    opened: HashMap<String, usize>,
    captures: HashMap<String, CaptureScript>,
}

/// In-memory [`AudioBackend`] whose output callbacks are driven by the test
pub struct FakeBackend {
    output_names: Mutex<Vec<String>>,
    input_names: Mutex<Vec<String>>,
    state: Arc<Mutex<FakeState>>,
    next_id: AtomicU64,
}

impl FakeBackend {
    pub fn new(outputs: &[&str], inputs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            output_names: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
            input_names: Mutex::new(inputs.iter().map(|s| s.to_string()).collect()),
            state: Arc::new(Mutex::new(FakeState::default())),
            next_id: AtomicU64::new(1),
        })
    }

    /// Every later open of `device` fails
    pub fn fail_device(&self, device: &str) {
        self.state.lock().failing.insert(device.to_string());
    }

    pub fn heal_device(&self, device: &str) {
        self.state.lock().failing.remove(device);
    }

    pub fn set_capture(&self, device: &str, script: CaptureScript) {
        self.state.lock().captures.insert(device.to_string(), script);
    }

    pub fn remove_output(&self, device: &str) {
        self.output_names.lock().retain(|name| name != device);
    }

    /// How many times `device` was opened successfully
    pub fn open_count(&self, device: &str) -> usize {
        self.state.lock().opened.get(device).copied().unwrap_or(0)
    }

    /// Devices with a live output stream, sorted
    pub fn live_outputs(&self) -> Vec<String> {
        let mut live: Vec<String> = self
            .state
            .lock()
            .outputs
            .values()
            .map(|output| output.device_id.clone())
            .collect();
        live.sort();
        live
    }

    pub fn is_live(&self, device: &str) -> bool {
        self.live_outputs().iter().any(|live| live == device)
    }

    /// Run the render callback of the stream on `device` for `frames` frames
    pub fn render(&self, device: &str, frames: usize) -> Option<Vec<f32>> {
        let render = {
            let state = self.state.lock();
            state
                .outputs
                .values()
                .find(|output| output.device_id == device)
                .map(|output| Arc::clone(&output.render))
        }?;

        let mut block = vec![0.0f32; frames * test_format().channels as usize];
        let mut render = render.lock();
        (*render)(&mut block);
        Some(block)
    }

    /// Simulate a mid-stream disconnect on `device`
    pub fn disconnect(&self, device: &str) {
        let on_error = {
            let state = self.state.lock();
            state
                .outputs
                .values()
                .find(|output| output.device_id == device)
                .map(|output| Arc::clone(&output.on_error))
        };
        if let Some(on_error) = on_error {
            let mut on_error = on_error.lock();
            (*on_error)(AudioError::unavailable(device, "device disconnected"));
        }
    }
}

struct FakeOutputStream {
    id: u64,
    device_id: String,
    state: Arc<Mutex<FakeState>>,
}

impl OutputStream for FakeOutputStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for FakeOutputStream {
    fn drop(&mut self) {
        self.state.lock().outputs.remove(&self.id);
    }
}

struct FakeCaptureSource {
    script: CaptureScript,
    produced: u64,
}

impl CaptureSource for FakeCaptureSource {
    fn read_frame(&mut self, out: &mut [f32]) -> AudioResult<()> {
        self.produced += 1;
        match self.script {
            CaptureScript::Counter { delay } => {
                thread::sleep(delay);
                out.fill(self.produced as f32);
            }
            CaptureScript::Constant { value, delay } => {
                thread::sleep(delay);
                out.fill(value);
            }
            CaptureScript::FailAfter { frames } => {
                thread::sleep(Duration::from_millis(1));
                if self.produced > frames {
                    return Err(AudioError::unavailable("fake mic", "capture device unplugged"));
                }
                out.fill(self.produced as f32);
            }
        }
        Ok(())
    }
}

impl AudioBackend for FakeBackend {
    fn output_devices(&self) -> AudioResult<Vec<AudioDevice>> {
        Ok(self
            .output_names
            .lock()
            .iter()
            .map(|name| AudioDevice::new(name.as_str()))
            .collect())
    }

    fn input_devices(&self) -> AudioResult<Vec<AudioDevice>> {
        Ok(self
            .input_names
            .lock()
            .iter()
            .map(|name| AudioDevice::new(name.as_str()))
            .collect())
    }

    fn open_output(
        &self,
        device_id: &str,
        _format: StreamFormat,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> AudioResult<Box<dyn OutputStream>> {
        let mut state = self.state.lock();
        let known = self.output_names.lock().iter().any(|name| name == device_id);
        if !known {
            return Err(AudioError::DeviceNotFound(device_id.to_string()));
        }
        if state.failing.contains(device_id) {
            return Err(AudioError::unavailable(device_id, "device busy"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.outputs.insert(
            id,
            LiveOutput {
                device_id: device_id.to_string(),
                render: Arc::new(Mutex::new(render)),
                on_error: Arc::new(Mutex::new(on_error)),
            },
        );
        *state.opened.entry(device_id.to_string()).or_default() += 1;

        Ok(Box::new(FakeOutputStream {
            id,
            device_id: device_id.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn open_capture(
        &self,
        device_id: &str,
        _format: StreamFormat,
    ) -> AudioResult<Box<dyn CaptureSource>> {
        let mut state = self.state.lock();
        if state.failing.contains(device_id) {
            return Err(AudioError::unavailable(device_id, "device busy"));
        }
        let script = state
            .captures
            .get(device_id)
            .copied()
            .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))?;
        *state.opened.entry(device_id.to_string()).or_default() += 1;

        Ok(Box::new(FakeCaptureSource {
            script,
            produced: 0,
        }))
    }
}

/// Input hook driven by the test thread
#[derive(Clone, Default)]
pub struct ManualHook {
    inner: Arc<Mutex<ManualHookState>>,
}

#[derive(Default)]
struct ManualHookState {
    sink: Option<HookSink>,
    mode: Option<HookMode>,
    installs: usize,
    fail_install: bool,
}

impl ManualHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let hook = Self::default();
        hook.inner.lock().fail_install = true;
        hook
    }

    pub fn boxed(&self) -> Box<dyn InputHook> {
        Box::new(self.clone())
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    pub fn mode(&self) -> Option<HookMode> {
        self.inner.lock().mode
    }

    pub fn installs(&self) -> usize {
        self.inner.lock().installs
    }

    /// Deliver an event if the hook is installed
    pub fn send(&self, event: HookEvent) {
        let sink = self.inner.lock().sink.clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn press(&self, name: &str) {
        self.send(HookEvent::Input(RawInputEvent::KeyPress(raw_key(name))));
    }

    pub fn release(&self, name: &str) {
        self.send(HookEvent::Input(RawInputEvent::KeyRelease(raw_key(name))));
    }

    pub fn tap(&self, name: &str) {
        self.press(name);
        self.release(name);
    }

    pub fn click(&self, button: MouseButton) {
        self.send(HookEvent::Input(RawInputEvent::ButtonPress(button)));
        self.send(HookEvent::Input(RawInputEvent::ButtonRelease(button)));
    }

    pub fn fail(&self, reason: &str) {
        self.send(HookEvent::Failed(reason.to_string()));
    }
}

/// Single printable characters are delivered as characters, everything else by name
fn raw_key(name: &str) -> RawKey {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => RawKey::char(c),
        _ => RawKey::named(name),
    }
}

impl InputHook for ManualHook {
    fn install(&mut self, sink: HookSink, mode: HookMode) -> HotkeyResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_install {
            return Err(HotkeyError::ListenerFailed("hook refused".to_string()));
        }
        inner.sink = Some(sink);
        inner.mode = Some(mode);
        inner.installs += 1;
        Ok(())
    }

    fn uninstall(&mut self) {
        let mut inner = self.inner.lock();
        inner.sink = None;
        inner.mode = None;
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
