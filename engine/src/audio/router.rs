//! Output stream routing
//!
//! [`DeviceRouter`] owns every stream the engine runs:
//!
//! - `Main`: the mix (plus optional mic) at master volume, usually into the
//!   virtual loopback cable
//! - `SoundboardMonitor`: the same mix, without mic, replayed through a small
//!   FIFO on a second device at its own volume
//! - `MicMonitor`: mic-only sidetone
//! - `MicCapture`: the capture thread feeding the mic taps
//!
//! Each stream starts, stops and restarts independently. Open failures leave
//! the stream stopped and are reported once; nothing retries automatically.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::backend::{AudioBackend, OutputStream, RenderCallback, StreamFormat};
use crate::audio::buffer::FrameFifo;
use crate::audio::capture::{MicCaptureBridge, MicTap};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::mixer::MixBuffer;
use crate::audio::status::StatusBoard;

/// Independent stream managed by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Main,
    SoundboardMonitor,
    MicMonitor,
    MicCapture,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Main,
        StreamKind::SoundboardMonitor,
        StreamKind::MicMonitor,
        StreamKind::MicCapture,
    ];

    /// Whether the stream reads from an input device
    pub fn is_input(self) -> bool {
        matches!(self, StreamKind::MicCapture)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::Main => "main output",
            StreamKind::SoundboardMonitor => "soundboard monitor",
            StreamKind::MicMonitor => "mic monitor",
            StreamKind::MicCapture => "mic capture",
        };
        f.write_str(name)
    }
}

/// Asynchronous stream notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// A running stream stopped delivering audio (disconnect, capture failure)
    StreamFailed {
        kind: StreamKind,
        device_id: String,
        reason: String,
    },
}

/// Receiver of [`RouterEvent`]s; called from device and capture threads
pub type EventSink = Arc<dyn Fn(RouterEvent) + Send + Sync>;

fn load_f32(value: &AtomicU32) -> f32 {
    f32::from_bits(value.load(Ordering::Relaxed))
}

fn store_f32(target: &AtomicU32, value: f32) {
    target.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
}

/// Volumes and toggles shared lock-free with the output callbacks
#[derive(Debug)]
pub struct MixLevels {
    master: AtomicU32,
    soundboard_monitor: AtomicU32,
    mic_monitor: AtomicU32,
    soundboard_monitor_enabled: AtomicBool,
    mic_monitor_enabled: AtomicBool,
    mic_included: AtomicBool,
}

impl Default for MixLevels {
    fn default() -> Self {
        Self {
            master: AtomicU32::new(1.0f32.to_bits()),
            soundboard_monitor: AtomicU32::new(0.75f32.to_bits()),
            mic_monitor: AtomicU32::new(0.75f32.to_bits()),
            soundboard_monitor_enabled: AtomicBool::new(false),
            mic_monitor_enabled: AtomicBool::new(false),
            mic_included: AtomicBool::new(false),
        }
    }
}

impl MixLevels {
    pub fn master(&self) -> f32 {
        load_f32(&self.master)
    }

    pub fn soundboard_monitor(&self) -> f32 {
        load_f32(&self.soundboard_monitor)
    }

    pub fn mic_monitor(&self) -> f32 {
        load_f32(&self.mic_monitor)
    }

    /// Set all three volumes, each clamped to [0, 1]
    pub fn set_volumes(&self, master: f32, soundboard_monitor: f32, mic_monitor: f32) {
        store_f32(&self.master, master);
        store_f32(&self.soundboard_monitor, soundboard_monitor);
        store_f32(&self.mic_monitor, mic_monitor);
    }

    pub fn soundboard_monitor_enabled(&self) -> bool {
        self.soundboard_monitor_enabled.load(Ordering::Relaxed)
    }

    pub fn mic_monitor_enabled(&self) -> bool {
        self.mic_monitor_enabled.load(Ordering::Relaxed)
    }

    pub fn mic_included(&self) -> bool {
        self.mic_included.load(Ordering::Relaxed)
    }
}

fn apply_gain(block: &mut [f32], gain: f32) {
    if gain != 1.0 {
        for sample in block.iter_mut() {
            *sample *= gain;
        }
    }
}

struct ActiveStream {
    device_id: String,
    _stream: Box<dyn OutputStream>,
}

/// Owns the output streams and the mic capture bridge
pub struct DeviceRouter {
    backend: Arc<dyn AudioBackend>,
    format: StreamFormat,
    mixer: Arc<MixBuffer>,
    status: Arc<StatusBoard>,
    levels: Arc<MixLevels>,
    monitor_fifo: Arc<FrameFifo>,
    mic: MicCaptureBridge,
    streams: HashMap<StreamKind, ActiveStream>,
    selected: HashMap<StreamKind, String>,
    events: EventSink,
}

impl DeviceRouter {
    /// Create a router with every stream stopped
    ///
    /// `fifo_frames` sizes both the soundboard-monitor FIFO and the mic taps,
    /// in blocks of `format.frame_size` frames.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        format: StreamFormat,
        fifo_frames: usize,
        mixer: Arc<MixBuffer>,
        status: Arc<StatusBoard>,
        events: EventSink,
    ) -> Self {
        let mic = MicCaptureBridge::new(
            Arc::clone(&backend),
            format,
            fifo_frames,
            Arc::clone(&events),
        );

        Self {
            monitor_fifo: Arc::new(FrameFifo::with_frames(
                fifo_frames.max(1),
                format.frame_size,
                format.channels,
            )),
            backend,
            format,
            mixer,
            status,
            levels: Arc::new(MixLevels::default()),
            mic,
            streams: HashMap::new(),
            selected: HashMap::new(),
            events,
        }
    }

    pub fn levels(&self) -> &Arc<MixLevels> {
        &self.levels
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn mic(&self) -> &MicCaptureBridge {
        &self.mic
    }

    /// Device the stream is currently running on
    pub fn active_device(&self, kind: StreamKind) -> Option<&str> {
        match kind {
            StreamKind::MicCapture => self.mic.device_id(),
            _ => self.streams.get(&kind).map(|s| s.device_id.as_str()),
        }
    }

    pub fn is_active(&self, kind: StreamKind) -> bool {
        self.active_device(kind).is_some()
    }

    /// Device chosen for the stream, running or not
    pub fn selected_device(&self, kind: StreamKind) -> Option<&str> {
        self.selected.get(&kind).map(String::as_str)
    }

    /// Whether the stream should be running when it has a device
    pub fn is_enabled(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Main => true,
            StreamKind::SoundboardMonitor => self.levels.soundboard_monitor_enabled(),
            StreamKind::MicMonitor => self.levels.mic_monitor_enabled(),
            StreamKind::MicCapture => {
                self.levels.mic_included() || self.levels.mic_monitor_enabled()
            }
        }
    }

    /// Start `kind` on `device_id`
    ///
    /// No-op if it already runs on that device; otherwise the previous stream
    /// of that kind is stopped first.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if the device cannot be opened.
    /// The stream is left stopped.
    pub fn start_stream(&mut self, kind: StreamKind, device_id: &str) -> AudioResult<()> {
        if self.active_device(kind) == Some(device_id) {
            debug!(%kind, device = device_id, "Stream already running");
            return Ok(());
        }

        self.stop_stream(kind);

        let result = match kind {
            StreamKind::MicCapture => self.mic.start(device_id),
            _ => self.open_output(kind, device_id),
        };

        match result {
            Ok(()) => {
                info!(%kind, device = device_id, "Stream started");
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    AudioError::DeviceUnavailable { .. } => e,
                    other => AudioError::unavailable(device_id, other),
                };
                warn!(%kind, device = device_id, "Failed to start stream: {}", err);
                Err(err)
            }
        }
    }

    /// Stop and release `kind`; safe when already stopped
    pub fn stop_stream(&mut self, kind: StreamKind) {
        match kind {
            StreamKind::MicCapture => self.mic.stop(),
            _ => {
                if let Some(stream) = self.streams.remove(&kind) {
                    info!(%kind, device = %stream.device_id, "Stopping stream");
                    drop(stream);
                }
                match kind {
                    StreamKind::Main => self.status.reset(),
                    StreamKind::SoundboardMonitor => self.monitor_fifo.clear(),
                    _ => {}
                }
            }
        }
    }

    /// Stop everything
    pub fn stop_all(&mut self) {
        for kind in StreamKind::ALL {
            self.stop_stream(kind);
        }
    }

    /// Choose the device for `kind` and restart only that stream
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if the stream is enabled and the
    /// device cannot be opened.
    pub fn select_device(&mut self, kind: StreamKind, device_id: Option<&str>) -> AudioResult<()> {
        match device_id {
            Some(id) => {
                self.selected.insert(kind, id.to_string());
            }
            None => {
                self.selected.remove(&kind);
            }
        }
        self.sync(kind)
    }

    /// Toggle the soundboard or mic monitor
    ///
    /// Toggling the mic monitor also starts or stops mic capture as needed.
    ///
    /// # Errors
    /// Returns the first stream that failed to open.
    pub fn enable_monitor(&mut self, kind: StreamKind, enabled: bool) -> AudioResult<()> {
        match kind {
            StreamKind::SoundboardMonitor => {
                self.levels
                    .soundboard_monitor_enabled
                    .store(enabled, Ordering::Relaxed);
                if !enabled {
                    self.monitor_fifo.clear();
                }
                self.sync(kind)
            }
            StreamKind::MicMonitor => {
                self.levels.mic_monitor_enabled.store(enabled, Ordering::Relaxed);
                let capture = self.sync(StreamKind::MicCapture);
                let monitor = self.sync(StreamKind::MicMonitor);
                capture.and(monitor)
            }
            other => Err(AudioError::ConfigError(format!(
                "{} is not a monitor stream",
                other
            ))),
        }
    }

    /// Mix the microphone into the main output
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if mic capture cannot start;
    /// the toggle keeps its previous value.
    pub fn enable_mic_inclusion(&mut self, enabled: bool) -> AudioResult<()> {
        let previous = self.levels.mic_included.swap(enabled, Ordering::Relaxed);
        let result = self.sync(StreamKind::MicCapture);
        if result.is_err() {
            self.levels.mic_included.store(previous, Ordering::Relaxed);
        }
        result
    }

    pub fn set_volumes(&self, master: f32, soundboard_monitor: f32, mic_monitor: f32) {
        debug!(master, soundboard_monitor, mic_monitor, "Setting volumes");
        self.levels.set_volumes(master, soundboard_monitor, mic_monitor);
    }

    /// Stop every stream, then start those still enabled with a device
    ///
    /// Used after the device list was refreshed. Returns the streams that
    /// failed to start; the others keep running.
    pub fn restart_all(&mut self) -> Vec<(StreamKind, AudioError)> {
        info!("Restarting all streams");
        self.stop_all();

        let mut failures = Vec::new();
        for kind in StreamKind::ALL {
            if let Err(e) = self.sync(kind) {
                failures.push((kind, e));
            }
        }
        failures
    }

    /// Release a stream reported as failed, unless it was restarted since
    pub fn handle_stream_failure(&mut self, kind: StreamKind, device_id: &str) {
        let still_current = match kind {
            StreamKind::MicCapture => !self.mic.is_running(),
            _ => self.active_device(kind) == Some(device_id),
        };
        if still_current {
            warn!(%kind, device = device_id, "Stream failed, leaving it stopped");
            self.stop_stream(kind);
        }
    }

    /// Start or stop `kind` to match its toggle and selected device
    fn sync(&mut self, kind: StreamKind) -> AudioResult<()> {
        let wanted = match self.selected.get(&kind) {
            Some(device) if self.is_enabled(kind) => Some(device.clone()),
            _ => None,
        };

        match wanted {
            Some(device) => self.start_stream(kind, &device),
            None => {
                self.stop_stream(kind);
                Ok(())
            }
        }
    }

    fn open_output(&mut self, kind: StreamKind, device_id: &str) -> AudioResult<()> {
        let render = self.render_callback(kind);
        let events = Arc::clone(&self.events);
        let failed_device = device_id.to_string();
        let on_error = Box::new(move |err: AudioError| {
            events(RouterEvent::StreamFailed {
                kind,
                device_id: failed_device.clone(),
                reason: err.to_string(),
            });
        });

        let stream = self
            .backend
            .open_output(device_id, self.format, render, on_error)?;

        self.streams.insert(
            kind,
            ActiveStream {
                device_id: device_id.to_string(),
                _stream: stream,
            },
        );
        Ok(())
    }

    fn render_callback(&self, kind: StreamKind) -> RenderCallback {
        let levels = Arc::clone(&self.levels);
        let mic = self.mic.taps();

        match kind {
            StreamKind::SoundboardMonitor => {
                let fifo = Arc::clone(&self.monitor_fifo);
                Box::new(move |out: &mut [f32]| {
                    fifo.pop_padded(out);
                    apply_gain(out, levels.soundboard_monitor());
                })
            }
            StreamKind::MicMonitor | StreamKind::MicCapture => Box::new(move |out: &mut [f32]| {
                mic.pull(MicTap::Monitor, out);
                apply_gain(out, levels.mic_monitor());
            }),
            StreamKind::Main => {
                let mixer = Arc::clone(&self.mixer);
                let status = Arc::clone(&self.status);
                let fifo = Arc::clone(&self.monitor_fifo);
                let mut names = Vec::with_capacity(self.mixer.peak_instances().max(8));
                let mut mic_block = vec![0.0f32; self.format.block_len()];

                Box::new(move |out: &mut [f32]| {
                    mixer.mix_into(out, &mut names);

                    if levels.soundboard_monitor_enabled() {
                        fifo.push_overwrite(out);
                    }

                    let mic_active = levels.mic_included() && mic.is_active();
                    if mic_active {
                        // Only a callback larger than the configured block grows it
                        if mic_block.len() < out.len() {
                            mic_block.resize(out.len(), 0.0);
                        }
                        let mic_block = &mut mic_block[..out.len()];
                        mic.pull(MicTap::Mix, mic_block);
                        for (sample, mic_sample) in out.iter_mut().zip(mic_block.iter()) {
                            *sample = (*sample + mic_sample).clamp(-1.0, 1.0);
                        }
                    }

                    apply_gain(out, levels.master());
                    status.publish(&names, mic_active);
                })
            }
        }
    }
}

impl Drop for DeviceRouter {
    fn drop(&mut self) {
        self.stop_all();
    }
}
