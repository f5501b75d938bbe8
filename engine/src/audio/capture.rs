//! Microphone capture
//!
//! [`MicCaptureBridge`] runs a dedicated blocking thread that reads fixed-size
//! frames from a [`CaptureSource`] and fans them out to bounded FIFOs, one per
//! consumer. Output callbacks pull from those FIFOs without ever waiting on
//! the capture thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::audio::backend::{AudioBackend, CaptureSource, StreamFormat};
use crate::audio::buffer::{AudioBufferConsumer, AudioBufferProducer, AudioRingBuffer, FrameFifo};
use crate::audio::device::{DeviceDirection, find_device_by_id};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::resampler::{AudioResampler, convert_channels};
use crate::audio::router::{EventSink, RouterEvent, StreamKind};

/// How long `start` waits for the capture thread to open its device
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for the capture thread to exit
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while the device ring buffer is empty
const IDLE_POLL: Duration = Duration::from_millis(2);

/// Consumer of captured microphone audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MicTap {
    /// Mixed into the main output
    Mix,
    /// Sidetone stream
    Monitor,
}

/// FIFOs shared between the capture thread and the output callbacks
pub struct MicTaps {
    mix: FrameFifo,
    monitor: FrameFifo,
    active: AtomicBool,
}

impl MicTaps {
    fn new(format: &StreamFormat, fifo_frames: usize) -> Self {
        Self {
            mix: FrameFifo::with_frames(fifo_frames, format.frame_size, format.channels),
            monitor: FrameFifo::with_frames(fifo_frames, format.frame_size, format.channels),
            active: AtomicBool::new(false),
        }
    }

    fn fifo(&self, tap: MicTap) -> &FrameFifo {
        match tap {
            MicTap::Mix => &self.mix,
            MicTap::Monitor => &self.monitor,
        }
    }

    /// Fill `out` from the tap's FIFO, padding with silence
    ///
    /// Returns the number of real samples read. Never blocks on the capture
    /// thread.
    pub fn pull(&self, tap: MicTap, out: &mut [f32]) -> usize {
        self.fifo(tap).pop_padded(out)
    }

    /// Whether the capture thread is delivering audio
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn push(&self, frame: &[f32]) {
        let dropped = self.mix.push_overwrite(frame) + self.monitor.push_overwrite(frame);
        if dropped > 0 {
            debug!(dropped, "Mic FIFO overflow, dropped oldest samples");
        }
    }

    fn clear(&self) {
        self.mix.clear();
        self.monitor.clear();
    }
}

struct CaptureWorker {
    device_id: String,
    running: Arc<AtomicBool>,
    done: std_mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Decouples a blocking capture thread from pull-based consumers
pub struct MicCaptureBridge {
    backend: Arc<dyn AudioBackend>,
    format: StreamFormat,
    taps: Arc<MicTaps>,
    events: EventSink,
    worker: Option<CaptureWorker>,
}

impl MicCaptureBridge {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        format: StreamFormat,
        fifo_frames: usize,
        events: EventSink,
    ) -> Self {
        Self {
            taps: Arc::new(MicTaps::new(&format, fifo_frames.max(1))),
            backend,
            format,
            events,
            worker: None,
        }
    }

    /// Shared handle for output callbacks
    pub fn taps(&self) -> Arc<MicTaps> {
        Arc::clone(&self.taps)
    }

    pub fn pull(&self, tap: MicTap, out: &mut [f32]) -> usize {
        self.taps.pull(tap, out)
    }

    /// Device currently being captured, if the thread is alive
    pub fn device_id(&self) -> Option<&str> {
        self.worker
            .as_ref()
            .filter(|worker| worker.running.load(Ordering::Acquire))
            .map(|worker| worker.device_id.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.device_id().is_some()
    }

    /// Start capturing from `device_id`
    ///
    /// No-op when already capturing from that device. The source is opened on
    /// the capture thread; open failures are returned here.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if the device cannot be opened.
    pub fn start(&mut self, device_id: &str) -> AudioResult<()> {
        if self.device_id() == Some(device_id) {
            debug!(device = device_id, "Mic capture already running");
            return Ok(());
        }
        self.stop();

        info!(device = device_id, "Starting mic capture");

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<AudioResult<()>>(1);
        let (done_tx, done_rx) = std_mpsc::channel::<()>();

        let backend = Arc::clone(&self.backend);
        let taps = Arc::clone(&self.taps);
        let events = Arc::clone(&self.events);
        let thread_running = Arc::clone(&running);
        let thread_device = device_id.to_string();
        let format = self.format;

        let handle = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                capture_loop(backend, format, thread_device, taps, thread_running, events, ready_tx);
                let _ = done_tx.send(());
            })
            .map_err(|e| AudioError::unavailable(device_id, e))?;

        let opened = ready_rx.recv_timeout(OPEN_TIMEOUT).unwrap_or_else(|_| {
            Err(AudioError::unavailable(
                device_id,
                "capture device did not open in time",
            ))
        });

        let worker = CaptureWorker {
            device_id: device_id.to_string(),
            running,
            done: done_rx,
            handle,
        };

        match opened {
            Ok(()) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                shutdown(worker);
                Err(e)
            }
        }
    }

    /// Stop the capture thread and clear buffered audio; safe when stopped
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            info!(device = %worker.device_id, "Stopping mic capture");
            shutdown(worker);
        }
        self.taps.active.store(false, Ordering::Release);
        self.taps.clear();
    }
}

impl Drop for MicCaptureBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

fn shutdown(worker: CaptureWorker) {
    worker.running.store(false, Ordering::Release);
    match worker.done.recv_timeout(JOIN_TIMEOUT) {
        Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
            if worker.handle.join().is_err() {
                error!(device = %worker.device_id, "Mic capture thread panicked");
            }
        }
        Err(std_mpsc::RecvTimeoutError::Timeout) => {
            // The thread exits on its own once the blocking read returns
            warn!(device = %worker.device_id, "Mic capture thread did not stop in time, detaching");
        }
    }
}

fn capture_loop(
    backend: Arc<dyn AudioBackend>,
    format: StreamFormat,
    device_id: String,
    taps: Arc<MicTaps>,
    running: Arc<AtomicBool>,
    events: EventSink,
    ready: std_mpsc::SyncSender<AudioResult<()>>,
) {
    let mut source = match backend.open_capture(&device_id, format) {
        Ok(source) => source,
        Err(e) => {
            let err = match e {
                AudioError::DeviceUnavailable { .. } => e,
                other => AudioError::unavailable(device_id.as_str(), other),
            };
            running.store(false, Ordering::Release);
            let _ = ready.send(Err(err));
            return;
        }
    };

    taps.active.store(true, Ordering::Release);
    let _ = ready.send(Ok(()));
    debug!(device = %device_id, "Mic capture thread running");

    let mut frame = vec![0.0f32; format.block_len()];
    while running.load(Ordering::Acquire) {
        match source.read_frame(&mut frame) {
            Ok(()) => taps.push(&frame),
            Err(e) => {
                error!(device = %device_id, "Mic capture failed: {}", e);
                taps.active.store(false, Ordering::Release);
                // A stop requested while the read was failing is not a device failure
                if running.swap(false, Ordering::AcqRel) {
                    events(RouterEvent::StreamFailed {
                        kind: StreamKind::MicCapture,
                        device_id: device_id.clone(),
                        reason: e.to_string(),
                    });
                }
                break;
            }
        }
    }

    taps.active.store(false, Ordering::Release);
    debug!(device = %device_id, "Mic capture thread exited");
}

/// cpal input stream normalized to the engine format
///
/// The device callback only copies raw samples into a lock-free ring buffer.
/// Channel conversion and resampling happen in `read_frame` on the capture
/// thread.
pub struct CpalCaptureSource {
    _stream: Stream,
    consumer: AudioBufferConsumer,
    failure: Arc<Mutex<Option<String>>>,
    device_id: String,
    device_channels: u16,
    format: StreamFormat,
    resampler: Option<AudioResampler>,
    stall_timeout: Duration,
    raw: Vec<f32>,
    converted: Vec<f32>,
    resample_buffer: Vec<f32>,
    pending: Vec<f32>,
}

impl CpalCaptureSource {
    /// Open `device_id`, preferring the engine format
    ///
    /// Falls back to the device default config with channel conversion and
    /// resampling when the device cannot deliver the engine format natively.
    pub fn open(device_id: &str, format: StreamFormat, stall_timeout: Duration) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = find_device_by_id(&host, DeviceDirection::Input, device_id)?;

        let supported = match native_config(&device, &format) {
            Some(config) => config,
            None => device.default_input_config()?,
        };
        let device_rate = supported.sample_rate().0;
        let device_channels = supported.channels();
        let sample_format = supported.sample_format();

        info!(
            device = device_id,
            device_rate,
            device_channels,
            ?sample_format,
            "Opening capture stream"
        );

        let config = StreamConfig {
            channels: device_channels,
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        // Half a second of device audio
        let capacity = (device_rate as usize * device_channels as usize / 2).max(format.block_len());
        let (producer, consumer) = AudioRingBuffer::new(capacity);
        let failure = Arc::new(Mutex::new(None));

        let stream = match sample_format {
            SampleFormat::F32 => build_input::<f32>(&device, &config, producer, Arc::clone(&failure)),
            SampleFormat::I16 => build_input::<i16>(&device, &config, producer, Arc::clone(&failure)),
            SampleFormat::U16 => build_input::<u16>(&device, &config, producer, Arc::clone(&failure)),
            other => Err(AudioError::ConfigError(format!(
                "Unsupported input sample format: {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let resampler = if device_rate != format.sample_rate {
            Some(AudioResampler::new(device_rate, format.sample_rate, format.channels)?)
        } else {
            None
        };

        Ok(Self {
            _stream: stream,
            consumer,
            failure,
            device_id: device_id.to_string(),
            device_channels,
            format,
            resampler,
            stall_timeout,
            raw: vec![0.0; capacity],
            converted: Vec::new(),
            resample_buffer: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Drain the device ring buffer into `pending`; returns raw samples read
    fn fill_pending(&mut self) -> AudioResult<usize> {
        let read = self.consumer.pop_slice(&mut self.raw);
        if read == 0 {
            return Ok(0);
        }

        self.converted.clear();
        convert_channels(
            &self.raw[..read],
            self.device_channels,
            self.format.channels,
            &mut self.converted,
        );

        match self.resampler.as_mut() {
            Some(resampler) => {
                let resampled = resampler.process_buffered(&self.converted, &mut self.resample_buffer)?;
                self.pending.extend_from_slice(&resampled);
            }
            None => self.pending.extend_from_slice(&self.converted),
        }

        Ok(read)
    }
}

impl CaptureSource for CpalCaptureSource {
    fn read_frame(&mut self, out: &mut [f32]) -> AudioResult<()> {
        let mut last_data = Instant::now();

        while self.pending.len() < out.len() {
            if let Some(reason) = self.failure.lock().take() {
                return Err(AudioError::unavailable(self.device_id.as_str(), reason));
            }

            if self.fill_pending()? > 0 {
                last_data = Instant::now();
            } else if last_data.elapsed() >= self.stall_timeout {
                return Err(AudioError::unavailable(
                    self.device_id.as_str(),
                    "no audio received from capture device",
                ));
            } else {
                thread::sleep(IDLE_POLL);
            }
        }

        out.copy_from_slice(&self.pending[..out.len()]);
        self.pending.drain(..out.len());
        Ok(())
    }
}

/// Supported config matching the engine format exactly, if any
fn native_config(device: &Device, format: &StreamFormat) -> Option<cpal::SupportedStreamConfig> {
    let rate = cpal::SampleRate(format.sample_rate);
    device
        .supported_input_configs()
        .ok()?
        .filter(|range| range.channels() == format.channels)
        .find(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .map(|range| range.with_sample_rate(rate))
}

fn build_input<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: AudioBufferProducer,
    failure: Arc<Mutex<Option<String>>>,
) -> AudioResult<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|&sample| f32::from_sample(sample)));
                // Capture thread is behind when this comes up short
                let _ = producer.push_slice(&scratch);
            },
            move |err| {
                error!("Audio capture stream error: {}", err);
                *failure.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))
}
