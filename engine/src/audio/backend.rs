//! Audio backend abstraction
//!
//! The router and the capture bridge never talk to cpal directly. They go
//! through [`AudioBackend`], which enumerates devices and opens streams in the
//! engine format. [`CpalBackend`] is the production implementation; tests plug
//! in a scripted backend.

use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info};

use crate::audio::capture::CpalCaptureSource;
use crate::audio::device::{DeviceDirection, find_device_by_id, list_devices};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::AudioDevice;

/// Engine sample rate
pub const SAMPLE_RATE: u32 = 44_100;
/// Engine channel count
pub const CHANNELS: u16 = 2;
/// Frames per mix block and per capture read
pub const FRAME_SIZE: usize = 1024;

/// Fixed stream format shared by every stream the engine opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per block
    pub frame_size: usize,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_size: FRAME_SIZE,
        }
    }
}

impl StreamFormat {
    /// Interleaved samples in one block
    pub fn block_len(&self) -> usize {
        self.frame_size * self.channels as usize
    }

    /// Wall-clock length of one block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate.max(1) as f64)
    }
}

/// Fills one interleaved output block; runs on the device's real-time thread
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Receives runtime stream failures (disconnects) from the device thread
pub type ErrorCallback = Box<dyn FnMut(AudioError) + Send + 'static>;

/// A running output stream; dropping it stops the stream and releases the device
pub trait OutputStream {
    fn device_id(&self) -> &str;
}

/// Blocking source of engine-format capture frames
pub trait CaptureSource {
    /// Block until `out` is completely filled
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` when the device fails or stops
    /// delivering data.
    fn read_frame(&mut self, out: &mut [f32]) -> AudioResult<()>;
}

/// Device enumeration and stream construction
pub trait AudioBackend: Send + Sync {
    fn output_devices(&self) -> AudioResult<Vec<AudioDevice>>;

    fn input_devices(&self) -> AudioResult<Vec<AudioDevice>>;

    /// Open and start an output stream that pulls blocks from `render`
    fn open_output(
        &self,
        device_id: &str,
        format: StreamFormat,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> AudioResult<Box<dyn OutputStream>>;

    /// Open a capture source delivering `format` frames
    ///
    /// Called on the capture thread, so the returned source does not need to
    /// be `Send`.
    fn open_capture(&self, device_id: &str, format: StreamFormat)
    -> AudioResult<Box<dyn CaptureSource>>;
}

/// cpal-backed [`AudioBackend`] using the platform default host
#[derive(Debug, Clone)]
pub struct CpalBackend {
    capture_stall_timeout: Duration,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl CpalBackend {
    pub fn new(capture_stall_timeout: Duration) -> Self {
        Self {
            capture_stall_timeout,
        }
    }
}

impl AudioBackend for CpalBackend {
    fn output_devices(&self) -> AudioResult<Vec<AudioDevice>> {
        list_devices(&cpal::default_host(), DeviceDirection::Output)
    }

    fn input_devices(&self) -> AudioResult<Vec<AudioDevice>> {
        list_devices(&cpal::default_host(), DeviceDirection::Input)
    }

    fn open_output(
        &self,
        device_id: &str,
        format: StreamFormat,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> AudioResult<Box<dyn OutputStream>> {
        let host = cpal::default_host();
        let device = find_device_by_id(&host, DeviceDirection::Output, device_id)?;
        let sample_format = device.default_output_config()?.sample_format();

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            device = device_id,
            sample_rate = format.sample_rate,
            channels = format.channels,
            ?sample_format,
            "Opening output stream"
        );

        let stream = match sample_format {
            SampleFormat::F32 => build_output::<f32>(&device, &config, device_id, render, on_error),
            SampleFormat::I16 => build_output::<i16>(&device, &config, device_id, render, on_error),
            SampleFormat::U16 => build_output::<u16>(&device, &config, device_id, render, on_error),
            other => Err(AudioError::ConfigError(format!(
                "Unsupported output sample format: {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Box::new(CpalOutputStream {
            device_id: device_id.to_string(),
            _stream: stream,
        }))
    }

    fn open_capture(
        &self,
        device_id: &str,
        format: StreamFormat,
    ) -> AudioResult<Box<dyn CaptureSource>> {
        let source = CpalCaptureSource::open(device_id, format, self.capture_stall_timeout)?;
        Ok(Box::new(source))
    }
}

fn build_output<T>(
    device: &Device,
    config: &StreamConfig,
    device_id: &str,
    mut render: RenderCallback,
    mut on_error: ErrorCallback,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let error_device = device_id.to_string();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Grows once to the host's buffer size, then stays put
                if scratch.len() != data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                render(&mut scratch);
                for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            move |err| {
                error!(device = %error_device, "Audio stream error: {}", err);
                on_error(AudioError::unavailable(error_device.as_str(), err));
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))
}

struct CpalOutputStream {
    device_id: String,
    _stream: Stream,
}

impl OutputStream for CpalOutputStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for CpalOutputStream {
    fn drop(&mut self) {
        debug!(device = %self.device_id, "Output stream released");
    }
}
