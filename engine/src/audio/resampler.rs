use crate::audio::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, info};

/// Audio resampler for converting between sample rates
///
/// Works on interleaved multi-channel audio and uses Sinc interpolation to
/// convert a capture device's native rate to the engine rate.
pub struct AudioResampler {
    /// The rubato resampler instance
    resampler: SincFixedIn<f32>,
    /// Input buffer for rubato (channels x frames)
    input_buffer: Vec<Vec<f32>>,
    /// Output buffer for rubato (channels x frames)
    output_buffer: Vec<Vec<f32>>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Number of input frames per chunk
    chunk_size: usize,
}

impl AudioResampler {
    /// Create a new audio resampler
    ///
    /// # Arguments
    /// * `input_rate` - Input sample rate in Hz
    /// * `output_rate` - Output sample rate in Hz
    /// * `channels` - Channel count of the interleaved audio
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if the resampler cannot be created.
    ///
    /// # Example
    /// ```no_run
    /// use warpboard_lib::audio::resampler::AudioResampler;
    ///
    /// // Resample stereo from 48kHz to 44.1kHz
    /// let resampler = AudioResampler::new(48000, 44100, 2).unwrap();
    /// ```
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> AudioResult<Self> {
        info!(input_rate, output_rate, channels, "Creating resampler");

        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(AudioError::ResampleFailed(format!(
                "Invalid resampler format: {} Hz -> {} Hz, {} channels",
                input_rate, output_rate, channels
            )));
        }

        let ratio = output_rate as f64 / input_rate as f64;
        debug!("Resample ratio: {:.6}", ratio);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        // 10ms worth of frames
        let chunk_size = (input_rate / 100).max(1) as usize;
        let channels = channels as usize;

        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, channels)
            .map_err(|e| AudioError::ResampleFailed(format!("Failed to create resampler: {}", e)))?;

        let input_buffer = resampler.input_buffer_allocate(true);
        let output_buffer = resampler.output_buffer_allocate(true);

        debug!(
            chunk_size,
            output_size = resampler.output_frames_max(),
            "Resampler created"
        );

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_rate,
            output_rate,
            channels,
            chunk_size,
        })
    }

    /// Resample exactly one chunk of interleaved audio
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if the input is not `chunk_size`
    /// frames long or rubato fails.
    pub fn process(&mut self, input: &[f32]) -> AudioResult<Vec<f32>> {
        let mut output = Vec::new();
        self.process_into(input, &mut output)?;
        Ok(output)
    }

    /// Resample one chunk and append the interleaved result to `output`
    pub fn process_into(&mut self, input: &[f32], output: &mut Vec<f32>) -> AudioResult<()> {
        let expected = self.chunk_size * self.channels;
        if input.len() != expected {
            return Err(AudioError::ResampleFailed(format!(
                "Input size mismatch: expected {} samples, got {}",
                expected,
                input.len()
            )));
        }

        for (frame_index, frame) in input.chunks_exact(self.channels).enumerate() {
            for (channel, &sample) in frame.iter().enumerate() {
                self.input_buffer[channel][frame_index] = sample;
            }
        }

        let (_frames_used, frames_generated) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;

        output.reserve(frames_generated * self.channels);
        for frame_index in 0..frames_generated {
            for channel in &self.output_buffer {
                output.push(channel[frame_index]);
            }
        }

        Ok(())
    }

    /// Process a variable-length input buffer
    ///
    /// Accumulates `input` in `buffer` and resamples every complete chunk.
    ///
    /// # Returns
    /// Resampled audio data (may be empty if not enough data accumulated)
    pub fn process_buffered(
        &mut self,
        input: &[f32],
        buffer: &mut Vec<f32>,
    ) -> AudioResult<Vec<f32>> {
        buffer.extend_from_slice(input);

        let chunk_samples = self.chunk_size * self.channels;
        let pending = std::mem::take(buffer);
        let mut chunks = pending.chunks_exact(chunk_samples);

        let mut output = Vec::new();
        for chunk in chunks.by_ref() {
            self.process_into(chunk, &mut output)?;
        }
        buffer.extend_from_slice(chunks.remainder());

        Ok(output)
    }

    /// Reset the resampler state
    pub fn reset(&mut self) {
        debug!("Resetting resampler");
        self.resampler.reset();

        for channel in &mut self.input_buffer {
            channel.fill(0.0);
        }
        for channel in &mut self.output_buffer {
            channel.fill(0.0);
        }
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    /// Number of input frames per `process` call
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Convert interleaved audio between channel counts
///
/// Mono is duplicated to every output channel. When narrowing, extra channels
/// are dropped. When widening from stereo or more, missing channels are silent.
pub fn convert_channels(input: &[f32], from: u16, to: u16, output: &mut Vec<f32>) {
    let (from, to) = (from.max(1) as usize, to.max(1) as usize);
    if from == to {
        output.extend_from_slice(input);
        return;
    }

    output.reserve(input.len() / from * to);
    for frame in input.chunks_exact(from) {
        for channel in 0..to {
            let sample = if from == 1 {
                frame[0]
            } else {
                frame.get(channel).copied().unwrap_or(0.0)
            };
            output.push(sample);
        }
    }
}
