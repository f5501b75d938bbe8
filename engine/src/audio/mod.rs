/// Audio backend seam and the cpal implementation
pub mod backend;

/// Ring buffers and bounded FIFOs
pub mod buffer;

/// Microphone capture bridge
pub mod capture;

/// Audio device enumeration and filtering
pub mod device;

/// Audio-related error types
pub mod error;

/// Real-time mixer
pub mod mixer;

/// Audio resampling
pub mod resampler;

/// Output stream routing
pub mod router;

/// Playback status snapshot
pub mod status;

// Re-export commonly used types
pub use backend::{AudioBackend, CaptureSource, CpalBackend, OutputStream, StreamFormat};
pub use capture::{MicCaptureBridge, MicTap};
pub use device::{AudioDevice, DeviceFilter, default_main_output, monitor_targets};
pub use error::{AudioError, AudioResult};
pub use mixer::{MixBlock, MixBuffer, PlayingInstance};
pub use resampler::AudioResampler;
pub use router::{DeviceRouter, EventSink, MixLevels, RouterEvent, StreamKind};
pub use status::{PlaybackStatus, StatusBoard};
