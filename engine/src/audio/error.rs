use thiserror::Error;

use crate::sound::SoundId;

/// Audio-related errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio device matched the requested id
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Device could not be opened or stopped delivering data
    #[error("Audio device '{device}' is unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildFailed(String),

    /// Audio stream error
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Resampling failed
    #[error("Resampling failed: {0}")]
    ResampleFailed(String),

    /// Device name is invalid
    #[error("Device name is invalid UTF-8")]
    InvalidDeviceName,

    /// Failed to get device configuration
    #[error("Failed to get device configuration: {0}")]
    ConfigError(String),

    /// Decoded sample data is missing for a sound at play time
    #[error("No decoded audio available for sound '{0}'")]
    DecodeUnavailable(SoundId),

    /// cpal error
    #[error("cpal error: {0}")]
    CpalError(#[from] cpal::DevicesError),

    /// Default config error
    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),

    /// Supported config error
    #[error("Supported config error: {0}")]
    SupportedConfigError(#[from] cpal::SupportedStreamConfigsError),
}

impl AudioError {
    /// Shorthand for [`AudioError::DeviceUnavailable`]
    pub fn unavailable(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error means a device could not be used
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound(_)
                | Self::DeviceUnavailable { .. }
                | Self::StreamBuildFailed(_)
                | Self::StreamError(_)
        )
    }
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
