use crate::audio::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use serde::{Deserialize, Serialize};

/// Default name fragment identifying the virtual loopback cable
pub const DEFAULT_LOOPBACK_FRAGMENT: &str = "CABLE Input";

/// Device names hidden from every list (host pseudo-devices)
pub const DEFAULT_EXCLUDED_FRAGMENTS: &[&str] = &["microsoft sound mapper", "primary sound"];

/// Information about an audio device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Device identifier (unique name)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Whether this is the host's default device for its direction
    pub is_default: bool,
    /// Whether this is the virtual loopback cable that carries the mix to other apps
    #[serde(default)]
    pub is_virtual_loopback: bool,
}

impl AudioDevice {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            is_default: false,
            is_virtual_loopback: false,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Stream direction of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDirection {
    Input,
    Output,
}

/// List all available output devices of the default host
///
/// # Errors
/// Returns `AudioError::CpalError` if there's an error accessing devices.
///
/// # Example
/// ```no_run
/// use warpboard_lib::audio::device::list_output_devices;
///
/// let devices = list_output_devices().unwrap();
/// for device in devices {
///     println!("Device: {} ({})", device.name, device.id);
/// }
/// ```
pub fn list_output_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(&cpal::default_host(), DeviceDirection::Output)
}

/// List all available input devices of the default host
///
/// # Errors
/// Returns `AudioError::CpalError` if there's an error accessing devices.
pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(&cpal::default_host(), DeviceDirection::Input)
}

/// Get the default input device
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if no default input device is found.
pub fn get_default_input_device() -> AudioResult<AudioDevice> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AudioError::DeviceNotFound("default input".to_string()))?;

    let name = device.name().map_err(|_| AudioError::InvalidDeviceName)?;
    Ok(AudioDevice::new(name).with_default(true))
}

pub(crate) fn list_devices(host: &Host, direction: DeviceDirection) -> AudioResult<Vec<AudioDevice>> {
    let (devices, default_device): (Vec<Device>, _) = match direction {
        DeviceDirection::Input => (host.input_devices()?.collect(), host.default_input_device()),
        DeviceDirection::Output => (host.output_devices()?.collect(), host.default_output_device()),
    };
    let default_name = default_device.as_ref().and_then(|d| d.name().ok());

    let mut audio_devices = Vec::with_capacity(devices.len());
    for device in devices {
        // Devices whose name cannot be read cannot be selected by id either
        let Ok(name) = device.name() else {
            continue;
        };
        let is_default = default_name.as_deref() == Some(name.as_str());
        audio_devices.push(AudioDevice::new(name).with_default(is_default));
    }

    Ok(audio_devices)
}

/// Find a device by its ID (name)
pub(crate) fn find_device_by_id(
    host: &Host,
    direction: DeviceDirection,
    device_id: &str,
) -> AudioResult<Device> {
    let mut devices: Box<dyn Iterator<Item = Device>> = match direction {
        DeviceDirection::Input => Box::new(host.input_devices()?),
        DeviceDirection::Output => Box::new(host.output_devices()?),
    };

    devices
        .find(|device| device.name().is_ok_and(|name| name == device_id))
        .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))
}

/// Name-based device list cleanup
///
/// Drops host pseudo-devices, collapses duplicate names (hosts that expose one
/// device through several APIs) and marks the virtual loopback cable.
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    loopback_fragment: String,
    excluded_fragments: Vec<String>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_LOOPBACK_FRAGMENT,
            DEFAULT_EXCLUDED_FRAGMENTS.iter().map(|f| f.to_string()).collect(),
        )
    }
}

impl DeviceFilter {
    pub fn new(loopback_fragment: impl Into<String>, excluded_fragments: Vec<String>) -> Self {
        Self {
            loopback_fragment: loopback_fragment.into().to_lowercase(),
            excluded_fragments: excluded_fragments
                .into_iter()
                .map(|fragment| fragment.to_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive loopback detection
    pub fn is_virtual_loopback(&self, name: &str) -> bool {
        !self.loopback_fragment.is_empty() && name.to_lowercase().contains(&self.loopback_fragment)
    }

    fn is_excluded(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.excluded_fragments
            .iter()
            .any(|fragment| lower.contains(fragment.as_str()))
    }

    /// Filter and annotate a raw device list, keeping host order
    pub fn apply(&self, devices: Vec<AudioDevice>) -> Vec<AudioDevice> {
        let mut kept: Vec<AudioDevice> = Vec::with_capacity(devices.len());
        for mut device in devices {
            if device.name.trim().is_empty() || self.is_excluded(&device.name) {
                continue;
            }
            if let Some(existing) = kept.iter_mut().find(|d| d.name == device.name) {
                existing.is_default |= device.is_default;
                continue;
            }
            device.is_virtual_loopback = self.is_virtual_loopback(&device.name);
            kept.push(device);
        }
        kept
    }
}

/// Output devices valid as monitor targets
///
/// The loopback cable is left out so the mix is never routed back into itself.
pub fn monitor_targets(devices: &[AudioDevice]) -> Vec<AudioDevice> {
    devices
        .iter()
        .filter(|device| !device.is_virtual_loopback)
        .cloned()
        .collect()
}

/// Preferred main output: the loopback cable when it is installed
pub fn default_main_output(devices: &[AudioDevice]) -> Option<&AudioDevice> {
    devices.iter().find(|device| device.is_virtual_loopback)
}
