//! Audio device capabilities and enumeration
//!
//! The session only sees the [`AudioBackend`] trait: a microphone that posts
//! fixed-size blocks into the session loop, and an output sink with its own
//! monotonic clock. [`CpalBackend`] is the hardware implementation.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::audio::frame::DecodedAudio;
use crate::audio::input::CpalMicrophone;
use crate::audio::output::CpalOutput;
use crate::audio::playback::SourceId;
use crate::config::{CaptureConfig, PlaybackConfig};
use crate::error::{AudioError, DeviceError};
use crate::session::event::EventSender;

/// An open microphone stream feeding the session loop
pub trait InputStream: Send {
    /// Stop delivering blocks and release the device
    fn stop_tracks(&mut self);

    /// Close the capture context. Must be a no-op when already closed.
    fn close(&mut self) -> Result<(), AudioError>;
}

/// An open output device that plays scheduled sources on its own clock
pub trait OutputSink: Send {
    /// Device clock in seconds, monotonic from when the sink was opened
    fn current_time(&self) -> f64;

    /// Begin playing `audio` at device time `at`. The sink posts
    /// `SessionEvent::SourceEnded(id)` once the source finishes on its own.
    fn start(&mut self, id: SourceId, audio: DecodedAudio, at: f64) -> Result<(), AudioError>;

    /// Stop a source immediately. Unknown ids are ignored.
    fn stop(&mut self, id: SourceId);

    /// Close the output context. Must be a no-op when already closed.
    fn close(&mut self) -> Result<(), AudioError>;
}

/// Microphone and speaker capability
pub trait AudioBackend: Send {
    fn open_microphone(
        &self,
        config: &CaptureConfig,
        events: EventSender,
    ) -> Result<Box<dyn InputStream>, DeviceError>;

    fn open_output(
        &self,
        config: &PlaybackConfig,
        events: EventSender,
    ) -> Result<Box<dyn OutputSink>, AudioError>;
}

/// Hardware backend on the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open_microphone(
        &self,
        config: &CaptureConfig,
        events: EventSender,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        Ok(Box::new(CpalMicrophone::open(config, events)?))
    }

    fn open_output(
        &self,
        config: &PlaybackConfig,
        events: EventSender,
    ) -> Result<Box<dyn OutputSink>, AudioError> {
        Ok(Box::new(CpalOutput::open(config, events)?))
    }
}

/// Device description for listings
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all available audio devices
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let mut devices: Vec<AudioDeviceInfo> = Vec::new();

    let default_input_name = host.default_input_device().and_then(|d| d.name().ok());
    let default_output_name = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(name) = device.name() {
                let (sample_rates, channels) = get_device_capabilities(&device, true);
                devices.push(AudioDeviceInfo {
                    is_default: default_input_name.as_ref() == Some(&name),
                    name,
                    is_input: true,
                    is_output: false,
                    sample_rates,
                    channels,
                });
            }
        }
    }

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let is_default = default_output_name.as_ref() == Some(&name);

                // Same physical device seen as input already
                if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                    existing.is_output = true;
                    existing.is_default |= is_default;
                    continue;
                }

                let (sample_rates, channels) = get_device_capabilities(&device, false);
                devices.push(AudioDeviceInfo {
                    name,
                    is_input: false,
                    is_output: true,
                    is_default,
                    sample_rates,
                    channels,
                });
            }
        }
    }

    devices
}

/// Sample rates of interest and channel counts a device supports
fn get_device_capabilities(device: &cpal::Device, is_input: bool) -> (Vec<u32>, Vec<u16>) {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = if is_input {
        device
            .supported_input_configs()
            .map(|iter| iter.collect())
            .unwrap_or_default()
    } else {
        device
            .supported_output_configs()
            .map(|iter| iter.collect())
            .unwrap_or_default()
    };

    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();
    for range in &ranges {
        for rate_val in [16_000u32, 24_000, 44_100, 48_000] {
            if supports_rate(range, rate_val) && !sample_rates.contains(&rate_val) {
                sample_rates.push(rate_val);
            }
        }
        if !channels.contains(&range.channels()) {
            channels.push(range.channels());
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}

fn supports_rate(range: &cpal::SupportedStreamConfigRange, rate: u32) -> bool {
    let rate = cpal::SampleRate(rate);
    rate >= range.min_sample_rate() && rate <= range.max_sample_rate()
}

/// Pick a stream config at `sample_rate`, preferring f32 samples and `channels` channels
pub(crate) fn pick_stream_config(
    ranges: &[cpal::SupportedStreamConfigRange],
    sample_rate: u32,
    channels: u16,
) -> Option<cpal::StreamConfig> {
    ranges
        .iter()
        .filter(|range| supports_rate(range, sample_rate))
        .min_by_key(|range| {
            (
                range.sample_format() != cpal::SampleFormat::F32,
                range.channels() != channels,
                range.channels(),
            )
        })
        .map(|range| {
            range
                .clone()
                .with_sample_rate(cpal::SampleRate(sample_rate))
                .config()
        })
}

/// Look up an input device by name, or the default input
pub(crate) fn find_input_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| DeviceError::NotFound("no default input device".to_string())),
        Some(name) => host
            .input_devices()
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeviceError::NotFound(name.to_string())),
    }
}

/// Look up an output device by name, or the default output
pub(crate) fn find_output_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string())),
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
    }
}

/// Classify a failure to open the microphone
pub(crate) fn map_build_error(err: cpal::BuildStreamError) -> DeviceError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            DeviceError::NotFound("input device disconnected".to_string())
        }
        cpal::BuildStreamError::BackendSpecific { err }
            if err.description.to_lowercase().contains("permission") =>
        {
            DeviceError::PermissionDenied
        }
        other => DeviceError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices_does_not_panic() {
        // May be empty on CI machines without audio hardware
        let devices = list_devices();
        for device in &devices {
            assert!(device.is_input || device.is_output);
        }
    }

    #[test]
    fn test_permission_error_classification() {
        let err = cpal::BuildStreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "Microphone Permission denied by user".to_string(),
            },
        };
        assert_eq!(map_build_error(err), DeviceError::PermissionDenied);
        assert!(matches!(
            map_build_error(cpal::BuildStreamError::DeviceNotAvailable),
            DeviceError::NotFound(_)
        ));
        assert!(matches!(
            map_build_error(cpal::BuildStreamError::StreamConfigNotSupported),
            DeviceError::Unavailable(_)
        ));
    }
}
