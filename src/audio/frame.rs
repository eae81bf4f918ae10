//! PCM16 audio frames and their decoded form

use bytes::Bytes;

use crate::codec::{bytes_to_transport_text, float_to_pcm16, pcm16_to_float, text_to_bytes};
use crate::codec::pcm::frame_count;
use crate::error::CodecError;

/// Immutable PCM16 little-endian buffer at a known rate and channel layout.
///
/// Frames are consumed exactly once: sent to the transport or scheduled for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Bytes,
    sample_rate: u32,
    channels: u16,
}

impl AudioFrame {
    pub fn new(data: Bytes, sample_rate: u32, channels: u16) -> Self {
        Self {
            data,
            sample_rate,
            channels,
        }
    }

    /// Encode interleaved float samples
    pub fn from_samples(samples: &[f32], sample_rate: u32, channels: u16) -> Self {
        Self::new(float_to_pcm16(samples), sample_rate, channels)
    }

    /// Decode a transport text payload
    pub fn from_transport_text(
        text: &str,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, CodecError> {
        let bytes = text_to_bytes(text)?;
        Ok(Self::new(Bytes::from(bytes), sample_rate, channels))
    }

    /// Encode for the text-only transport
    pub fn to_transport_text(&self) -> String {
        bytes_to_transport_text(&self.data)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Decode into per-channel float samples
    pub fn decode(&self) -> Result<DecodedAudio, CodecError> {
        Ok(DecodedAudio {
            channels: pcm16_to_float(&self.data, self.channels)?,
            sample_rate: self.sample_rate,
        })
    }

    /// Playback duration in seconds
    pub fn duration(&self) -> Result<f64, CodecError> {
        let frames = frame_count(self.data.len(), self.channels)?;
        Ok(frames as f64 / f64::from(self.sample_rate))
    }
}

/// Planar float samples ready for an output device
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => (0..self.frames())
                .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n as f32)
                .collect(),
        }
    }
}
