//! Linear PCM16 framing
//!
//! Samples are signed 16-bit little-endian, interleaved when there is more
//! than one channel. No clamping is applied when encoding: callers keep input
//! in `[-1.0, 1.0)`. Out-of-range samples wrap around the 16-bit range.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::PCM16_SCALE;
use crate::error::CodecError;

/// Encode float samples as PCM16 little-endian bytes
pub fn float_to_pcm16(samples: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        buf.put_i16_le(sample_to_i16(sample));
    }
    buf.freeze()
}

/// Truncate toward zero, then wrap into 16 bits (`1.0` becomes `-32768`)
#[inline]
fn sample_to_i16(sample: f32) -> i16 {
    (sample * PCM16_SCALE) as i32 as i16
}

/// Decode interleaved PCM16 little-endian bytes into one float vector per channel
pub fn pcm16_to_float(bytes: &[u8], channels: u16) -> Result<Vec<Vec<f32>>, CodecError> {
    let frames = frame_count(bytes.len(), channels)?;
    let channels = channels as usize;

    let mut planar: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        planar[i % channels].push(f32::from(sample) / PCM16_SCALE);
    }

    Ok(planar)
}

/// Number of frames (samples per channel) in a PCM16 payload
pub fn frame_count(byte_len: usize, channels: u16) -> Result<usize, CodecError> {
    if channels == 0 {
        return Err(CodecError::Format("channel count must be non-zero".to_string()));
    }
    if byte_len % 2 != 0 {
        return Err(CodecError::Format(format!(
            "{} bytes is not a whole number of 16-bit samples",
            byte_len
        )));
    }

    let samples = byte_len / 2;
    if samples % channels as usize != 0 {
        return Err(CodecError::Format(format!(
            "{} samples do not divide evenly into {} channels",
            samples, channels
        )));
    }

    Ok(samples / channels as usize)
}
