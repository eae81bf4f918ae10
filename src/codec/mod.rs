//! Sample codec
//!
//! Converts between float samples and 16-bit little-endian PCM, and between
//! raw bytes and the text encoding the transport accepts.

pub mod pcm;
pub mod text;

pub use pcm::{float_to_pcm16, pcm16_to_float};
pub use text::{bytes_to_transport_text, text_to_bytes};
