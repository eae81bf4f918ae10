//! Byte ↔ text encoding for the text-only transport boundary

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::CodecError;

/// Encode raw bytes as padded standard base64
pub fn bytes_to_transport_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64 back into raw bytes
pub fn text_to_bytes(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CodecError::Text(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_byte_value_roundtrips() {
        for b in 0..=255u8 {
            let text = bytes_to_transport_text(&[b]);
            assert_eq!(text_to_bytes(&text).unwrap(), vec![b], "byte {}", b);
        }
    }

    #[test]
    fn test_full_range_buffer_roundtrips() {
        let all: Vec<u8> = (0..=255u8).collect();
        let text = bytes_to_transport_text(&all);
        assert!(text.is_ascii());
        assert_eq!(text_to_bytes(&text).unwrap(), all);
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(bytes_to_transport_text(b"PCM"), "UENN");
        assert_eq!(bytes_to_transport_text(&[0xff, 0x00]), "/wA=");
    }

    #[test]
    fn test_rejects_malformed_text() {
        let err = text_to_bytes("not base64!").unwrap_err();
        assert!(matches!(err, CodecError::Text(_)));
    }
}
