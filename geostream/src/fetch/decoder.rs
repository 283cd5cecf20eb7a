//! Payload decoders.

use bytes::Bytes;
use serde_json::Value;

use crate::error::ParseError;

/// Turns fetched bytes into a loader payload.
pub trait PayloadDecoder: Send + Sync + 'static {
    /// Decoded payload, shared read-only between consumers.
    type Output: Send + Sync + 'static;

    /// Decode one response body.
    fn decode(&self, bytes: Bytes) -> Result<Self::Output, ParseError>;
}

/// Passes bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl PayloadDecoder for RawDecoder {
    type Output = Bytes;

    fn decode(&self, bytes: Bytes) -> Result<Bytes, ParseError> {
        Ok(bytes)
    }
}

/// Parses the body as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl PayloadDecoder for JsonDecoder {
    type Output = Value;

    fn decode(&self, bytes: Bytes) -> Result<Value, ParseError> {
        serde_json::from_slice(&bytes).map_err(|e| ParseError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_decoder_passes_through() {
        let bytes = Bytes::from_static(b"\x89PNG");
        assert_eq!(RawDecoder.decode(bytes.clone()).unwrap(), bytes);
    }

    #[test]
    fn test_json_decoder() {
        let value = JsonDecoder
            .decode(Bytes::from_static(br#"{"height": 12.5}"#))
            .unwrap();
        assert_eq!(value, json!({ "height": 12.5 }));
    }

    #[test]
    fn test_json_decoder_rejects_malformed_input() {
        let err = JsonDecoder.decode(Bytes::from_static(b"{oops")).unwrap_err();
        assert!(err.to_string().starts_with("Malformed payload"));
    }
}
