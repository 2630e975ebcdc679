//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The rest of the stack doesn't care HOW messages are serialized - it
//! just needs something that implements the [`Codec`] trait, so a binary
//! codec could be swapped in later without touching other code.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs are shared across Tokio tasks
/// and stored in long-lived state. The methods are generic over the
/// message type: `encode` takes any `Serialize`, `decode` produces any
/// `DeserializeOwned` (owned so the input buffer can be dropped after
/// decoding).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what deployed clients speak, and it keeps messages inspectable
/// in browser DevTools during development.
///
/// ## Example
///
/// ```rust
/// use fourstack_protocol::{Codec, JsonCodec, Reply};
/// use serde_json::json;
///
/// let codec = JsonCodec;
///
/// let reply = Reply::ok("chat_msg", json!({"msg": "hi"}));
///
/// let bytes = codec.encode(&reply).unwrap();
/// let decoded: Reply = codec.decode(&bytes).unwrap();
/// assert_eq!(reply, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ErrorCode, ErrorEnvelope, Reply};

    #[test]
    fn test_json_codec_round_trip_reply() {
        let codec = JsonCodec;
        let reply = Reply::ok("new_room_name", json!({"name": "Lobby"}));
        let bytes = codec.encode(&reply).unwrap();
        let decoded: Reply = codec.decode(&bytes).unwrap();
        assert_eq!(reply, decoded);
    }

    #[test]
    fn test_json_codec_round_trip_error_envelope() {
        let codec = JsonCodec;
        let envelope = ErrorEnvelope::new(ErrorCode::NoJson, json!("garbage"));
        let bytes = codec.encode(&envelope).unwrap();
        let decoded: ErrorEnvelope = codec.decode(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_json_codec_decode_rejects_garbage() {
        let codec = JsonCodec;
        let result: Result<Reply, _> = codec.decode(b"\xff\xfe not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
