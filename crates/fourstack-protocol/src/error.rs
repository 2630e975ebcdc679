//! Protocol error types.

use serde_json::Value;
use thiserror::Error;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization to bytes failed.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization from bytes failed.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Rejection reasons for an inbound frame before it becomes an
/// [`Inbound`](crate::Inbound) message.
///
/// The two variants map to distinct wire error codes, so they are kept
/// apart rather than folded into [`ProtocolError`].
#[derive(Debug, Error)]
pub enum InboundError {
    /// The frame is not JSON at all.
    #[error("message is not JSON")]
    NoJson,

    /// The frame is JSON but lacks a usable `act` or `data` field. Carries
    /// the parsed value so it can be echoed back to the sender.
    #[error("message is missing act or data")]
    Invalid(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = serde_json::from_str::<Value>("not json").unwrap_err();
        let wrapped = ProtocolError::Decode(err);
        assert!(wrapped.to_string().starts_with("failed to decode message"));
    }

    #[test]
    fn test_inbound_error_display() {
        assert_eq!(InboundError::NoJson.to_string(), "message is not JSON");
        assert_eq!(
            InboundError::Invalid(Value::Null).to_string(),
            "message is missing act or data"
        );
    }
}
