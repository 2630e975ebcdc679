//! Core protocol types for Fourstack's wire format.
//!
//! Every message on the wire is one of three envelopes:
//!
//! - [`Inbound`] (client → server): `{ "act": ..., "data": ... }`
//! - [`Reply`] (server → client): `{ "act": ..., "success": ..., "result": ... }`
//! - [`ErrorEnvelope`] (server → client, registry-level):
//!   `{ "err": true, "code": ..., "msg": ..., "data": ... }`
//!
//! Replies cover both successful results and application-level failures
//! (`success: false`); the error envelope is reserved for protocol misuse
//! detected by the registry itself (see [`ErrorCode`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::InboundError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user.
///
/// User ids are opaque strings: the server mints them (32 hex chars) and the
/// client merely echoes them back on reconnection. A client may also assert
/// an id of its own - ids carry no authority, so this is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// By convention a room id equals the game token it hosts, but the protocol
/// and registry layers treat it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Inbound - client → server
// ---------------------------------------------------------------------------

/// An inbound client message: a named action plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    /// The action name, e.g. `"register"`, `"game_move"`, `"chat_msg"`.
    pub act: String,
    /// Action-specific payload. Kept as raw JSON - the protocol layer has
    /// no knowledge of individual actions; handlers pick it apart.
    pub data: Value,
}

impl Inbound {
    /// Parses raw bytes into an inbound message.
    ///
    /// Distinguishes the two rejection cases the wire format defines:
    /// bytes that are not JSON at all ([`InboundError::NoJson`]), and
    /// valid JSON whose `act` is missing or empty or whose `data` is not
    /// a JSON object ([`InboundError::Invalid`], which echoes the parsed
    /// value back so the sender can see what was rejected). Every defined
    /// action carries an object payload, so scalar `data` is malformed
    /// even when present.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, InboundError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|_| InboundError::NoJson)?;

        let act = match value.get("act").and_then(Value::as_str) {
            Some(act) if !act.is_empty() => act.to_string(),
            _ => return Err(InboundError::Invalid(value)),
        };
        let data = match value.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => return Err(InboundError::Invalid(value)),
        };

        Ok(Self { act, data })
    }
}

// ---------------------------------------------------------------------------
// Reply - server → client
// ---------------------------------------------------------------------------

/// A server reply, either answered to one connection or broadcast.
///
/// `success: false` replies carry application-level failures (for example
/// a rejected move); the `result` then typically holds a `msg` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// The action this reply belongs to (not necessarily the inbound action:
    /// a `register` is answered with a `game_status`).
    pub act: String,
    /// Whether the action succeeded.
    pub success: bool,
    /// Action-specific result payload.
    pub result: Value,
}

impl Reply {
    /// Builds a successful reply.
    pub fn ok(act: impl Into<String>, result: Value) -> Self {
        Self {
            act: act.into(),
            success: true,
            result,
        }
    }

    /// Builds a failed reply.
    pub fn fail(act: impl Into<String>, result: Value) -> Self {
        Self {
            act: act.into(),
            success: false,
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry-level errors
// ---------------------------------------------------------------------------

/// The fixed error-code table for registry-level rejections.
///
/// The numeric codes are part of the wire contract - clients switch on them -
/// so they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// The message parsed as JSON but is missing `act` or `data`.
    InvalidMessage = 0,
    /// The named room does not exist.
    InvalidRoom = 1,
    /// The named user does not exist.
    InvalidUser = 2,
    /// The action is not on the configured allow-list.
    InvalidAction = 3,
    /// The connection already performed `register`.
    ConnectionAlreadyRegistered = 4,
    /// The connection must `register` before any other action.
    ConnectionNotRegistered = 5,
    /// The server is force-closing this connection.
    ConnectionCloses = 6,
    /// The message is not JSON.
    NoJson = 7,
}

impl ErrorCode {
    /// The numeric wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The human-readable message sent alongside the code.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidMessage => "Invalid message",
            Self::InvalidRoom => "Invalid room",
            Self::InvalidUser => "Invalid user",
            Self::InvalidAction => "Invalid action",
            Self::ConnectionAlreadyRegistered => {
                "Connection is already registered"
            }
            Self::ConnectionNotRegistered => "Connection is not registered",
            Self::ConnectionCloses => "Connection closes by server",
            Self::NoJson => "Message is not JSON",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// The registry-level error envelope.
///
/// Always delivered to the originating connection only, never broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always `true`; lets clients distinguish errors from replies without
    /// inspecting other fields.
    pub err: bool,
    /// Numeric code from the [`ErrorCode`] table.
    pub code: u8,
    /// Human-readable message for the code.
    pub msg: String,
    /// Context for the rejection (e.g. the offending message).
    pub data: Value,
}

impl ErrorEnvelope {
    /// Builds an error envelope for the given code and context.
    pub fn new(code: ErrorCode, data: Value) -> Self {
        Self {
            err: true,
            code: code.code(),
            msg: code.message().to_string(),
            data,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
