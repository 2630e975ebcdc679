//! Wire protocol for Fourstack.
//!
//! This crate defines the JSON grammar that clients and the server speak:
//!
//! - **Types** ([`Inbound`], [`Reply`], [`ErrorEnvelope`], the id newtypes) -
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) - how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`], [`InboundError`]) - what can go wrong
//!   during encoding/decoding.
//!
//! The protocol layer sits between transport (raw bytes) and the registry
//! (users, rooms, connections). It doesn't know about connections or games -
//! it only knows message shapes.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::{InboundError, ProtocolError};
pub use types::{ErrorCode, ErrorEnvelope, Inbound, Reply, RoomId, UserId};
