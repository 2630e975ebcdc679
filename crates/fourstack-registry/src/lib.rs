//! Connection registry for Fourstack.
//!
//! The registry tracks three things and the links between them:
//!
//! - **Users** - identities that survive reconnects. A user can hold
//!   several live connections (two browser tabs, phone plus laptop).
//! - **Rooms** - named places connections gather in. A connection is
//!   always in exactly one room; a user can be in several through
//!   different connections.
//! - **Connections** - live sockets, each bound to one `(user, room)`
//!   pair by its `register` message.
//!
//! Inbound frames go through [`Registry::admit`], which enforces the
//! wire grammar (registration first, optional action allow-list) and
//! turns accepted frames into [`Event`]s for the layer above. Protocol
//! misuse is answered directly with the error envelope; it never
//! reaches a handler.
//!
//! # Concurrency note
//!
//! `Registry` is NOT thread-safe by itself - plain `HashMap`s, no
//! interior locking. The server owns it behind a single async mutex and
//! releases that lock before running handlers. Outbound delivery is
//! decoupled through per-connection unbounded channels, so no socket
//! I/O ever happens under the registry lock.

mod error;
mod event;
mod registry;

pub use error::RegistryError;
pub use event::{Answer, Event, PartySnapshot};
pub use registry::{Binding, Registry};
