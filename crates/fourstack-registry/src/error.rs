//! Registry error types.

use thiserror::Error;

use fourstack_protocol::{RoomId, UserId};

/// Errors from registry management operations.
///
/// Wire-level misuse (bad JSON, unregistered connections, unknown
/// rooms) is not represented here - [`admit`](crate::Registry::admit)
/// answers those with the error envelope directly.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `new_user` with an id that is already taken.
    #[error("user {0} already exists")]
    UserExists(UserId),

    /// `new_room` with an id that is already taken.
    #[error("room {0} already exists")]
    RoomExists(RoomId),
}
