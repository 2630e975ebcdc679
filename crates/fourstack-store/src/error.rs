//! Store error types.
//!
//! The display strings double as the `msg` field of failure replies, so
//! they are part of the wire contract and must stay stable.

use thiserror::Error;

use crate::BackendError;

/// Reasons a store operation can be refused.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No game exists for the given token.
    #[error("Invalid token")]
    NotFound,

    /// `add_player` was called without a player name.
    #[error("No player was given")]
    NoPlayer,

    /// `add_player` on a game whose seats are already assigned.
    #[error("Players were already selected")]
    SeatsTaken,

    /// A move on a game that is pending or finished.
    #[error("Game is not active")]
    InactiveGame,

    /// A move by the player whose turn it is not.
    #[error("Not player's turn")]
    WrongTurn,

    /// A move column outside `0..=6`.
    #[error("Column index out of range")]
    ColumnOutOfRange,

    /// A move into a column holding six discs.
    #[error("Chosen column is full")]
    ColumnFull,

    /// `delete_game` matched no record.
    #[error("Could not delete")]
    DeleteFailed,

    /// The backend itself failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
