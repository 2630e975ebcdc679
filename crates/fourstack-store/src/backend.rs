//! The storage backend trait.
//!
//! The store is written against this trait, not a concrete database.
//! [`MemoryBackend`](crate::MemoryBackend) is the in-process
//! implementation; a document-store backend would implement the same
//! eight operations. Timestamps are epoch milliseconds throughout.

use std::future::Future;

use thiserror::Error;

use crate::{GameRecord, GameStatus};

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or refused the operation.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// A patch could not be applied to the stored record.
    #[error("invalid patch for game {token}: {reason}")]
    InvalidPatch { token: String, reason: String },
}

/// A partial update to one game record.
///
/// `None` fields are left untouched. `push` appends a disc to a column
/// and is applied atomically with the `set`-style fields, mirroring a
/// combined `$set`/`$push` document update.
#[derive(Debug, Clone, Default)]
pub struct GamePatch {
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub status: Option<GameStatus>,
    pub turn: Option<bool>,
    pub last_change: Option<u64>,
    /// `(column, disc)` to append; `true` is a player-one disc.
    pub push: Option<(usize, bool)>,
}

/// Persistence operations the store needs.
///
/// Implementations must apply [`update_one`](Self::update_one)
/// atomically per record. They do not enforce game rules; the store
/// validates before it writes.
///
/// Methods return `impl Future + Send` rather than plain `async fn` so
/// callers generic over the backend can spawn their futures onto the
/// runtime. Implementations may still be written as `async fn`.
pub trait Backend: Send + Sync + 'static {
    /// Stores a new record. Tokens are assumed unique; the store mints
    /// them with 128 bits of randomness.
    fn insert_one(
        &self,
        game: GameRecord,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Fetches a record by token.
    fn find_one(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<GameRecord>, BackendError>> + Send;

    /// All stored tokens.
    fn tokens(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Tokens of records with `last_change < cutoff`.
    fn tokens_changed_before(
        &self,
        cutoff: u64,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Tokens of records with `from <= last_change < to`.
    fn tokens_changed_between(
        &self,
        from: u64,
        to: u64,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Applies a patch. Returns `false` if no record matched the token.
    fn update_one(
        &self,
        token: &str,
        patch: GamePatch,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Deletes a record. Returns `false` if no record matched.
    fn delete_one(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Deletes every record with `last_change < cutoff`, returning how
    /// many were removed.
    fn delete_changed_before(
        &self,
        cutoff: u64,
    ) -> impl Future<Output = Result<u64, BackendError>> + Send;
}
