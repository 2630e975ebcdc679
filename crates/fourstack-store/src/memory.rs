//! In-process storage backend.
//!
//! Keeps every record in a `HashMap` behind one async mutex. Good for a
//! single-process deployment and for tests; a multi-node deployment
//! would swap in a shared database behind the same [`Backend`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{Backend, BackendError, GamePatch, GameRecord};

/// A [`Backend`] backed by process memory. Contents are lost on restart.
///
/// Clones share the same storage, so a handle can be kept for seeding
/// or inspection after another is handed to the server.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    games: Arc<Mutex<HashMap<String, GameRecord>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    async fn insert_one(&self, game: GameRecord) -> Result<(), BackendError> {
        self.games.lock().await.insert(game.token.clone(), game);
        Ok(())
    }

    async fn find_one(
        &self,
        token: &str,
    ) -> Result<Option<GameRecord>, BackendError> {
        Ok(self.games.lock().await.get(token).cloned())
    }

    async fn tokens(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.games.lock().await.keys().cloned().collect())
    }

    async fn tokens_changed_before(
        &self,
        cutoff: u64,
    ) -> Result<Vec<String>, BackendError> {
        Ok(self
            .games
            .lock()
            .await
            .values()
            .filter(|game| game.last_change < cutoff)
            .map(|game| game.token.clone())
            .collect())
    }

    async fn tokens_changed_between(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<String>, BackendError> {
        Ok(self
            .games
            .lock()
            .await
            .values()
            .filter(|game| (from..to).contains(&game.last_change))
            .map(|game| game.token.clone())
            .collect())
    }

    async fn update_one(
        &self,
        token: &str,
        patch: GamePatch,
    ) -> Result<bool, BackendError> {
        let mut games = self.games.lock().await;
        let Some(game) = games.get_mut(token) else {
            return Ok(false);
        };

        // Set fields and the disc push land under one lock hold, so a
        // reader never observes a half-applied patch.
        if let Some((col, disc)) = patch.push {
            game.board.push(col, disc).map_err(|err| {
                BackendError::InvalidPatch {
                    token: token.to_string(),
                    reason: err.to_string(),
                }
            })?;
        }
        if let Some(player1) = patch.player1 {
            game.player1 = player1;
        }
        if let Some(player2) = patch.player2 {
            game.player2 = player2;
        }
        if let Some(status) = patch.status {
            game.status = status;
        }
        if let Some(turn) = patch.turn {
            game.turn = turn;
        }
        if let Some(last_change) = patch.last_change {
            game.last_change = last_change;
        }
        Ok(true)
    }

    async fn delete_one(&self, token: &str) -> Result<bool, BackendError> {
        Ok(self.games.lock().await.remove(token).is_some())
    }

    async fn delete_changed_before(
        &self,
        cutoff: u64,
    ) -> Result<u64, BackendError> {
        let mut games = self.games.lock().await;
        let before = games.len();
        games.retain(|_, game| game.last_change >= cutoff);
        Ok((before - games.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use fourstack_board::Board;

    use super::*;
    use crate::GameStatus;

    fn record(token: &str, last_change: u64) -> GameRecord {
        GameRecord {
            token: token.to_string(),
            player1: String::new(),
            player2: String::new(),
            status: GameStatus::Pending,
            turn: true,
            board: Board::new(),
            last_change,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let backend = MemoryBackend::new();
        backend.insert_one(record("abc", 10)).await.unwrap();

        let found = backend.find_one("abc").await.unwrap().unwrap();
        assert_eq!(found.token, "abc");
        assert!(backend.find_one("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_one_applies_set_and_push_together() {
        let backend = MemoryBackend::new();
        backend.insert_one(record("abc", 10)).await.unwrap();

        let matched = backend
            .update_one(
                "abc",
                GamePatch {
                    turn: Some(false),
                    last_change: Some(20),
                    push: Some((3, true)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matched);

        let game = backend.find_one("abc").await.unwrap().unwrap();
        assert!(!game.turn);
        assert_eq!(game.last_change, 20);
        assert_eq!(game.board.columns()[3], vec![true]);
    }

    #[tokio::test]
    async fn test_update_one_unknown_token_matches_nothing() {
        let backend = MemoryBackend::new();
        let matched = backend
            .update_one("nope", GamePatch::default())
            .await
            .unwrap();
        assert!(!matched);
    }

    #[tokio::test]
    async fn test_timestamp_queries_partition_records() {
        let backend = MemoryBackend::new();
        backend.insert_one(record("old", 5)).await.unwrap();
        backend.insert_one(record("mid", 15)).await.unwrap();
        backend.insert_one(record("new", 25)).await.unwrap();

        let before = backend.tokens_changed_before(10).await.unwrap();
        assert_eq!(before, vec!["old"]);

        let between = backend.tokens_changed_between(10, 20).await.unwrap();
        assert_eq!(between, vec!["mid"]);

        let removed = backend.delete_changed_before(20).await.unwrap();
        assert_eq!(removed, 2);
        let left = backend.tokens().await.unwrap();
        assert_eq!(left, vec!["new"]);
    }
}
