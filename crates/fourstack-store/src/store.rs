//! The game store: rule enforcement on top of a storage backend.
//!
//! Every mutation is a read-validate-write cycle. Writes to the same
//! game are serialized by a per-token async lock, so two simultaneous
//! moves on one game cannot both pass validation against the same
//! snapshot; games with different tokens never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fourstack_board::{Board, COLUMNS};
use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Backend, GamePatch, GameRecord, GameStatus, MoveOutcome, Seat,
    SeatAssignment, StoreError, SweepReport,
};

/// Per-token locks guarding read-modify-write cycles.
///
/// Entries are created on first use and dropped when the game is
/// deleted. Tasks still holding a clone of a removed entry keep working
/// against their own `Arc`.
#[derive(Default)]
struct TokenLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenLocks {
    async fn acquire(&self, token: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(token.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn forget(&self, token: &str) {
        self.locks.lock().await.remove(token);
    }
}

/// Holds the game's per-token lock past the commit of a move.
///
/// [`GameStore::play`] returns this alongside the outcome; the next
/// move on the same game cannot commit until it is dropped. Callers
/// that publish the outcome do so before dropping the guard, so
/// observers see moves in the order they were committed.
pub struct MoveGuard {
    _guard: OwnedMutexGuard<()>,
}

/// The rule-enforcing game store.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct GameStore<B> {
    backend: B,
    locks: TokenLocks,
}

impl<B: Backend> GameStore<B> {
    /// Wraps a backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            locks: TokenLocks::default(),
        }
    }

    /// Creates a game, optionally pre-seating one or both players.
    ///
    /// The game starts `pending` unless both seats were given, in which
    /// case it is immediately `on`. Player one always moves first.
    pub async fn new_game(
        &self,
        player1: &str,
        player2: &str,
    ) -> Result<GameRecord, StoreError> {
        let status = if !player1.is_empty() && !player2.is_empty() {
            GameStatus::On
        } else {
            GameStatus::Pending
        };
        let game = GameRecord {
            token: generate_token(),
            player1: player1.to_string(),
            player2: player2.to_string(),
            status,
            turn: true,
            board: Board::new(),
            last_change: now_ms(),
        };
        self.backend.insert_one(game.clone()).await?;
        tracing::info!(token = %game.token, ?status, "game created");
        Ok(game)
    }

    /// Fetches a game by token.
    pub async fn get_game(
        &self,
        token: &str,
    ) -> Result<GameRecord, StoreError> {
        self.backend
            .find_one(token)
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Tokens of every stored game.
    pub async fn all_games(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.backend.tokens().await?)
    }

    /// Seats a player in the first open seat of a pending game.
    ///
    /// `player2` may pre-fill the second seat in the same call. Once
    /// both seats are taken the game switches to `on`.
    pub async fn add_player(
        &self,
        token: &str,
        player: &str,
        player2: &str,
    ) -> Result<SeatAssignment, StoreError> {
        if player.is_empty() {
            return Err(StoreError::NoPlayer);
        }
        let _guard = self.locks.acquire(token).await;

        let game = self.get_game(token).await?;
        if game.status != GameStatus::Pending {
            return Err(StoreError::SeatsTaken);
        }

        let mut patch = GamePatch {
            last_change: Some(now_ms()),
            ..Default::default()
        };
        if game.player1.is_empty() {
            patch.player1 = Some(player.to_string());
            if !player2.is_empty() {
                patch.player2 = Some(player2.to_string());
                patch.status = Some(GameStatus::On);
            }
        } else {
            patch.player2 = Some(player.to_string());
            patch.status = Some(GameStatus::On);
        }

        let assignment = SeatAssignment {
            player1: patch.player1.clone().unwrap_or(game.player1),
            player2: patch.player2.clone().unwrap_or_default(),
            status: patch.status.unwrap_or(GameStatus::Pending),
        };
        if !self.backend.update_one(token, patch).await? {
            return Err(StoreError::NotFound);
        }
        tracing::info!(%token, %player, status = %assignment.status, "player seated");
        Ok(assignment)
    }

    /// Plays a move: drops `player`'s disc into `col`.
    ///
    /// The column arrives as `i64` straight from the wire so negative
    /// indices are rejected here rather than at deserialization. On
    /// success the record's win/tie status is resolved and the turn
    /// passes; the caller gets the move in wire shape plus a
    /// [`MoveGuard`] that keeps the game locked until the outcome has
    /// been published.
    pub async fn play(
        &self,
        token: &str,
        player: &str,
        col: i64,
    ) -> Result<(MoveOutcome, MoveGuard), StoreError> {
        let guard = self.locks.acquire(token).await;

        let game = self.get_game(token).await?;
        if !game.status.is_active() {
            return Err(StoreError::InactiveGame);
        }
        let seat = Seat::from_turn(game.turn);
        if player != game.name_at(seat) {
            return Err(StoreError::WrongTurn);
        }
        if !(0..COLUMNS as i64).contains(&col) {
            return Err(StoreError::ColumnOutOfRange);
        }
        let col = col as usize;
        if game.board.is_column_full(col) {
            return Err(StoreError::ColumnFull);
        }

        let mut board = game.board.clone();
        board
            .push(col, game.turn)
            .map_err(|_| StoreError::ColumnFull)?;

        let mut patch = GamePatch {
            last_change: Some(now_ms()),
            push: Some((col, game.turn)),
            ..Default::default()
        };
        // Win is resolved before tie: a line completed by the filling
        // move counts as a win.
        let status = if board.wins_at(col) {
            seat.winning_status()
        } else if board.is_tie() {
            GameStatus::Tie
        } else {
            patch.turn = Some(!game.turn);
            game.status
        };
        if status != game.status {
            patch.status = Some(status);
        }

        if !self.backend.update_one(token, patch).await? {
            return Err(StoreError::NotFound);
        }
        tracing::debug!(%token, %player, col, %status, "move played");
        Ok((
            MoveOutcome {
                last_move: col,
                last_played: seat,
                status,
                board,
            },
            MoveGuard { _guard: guard },
        ))
    }

    /// Deletes a game, returning its token.
    pub async fn delete_game(
        &self,
        token: &str,
    ) -> Result<String, StoreError> {
        let deleted = self.backend.delete_one(token).await?;
        self.locks.forget(token).await;
        if !deleted {
            return Err(StoreError::DeleteFailed);
        }
        tracing::info!(%token, "game deleted");
        Ok(token.to_string())
    }

    /// Deletes games untouched for `minutes` and reports the ones that
    /// will be deleted within the next `warning` minutes.
    pub async fn sweep_old_games(
        &self,
        minutes: u64,
        warning: u64,
    ) -> Result<SweepReport, StoreError> {
        let now = now_ms();
        let delete_cutoff = now.saturating_sub(minutes * 60_000);
        let warn_cutoff =
            now.saturating_sub(minutes.saturating_sub(warning) * 60_000);

        let deleted =
            self.backend.tokens_changed_before(delete_cutoff).await?;
        let warning = self
            .backend
            .tokens_changed_between(delete_cutoff, warn_cutoff)
            .await?;
        self.backend.delete_changed_before(delete_cutoff).await?;
        for token in &deleted {
            self.locks.forget(token).await;
        }

        if !deleted.is_empty() || !warning.is_empty() {
            tracing::info!(
                deleted = deleted.len(),
                warned = warning.len(),
                "swept stale games"
            );
        }
        Ok(SweepReport { deleted, warning })
    }
}

/// Random 32-character hex token (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Current time as epoch milliseconds.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `GameStore` over the in-memory backend, following
    //! the `test_{function}_{scenario}_{expected}` naming convention.

    use fourstack_board::ROWS;

    use super::*;
    use crate::MemoryBackend;

    // -- Helpers ----------------------------------------------------------

    fn store() -> GameStore<MemoryBackend> {
        GameStore::new(MemoryBackend::new())
    }

    /// Creates a running game between alice (player one) and bob.
    async fn running_game(store: &GameStore<MemoryBackend>) -> String {
        let game = store.new_game("alice", "bob").await.unwrap();
        game.token
    }

    /// Seeds a record directly into the backend, bypassing validation.
    async fn seed(
        store: &GameStore<MemoryBackend>,
        token: &str,
        board: Board,
        turn: bool,
        status: GameStatus,
        last_change: u64,
    ) {
        store
            .backend
            .insert_one(GameRecord {
                token: token.to_string(),
                player1: "alice".into(),
                player2: "bob".into(),
                status,
                turn,
                board,
                last_change,
            })
            .await
            .unwrap();
    }

    /// Columns of a full board with no line of four anywhere.
    fn tie_columns() -> [Vec<bool>; COLUMNS] {
        std::array::from_fn(|col| {
            if col % 2 == 0 {
                vec![true, true, false, false, true, true]
            } else {
                vec![false, false, true, true, false, false]
            }
        })
    }

    // =====================================================================
    // new_game()
    // =====================================================================

    #[tokio::test]
    async fn test_new_game_no_players_is_pending() {
        let store = store();
        let game = store.new_game("", "").await.unwrap();

        assert_eq!(game.status, GameStatus::Pending);
        assert!(game.turn, "player one moves first");
        assert_eq!(game.token.len(), 32);
        assert!(game.board.columns().iter().all(Vec::is_empty));
    }

    #[tokio::test]
    async fn test_new_game_one_player_is_pending() {
        let store = store();
        let game = store.new_game("alice", "").await.unwrap();
        assert_eq!(game.status, GameStatus::Pending);
        assert_eq!(game.player1, "alice");
    }

    #[tokio::test]
    async fn test_new_game_both_players_is_on() {
        let store = store();
        let game = store.new_game("alice", "bob").await.unwrap();
        assert_eq!(game.status, GameStatus::On);
    }

    #[tokio::test]
    async fn test_new_game_tokens_are_unique() {
        let store = store();
        let a = store.new_game("", "").await.unwrap();
        let b = store.new_game("", "").await.unwrap();
        assert_ne!(a.token, b.token);
    }

    // =====================================================================
    // get_game() / all_games()
    // =====================================================================

    #[tokio::test]
    async fn test_get_game_unknown_token_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get_game("nope").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_all_games_lists_every_token() {
        let store = store();
        let a = store.new_game("", "").await.unwrap().token;
        let b = store.new_game("", "").await.unwrap().token;

        let mut tokens = store.all_games().await.unwrap();
        tokens.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(tokens, expected);
    }

    // =====================================================================
    // add_player()
    // =====================================================================

    #[tokio::test]
    async fn test_add_player_fills_seats_in_order() {
        let store = store();
        let token = store.new_game("", "").await.unwrap().token;

        let first = store.add_player(&token, "alice", "").await.unwrap();
        assert_eq!(first.player1, "alice");
        assert_eq!(first.player2, "");
        assert_eq!(first.status, GameStatus::Pending);

        let second = store.add_player(&token, "bob", "").await.unwrap();
        assert_eq!(second.player2, "bob");
        assert_eq!(second.status, GameStatus::On);

        let game = store.get_game(&token).await.unwrap();
        assert_eq!(game.player1, "alice");
        assert_eq!(game.player2, "bob");
        assert_eq!(game.status, GameStatus::On);
    }

    #[tokio::test]
    async fn test_add_player_both_at_once_starts_game() {
        let store = store();
        let token = store.new_game("", "").await.unwrap().token;

        let seats = store.add_player(&token, "alice", "bob").await.unwrap();
        assert_eq!(seats.player1, "alice");
        assert_eq!(seats.player2, "bob");
        assert_eq!(seats.status, GameStatus::On);
    }

    #[tokio::test]
    async fn test_add_player_empty_name_is_rejected() {
        let store = store();
        let token = store.new_game("", "").await.unwrap().token;
        assert!(matches!(
            store.add_player(&token, "", "").await,
            Err(StoreError::NoPlayer)
        ));
    }

    #[tokio::test]
    async fn test_add_player_unknown_token_is_not_found() {
        let store = store();
        assert!(matches!(
            store.add_player("nope", "alice", "").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_add_player_on_started_game_is_rejected() {
        let store = store();
        let token = running_game(&store).await;
        assert!(matches!(
            store.add_player(&token, "carol", "").await,
            Err(StoreError::SeatsTaken)
        ));
    }

    // =====================================================================
    // play()
    // =====================================================================

    #[tokio::test]
    async fn test_play_alternates_turns() {
        let store = store();
        let token = running_game(&store).await;

        let (first, _) = store.play(&token, "alice", 3).await.unwrap();
        assert_eq!(first.last_move, 3);
        assert_eq!(first.last_played, Seat::Player1);
        assert_eq!(first.status, GameStatus::On);

        let (second, _) = store.play(&token, "bob", 3).await.unwrap();
        assert_eq!(second.last_played, Seat::Player2);
        assert_eq!(second.board.columns()[3], vec![true, false]);

        let game = store.get_game(&token).await.unwrap();
        assert!(game.turn, "turn is back with player one");
    }

    #[tokio::test]
    async fn test_play_out_of_turn_is_rejected() {
        let store = store();
        let token = running_game(&store).await;

        assert!(matches!(
            store.play(&token, "bob", 0).await,
            Err(StoreError::WrongTurn)
        ));
        // Strangers are indistinguishable from out-of-turn players.
        assert!(matches!(
            store.play(&token, "mallory", 0).await,
            Err(StoreError::WrongTurn)
        ));
    }

    #[tokio::test]
    async fn test_play_on_pending_game_is_rejected() {
        let store = store();
        let token = store.new_game("alice", "").await.unwrap().token;
        assert!(matches!(
            store.play(&token, "alice", 0).await,
            Err(StoreError::InactiveGame)
        ));
    }

    #[tokio::test]
    async fn test_play_column_out_of_range() {
        let store = store();
        let token = running_game(&store).await;

        assert!(matches!(
            store.play(&token, "alice", 7).await,
            Err(StoreError::ColumnOutOfRange)
        ));
        assert!(matches!(
            store.play(&token, "alice", -1).await,
            Err(StoreError::ColumnOutOfRange)
        ));
    }

    #[tokio::test]
    async fn test_play_full_column_is_rejected() {
        let store = store();
        let token = running_game(&store).await;

        for turn in 0..ROWS {
            let player = if turn % 2 == 0 { "alice" } else { "bob" };
            store.play(&token, player, 0).await.unwrap();
        }
        assert!(matches!(
            store.play(&token, "alice", 0).await,
            Err(StoreError::ColumnFull)
        ));
    }

    #[tokio::test]
    async fn test_play_vertical_win_finishes_game() {
        let store = store();
        let token = running_game(&store).await;

        // Alice stacks column 0, bob wastes moves in column 1.
        for _ in 0..3 {
            store.play(&token, "alice", 0).await.unwrap();
            store.play(&token, "bob", 1).await.unwrap();
        }
        let (outcome, _) = store.play(&token, "alice", 0).await.unwrap();
        assert_eq!(outcome.status, GameStatus::Player1);
        assert_eq!(outcome.last_played, Seat::Player1);

        let game = store.get_game(&token).await.unwrap();
        assert_eq!(game.status, GameStatus::Player1);
        assert!(game.turn, "turn does not pass after a finishing move");
    }

    #[tokio::test]
    async fn test_play_on_finished_game_is_rejected() {
        let store = store();
        let token = running_game(&store).await;
        for _ in 0..3 {
            store.play(&token, "alice", 0).await.unwrap();
            store.play(&token, "bob", 1).await.unwrap();
        }
        store.play(&token, "alice", 0).await.unwrap();

        assert!(matches!(
            store.play(&token, "bob", 2).await,
            Err(StoreError::InactiveGame)
        ));
    }

    #[tokio::test]
    async fn test_play_final_move_without_line_is_tie() {
        let store = store();
        let mut columns = tie_columns();
        let last_disc = columns[6].pop().unwrap();
        seed(
            &store,
            "almost-tied",
            Board::from_columns(columns).unwrap(),
            last_disc,
            GameStatus::On,
            now_ms(),
        )
        .await;

        let player = if last_disc { "alice" } else { "bob" };
        let (outcome, _) = store.play("almost-tied", player, 6).await.unwrap();
        assert_eq!(outcome.status, GameStatus::Tie);
        assert!(outcome.board.is_full());

        let game = store.get_game("almost-tied").await.unwrap();
        assert_eq!(game.status, GameStatus::Tie);
    }

    #[tokio::test]
    async fn test_play_final_move_with_line_is_win_not_tie() {
        let store = store();
        let mut columns = tie_columns();
        columns[0] = vec![true, true, true, true, true];
        seed(
            &store,
            "last-gasp",
            Board::from_columns(columns).unwrap(),
            true,
            GameStatus::On,
            now_ms(),
        )
        .await;

        let (outcome, _) = store.play("last-gasp", "alice", 0).await.unwrap();
        assert!(outcome.board.is_full());
        assert_eq!(outcome.status, GameStatus::Player1);
    }

    #[tokio::test]
    async fn test_play_guard_blocks_next_move_until_dropped() {
        let store = Arc::new(store());
        let token = running_game(&store).await;

        let (_, guard) = store.play(&token, "alice", 0).await.unwrap();

        let contender = {
            let store = Arc::clone(&store);
            let token = token.clone();
            tokio::spawn(async move {
                store.play(&token, "bob", 1).await.unwrap().0
            })
        };
        tokio::task::yield_now().await;
        assert!(
            !contender.is_finished(),
            "second move must wait for the first move's guard"
        );

        drop(guard);
        let outcome = contender.await.unwrap();
        assert_eq!(outcome.last_played, Seat::Player2);
    }

    // =====================================================================
    // delete_game()
    // =====================================================================

    #[tokio::test]
    async fn test_delete_game_removes_record() {
        let store = store();
        let token = running_game(&store).await;

        assert_eq!(store.delete_game(&token).await.unwrap(), token);
        assert!(matches!(
            store.get_game(&token).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_game_unknown_token_fails() {
        let store = store();
        assert!(matches!(
            store.delete_game("nope").await,
            Err(StoreError::DeleteFailed)
        ));
    }

    // =====================================================================
    // sweep_old_games()
    // =====================================================================

    #[tokio::test]
    async fn test_sweep_old_games_deletes_and_warns() {
        let store = store();
        let now = now_ms();
        // 181 minutes idle: past the 180-minute deletion cutoff.
        seed(&store, "stale", Board::new(), true, GameStatus::On, now - 181 * 60_000).await;
        // 170 minutes idle: inside the 15-minute warning window.
        seed(&store, "aging", Board::new(), true, GameStatus::On, now - 170 * 60_000).await;
        seed(&store, "fresh", Board::new(), true, GameStatus::On, now).await;

        let report = store.sweep_old_games(180, 15).await.unwrap();
        assert_eq!(report.deleted, vec!["stale"]);
        assert_eq!(report.warning, vec!["aging"]);

        assert!(matches!(
            store.get_game("stale").await,
            Err(StoreError::NotFound)
        ));
        assert!(store.get_game("aging").await.is_ok());
        assert!(store.get_game("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_old_games_nothing_stale_is_empty() {
        let store = store();
        running_game(&store).await;

        let report = store.sweep_old_games(180, 15).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(report.warning.is_empty());
    }
}
