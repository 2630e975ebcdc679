//! Stored game records and the result types of store operations.

use std::fmt;

use fourstack_board::Board;
use serde::{Deserialize, Serialize};

/// Where a game is in its lifecycle.
///
/// Serialized lowercase; the terminal `Player1`/`Player2` values double
/// as "who won".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Waiting for both seats to be taken.
    Pending,
    /// Both seats taken, moves accepted.
    On,
    /// Finished: player one won.
    Player1,
    /// Finished: player two won.
    Player2,
    /// Finished: board full, nobody won.
    Tie,
}

impl GameStatus {
    /// Whether moves are currently accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::On => "on",
            Self::Player1 => "player1",
            Self::Player2 => "player2",
            Self::Tie => "tie",
        };
        write!(f, "{s}")
    }
}

/// One of the two seats at a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    /// The seat whose turn it is, given the stored turn flag
    /// (`true` means player one).
    pub fn from_turn(turn: bool) -> Self {
        if turn { Self::Player1 } else { Self::Player2 }
    }

    /// The winning status for this seat.
    pub fn winning_status(self) -> GameStatus {
        match self {
            Self::Player1 => GameStatus::Player1,
            Self::Player2 => GameStatus::Player2,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => write!(f, "player1"),
            Self::Player2 => write!(f, "player2"),
        }
    }
}

/// A stored game.
///
/// `player1` and `player2` hold player names; an empty string marks a
/// seat that has not been taken yet. `turn == true` means it is player
/// one's move. `last_change` is epoch milliseconds, bumped on every
/// mutation so the sweeper can find abandoned games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub token: String,
    pub player1: String,
    pub player2: String,
    pub status: GameStatus,
    pub turn: bool,
    pub board: Board,
    pub last_change: u64,
}

impl GameRecord {
    /// The name seated as `seat`, or an empty string if the seat is open.
    pub fn name_at(&self, seat: Seat) -> &str {
        match seat {
            Seat::Player1 => &self.player1,
            Seat::Player2 => &self.player2,
        }
    }

    /// The seat a player name occupies, if any. An empty name never
    /// matches, even against an open seat.
    pub fn seat_of(&self, player: &str) -> Option<Seat> {
        if player.is_empty() {
            None
        } else if self.player1 == player {
            Some(Seat::Player1)
        } else if self.player2 == player {
            Some(Seat::Player2)
        } else {
            None
        }
    }
}

/// The result of a successful move, in wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// The column the disc was dropped into.
    pub last_move: usize,
    /// The seat that made the move.
    pub last_played: Seat,
    /// Game status after the move.
    pub status: GameStatus,
    /// Full board after the move.
    pub board: Board,
}

/// The seats after an [`add_player`](crate::GameStore::add_player) call.
/// `player2` is empty while the second seat is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub player1: String,
    pub player2: String,
    pub status: GameStatus,
}

/// Outcome of a sweep pass over stale games.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Tokens of games deleted this pass.
    pub deleted: Vec<String>,
    /// Tokens of games that will be deleted soon unless touched.
    pub warning: Vec<String>,
}
