//! Connect-four board engine.
//!
//! A [`Board`] is seven columns of discs. Each column is a stack that
//! fills bottom-up, and each disc is a `bool`: `true` for player one,
//! `false` for player two. The board knows nothing about turns, games,
//! or players beyond that bit - turn order and game lifecycle live a
//! layer up.
//!
//! The wire representation is exactly the in-memory one: an array of
//! seven bool-arrays, where index 0 of each inner array is the bottom
//! of the column.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of columns on the board.
pub const COLUMNS: usize = 7;

/// Maximum number of discs per column.
pub const ROWS: usize = 6;

/// How many discs in a line win the game.
const WIN_LENGTH: usize = 4;

/// Errors from board mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// The column index is not in `0..COLUMNS`.
    #[error("column index out of range")]
    ColumnOutOfRange,

    /// The column already holds [`ROWS`] discs.
    #[error("column is full")]
    ColumnFull,

    /// A seeded column exceeds [`ROWS`] discs.
    #[error("column exceeds board height")]
    ColumnTooTall,
}

/// A connect-four board: seven bottom-up stacks of discs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([Vec<bool>; COLUMNS]);

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self(std::array::from_fn(|_| Vec::new()))
    }

    /// Builds a board from pre-filled columns, validating column heights.
    ///
    /// # Errors
    /// Returns [`BoardError::ColumnTooTall`] if any column holds more than
    /// [`ROWS`] discs.
    pub fn from_columns(
        columns: [Vec<bool>; COLUMNS],
    ) -> Result<Self, BoardError> {
        if columns.iter().any(|column| column.len() > ROWS) {
            return Err(BoardError::ColumnTooTall);
        }
        Ok(Self(columns))
    }

    /// Returns the columns as slices, bottom disc first.
    pub fn columns(&self) -> &[Vec<bool>; COLUMNS] {
        &self.0
    }

    /// Number of discs currently in `col`.
    ///
    /// # Panics
    /// Panics if `col >= COLUMNS`; callers validate the index first.
    pub fn height(&self, col: usize) -> usize {
        self.0[col].len()
    }

    /// Whether `col` can take no more discs.
    pub fn is_column_full(&self, col: usize) -> bool {
        self.height(col) >= ROWS
    }

    /// Whether every column is full.
    pub fn is_full(&self) -> bool {
        (0..COLUMNS).all(|col| self.is_column_full(col))
    }

    /// The disc at `(col, row)`, or `None` if the cell is off the board
    /// or above the column's current fill level.
    fn cell(&self, col: i64, row: i64) -> Option<bool> {
        if !(0..COLUMNS as i64).contains(&col) || row < 0 {
            return None;
        }
        self.0[col as usize].get(row as usize).copied()
    }

    /// Drops a disc into `col` and returns the row it landed in.
    ///
    /// # Errors
    /// Returns [`BoardError::ColumnOutOfRange`] for a bad index and
    /// [`BoardError::ColumnFull`] when the column holds [`ROWS`] discs.
    pub fn push(
        &mut self,
        col: usize,
        player1: bool,
    ) -> Result<usize, BoardError> {
        if col >= COLUMNS {
            return Err(BoardError::ColumnOutOfRange);
        }
        if self.is_column_full(col) {
            return Err(BoardError::ColumnFull);
        }
        self.0[col].push(player1);
        Ok(self.0[col].len() - 1)
    }

    /// Whether the most recent disc in `col` completes a line of four.
    ///
    /// Only lines through that disc are scanned: the board is checked
    /// after every move, so any older line would already have ended the
    /// game. Returns `false` for an out-of-range or empty column.
    pub fn wins_at(&self, col: usize) -> bool {
        if col >= COLUMNS || self.0[col].is_empty() {
            return false;
        }
        let row = (self.0[col].len() - 1) as i64;
        let col = col as i64;
        let player = self.0[col as usize][row as usize];

        // One scan per direction through the landed cell. Cells that are
        // off the board or not yet filled never match.
        let vertical = (0..ROWS as i64).map(|r| (col, r));
        let horizontal = (0..COLUMNS as i64).map(|c| (c, row));
        let rising = (0..COLUMNS as i64).map(|c| (c, row - col + c));
        let falling = (0..COLUMNS as i64).map(|c| (c, row + col - c));

        self.has_run(vertical, player)
            || self.has_run(horizontal, player)
            || self.has_run(rising, player)
            || self.has_run(falling, player)
    }

    /// Whether the board is a tie: completely full with no line of four.
    ///
    /// Callers check [`wins_at`](Self::wins_at) first, so a full board
    /// whose final move also won reports the win, not the tie.
    pub fn is_tie(&self) -> bool {
        self.is_full()
    }

    /// Scans a line of cells for `WIN_LENGTH` consecutive discs owned by
    /// `player`.
    fn has_run(
        &self,
        cells: impl Iterator<Item = (i64, i64)>,
        player: bool,
    ) -> bool {
        let mut run = 0;
        for (c, r) in cells {
            if self.cell(c, r) == Some(player) {
                run += 1;
                if run >= WIN_LENGTH {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    }
}
