//! Game persistence for Fourstack.
//!
//! This crate owns the lifecycle of a game record:
//!
//! - **Types** ([`GameRecord`], [`GameStatus`], [`Seat`], the operation
//!   result types) - what a stored game looks like.
//! - **Backend** ([`Backend`] trait, [`GamePatch`], [`MemoryBackend`]) -
//!   where records live. The trait is async so a database-backed
//!   implementation can slot in without touching the store.
//! - **Store** ([`GameStore`]) - the rule-enforcing layer: seat
//!   assignment, turn order, move legality, win/tie resolution, and
//!   stale-game sweeping. All game rules live here; backends only
//!   persist what the store decides.

mod backend;
mod error;
mod memory;
mod store;
mod types;

pub use backend::{Backend, BackendError, GamePatch};
pub use error::StoreError;
pub use fourstack_board::Board;
pub use memory::MemoryBackend;
pub use store::{GameStore, MoveGuard};
pub use types::{
    GameRecord, GameStatus, MoveOutcome, Seat, SeatAssignment, SweepReport,
};
