//! # Fourstack
//!
//! A real-time connect-four room server. Browsers connect over
//! WebSocket, register into a game's room, and the server coordinates
//! seats, turns, spectators, chat, and room lifecycle. All state is
//! server-authoritative.
//!
//! The workspace layers, bottom to top:
//!
//! - `fourstack-board`: the board and win/tie detection.
//! - `fourstack-protocol`: the JSON wire grammar.
//! - `fourstack-transport`: WebSocket accept/send/recv.
//! - `fourstack-store`: game records behind a storage backend.
//! - `fourstack-registry`: users, rooms, and connection bindings.
//! - this crate: the coordinator wiring them together, plus the
//!   server loop, control surface, and stale-game sweeper.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fourstack::{MemoryBackend, ServerBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(MemoryBackend::new())
//!     .await?;
//! let control = server.control();
//! let game = control.new_game("").await?;
//! println!("share {}", game.url);
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

mod control;
mod coordinator;
mod error;
mod handler;
mod server;
mod sweep;

pub use control::{
    ControlApi, ControlError, NewGameResponse, NewPlayerResponse,
    UserExistence,
};
pub use error::ServerError;
pub use fourstack_store::MemoryBackend;
pub use server::{Server, ServerBuilder, SweepConfig};
