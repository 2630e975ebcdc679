//! Periodic stale-game sweeper.
//!
//! Idle games get one warning in chat before they go. Deleting the room
//! sends the code-6 close notice and drops every socket in it, so
//! lingering spectators of a dead game do not hold connections open.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;

use fourstack_protocol::{Reply, RoomId};
use fourstack_store::Backend;

use crate::server::{AppState, SweepConfig};

pub(crate) fn spawn_sweeper<B: Backend>(
    state: Arc<AppState<B>>,
    config: SweepConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.every);
        // The builder already swept at startup; skip the immediate tick.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let report = match state
                .store
                .sweep_old_games(config.max_idle_minutes, config.warning_minutes)
                .await
            {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(%err, "sweep pass failed");
                    continue;
                }
            };

            if report.deleted.is_empty() && report.warning.is_empty() {
                continue;
            }
            tracing::info!(
                deleted = report.deleted.len(),
                warned = report.warning.len(),
                "sweep pass"
            );

            let mut registry = state.registry.lock().await;
            for token in &report.deleted {
                registry.delete_room(&RoomId::new(token.clone()));
            }
            for token in &report.warning {
                registry.broadcast_to_room(
                    &RoomId::new(token.clone()),
                    &Reply::ok(
                        "chat_msg",
                        json!({
                            "username": "Game Admin",
                            "msg": "This game will be deleted soon unless someone makes a move",
                        }),
                    ),
                );
            }
        }
    })
}
