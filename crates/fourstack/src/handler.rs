//! Per-connection lifecycle: the outbound pump, the inbound loop, and
//! teardown.

use std::sync::Arc;

use tokio::sync::mpsc;

use fourstack_store::Backend;
use fourstack_transport::{Connection, WebSocketConnection};

use crate::coordinator::Handlers;
use crate::error::ServerError;
use crate::server::AppState;

/// Drives one connection from attach to close.
///
/// Outbound frames flow through an unbounded channel drained by a pump
/// task, so broadcasts never block on a slow socket. The registry holds
/// the sender half; when it drops the sender (explicit deletion or
/// close teardown) the pump ends and closes the socket.
///
/// Inbound frames are admitted under the registry lock and dispatched
/// after it is released, one at a time in arrival order.
pub(crate) async fn handle_connection<B: Backend>(
    conn: WebSocketConnection,
    state: Arc<AppState<B>>,
    handlers: Arc<Handlers<B>>,
) -> Result<(), ServerError> {
    let conn_id = conn.id();
    let conn = Arc::new(conn);
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    state.registry.lock().await.attach(conn_id, tx);
    tracing::debug!(%conn_id, "connection attached");

    let writer = Arc::clone(&conn);
    let pump = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer.send(&frame).await.is_err() {
                break;
            }
        }
        let _ = writer.close().await;
    });

    let mut failure = None;
    loop {
        match conn.recv().await {
            Ok(Some(frame)) => {
                let event = state
                    .registry
                    .lock()
                    .await
                    .admit(conn_id, &frame);
                if let Some(event) = event {
                    handlers.dispatch(Arc::clone(&state), event).await;
                }
            }
            Ok(None) => break,
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    // Teardown drops the registry's sender half, which ends the pump.
    let close_event = state.registry.lock().await.handle_close(conn_id);
    if let Some(event) = close_event {
        handlers.dispatch(Arc::clone(&state), event).await;
    }
    let _ = pump.await;
    tracing::debug!(%conn_id, "connection closed");

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
