//! Server assembly: shared state, the builder, and the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};
use tokio::sync::Mutex;

use fourstack_protocol::RoomId;
use fourstack_registry::Registry;
use fourstack_store::{Backend, GameStore};
use fourstack_transport::{Connection, Transport, WebSocketTransport};

use crate::control::ControlApi;
use crate::coordinator::Handlers;
use crate::error::ServerError;
use crate::handler::handle_connection;
use crate::sweep::spawn_sweeper;

/// State shared by every connection task, the sweeper, and the control
/// surface.
///
/// The registry sits behind one async mutex; handlers lock it for the
/// duration of a registry call and release it before touching the
/// store. The store does its own per-game locking.
pub(crate) struct AppState<B: Backend> {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) store: GameStore<B>,
}

/// Stale-game sweeper settings.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// How often the sweeper wakes up.
    pub every: Duration,
    /// Games untouched for this many minutes are deleted.
    pub max_idle_minutes: u64,
    /// Games within this many minutes of deletion get a warning
    /// broadcast to their room.
    pub warning_minutes: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            every: Duration::from_secs(60),
            max_idle_minutes: 180,
            warning_minutes: 15,
        }
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    bind_addr: String,
    sweep: SweepConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            sweep: SweepConfig::default(),
        }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen address (default `127.0.0.1:8080`). Use port 0
    /// for an OS-assigned port.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Overrides the sweeper settings.
    pub fn sweep(mut self, sweep: SweepConfig) -> Self {
        self.sweep = sweep;
        self
    }

    /// Binds the listener, grooms the store, and rebuilds a room for
    /// every surviving game.
    pub async fn build<B: Backend>(
        self,
        backend: B,
    ) -> Result<Server<B>, ServerError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let store = GameStore::new(backend);

        // Games already past the idle cutoff never get a room.
        let report = store
            .sweep_old_games(self.sweep.max_idle_minutes, self.sweep.warning_minutes)
            .await?;
        if !report.deleted.is_empty() {
            tracing::info!(
                count = report.deleted.len(),
                "removed stale games at startup"
            );
        }

        let handlers = Arc::new(Handlers::new());
        let mut registry = Registry::with_allowed_actions(handlers.actions());

        for (i, token) in store.all_games().await?.into_iter().enumerate() {
            let mut metadata = Map::new();
            metadata.insert(
                "name".to_string(),
                json!(format!("New Room {}", i + 1)),
            );
            registry.new_room(RoomId::new(token), metadata)?;
        }

        Ok(Server {
            transport,
            state: Arc::new(AppState {
                registry: Mutex::new(registry),
                store,
            }),
            handlers,
            sweep: self.sweep,
        })
    }
}

/// The assembled server: WebSocket listener, registry, store,
/// coordinator, and sweeper.
pub struct Server<B: Backend> {
    transport: WebSocketTransport,
    state: Arc<AppState<B>>,
    handlers: Arc<Handlers<B>>,
    sweep: SweepConfig,
}

impl<B: Backend> Server<B> {
    /// The bound listen address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle for driving the server from outside the socket: game
    /// and player creation, existence checks, game copies.
    pub fn control(&self) -> ControlApi<B> {
        ControlApi::new(Arc::clone(&self.state))
    }

    /// Runs the sweeper and the accept loop. Each accepted connection
    /// gets its own task; a connection failing never takes the server
    /// down.
    pub async fn run(mut self) -> Result<(), ServerError> {
        spawn_sweeper(Arc::clone(&self.state), self.sweep);

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    let handlers = Arc::clone(&self.handlers);
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        if let Err(err) =
                            handle_connection(conn, state, handlers).await
                        {
                            tracing::debug!(%conn_id, %err, "connection ended with error");
                        }
                    });
                }
                Err(err) => {
                    tracing::error!(%err, "failed to accept connection");
                }
            }
        }
    }
}
