//! The control surface: game and player lifecycle driven from outside
//! the socket protocol.
//!
//! An HTTP layer (or an admin CLI, or a test) gets one of these from
//! [`Server::control`](crate::Server::control) and uses it to mint
//! games, register players ahead of their first connection, check
//! whether an identity is still known, and fork finished games into
//! fresh ones.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use fourstack_protocol::{Reply, RoomId, UserId};
use fourstack_registry::{PartySnapshot, RegistryError};
use fourstack_store::{Backend, StoreError};

use crate::server::AppState;

/// Errors from the control surface.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A player name was required but missing or empty.
    #[error("No name was given")]
    NoName,

    /// A game token was required but missing or empty.
    #[error("No token was given")]
    NoToken,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Response to [`ControlApi::new_game`] and [`ControlApi::copy_game`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameResponse {
    /// Token identifying the game and its room.
    pub game_token: String,
    /// Join path for the game.
    pub url: String,
    /// The creator's identity, when one was seated at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_user: Option<PartySnapshot>,
}

/// Response to [`ControlApi::new_player`].
#[derive(Debug, Clone, Serialize)]
pub struct NewPlayerResponse {
    /// The minted identity, ready to be used in a `register` message.
    pub user: PartySnapshot,
}

/// Response to [`ControlApi::user_exist`].
#[derive(Debug, Clone, Serialize)]
pub struct UserExistence {
    pub exist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Handle over the shared server state. Cheap to clone.
pub struct ControlApi<B: Backend> {
    state: Arc<AppState<B>>,
}

impl<B: Backend> Clone for ControlApi<B> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: Backend> ControlApi<B> {
    pub(crate) fn new(state: Arc<AppState<B>>) -> Self {
        Self { state }
    }

    /// Creates a game and its room. `player` may be empty, leaving both
    /// seats open; when given, it takes the first seat and the identity
    /// is registered so the creator's later `register` message finds it.
    pub async fn new_game(
        &self,
        player: &str,
    ) -> Result<NewGameResponse, ControlError> {
        let game = self.state.store.new_game(player, "").await?;

        let mut registry = self.state.registry.lock().await;
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!("New Room"));
        registry.new_room(RoomId::new(game.token.clone()), metadata)?;

        let registered_user = if player.is_empty() {
            None
        } else {
            let id = UserId::new(player);
            if !registry.has_user(&id) {
                registry.new_user(Some(id.clone()), Map::new())?;
            }
            registry.user_snapshot(&id)
        };

        Ok(NewGameResponse {
            url: format!("/game/{}", game.token),
            game_token: game.token,
            registered_user,
        })
    }

    /// Mints a user with the given display name.
    pub async fn new_player(
        &self,
        name: &str,
    ) -> Result<NewPlayerResponse, ControlError> {
        if name.is_empty() {
            return Err(ControlError::NoName);
        }
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!(name));

        let mut registry = self.state.registry.lock().await;
        let user = registry.new_user(None, metadata)?;
        Ok(NewPlayerResponse { user })
    }

    /// Whether an identity is still known, with its metadata when it is.
    pub async fn user_exist(&self, id: &str) -> UserExistence {
        let registry = self.state.registry.lock().await;
        match registry.user_snapshot(&UserId::new(id)) {
            Some(user) => UserExistence {
                exist: true,
                metadata: Some(user.metadata),
            },
            None => UserExistence {
                exist: false,
                metadata: None,
            },
        }
    }

    /// Forks a game: same seats, fresh board. The old game's room gets
    /// a chat message linking to the new one, so everyone can follow.
    pub async fn copy_game(
        &self,
        token: &str,
    ) -> Result<NewGameResponse, ControlError> {
        if token.is_empty() {
            return Err(ControlError::NoToken);
        }
        let game = self.state.store.get_game(token).await?;
        let copy = self
            .state
            .store
            .new_game(&game.player1, &game.player2)
            .await?;

        let mut registry = self.state.registry.lock().await;
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!("New Room"));
        registry.new_room(RoomId::new(copy.token.clone()), metadata)?;

        registry.broadcast_to_room(
            &RoomId::new(token.to_string()),
            &Reply::ok(
                "chat_msg",
                json!({
                    "username": "Game Admin",
                    "msg": format!("<a href=\"{}\">New Game</a>", copy.token),
                    "allow_link": true,
                }),
            ),
        );

        Ok(NewGameResponse {
            url: format!("/game/{}", copy.token),
            game_token: copy.token,
            registered_user: None,
        })
    }
}
