//! The session coordinator: named action handlers over the registry
//! and the game store.
//!
//! Each inbound action maps to exactly one handler through an explicit
//! table; the registry's allow-list is seeded from the same table, so
//! an action without a handler is rejected at admission and can never
//! reach [`Handlers::dispatch`] with an unknown name.
//!
//! Handlers receive the event plus shared state and do all their own
//! locking. The registry lock is held only around registry calls, never
//! across a store await.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value};

use fourstack_protocol::{Reply, RoomId, UserId};
use fourstack_registry::Event;
use fourstack_store::{Backend, GameRecord, GameStatus, Seat};

use crate::server::AppState;

pub(crate) type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub(crate) type HandlerFn<B> = fn(Arc<AppState<B>>, Event) -> HandlerFuture;

/// The action-to-handler table.
pub(crate) struct Handlers<B: Backend> {
    map: HashMap<&'static str, HandlerFn<B>>,
}

impl<B: Backend> Handlers<B> {
    pub(crate) fn new() -> Self {
        let mut map: HashMap<&'static str, HandlerFn<B>> = HashMap::new();
        map.insert("register", on_register::<B>);
        map.insert("close", on_close::<B>);
        map.insert("change_name", on_change_name::<B>);
        map.insert("change_room_name", on_change_room_name::<B>);
        map.insert("get_game_status", on_get_game_status::<B>);
        map.insert("game_move", on_game_move::<B>);
        map.insert("chat_msg", on_chat_msg::<B>);
        Self { map }
    }

    /// The action names this coordinator handles; used to seed the
    /// registry's allow-list.
    pub(crate) fn actions(&self) -> Vec<&'static str> {
        self.map.keys().copied().collect()
    }

    /// Runs the handler for an admitted event to completion.
    pub(crate) async fn dispatch(
        &self,
        state: Arc<AppState<B>>,
        event: Event,
    ) {
        match self.map.get(event.act.as_str()) {
            Some(handler) => handler(state, event).await,
            None => {
                tracing::debug!(act = %event.act, "no handler for action");
            }
        }
    }
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// `register`: resolve the joiner's position (seating them if the game
/// is still pending), answer with the full game snapshot, and announce
/// the arrival to the room.
fn on_register<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let token = RoomId::new(event.room.id.clone());
        let user = event.user.id.clone();

        let mut game = match state.store.get_game(token.as_str()).await {
            Ok(game) => game,
            Err(err) => {
                answer(
                    &event,
                    "game_status",
                    json!({ "msg": err.to_string() }),
                    false,
                );
                return;
            }
        };

        let mut game_just_started = false;
        let position = if user == game.player1 {
            "player1"
        } else if user == game.player2 {
            "player2"
        } else if game.status == GameStatus::Pending {
            match state.store.add_player(token.as_str(), &user, "").await {
                Ok(seats) => {
                    game.player1 = seats.player1;
                    if !seats.player2.is_empty() {
                        game.player2 = seats.player2;
                    }
                    if game.status != seats.status {
                        game.status = seats.status;
                        game_just_started = true;
                    }
                    if game.player1 == user { "player1" } else { "player2" }
                }
                // Lost the seat race to a concurrent joiner.
                Err(_) => "watcher",
            }
        } else {
            "watcher"
        };

        let users = roster(&state, &token, &game, Some(&user)).await;
        let payload = game_status_payload(&game, position, users, &event);
        answer(&event, "game_status", payload, true);

        state.registry.lock().await.broadcast_to_room(
            &token,
            &Reply::ok(
                "user_enter",
                json!({
                    "position": position,
                    "metadata": event.user.metadata,
                    "users": event.room.connections,
                    "gameJustStarted": game_just_started,
                }),
            ),
        );
    })
}

/// `close`: announce the departure with the position the user held.
fn on_close<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let token = RoomId::new(event.room.id.clone());
        let Ok(game) = state.store.get_game(token.as_str()).await else {
            return;
        };
        let position = position_of(&game, &event.user.id);
        state.registry.lock().await.broadcast_to_room(
            &token,
            &Reply::ok(
                "user_left",
                json!({
                    "position": position,
                    "metadata": event.user.metadata,
                }),
            ),
        );
    })
}

/// `change_name`: update the display name, then tell every room where
/// this user is actually seated.
fn on_change_name<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let Some(name) = string_field(&event.data, "name") else {
            return;
        };
        let name = name.to_string();
        let user = UserId::new(event.user.id.clone());

        let rooms = {
            let mut registry = state.registry.lock().await;
            if let Some(metadata) = registry.user_metadata_mut(&user) {
                metadata.insert("name".to_string(), json!(name));
            }
            registry.rooms_by_user(&user).unwrap_or_default()
        };

        for room in rooms {
            let Ok(game) = state.store.get_game(&room.id).await else {
                continue;
            };
            // Watchers rename silently; only seated players are announced.
            let Some(seat) = game.seat_of(user.as_str()) else {
                continue;
            };
            state.registry.lock().await.broadcast_to_room(
                &RoomId::new(game.token),
                &Reply::ok(
                    "player_changed_name",
                    json!({ "position": seat, "name": name }),
                ),
            );
        }
    })
}

/// `change_room_name`: seated players only; update the room metadata
/// and announce the new name room-wide.
fn on_change_room_name<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let Some(name) = string_field(&event.data, "name") else {
            return;
        };
        let name = name.to_string();
        let token = RoomId::new(event.room.id.clone());
        let Ok(game) = state.store.get_game(token.as_str()).await else {
            return;
        };
        if game.seat_of(&event.user.id).is_none() {
            return;
        }

        let mut registry = state.registry.lock().await;
        if let Some(metadata) = registry.room_metadata_mut(&token) {
            metadata.insert("name".to_string(), json!(name));
        }
        registry.broadcast_to_room(
            &token,
            &Reply::ok("new_room_name", json!({ "name": name })),
        );
    })
}

/// `get_game_status`: snapshot answered to the requester only.
fn on_get_game_status<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let token = RoomId::new(event.room.id.clone());
        let game = match state.store.get_game(token.as_str()).await {
            Ok(game) => game,
            Err(err) => {
                answer(
                    &event,
                    "game_status",
                    json!({ "msg": err.to_string() }),
                    false,
                );
                return;
            }
        };
        let position = position_of(&game, &event.user.id);
        let users = roster(&state, &token, &game, None).await;
        let payload = game_status_payload(&game, position, users, &event);
        answer(&event, "game_status", payload, true);
    })
}

/// `game_move`: play the column; a rejected move is answered to the
/// mover only, an accepted one is broadcast to the whole room.
fn on_game_move<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let Some(col) = event.data.get("col").and_then(Value::as_i64)
        else {
            answer(
                &event,
                "failed_move",
                json!({ "msg": "No column number" }),
                false,
            );
            return;
        };
        let token = RoomId::new(event.room.id.clone());

        match state.store.play(token.as_str(), &event.user.id, col).await {
            Ok((outcome, lock)) => {
                // The game stays locked until the move is queued, so
                // room broadcasts carry moves in commit order.
                state.registry.lock().await.broadcast_to_room(
                    &token,
                    &Reply::ok("game_move", json!(outcome)),
                );
                drop(lock);
            }
            Err(err) => {
                answer(
                    &event,
                    "failed_move",
                    json!({ "msg": err.to_string() }),
                    false,
                );
            }
        }
    })
}

/// `chat_msg`: relay to the room under the sender's display name.
fn on_chat_msg<B: Backend>(
    state: Arc<AppState<B>>,
    event: Event,
) -> HandlerFuture {
    Box::pin(async move {
        let Some(msg) = string_field(&event.data, "msg") else {
            return;
        };
        let username = event
            .user
            .metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or("Anonymous User");

        state.registry.lock().await.broadcast_to_room(
            &RoomId::new(event.room.id.clone()),
            &Reply::ok(
                "chat_msg",
                json!({ "username": username, "msg": msg }),
            ),
        );
    })
}

// -------------------------------------------------------------------------
// Shared helpers
// -------------------------------------------------------------------------

/// Replies to the originating connection, if it is still around.
fn answer(event: &Event, act: &str, result: Value, success: bool) {
    if let Some(answer) = &event.answer {
        answer.send(act, result, success);
    }
}

/// A non-empty string field from an action payload.
fn string_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// The position a user holds in a game.
fn position_of(game: &GameRecord, user: &str) -> &'static str {
    match game.seat_of(user) {
        Some(Seat::Player1) => "player1",
        Some(Seat::Player2) => "player2",
        None => "watcher",
    }
}

/// The room's roster: every user with a connection in the room, tagged
/// with their position. With `me`, each entry also says whether it is
/// the requester (the register snapshot carries this, `get_game_status`
/// does not).
async fn roster<B: Backend>(
    state: &AppState<B>,
    room: &RoomId,
    game: &GameRecord,
    me: Option<&str>,
) -> Value {
    let users = state
        .registry
        .lock()
        .await
        .users_by_room(room)
        .unwrap_or_default();

    Value::Array(
        users
            .into_iter()
            .map(|user| {
                let mut entry = json!({
                    "position": position_of(game, &user.id),
                    "metadata": user.metadata,
                });
                if let Some(me) = me {
                    entry["me"] = json!(user.id == me);
                }
                entry
            })
            .collect(),
    )
}

/// The `game_status` snapshot. Player names are reduced to booleans so
/// ids never leak to other clients; the roster and position carry the
/// rest.
fn game_status_payload(
    game: &GameRecord,
    position: &str,
    users: Value,
    event: &Event,
) -> Value {
    json!({
        "token": game.token,
        "player1": !game.player1.is_empty(),
        "player2": !game.player2.is_empty(),
        "status": game.status,
        "turn": game.turn,
        "board": game.board,
        "last_change": game.last_change,
        "position": position,
        "users": users,
        "roomName": event.room.metadata.get("name").cloned().unwrap_or(Value::Null),
    })
}
