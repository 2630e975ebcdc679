//! The registry itself: parties, bindings, admission, and broadcasts.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::UnboundedSender;

use fourstack_protocol::{
    Codec, ErrorCode, ErrorEnvelope, Inbound, InboundError, JsonCodec,
    Reply, RoomId, UserId,
};
use fourstack_transport::ConnectionId;

use crate::{Answer, Event, PartySnapshot, RegistryError};

/// The action every connection must send first.
const ACT_REGISTER: &str = "register";

/// The synthetic action emitted when a bound connection goes away.
const ACT_CLOSE: &str = "close";

/// A user or room: its metadata plus the live connections attached.
#[derive(Debug, Default)]
struct Party {
    metadata: Map<String, Value>,
    connections: HashSet<ConnectionId>,
}

impl Party {
    fn new(metadata: Map<String, Value>) -> Self {
        Self {
            metadata,
            connections: HashSet::new(),
        }
    }

    fn snapshot(&self, id: &str) -> PartySnapshot {
        PartySnapshot {
            id: id.to_string(),
            metadata: self.metadata.clone(),
            connections: self.connections.len(),
        }
    }
}

/// The `(user, room)` pair a connection was registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub user: UserId,
    pub room: RoomId,
}

/// Tracks users, rooms, and connection bindings; admits inbound frames.
///
/// See the crate docs for the concurrency model. All methods are
/// synchronous; outbound bytes go onto per-connection channels. Every
/// outbound envelope (replies, broadcasts, errors) is encoded through
/// the registry's [`Codec`], JSON by default.
#[derive(Default)]
pub struct Registry<C: Codec = JsonCodec> {
    users: HashMap<UserId, Party>,
    rooms: HashMap<RoomId, Party>,
    bindings: HashMap<ConnectionId, Binding>,
    senders: HashMap<ConnectionId, UnboundedSender<Vec<u8>>>,
    /// When set, only these actions are admitted. `register` and `close`
    /// are always included.
    allowed: Option<HashSet<String>>,
    codec: C,
}

impl Registry {
    /// A JSON registry that admits any action.
    pub fn new() -> Self {
        Self::default()
    }

    /// A JSON registry that only admits the given actions (plus
    /// `register` and `close`, which are always allowed).
    pub fn with_allowed_actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed: HashSet<String> =
            actions.into_iter().map(Into::into).collect();
        allowed.insert(ACT_REGISTER.to_string());
        allowed.insert(ACT_CLOSE.to_string());
        Self {
            allowed: Some(allowed),
            ..Self::default()
        }
    }
}

impl<C: Codec> Registry<C> {
    /// A registry that encodes outbound envelopes with the given codec
    /// and admits any action.
    pub fn with_codec(codec: C) -> Self {
        Self {
            users: HashMap::new(),
            rooms: HashMap::new(),
            bindings: HashMap::new(),
            senders: HashMap::new(),
            allowed: None,
            codec,
        }
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    /// Attaches a connection's outbound channel. Must happen before the
    /// first frame from that connection is admitted.
    pub fn attach(
        &mut self,
        conn: ConnectionId,
        sender: UnboundedSender<Vec<u8>>,
    ) {
        self.senders.insert(conn, sender);
    }

    /// Admits one inbound frame from a connection.
    ///
    /// Enforces, in order: JSON wellformedness, envelope shape,
    /// registration state, and the action allow-list. Violations are
    /// answered with the error envelope and yield `None`; an accepted
    /// frame yields an [`Event`] for the layer above.
    ///
    /// For `register` frames this also resolves the user: a supplied id
    /// is adopted whether or not it is known (ids carry no authority),
    /// and a missing id gets a freshly minted one, announced to the
    /// connection with a `new_user` reply before the event is returned.
    pub fn admit(
        &mut self,
        conn: ConnectionId,
        raw: &[u8],
    ) -> Option<Event> {
        let inbound = match Inbound::from_bytes(raw) {
            Ok(inbound) => inbound,
            Err(InboundError::NoJson) => {
                let echo = String::from_utf8_lossy(raw).into_owned();
                self.send_error(conn, ErrorCode::NoJson, Value::String(echo));
                return None;
            }
            Err(InboundError::Invalid(value)) => {
                self.send_error(conn, ErrorCode::InvalidMessage, value);
                return None;
            }
        };

        let mut minted: Option<UserId> = None;
        if inbound.act == ACT_REGISTER {
            if self.bindings.contains_key(&conn) {
                self.send_error(
                    conn,
                    ErrorCode::ConnectionAlreadyRegistered,
                    json!({}),
                );
                return None;
            }
            let room = match string_field(&inbound.data, "room") {
                Some(room) => RoomId::new(room),
                None => {
                    self.send_error(
                        conn,
                        ErrorCode::InvalidRoom,
                        inbound.data.clone(),
                    );
                    return None;
                }
            };
            if !self.rooms.contains_key(&room) {
                self.send_error(
                    conn,
                    ErrorCode::InvalidRoom,
                    inbound.data.clone(),
                );
                return None;
            }

            let metadata = inbound
                .data
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let user = match string_field(&inbound.data, "user") {
                Some(id) => {
                    let user = UserId::new(id);
                    // Unknown asserted ids are adopted, not rejected:
                    // they carry no authority, and rejecting them would
                    // strand reconnecting clients after a restart.
                    self.users
                        .entry(user.clone())
                        .or_insert_with(|| Party::new(metadata));
                    user
                }
                None => {
                    let user = UserId::new(generate_id());
                    self.users.insert(user.clone(), Party::new(metadata));
                    minted = Some(user.clone());
                    user
                }
            };

            self.bindings.insert(
                conn,
                Binding {
                    user: user.clone(),
                    room: room.clone(),
                },
            );
            self.users
                .get_mut(&user)
                .expect("user just resolved")
                .connections
                .insert(conn);
            self.rooms
                .get_mut(&room)
                .expect("room existence just checked")
                .connections
                .insert(conn);
            tracing::debug!(%conn, %user, %room, "connection registered");
        } else if !self.bindings.contains_key(&conn) {
            self.send_error(
                conn,
                ErrorCode::ConnectionNotRegistered,
                json!({}),
            );
            return None;
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(inbound.act.as_str()) {
                self.send_error(
                    conn,
                    ErrorCode::InvalidAction,
                    json!({ "act": inbound.act }),
                );
                return None;
            }
        }

        if let Some(user) = minted {
            self.send_reply(
                conn,
                &Reply::ok("new_user", json!({ "id": user.as_str() })),
            );
        }

        let binding = self.bindings.get(&conn)?;
        let user = self.user_snapshot(&binding.user)?;
        let room = self.room_snapshot(&binding.room)?;
        let answer = self.senders.get(&conn).cloned().map(Answer::new);
        Some(Event {
            act: inbound.act,
            data: inbound.data,
            user,
            room,
            answer,
        })
    }

    /// Unwinds a closed connection and, if it was bound, returns the
    /// synthetic `close` event with post-removal snapshots.
    pub fn handle_close(&mut self, conn: ConnectionId) -> Option<Event> {
        self.senders.remove(&conn);
        let binding = self.bindings.remove(&conn)?;
        if let Some(user) = self.users.get_mut(&binding.user) {
            user.connections.remove(&conn);
        }
        if let Some(room) = self.rooms.get_mut(&binding.room) {
            room.connections.remove(&conn);
        }
        tracing::debug!(%conn, user = %binding.user, room = %binding.room, "connection closed");

        let user = self.user_snapshot(&binding.user)?;
        let room = self.room_snapshot(&binding.room)?;
        Some(Event {
            act: ACT_CLOSE.to_string(),
            data: json!({}),
            user,
            room,
            answer: None,
        })
    }

    /// The `(user, room)` pair a connection is bound to, if registered.
    pub fn binding(&self, conn: ConnectionId) -> Option<&Binding> {
        self.bindings.get(&conn)
    }

    // -----------------------------------------------------------------
    // Party management
    // -----------------------------------------------------------------

    /// Creates a user, minting an id when none is given.
    pub fn new_user(
        &mut self,
        id: Option<UserId>,
        metadata: Map<String, Value>,
    ) -> Result<PartySnapshot, RegistryError> {
        let id = id.unwrap_or_else(|| UserId::new(generate_id()));
        if self.users.contains_key(&id) {
            return Err(RegistryError::UserExists(id));
        }
        let party = Party::new(metadata);
        let snapshot = party.snapshot(id.as_str());
        self.users.insert(id, party);
        Ok(snapshot)
    }

    /// Creates a room.
    pub fn new_room(
        &mut self,
        id: RoomId,
        metadata: Map<String, Value>,
    ) -> Result<PartySnapshot, RegistryError> {
        if self.rooms.contains_key(&id) {
            return Err(RegistryError::RoomExists(id));
        }
        let party = Party::new(metadata);
        let snapshot = party.snapshot(id.as_str());
        tracing::debug!(room = %id, "room created");
        self.rooms.insert(id, party);
        Ok(snapshot)
    }

    pub fn has_user(&self, id: &UserId) -> bool {
        self.users.contains_key(id)
    }

    pub fn has_room(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    /// Snapshot of a user, if it exists.
    pub fn user_snapshot(&self, id: &UserId) -> Option<PartySnapshot> {
        Some(self.users.get(id)?.snapshot(id.as_str()))
    }

    /// Snapshot of a room, if it exists.
    pub fn room_snapshot(&self, id: &RoomId) -> Option<PartySnapshot> {
        Some(self.rooms.get(id)?.snapshot(id.as_str()))
    }

    /// Mutable access to a user's metadata.
    pub fn user_metadata_mut(
        &mut self,
        id: &UserId,
    ) -> Option<&mut Map<String, Value>> {
        Some(&mut self.users.get_mut(id)?.metadata)
    }

    /// Mutable access to a room's metadata.
    pub fn room_metadata_mut(
        &mut self,
        id: &RoomId,
    ) -> Option<&mut Map<String, Value>> {
        Some(&mut self.rooms.get_mut(id)?.metadata)
    }

    /// Distinct users with at least one connection in the room, or
    /// `None` for an unknown room.
    pub fn users_by_room(
        &self,
        room: &RoomId,
    ) -> Option<Vec<PartySnapshot>> {
        let party = self.rooms.get(room)?;
        let mut seen = HashSet::new();
        let mut users = Vec::new();
        for conn in &party.connections {
            let Some(binding) = self.bindings.get(conn) else {
                continue;
            };
            if seen.insert(&binding.user) {
                if let Some(snapshot) = self.user_snapshot(&binding.user) {
                    users.push(snapshot);
                }
            }
        }
        Some(users)
    }

    /// Distinct rooms a user has connections in, or `None` for an
    /// unknown user.
    pub fn rooms_by_user(
        &self,
        user: &UserId,
    ) -> Option<Vec<PartySnapshot>> {
        let party = self.users.get(user)?;
        let mut seen = HashSet::new();
        let mut rooms = Vec::new();
        for conn in &party.connections {
            let Some(binding) = self.bindings.get(conn) else {
                continue;
            };
            if seen.insert(&binding.room) {
                if let Some(snapshot) = self.room_snapshot(&binding.room) {
                    rooms.push(snapshot);
                }
            }
        }
        Some(rooms)
    }

    /// Live connections currently in a room.
    pub fn room_connection_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map_or(0, |p| p.connections.len())
    }

    /// Removes a user and force-closes all their connections. Each
    /// connection gets a close notice first; dropping its sender then
    /// tears the socket down.
    pub fn delete_user(&mut self, id: &UserId) {
        let Some(party) = self.users.remove(id) else {
            return;
        };
        for conn in party.connections {
            if let Some(binding) = self.bindings.remove(&conn) {
                if let Some(room) = self.rooms.get_mut(&binding.room) {
                    room.connections.remove(&conn);
                }
            }
            self.send_error(
                conn,
                ErrorCode::ConnectionCloses,
                json!({ "close_notice": true }),
            );
            self.senders.remove(&conn);
        }
        tracing::info!(user = %id, "user deleted");
    }

    /// Removes a room and force-closes every connection in it, the same
    /// way [`delete_user`](Self::delete_user) does.
    pub fn delete_room(&mut self, id: &RoomId) {
        let Some(party) = self.rooms.remove(id) else {
            return;
        };
        for conn in party.connections {
            if let Some(binding) = self.bindings.remove(&conn) {
                if let Some(user) = self.users.get_mut(&binding.user) {
                    user.connections.remove(&conn);
                }
            }
            self.send_error(
                conn,
                ErrorCode::ConnectionCloses,
                json!({ "close_notice": true }),
            );
            self.senders.remove(&conn);
        }
        tracing::info!(room = %id, "room deleted");
    }

    /// Removes connectionless users, returning how many were removed.
    /// With a filter, only users whose metadata matches are removed.
    pub fn clean_users(
        &mut self,
        filter: Option<&dyn Fn(&Map<String, Value>) -> bool>,
    ) -> usize {
        let before = self.users.len();
        self.users.retain(|_, party| {
            !(party.connections.is_empty()
                && filter.is_none_or(|matches| matches(&party.metadata)))
        });
        before - self.users.len()
    }

    /// Removes connectionless rooms, returning how many were removed.
    /// With a filter, only rooms whose metadata matches are removed.
    pub fn clean_rooms(
        &mut self,
        filter: Option<&dyn Fn(&Map<String, Value>) -> bool>,
    ) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, party| {
            !(party.connections.is_empty()
                && filter.is_none_or(|matches| matches(&party.metadata)))
        });
        before - self.rooms.len()
    }

    // -----------------------------------------------------------------
    // Broadcasts
    // -----------------------------------------------------------------

    /// Queues a reply on every connection of a user. Returns `false`
    /// for an unknown user.
    pub fn broadcast_to_user(&self, user: &UserId, reply: &Reply) -> bool {
        let Some(party) = self.users.get(user) else {
            return false;
        };
        self.fan_out(party.connections.iter(), reply);
        true
    }

    /// Queues a reply on every connection in a room. Returns `false`
    /// for an unknown room.
    pub fn broadcast_to_room(&self, room: &RoomId, reply: &Reply) -> bool {
        let Some(party) = self.rooms.get(room) else {
            return false;
        };
        self.fan_out(party.connections.iter(), reply);
        true
    }

    /// Queues a reply on the user's connections that are in the given
    /// room. Returns `false` if either party is unknown.
    pub fn broadcast_to_user_in_room(
        &self,
        user: &UserId,
        room: &RoomId,
        reply: &Reply,
    ) -> bool {
        let (Some(user), Some(room)) =
            (self.users.get(user), self.rooms.get(room))
        else {
            return false;
        };
        let both = user
            .connections
            .iter()
            .filter(|conn| room.connections.contains(conn));
        self.fan_out(both, reply);
        true
    }

    fn fan_out<'a>(
        &self,
        connections: impl Iterator<Item = &'a ConnectionId>,
        reply: &Reply,
    ) {
        let bytes = match self.codec.encode(reply) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(act = %reply.act, %error, "failed to encode broadcast");
                return;
            }
        };
        for conn in connections {
            if let Some(sender) = self.senders.get(conn) {
                let _ = sender.send(bytes.clone());
            }
        }
    }

    fn send_reply(&self, conn: ConnectionId, reply: &Reply) {
        match self.codec.encode(reply) {
            Ok(bytes) => {
                if let Some(sender) = self.senders.get(&conn) {
                    let _ = sender.send(bytes);
                }
            }
            Err(error) => {
                tracing::error!(act = %reply.act, %error, "failed to encode reply");
            }
        }
    }

    fn send_error(&self, conn: ConnectionId, code: ErrorCode, data: Value) {
        tracing::debug!(%conn, code = code.code(), %code, "rejected frame");
        let envelope = ErrorEnvelope::new(code, data);
        match self.codec.encode(&envelope) {
            Ok(bytes) => {
                if let Some(sender) = self.senders.get(&conn) {
                    let _ = sender.send(bytes);
                }
            }
            Err(error) => {
                tracing::error!(%error, "failed to encode error envelope");
            }
        }
    }
}

/// A non-empty string field from an action payload.
fn string_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Random 32-character hex id (128 bits of entropy).
fn generate_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
