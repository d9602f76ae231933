//! WebSocket transport for the Twofold Chess server.
//!
//! Each client connects once and speaks a JSON event protocol over the
//! socket. The adapter validates event shape, routes to the room layer,
//! and fans broadcasts out to room members.
//!
//! ## Architecture
//!
//! - **`RoomHub`** — a singleton actor holding the session registry and
//!   the per-room membership sets. Room events (`game_update`, chat,
//!   lifecycle) are pushed through it to every member. It also runs the
//!   periodic expiry sweep over the room registry.
//!
//! - **`WsSession`** — an actor per WebSocket connection. Parses client
//!   events, calls into [`crate::room`], sends direct replies, and
//!   forwards hub events to its socket.
//!
//! ## Client → Server events
//!
//! | Event           | Fields                                        |
//! |-----------------|-----------------------------------------------|
//! | `join`          | `username`, `room`                            |
//! | `create_lobby`  | `roomId`, `host`, `isPrivate`                 |
//! | `get_lobbies`   | —                                             |
//! | `leave_lobby`   | `roomId`                                      |
//! | `move`          | `room`, `boardType`, `move` (advisory board ignored) |
//! | `reset`         | `room`                                        |
//! | `vote_reset`    | `room`, `color` (advisory; the seat decides)  |
//! | `chat_message`  | `room`, `message`                             |
//! | `finish_game`   | `room`, `winner`, `moves`                     |
//! | `get_game_state`| `room`                                        |
//!
//! ## Server → Client events
//!
//! `game_state`, `game_update`, `game_reset`, `move_error`, `lobby_list`,
//! `reset_votes_update`, `chat_message`, `player_joined`, `game_start`,
//! `player_left`, `player_disconnected`, `room_deleted`, `error` — all
//! shaped as `{"event": <name>, "data": <payload>}`.
//!
//! ## Ordering
//!
//! Room broadcasts are enqueued to the hub while the room lock is held,
//! so every member observes the same per-room sequence of updates, and
//! chat is ordered relative to moves. Per-socket send order is preserved
//! by the actor mailbox.

use actix::prelude::*;
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::api::AppState;
use crate::room::{ResetAction, RoomError};
use crate::storage::FinishedGame;
use crate::types::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How often the server sends a WebSocket ping frame.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum time without a pong before a session is evicted.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the hub sweeps expired rooms out of the registry.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Chat messages beyond this many characters are truncated.
const MAX_CHAT_LEN: usize = 500;

// ---------------------------------------------------------------------------
// Hub messages (actor mailbox protocol)
// ---------------------------------------------------------------------------

/// Sent by a `WsSession` to register itself with the hub.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub addr: Addr<WsSession>,
    pub session_id: Uuid,
}

/// Sent by a `WsSession` on shutdown.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub session_id: Uuid,
}

/// Binds a session to a room's broadcast set.
#[derive(Message)]
#[rtype(result = "()")]
pub struct JoinRoom {
    pub session_id: Uuid,
    pub room: String,
}

/// Removes a session from a room's broadcast set.
#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaveRoom {
    pub session_id: Uuid,
    pub room: String,
}

/// An event pushed to every member of a room.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct BroadcastRoom {
    pub room: String,
    pub event: String,
    pub data: serde_json::Value,
}

/// Internal message: deliver a text frame to a single `WsSession`.
#[derive(Message)]
#[rtype(result = "()")]
pub struct WsText(pub String);

// ---------------------------------------------------------------------------
// RoomHub — central event hub (actor)
// ---------------------------------------------------------------------------

/// Singleton actor managing session registration, room membership sets,
/// and room-wide event fan-out. Also runs the room expiry sweep.
pub struct RoomHub {
    /// Map of session id → session actor address (all connected sessions).
    sessions: HashMap<Uuid, Addr<WsSession>>,
    /// Map of room id → set of member session ids.
    rooms: HashMap<String, HashSet<Uuid>>,
    /// The room registry, for the expiry sweep.
    registry: std::sync::Arc<crate::room::RoomRegistry>,
}

impl RoomHub {
    pub fn new(registry: std::sync::Arc<crate::room::RoomRegistry>) -> Self {
        Self {
            sessions: HashMap::new(),
            rooms: HashMap::new(),
            registry,
        }
    }

    fn send_to_room(&self, room: &str, payload: &str) {
        if let Some(members) = self.rooms.get(room) {
            for session_id in members {
                if let Some(addr) = self.sessions.get(session_id) {
                    addr.do_send(WsText(payload.to_string()));
                }
            }
        }
    }
}

impl Actor for RoomHub {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        // Periodic expiry sweep: collect dead rooms and tell any
        // remaining members before dropping the broadcast sets.
        ctx.run_interval(SWEEP_INTERVAL, |act, _ctx| {
            for room_id in act.registry.sweep() {
                let payload = build_event("room_deleted", serde_json::json!({ "room": room_id }));
                act.send_to_room(&room_id, &payload);
                act.rooms.remove(&room_id);
            }
        });
    }
}

impl Handler<Connect> for RoomHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Context<Self>) {
        log::debug!("ws session {} connected to hub", msg.session_id);
        self.sessions.insert(msg.session_id, msg.addr);
    }
}

impl Handler<Disconnect> for RoomHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Context<Self>) {
        log::debug!("ws session {} disconnected from hub", msg.session_id);
        self.sessions.remove(&msg.session_id);
        for members in self.rooms.values_mut() {
            members.remove(&msg.session_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
    }
}

impl Handler<JoinRoom> for RoomHub {
    type Result = ();

    fn handle(&mut self, msg: JoinRoom, _ctx: &mut Context<Self>) {
        self.rooms.entry(msg.room).or_default().insert(msg.session_id);
    }
}

impl Handler<LeaveRoom> for RoomHub {
    type Result = ();

    fn handle(&mut self, msg: LeaveRoom, _ctx: &mut Context<Self>) {
        if let Some(members) = self.rooms.get_mut(&msg.room) {
            members.remove(&msg.session_id);
            if members.is_empty() {
                self.rooms.remove(&msg.room);
            }
        }
    }
}

impl Handler<BroadcastRoom> for RoomHub {
    type Result = ();

    fn handle(&mut self, msg: BroadcastRoom, _ctx: &mut Context<Self>) {
        let payload = build_event(&msg.event, msg.data);
        self.send_to_room(&msg.room, &payload);
    }
}

// ---------------------------------------------------------------------------
// Client → Server message shape
// ---------------------------------------------------------------------------

/// A single JSON event received from a client. Optional fields default
/// so clients only supply what their event needs.
#[derive(Debug, Deserialize)]
struct ClientEvent {
    /// The event name.
    event: String,

    #[serde(default)]
    username: Option<String>,

    #[serde(default)]
    room: Option<String>,

    /// Room id for lobby events.
    #[serde(default, rename = "roomId")]
    room_id: Option<String>,

    #[serde(default)]
    host: Option<String>,

    #[serde(default, rename = "isPrivate")]
    is_private: Option<bool>,

    /// Target board for `move`.
    #[serde(default, rename = "boardType")]
    board_type: Option<BoardId>,

    /// The move itself, parsed leniently here and strictly in the move
    /// handler so shape errors surface as `move_error`.
    #[serde(default, rename = "move")]
    mv: Option<serde_json::Value>,

    /// Advisory board snapshot some clients attach to `move`; never read.
    #[serde(default)]
    #[allow(dead_code)]
    board: Option<serde_json::Value>,

    /// Advisory color for `vote_reset`; the session's seat decides.
    #[serde(default)]
    color: Option<Color>,

    /// Advisory sender name for `chat_message`; the session's username
    /// is authoritative.
    #[serde(default)]
    #[allow(dead_code)]
    sender: Option<String>,

    #[serde(default)]
    message: Option<String>,

    /// Winner for the legacy `finish_game` event.
    #[serde(default)]
    winner: Option<Winner>,

    /// Move records for the legacy `finish_game` event.
    #[serde(default)]
    moves: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Server → Client event helpers
// ---------------------------------------------------------------------------

/// Builds an outgoing event frame: `{"event": <name>, "data": <payload>}`.
fn build_event(event: &str, data: serde_json::Value) -> String {
    serde_json::json!({
        "event": event,
        "data": data,
    })
    .to_string()
}

/// Builds an `error` event.
fn build_error(message: &str) -> String {
    build_event("error", serde_json::json!({ "message": message }))
}

/// Builds a `move_error` event from a rule rejection, attaching the
/// expected/attempted boards when the rejection carries them.
fn build_move_error(err: &MoveError) -> String {
    let mut data = serde_json::json!({ "message": err.to_string() });
    if let Some(expected) = err.expected_board() {
        data["expectedBoard"] = serde_json::json!(expected);
    }
    if let Some(attempted) = err.attempted_board() {
        data["actualBoard"] = serde_json::json!(attempted);
    }
    build_event("move_error", data)
}

fn snapshot_value(game: &crate::game::Game) -> serde_json::Value {
    serde_json::to_value(game.snapshot()).unwrap_or(serde_json::Value::Null)
}

// ---------------------------------------------------------------------------
// WsSession — per-connection actor
// ---------------------------------------------------------------------------

/// Actor representing a single WebSocket client connection.
pub struct WsSession {
    /// Unique session id; rooms key their member table on it.
    id: Uuid,

    /// Timestamp of the last received pong (or initial connect time).
    last_heartbeat: Instant,

    /// Shared application state (registry + history store).
    app_state: web::Data<AppState>,

    /// Address of the central hub actor.
    hub: Addr<RoomHub>,

    /// Username this session registered with, once joined.
    username: Option<String>,

    /// The room this session is a member of, once joined.
    room: Option<String>,
}

impl WsSession {
    pub fn new(app_state: web::Data<AppState>, hub: Addr<RoomHub>) -> Self {
        Self {
            id: Uuid::new_v4(),
            last_heartbeat: Instant::now(),
            app_state,
            hub,
            username: None,
            room: None,
        }
    }

    /// Starts the ping/pong loop; a client silent past `CLIENT_TIMEOUT`
    /// is evicted.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                log::warn!("ws session {} heartbeat timeout, disconnecting", act.id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn handle_message(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let msg: ClientEvent = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                ctx.text(build_error(&format!("Invalid JSON: {}", e)));
                return;
            }
        };

        match msg.event.as_str() {
            "join" => self.handle_join(&msg, ctx),
            "create_lobby" => self.handle_create_lobby(&msg, ctx),
            "get_lobbies" => self.handle_get_lobbies(ctx),
            "leave_lobby" => self.handle_leave_lobby(&msg, ctx),
            "move" => self.handle_move(&msg, ctx),
            "reset" => self.handle_reset(&msg, ctx),
            "vote_reset" => self.handle_vote_reset(&msg, ctx),
            "chat_message" => self.handle_chat(&msg, ctx),
            "finish_game" => self.handle_finish_game(&msg, ctx),
            "get_game_state" => self.handle_get_game_state(&msg, ctx),
            other => ctx.text(build_error(&format!("Unknown event: '{}'", other))),
        }
    }

    /// Looks up the room named by the event, with a uniform error reply.
    fn lookup_room(
        &self,
        room_id: Option<&str>,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Option<(String, std::sync::Arc<std::sync::Mutex<crate::room::Room>>)> {
        let Some(room_id) = room_id else {
            ctx.text(build_error("Missing field: room"));
            return None;
        };
        match self.app_state.registry.get(room_id) {
            Some(room) => Some((room_id.to_string(), room)),
            None => {
                ctx.text(build_error(&RoomError::NotFound(room_id.to_string()).to_string()));
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    /// `join {username, room}` — registers the session in the room,
    /// creating room and game on a fresh id. The first joiner plays
    /// White, the second Black (triggering `game_start`); reconnects
    /// within the grace window get their old color back.
    fn handle_join(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let (Some(username), Some(room_id)) = (msg.username.as_deref(), msg.room.as_deref())
        else {
            ctx.text(build_error("join requires username and room"));
            return;
        };

        let registry = &self.app_state.registry;
        let room_arc = registry.get_or_create(room_id, username);
        let grace = registry.grace();
        let room = &mut *room_arc.lock().unwrap();

        match room.join(self.id, username, grace) {
            Ok(outcome) => {
                self.username = Some(username.to_string());
                self.room = Some(room_id.to_string());

                log::info!(
                    "room {}: {} joined as {} (session {})",
                    room_id,
                    username,
                    outcome.color,
                    self.id
                );

                // Membership first, then the announcements: the hub
                // mailbox preserves this order, so the joiner sees its
                // own player_joined too.
                self.hub.do_send(JoinRoom {
                    session_id: self.id,
                    room: room_id.to_string(),
                });
                self.hub.do_send(BroadcastRoom {
                    room: room_id.to_string(),
                    event: "player_joined".to_string(),
                    data: serde_json::json!({
                        "color": outcome.color,
                        "username": username,
                    }),
                });
                if outcome.started {
                    self.hub.do_send(BroadcastRoom {
                        room: room_id.to_string(),
                        event: "game_start".to_string(),
                        data: serde_json::json!({
                            "color": outcome.color,
                            "username": username,
                        }),
                    });
                }

                // Direct full snapshot so the joiner can render at once.
                ctx.text(build_event("game_state", snapshot_value(&room.game)));
            }
            Err(e) => ctx.text(build_error(&e.to_string())),
        }
    }

    /// `create_lobby {roomId, host, isPrivate}`.
    fn handle_create_lobby(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(room_id) = msg.room_id.as_deref() else {
            ctx.text(build_error("create_lobby requires roomId"));
            return;
        };
        let host = msg
            .host
            .as_deref()
            .or(msg.username.as_deref())
            .unwrap_or("anonymous");
        let is_private = msg.is_private.unwrap_or(false);

        match self.app_state.registry.create(room_id, host, is_private) {
            Ok(_) => self.handle_get_lobbies(ctx),
            Err(e) => ctx.text(build_error(&e.to_string())),
        }
    }

    /// `get_lobbies {}` — replies with the public lobby snapshot.
    fn handle_get_lobbies(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let lobbies = self.app_state.registry.lobbies();
        let data = serde_json::to_value(lobbies).unwrap_or(serde_json::Value::Null);
        ctx.text(build_event("lobby_list", data));
    }

    /// `leave_lobby {roomId}` — releases the seat; an empty room closes.
    fn handle_leave_lobby(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let room_id = msg.room_id.as_deref().or(msg.room.as_deref());
        let Some((room_id, room_arc)) = self.lookup_room(room_id, ctx) else {
            return;
        };

        let now_empty = {
            let room = &mut *room_arc.lock().unwrap();
            let left = room.leave(self.id);
            if let Some(member) = left {
                self.hub.do_send(BroadcastRoom {
                    room: room_id.clone(),
                    event: "player_left".to_string(),
                    data: serde_json::json!({
                        "color": member.color,
                        "username": member.username,
                    }),
                });
            }
            room.is_empty()
        };

        self.hub.do_send(LeaveRoom {
            session_id: self.id,
            room: room_id.clone(),
        });
        if now_empty {
            self.app_state.registry.remove(&room_id);
            log::info!("room {} closed: last member left", room_id);
        }
        self.room = None;
    }

    /// `move {room, boardType, move}` — the core path. The room lock
    /// serializes the mutation, the update broadcast is enqueued before
    /// the lock drops, and a finished game goes to the history sink
    /// afterwards (fire-and-forget).
    fn handle_move(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some((room_id, room_arc)) = self.lookup_room(msg.room.as_deref(), ctx) else {
            return;
        };
        let Some(board) = msg.board_type else {
            ctx.text(build_event(
                "move_error",
                serde_json::json!({ "message": "move requires boardType" }),
            ));
            return;
        };
        let payload: MovePayload = match &msg.mv {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(payload) => payload,
                Err(e) => {
                    ctx.text(build_event(
                        "move_error",
                        serde_json::json!({ "message": format!("malformed move payload: {}", e) }),
                    ));
                    return;
                }
            },
            None => {
                ctx.text(build_event(
                    "move_error",
                    serde_json::json!({ "message": "move requires a move object" }),
                ));
                return;
            }
        };

        let finished = {
            let room = &mut *room_arc.lock().unwrap();
            match room.submit_move(self.id, board, &payload) {
                Ok(()) => {
                    self.hub.do_send(BroadcastRoom {
                        room: room_id.clone(),
                        event: "game_update".to_string(),
                        data: snapshot_value(&room.game),
                    });
                    room.game
                        .game_over
                        .then(|| FinishedGame::from_game(&room.room_id, &room.game))
                }
                Err(RoomError::Illegal(e)) => {
                    log::warn!(
                        "room {}: rejected move by session {} on {}: {}",
                        room_id,
                        self.id,
                        board,
                        e
                    );
                    ctx.text(build_move_error(&e));
                    return;
                }
                Err(e) => {
                    ctx.text(build_error(&e.to_string()));
                    return;
                }
            }
        };

        if let Some(doc) = finished {
            self.app_state.history.persist_with_retry(&doc);
        }
    }

    /// `reset {room}` — immediate for a lone player, a vote otherwise.
    fn handle_reset(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some((room_id, room_arc)) = self.lookup_room(msg.room.as_deref(), ctx) else {
            return;
        };

        let room = &mut *room_arc.lock().unwrap();
        match room.request_reset(self.id) {
            Ok(action) => self.broadcast_reset_outcome(&room_id, room, action),
            Err(e) => ctx.text(build_error(&e.to_string())),
        }
    }

    /// `vote_reset {room, color}` — records the vote of the session's
    /// seat. The payload color is advisory only.
    fn handle_vote_reset(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some((room_id, room_arc)) = self.lookup_room(msg.room.as_deref(), ctx) else {
            return;
        };

        let room = &mut *room_arc.lock().unwrap();
        let Some(color) = room.member_color(self.id) else {
            ctx.text(build_error(&RoomError::NotAPlayer.to_string()));
            return;
        };
        if let Some(claimed) = msg.color
            && claimed != color
        {
            log::warn!(
                "room {}: session {} voted as {} but holds {}",
                room_id,
                self.id,
                claimed,
                color
            );
        }
        let action = room.vote_reset(color);
        self.broadcast_reset_outcome(&room_id, room, action);
    }

    fn broadcast_reset_outcome(
        &self,
        room_id: &str,
        room: &crate::room::Room,
        action: ResetAction,
    ) {
        match action {
            ResetAction::Reset => self.hub.do_send(BroadcastRoom {
                room: room_id.to_string(),
                event: "game_reset".to_string(),
                data: snapshot_value(&room.game),
            }),
            ResetAction::VotesUpdated => self.hub.do_send(BroadcastRoom {
                room: room_id.to_string(),
                event: "reset_votes_update".to_string(),
                data: serde_json::json!({ "votes": room.game.reset_votes }),
            }),
        }
    }

    /// `chat_message {room, message}` — relayed verbatim (length-capped)
    /// to the room, ordered with moves under the same lock.
    fn handle_chat(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some((room_id, room_arc)) = self.lookup_room(msg.room.as_deref(), ctx) else {
            return;
        };
        let Some(message) = msg.message.as_deref() else {
            ctx.text(build_error("chat_message requires message"));
            return;
        };

        let sender = self
            .username
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());
        let message: String = message.chars().take(MAX_CHAT_LEN).collect();

        let room = &mut *room_arc.lock().unwrap();
        room.touch();
        self.hub.do_send(BroadcastRoom {
            room: room_id,
            event: "chat_message".to_string(),
            data: serde_json::json!({ "sender": sender, "message": message }),
        });
    }

    /// `finish_game {room, winner, moves}` — legacy manual end: persists
    /// a document and resets the game in place.
    fn handle_finish_game(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some((room_id, room_arc)) = self.lookup_room(msg.room.as_deref(), ctx) else {
            return;
        };

        let doc = {
            let room = &mut *room_arc.lock().unwrap();
            let mut doc = FinishedGame::from_game(&room.room_id, &room.game);
            if msg.winner.is_some() {
                doc.winner = msg.winner;
            }
            if let Some(moves) = &msg.moves
                && !moves.is_empty()
            {
                doc.moves = moves.clone();
            }
            room.game.reset();
            room.touch();
            self.hub.do_send(BroadcastRoom {
                room: room_id,
                event: "game_reset".to_string(),
                data: snapshot_value(&room.game),
            });
            doc
        };

        self.app_state.history.persist_with_retry(&doc);
    }

    /// `get_game_state {room}` — direct snapshot reply.
    fn handle_get_game_state(&mut self, msg: &ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let Some((_, room_arc)) = self.lookup_room(msg.room.as_deref(), ctx) else {
            return;
        };
        let room = room_arc.lock().unwrap();
        ctx.text(build_event("game_state", snapshot_value(&room.game)));
    }
}

// ---------------------------------------------------------------------------
// WsSession — Actor + StreamHandler implementation
// ---------------------------------------------------------------------------

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!("ws session {} started", self.id);
        self.start_heartbeat(ctx);
        self.hub.do_send(Connect {
            addr: ctx.address(),
            session_id: self.id,
        });
    }

    /// Socket gone: tell the room (the seat survives for the grace
    /// window) and unregister from the hub.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        log::info!("ws session {} stopped", self.id);

        if let Some(room_id) = self.room.take()
            && let Some(room_arc) = self.app_state.registry.get(&room_id)
        {
            let room = &mut *room_arc.lock().unwrap();
            if let Some(member) = room.disconnect(self.id) {
                self.hub.do_send(BroadcastRoom {
                    room: room_id,
                    event: "player_disconnected".to_string(),
                    data: serde_json::json!({
                        "color": member.color,
                        "username": member.username,
                    }),
                });
            }
        }

        self.hub.do_send(Disconnect {
            session_id: self.id,
        });
    }
}

/// Handler for incoming WebSocket frames.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.handle_message(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                log::warn!("ws session {}: binary messages not supported", self.id);
                ctx.text(build_error("Binary messages are not supported; send JSON text"));
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                log::info!("ws session {} closed: {:?}", self.id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                // Continuation frames are handled internally by actix
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                log::error!("ws session {} protocol error: {}", self.id, e);
                ctx.stop();
            }
        }
    }
}

/// Hub-pushed events forwarded to this session's socket.
impl Handler<WsText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// ---------------------------------------------------------------------------
// HTTP → WebSocket upgrade handler
// ---------------------------------------------------------------------------

/// Upgrades an HTTP request to a WebSocket connection.
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
    hub: web::Data<Addr<RoomHub>>,
) -> Result<HttpResponse, actix_web::Error> {
    let session = WsSession::new(app_state, hub.get_ref().clone());
    log::info!("new WebSocket connection request from {:?}", req.peer_addr());
    ws::start(session, &req, stream)
}

// ---------------------------------------------------------------------------
// Broadcast helper for REST API handlers
// ---------------------------------------------------------------------------

/// Pushes a room event through the hub. Called from REST handlers that
/// mutate a room (admin reset, debug setup).
pub fn broadcast_room_event(
    hub: &web::Data<Addr<RoomHub>>,
    room: &str,
    event: &str,
    data: serde_json::Value,
) {
    hub.do_send(BroadcastRoom {
        room: room.to_string(),
        event: event.to_string(),
        data,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_move_event_parses() {
        let json = r#"{
            "event": "move",
            "room": "r1",
            "boardType": "secondary",
            "move": {
                "from": [6, 4],
                "to": [4, 4],
                "piece": "P5",
                "en_passant": false
            },
            "board": [[null]]
        }"#;
        let msg: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(msg.event, "move");
        assert_eq!(msg.board_type, Some(BoardId::Secondary));
        let mv: MovePayload = serde_json::from_value(msg.mv.unwrap()).unwrap();
        assert_eq!(mv.from, Square::new(6, 4));
        assert_eq!(mv.to, Square::new(4, 4));
    }

    #[test]
    fn out_of_range_square_is_rejected() {
        let value = serde_json::json!({ "from": [8, 0], "to": [0, 0] });
        assert!(serde_json::from_value::<MovePayload>(value).is_err());
    }

    #[test]
    fn move_error_carries_board_fields() {
        let err = MoveError::MustRespondToCheckOn {
            board: BoardId::Main,
            attempted: BoardId::Secondary,
        };
        let frame = build_move_error(&err);
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "move_error");
        assert_eq!(value["data"]["expectedBoard"], "main");
        assert_eq!(value["data"]["actualBoard"], "secondary");
    }
}
