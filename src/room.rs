//! Room and session management for the Twofold Chess server.
//!
//! A [`Room`] owns one [`Game`] and the table of connected members; the
//! process-wide [`RoomRegistry`] maps room ids to rooms and doubles as
//! the public lobby list. All mutations of a game go through its room's
//! mutex (per-room serialization); the registry lock is only held for
//! map lookups so the lobby list never blocks another room's moves.
//!
//! Membership rules: the first joiner of a fresh room id creates the
//! room and plays White, the second plays Black, and any further joiner
//! is rejected. A username keeps a claim on its color for a grace
//! window after a disconnect so a network blip does not cost the seat.

use crate::game::Game;
use crate::storage;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use utoipa::ToSchema;
use uuid::Uuid;

/// How long a disconnected player's color claim survives.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

/// How long an inactive room lives before the sweep collects it.
pub const DEFAULT_ROOM_TTL: Duration = Duration::from_secs(30 * 60);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Session-level failures surfaced to clients as `error` events, plus
/// rule rejections relayed as `move_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    AlreadyExists(String),
    NotFound(String),
    Full(String),
    /// The session holds no seat in the room.
    NotAPlayer,
    /// The room's game violated an internal invariant and refuses moves.
    Poisoned,
    /// The move was rejected by the rules engine.
    Illegal(MoveError),
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::AlreadyExists(id) => write!(f, "Room {} already exists", id),
            RoomError::NotFound(id) => write!(f, "Room {} not found", id),
            RoomError::Full(id) => write!(f, "Room {} is full", id),
            RoomError::NotAPlayer => write!(f, "You are not a player in this room"),
            RoomError::Poisoned => {
                write!(f, "This room is no longer accepting moves due to an internal error")
            }
            RoomError::Illegal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RoomError {}

impl From<MoveError> for RoomError {
    fn from(e: MoveError) -> Self {
        RoomError::Illegal(e)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A connected member of a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub username: String,
    pub color: Color,
}

/// A color held by a username, surviving disconnects until the grace
/// window runs out.
#[derive(Debug, Clone)]
struct ColorClaim {
    color: Color,
    disconnected_at: Option<Instant>,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub color: Color,
    /// Both seats filled for the first time; `game_start` goes out.
    pub started: bool,
    /// The session re-entered a seat it already held (same socket or a
    /// grace-window reclaim).
    pub rejoined: bool,
}

/// What a reset request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    /// The game was re-initialized.
    Reset,
    /// A vote was recorded; the other color has not voted yet.
    VotesUpdated,
}

/// One game room: the game, its members, and the lobby metadata.
pub struct Room {
    pub room_id: String,
    pub host: String,
    pub is_private: bool,
    pub created_at: u64,
    pub last_activity: Instant,
    pub members: HashMap<Uuid, Member>,
    pub game: Game,
    claims: HashMap<String, ColorClaim>,
    poisoned: bool,
}

impl Room {
    /// Creates an empty room with a fresh game.
    pub fn new(room_id: &str, host: &str, is_private: bool) -> Self {
        Self {
            room_id: room_id.to_string(),
            host: host.to_string(),
            is_private,
            created_at: storage::unix_timestamp(),
            last_activity: Instant::now(),
            members: HashMap::new(),
            game: Game::new(),
            claims: HashMap::new(),
            poisoned: false,
        }
    }

    /// Marks the room as recently used.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Returns the color held by the given session, if any.
    pub fn member_color(&self, session_id: Uuid) -> Option<Color> {
        self.members.get(&session_id).map(|m| m.color)
    }

    /// Returns `true` when both seats are held by connected members.
    pub fn is_full(&self) -> bool {
        self.members.len() >= 2
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Registers a session in the room.
    ///
    /// A username holding a grace-window claim gets its old color back;
    /// otherwise White is assigned first, then Black, and further
    /// joiners are rejected.
    pub fn join(
        &mut self,
        session_id: Uuid,
        username: &str,
        grace: Duration,
    ) -> Result<JoinOutcome, RoomError> {
        self.touch();
        self.prune_claims(grace);

        // The same socket joining again just re-reads its seat.
        if let Some(member) = self.members.get(&session_id) {
            return Ok(JoinOutcome {
                color: member.color,
                started: false,
                rejoined: true,
            });
        }

        // Reclaim a seat held in the grace index.
        if let Some(claim) = self.claims.get_mut(username)
            && !self.members.values().any(|m| m.color == claim.color)
        {
            let color = claim.color;
            claim.disconnected_at = None;
            self.members.insert(
                session_id,
                Member {
                    username: username.to_string(),
                    color,
                },
            );
            log::info!(
                "room {}: {} reclaimed {} after reconnect",
                self.room_id,
                username,
                color
            );
            return Ok(JoinOutcome {
                color,
                started: false,
                rejoined: true,
            });
        }

        let taken: Vec<Color> = self.members.values().map(|m| m.color).collect();
        let color = if !taken.contains(&Color::White) {
            Color::White
        } else if !taken.contains(&Color::Black) {
            Color::Black
        } else {
            return Err(RoomError::Full(self.room_id.clone()));
        };

        self.members.insert(
            session_id,
            Member {
                username: username.to_string(),
                color,
            },
        );
        self.claims.insert(
            username.to_string(),
            ColorClaim {
                color,
                disconnected_at: None,
            },
        );

        Ok(JoinOutcome {
            color,
            started: self.members.len() == 2,
            rejoined: false,
        })
    }

    /// Handles a transport-level disconnect: the member leaves the table
    /// but keeps a timed claim on their color.
    pub fn disconnect(&mut self, session_id: Uuid) -> Option<Member> {
        let member = self.members.remove(&session_id)?;
        if let Some(claim) = self.claims.get_mut(&member.username) {
            claim.disconnected_at = Some(Instant::now());
        }
        Some(member)
    }

    /// Handles an explicit leave: the seat is released immediately.
    pub fn leave(&mut self, session_id: Uuid) -> Option<Member> {
        let member = self.members.remove(&session_id)?;
        self.claims.remove(&member.username);
        self.touch();
        Some(member)
    }

    /// Submits a move for the member bound to `session_id`, enforcing
    /// the fatal-error policy: a game that breaks the king invariant
    /// poisons the room, which then refuses all further moves.
    pub fn submit_move(
        &mut self,
        session_id: Uuid,
        board: BoardId,
        payload: &MovePayload,
    ) -> Result<(), RoomError> {
        if self.poisoned {
            return Err(RoomError::Poisoned);
        }
        let color = self.member_color(session_id).ok_or(RoomError::NotAPlayer)?;
        self.game.submit(color, board, payload)?;
        self.touch();

        if !self.game.kings_intact() {
            self.poisoned = true;
            let state = serde_json::to_string(&self.game)
                .unwrap_or_else(|e| format!("<unserializable: {}>", e));
            log::error!(
                "room {}: king invariant violated, refusing further moves; state: {}",
                self.room_id,
                state
            );
            return Err(RoomError::Poisoned);
        }
        Ok(())
    }

    /// Records a reset vote for the given color; both votes re-initialize
    /// the game (clearing votes and history with it).
    pub fn vote_reset(&mut self, color: Color) -> ResetAction {
        self.touch();
        *self.game.reset_votes.for_color_mut(color) = true;
        if self.game.reset_votes.both() {
            self.game.reset();
            log::info!("room {}: reset by mutual vote", self.room_id);
            ResetAction::Reset
        } else {
            ResetAction::VotesUpdated
        }
    }

    /// Handles a `reset` request: immediate for a lone player, a vote in
    /// a two-player room.
    pub fn request_reset(&mut self, session_id: Uuid) -> Result<ResetAction, RoomError> {
        if self.members.len() <= 1 {
            self.game.reset();
            self.touch();
            return Ok(ResetAction::Reset);
        }
        let color = self.member_color(session_id).ok_or(RoomError::NotAPlayer)?;
        Ok(self.vote_reset(color))
    }

    fn prune_claims(&mut self, grace: Duration) {
        self.claims.retain(|_, claim| match claim.disconnected_at {
            Some(at) => at.elapsed() <= grace,
            None => true,
        });
    }
}

// ---------------------------------------------------------------------------
// Lobby summary
// ---------------------------------------------------------------------------

/// Public lobby entry sent in `lobby_list`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LobbySummary {
    pub room: String,
    pub host: String,
    pub is_private: bool,
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Process-wide map of live rooms.
///
/// Rooms are individually mutex-guarded; the registry's own lock only
/// covers the map, so listing lobbies or creating a room never blocks
/// an in-flight move in another room.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    grace: Duration,
    room_ttl: Duration,
}

impl RoomRegistry {
    pub fn new(grace: Duration, room_ttl: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            grace,
            room_ttl,
        }
    }

    /// The configured reconnect grace window.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Creates a room, failing if the id is taken.
    pub fn create(
        &self,
        room_id: &str,
        host: &str,
        is_private: bool,
    ) -> Result<Arc<Mutex<Room>>, RoomError> {
        let mut rooms = self.rooms.write().unwrap();
        if rooms.contains_key(room_id) {
            return Err(RoomError::AlreadyExists(room_id.to_string()));
        }
        let room = Arc::new(Mutex::new(Room::new(room_id, host, is_private)));
        rooms.insert(room_id.to_string(), room.clone());
        log::info!("created room {} (host: {}, private: {})", room_id, host, is_private);
        Ok(room)
    }

    /// Looks up a room by id.
    pub fn get(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().unwrap().get(room_id).cloned()
    }

    /// Looks up a room, creating a fresh public one when the id is new
    /// (first `join` to a fresh room id creates the game).
    pub fn get_or_create(&self, room_id: &str, host: &str) -> Arc<Mutex<Room>> {
        if let Some(room) = self.get(room_id) {
            return room;
        }
        let mut rooms = self.rooms.write().unwrap();
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                log::info!("created room {} on first join (host: {})", room_id, host);
                Arc::new(Mutex::new(Room::new(room_id, host, false)))
            })
            .clone()
    }

    /// Removes a room from the registry.
    pub fn remove(&self, room_id: &str) -> bool {
        self.rooms.write().unwrap().remove(room_id).is_some()
    }

    /// Snapshot of the public, joinable rooms.
    pub fn lobbies(&self) -> Vec<LobbySummary> {
        let rooms = self.rooms.read().unwrap();
        let mut out = Vec::new();
        for room in rooms.values() {
            let room = room.lock().unwrap();
            if room.is_private || room.is_full() {
                continue;
            }
            out.push(LobbySummary {
                room: room.room_id.clone(),
                host: room.host.clone(),
                is_private: room.is_private,
                created_at: room.created_at,
            });
        }
        out
    }

    /// Returns (room count, connected member count) for health reporting.
    pub fn counts(&self) -> (usize, usize) {
        let rooms = self.rooms.read().unwrap();
        let members = rooms
            .values()
            .map(|room| room.lock().unwrap().members.len())
            .sum();
        (rooms.len(), members)
    }

    /// Collects expired rooms: empty past the grace window, or idle past
    /// the TTL. Returns the removed room ids so the transport layer can
    /// announce `room_deleted`.
    pub fn sweep(&self) -> Vec<String> {
        let expired: Vec<String> = {
            let rooms = self.rooms.read().unwrap();
            rooms
                .iter()
                .filter(|(_, room)| {
                    let mut room = room.lock().unwrap();
                    room.prune_claims(self.grace);
                    let idle = room.last_activity.elapsed();
                    (room.is_empty() && idle > self.grace) || idle > self.room_ttl
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        if !expired.is_empty() {
            let mut rooms = self.rooms.write().unwrap();
            for id in &expired {
                rooms.remove(id);
                log::info!("room {} expired", id);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(30);

    #[test]
    fn first_two_joiners_get_colors_third_is_rejected() {
        let mut room = Room::new("r1", "alice", false);
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let s3 = Uuid::new_v4();

        let first = room.join(s1, "alice", GRACE).unwrap();
        assert_eq!(first.color, Color::White);
        assert!(!first.started);

        let second = room.join(s2, "bob", GRACE).unwrap();
        assert_eq!(second.color, Color::Black);
        assert!(second.started);

        assert_eq!(
            room.join(s3, "carol", GRACE),
            Err(RoomError::Full("r1".to_string()))
        );
    }

    #[test]
    fn reconnect_within_grace_restores_the_color() {
        let mut room = Room::new("r1", "alice", false);
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();

        room.join(s1, "alice", GRACE).unwrap();
        room.join(s2, "bob", GRACE).unwrap();

        assert!(room.disconnect(s1).is_some());
        assert!(!room.is_full());

        let rebound = room.join(Uuid::new_v4(), "alice", GRACE).unwrap();
        assert_eq!(rebound.color, Color::White);
        assert!(rebound.rejoined);
        assert!(!rebound.started);
    }

    #[test]
    fn expired_claim_is_not_restored() {
        let mut room = Room::new("r1", "alice", false);
        room.join(Uuid::new_v4(), "alice", GRACE).unwrap();
        room.join(Uuid::new_v4(), "bob", GRACE).unwrap();

        let alice_session = *room
            .members
            .iter()
            .find(|(_, m)| m.username == "alice")
            .map(|(id, _)| id)
            .unwrap();
        room.disconnect(alice_session);

        // Zero grace: the claim is pruned on the next join, and with Bob
        // still holding Black, Alice comes back as White regardless --
        // but as a fresh assignment, not a reclaim.
        let back = room.join(Uuid::new_v4(), "alice", Duration::ZERO).unwrap();
        assert_eq!(back.color, Color::White);
        assert!(!back.rejoined);
    }

    #[test]
    fn explicit_leave_releases_the_seat() {
        let mut room = Room::new("r1", "alice", false);
        let s1 = Uuid::new_v4();
        room.join(s1, "alice", GRACE).unwrap();
        room.join(Uuid::new_v4(), "bob", GRACE).unwrap();

        room.leave(s1);
        let carol = room.join(Uuid::new_v4(), "carol", GRACE).unwrap();
        assert_eq!(carol.color, Color::White);
    }

    #[test]
    fn reset_needs_both_votes_in_a_two_player_room() {
        let mut room = Room::new("r1", "alice", false);
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        room.join(s1, "alice", GRACE).unwrap();
        room.join(s2, "bob", GRACE).unwrap();

        // Play a move so the reset is observable.
        room.submit_move(
            s1,
            BoardId::Main,
            &MovePayload::simple(Square::new(6, 4), Square::new(4, 4)),
        )
        .unwrap();
        assert_eq!(room.game.moves.len(), 1);

        assert_eq!(room.request_reset(s1).unwrap(), ResetAction::VotesUpdated);
        assert!(room.game.reset_votes.white);
        assert!(!room.game.reset_votes.black);
        assert_eq!(room.game.moves.len(), 1);

        assert_eq!(room.request_reset(s2).unwrap(), ResetAction::Reset);
        assert!(room.game.moves.is_empty());
        assert!(!room.game.reset_votes.white);
        assert!(!room.game.reset_votes.black);
    }

    #[test]
    fn lone_player_resets_immediately() {
        let mut room = Room::new("r1", "alice", false);
        let s1 = Uuid::new_v4();
        room.join(s1, "alice", GRACE).unwrap();
        room.submit_move(
            s1,
            BoardId::Main,
            &MovePayload::simple(Square::new(6, 4), Square::new(4, 4)),
        )
        .unwrap();

        assert_eq!(room.request_reset(s1).unwrap(), ResetAction::Reset);
        assert!(room.game.moves.is_empty());
    }

    #[test]
    fn submit_move_requires_a_seat() {
        let mut room = Room::new("r1", "alice", false);
        assert_eq!(
            room.submit_move(
                Uuid::new_v4(),
                BoardId::Main,
                &MovePayload::simple(Square::new(6, 4), Square::new(4, 4)),
            ),
            Err(RoomError::NotAPlayer)
        );
    }

    #[test]
    fn lobby_list_hides_private_and_full_rooms() {
        let registry = RoomRegistry::new(GRACE, DEFAULT_ROOM_TTL);
        registry.create("open", "alice", false).unwrap();
        registry.create("hidden", "bob", true).unwrap();
        let full = registry.create("full", "carol", false).unwrap();
        {
            let mut full = full.lock().unwrap();
            full.join(Uuid::new_v4(), "carol", GRACE).unwrap();
            full.join(Uuid::new_v4(), "dave", GRACE).unwrap();
        }

        let lobbies = registry.lobbies();
        assert_eq!(lobbies.len(), 1);
        assert_eq!(lobbies[0].room, "open");
    }

    #[test]
    fn duplicate_room_id_is_rejected() {
        let registry = RoomRegistry::new(GRACE, DEFAULT_ROOM_TTL);
        registry.create("r1", "alice", false).unwrap();
        assert!(matches!(
            registry.create("r1", "bob", false),
            Err(RoomError::AlreadyExists(_))
        ));
    }

    #[test]
    fn sweep_collects_empty_and_idle_rooms() {
        let registry = RoomRegistry::new(Duration::ZERO, Duration::ZERO);
        registry.create("stale", "alice", false).unwrap();

        let removed = registry.sweep();
        assert_eq!(removed, vec!["stale".to_string()]);
        assert!(registry.get("stale").is_none());
    }
}
