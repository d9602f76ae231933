//! REST API for the Twofold Chess server.
//!
//! The realtime protocol lives on the WebSocket (`/ws`); this module
//! provides the HTTP surface around it:
//!
//! - Health probes (`/health`, `/health/detailed`)
//! - Administrative room reset (`POST /api/reset`)
//! - Finished-game history (`POST /api/games`, `GET /api/games`)
//! - Debug scenario install (`POST /api/debug/setup/{scenario}`,
//!   compiled only in debug builds)
//!
//! The API is documented with OpenAPI/Swagger via `utoipa`; Swagger UI
//! is available at `/swagger-ui/`.

use actix::Addr;
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::room::{LobbySummary, RoomRegistry};
use crate::storage::{self, FinishedGame, HistoryStore};
use crate::types::*;
use crate::ws::{RoomHub, broadcast_room_event};

/// Shared application state for all HTTP and WebSocket handlers.
///
/// Wrapped in `web::Data` (an `Arc` internally). The registry carries
/// its own locking; no handler-level mutex is needed here.
pub struct AppState {
    /// The process-wide room registry.
    pub registry: Arc<RoomRegistry>,
    /// The finished-game document store.
    pub history: HistoryStore,
    /// Server start time, for uptime reporting.
    pub started_at: Instant,
}

// ---------------------------------------------------------------------------
// OpenAPI definition
// ---------------------------------------------------------------------------

/// OpenAPI documentation for the Twofold Chess server.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Twofold Chess Server",
        version = "0.1.0",
        description = "Authoritative server for Twofold Chess, a variant played on two \
            coupled boards. Realtime play happens over the WebSocket endpoint at /ws; \
            this API covers health, administrative resets, and game history.",
        license(name = "MIT")
    ),
    paths(health, health_detailed, reset_room, persist_game, list_games),
    components(schemas(
        HealthResponse,
        DetailedHealthResponse,
        ResetRequest,
        MessageResponse,
        ErrorResponse,
        PersistGameRequest,
        PersistGameResponse,
        GameHistoryResponse,
        FinishedGame,
        LobbySummary,
        GameSnapshot,
        MovePayload,
        Color,
        BoardId,
        BoardOutcome,
        Winner,
        CastlingRights,
        SideCastlingRights,
        ResetVotes,
        EnPassantTargets,
        BoardCastlingRights,
    )),
    tags(
        (name = "health", description = "Liveness and status probes"),
        (name = "rooms", description = "Administrative room operations"),
        (name = "history", description = "Finished-game persistence and listing"),
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Basic liveness reply.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Detailed status reply.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailedHealthResponse {
    pub status: String,
    /// Number of live rooms.
    pub rooms: usize,
    /// Number of connected players across all rooms.
    pub players: usize,
    /// Number of persisted finished games.
    pub finished_games: usize,
    pub uptime_secs: u64,
}

/// Request naming a room.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetRequest {
    pub room: String,
}

/// Generic confirmation reply.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Error reply.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request persisting a finished game (legacy manual end).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistGameRequest {
    pub room: String,
    pub winner: Option<Winner>,
    /// Move records; when empty, the live room's records are used.
    #[serde(default)]
    pub moves: Vec<String>,
}

/// Reply after persisting a finished game.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistGameResponse {
    pub id: String,
}

/// Reply listing persisted games.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameHistoryResponse {
    pub games: Vec<FinishedGame>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Detailed status: room/player counts, history size, uptime.
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses((status = 200, description = "Detailed status", body = DetailedHealthResponse))
)]
pub async fn health_detailed(data: web::Data<AppState>) -> impl Responder {
    let (rooms, players) = data.registry.counts();
    let finished_games = data.history.list().map(|games| games.len()).unwrap_or(0);

    HttpResponse::Ok().json(DetailedHealthResponse {
        status: "ok".to_string(),
        rooms,
        players,
        finished_games,
        uptime_secs: data.started_at.elapsed().as_secs(),
    })
}

/// Administrative reset of a room's game.
///
/// Unlike the vote-based in-game reset, this re-initializes the game
/// unconditionally and broadcasts `game_reset` to the room.
#[utoipa::path(
    post,
    path = "/api/reset",
    tag = "rooms",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Room reset", body = MessageResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn reset_room(
    body: web::Json<ResetRequest>,
    data: web::Data<AppState>,
    hub: web::Data<Addr<RoomHub>>,
) -> impl Responder {
    match data.registry.get(&body.room) {
        Some(room_arc) => {
            let room = &mut *room_arc.lock().unwrap();
            room.game.reset();
            room.touch();
            log::info!("room {} reset via HTTP", body.room);
            broadcast_room_event(
                &hub,
                &body.room,
                "game_reset",
                serde_json::to_value(room.game.snapshot()).unwrap_or(serde_json::Value::Null),
            );
            HttpResponse::Ok().json(MessageResponse {
                message: format!("Room {} reset", body.room),
            })
        }
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Room {} not found", body.room),
        }),
    }
}

/// Persists a finished game document.
///
/// Outcomes and (when the request omits them) move records come from the
/// live room if it exists.
#[utoipa::path(
    post,
    path = "/api/games",
    tag = "history",
    request_body = PersistGameRequest,
    responses(
        (status = 201, description = "Game persisted", body = PersistGameResponse),
        (status = 500, description = "Write failed", body = ErrorResponse),
    )
)]
pub async fn persist_game(
    body: web::Json<PersistGameRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let (main_outcome, secondary_outcome, moves) = match data.registry.get(&body.room) {
        Some(room_arc) => {
            let room = room_arc.lock().unwrap();
            let moves = if body.moves.is_empty() {
                room.game.moves.clone()
            } else {
                body.moves.clone()
            };
            (room.game.main.outcome, room.game.secondary.outcome, moves)
        }
        None => (BoardOutcome::Active, BoardOutcome::Active, body.moves.clone()),
    };

    let doc = FinishedGame {
        id: Uuid::new_v4(),
        room: body.room.clone(),
        winner: body.winner,
        main_board_outcome: main_outcome,
        secondary_board_outcome: secondary_outcome,
        moves,
        finished_at: storage::unix_timestamp(),
    };

    match data.history.save(&doc) {
        Ok(()) => HttpResponse::Created().json(PersistGameResponse {
            id: doc.id.to_string(),
        }),
        Err(e) => {
            log::error!("failed to persist game for room {}: {}", body.room, e);
            HttpResponse::InternalServerError().json(ErrorResponse { error: e })
        }
    }
}

/// Lists the persisted finished games, newest first.
#[utoipa::path(
    get,
    path = "/api/games",
    tag = "history",
    responses(
        (status = 200, description = "Finished games", body = GameHistoryResponse),
        (status = 500, description = "Read failed", body = ErrorResponse),
    )
)]
pub async fn list_games(data: web::Data<AppState>) -> impl Responder {
    match data.history.list() {
        Ok(games) => {
            let total = games.len();
            HttpResponse::Ok().json(GameHistoryResponse { games, total })
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse { error: e }),
    }
}

/// Installs a preset game state into a room. Debug builds only; this is
/// the single non-move path that mutates a game.
#[cfg(debug_assertions)]
pub async fn debug_setup(
    path: web::Path<String>,
    body: web::Json<ResetRequest>,
    data: web::Data<AppState>,
    hub: web::Data<Addr<RoomHub>>,
) -> impl Responder {
    let scenario = path.into_inner();
    match crate::scenarios::build(&scenario) {
        Some(game) => {
            let room_arc = data.registry.get_or_create(&body.room, "debug");
            let room = &mut *room_arc.lock().unwrap();
            room.game = game;
            room.touch();
            log::info!("installed scenario '{}' into room {}", scenario, body.room);
            broadcast_room_event(
                &hub,
                &body.room,
                "game_state",
                serde_json::to_value(room.game.snapshot()).unwrap_or(serde_json::Value::Null),
            );
            HttpResponse::Ok().json(MessageResponse {
                message: format!("Scenario '{}' installed into room {}", scenario, body.room),
            })
        }
        None => HttpResponse::BadRequest().json(ErrorResponse {
            error: format!(
                "Unknown scenario '{}'; available: {}",
                scenario,
                crate::scenarios::SCENARIO_NAMES.join(", ")
            ),
        }),
    }
}

// ---------------------------------------------------------------------------
// Route configuration
// ---------------------------------------------------------------------------

/// Registers all HTTP routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/health/detailed", web::get().to(health_detailed))
        .route("/api/reset", web::post().to(reset_room))
        .route("/api/games", web::post().to(persist_game))
        .route("/api/games", web::get().to(list_games));

    #[cfg(debug_assertions)]
    cfg.route("/api/debug/setup/{scenario}", web::post().to(debug_setup));
}
