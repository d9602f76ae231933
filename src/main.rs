//! # Twofold — Authoritative server for Twofold Chess
//!
//! Twofold Chess is a variant played on two independent boards with
//! cross-board coupling: a capture on the main board also removes the
//! piece with the same identity from the secondary board, a delivered
//! check pins the defender to the board it happened on, and after a
//! quiet move the opponent plays the other board. This server enforces
//! those rules deterministically and relays state to two remote players
//! over a WebSocket event channel.
//!
//! ## Features
//!
//! - **Rules engine**: legal move generation per board (castling, en
//!   passant, promotion, check/checkmate/stalemate) plus the variant's
//!   capture mirror, check-response gating, and per-board outcomes.
//! - **Rooms**: per-room games with color assignment, reset voting,
//!   chat relay, a public lobby list, and reconnect handling with a
//!   grace window.
//! - **Realtime channel**: a WebSocket event protocol at `/ws` with
//!   ordered per-room broadcasts and heartbeat-based eviction.
//! - **History**: finished games persisted as compressed documents,
//!   listable over HTTP.
//! - **Swagger/OpenAPI documentation** at `/swagger-ui/`.
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (default: http://0.0.0.0:8080)
//! twofold serve
//!
//! # Custom port and data directory
//! twofold serve --port 3000 --data-dir /var/lib/twofold
//! ```
//!
//! ## HTTP endpoints
//!
//! | Method | Path                          | Description                  |
//! |--------|-------------------------------|------------------------------|
//! | GET    | `/ws`                         | WebSocket event channel      |
//! | GET    | `/health`                     | Liveness probe               |
//! | GET    | `/health/detailed`            | Status counters              |
//! | POST   | `/api/reset`                  | Reset a room                 |
//! | POST   | `/api/games`                  | Persist a finished game      |
//! | GET    | `/api/games`                  | List finished games          |
//! | POST   | `/api/debug/setup/{scenario}` | Install preset (debug only)  |
//! | GET    | `/swagger-ui/`                | Swagger UI documentation     |

pub mod api;
pub mod game;
pub mod movegen;
pub mod room;
pub mod scenarios;
pub mod storage;
pub mod types;
pub mod ws;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{ApiDoc, AppState};
use crate::room::RoomRegistry;
use crate::storage::HistoryStore;
use crate::ws::RoomHub;

/// Twofold — authoritative game server for Twofold Chess.
#[derive(Parser, Debug)]
#[command(name = "twofold")]
#[command(about = "Realtime server for Twofold Chess, a two-board chess variant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the WebSocket + HTTP server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Directory for finished-game history.
        #[arg(long, default_value = "data")]
        data_dir: String,

        /// Seconds an idle room lives before being collected.
        #[arg(long, default_value_t = 1800)]
        room_ttl_secs: u64,

        /// Seconds a disconnected player keeps their color.
        #[arg(long, default_value_t = 30)]
        grace_secs: u64,
    },
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            data_dir,
            room_ttl_secs,
            grace_secs,
        } => {
            run_server(
                &host,
                port,
                &data_dir,
                Duration::from_secs(room_ttl_secs),
                Duration::from_secs(grace_secs),
            )
            .await
        }
    }
}

/// Starts the HTTP + WebSocket server with all routes and Swagger UI.
async fn run_server(
    host: &str,
    port: u16,
    data_dir: &str,
    room_ttl: Duration,
    grace: Duration,
) -> std::io::Result<()> {
    let openapi = ApiDoc::openapi();

    let registry = Arc::new(RoomRegistry::new(grace, room_ttl));
    let history = HistoryStore::new(data_dir)?;

    let app_state = web::Data::new(AppState {
        registry: registry.clone(),
        history,
        started_at: Instant::now(),
    });

    // Start the central event hub actor (fan-out + room expiry sweep).
    let hub = RoomHub::new(registry).start();
    let hub_data = web::Data::new(hub);

    log::info!("starting Twofold server on {}:{}", host, port);
    log::info!("history directory: {}", data_dir);
    log::info!("WebSocket endpoint: ws://{}:{}/ws", host, port);
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);

    HttpServer::new(move || {
        // Permissive CORS so browser clients on other origins can connect.
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .app_data(hub_data.clone())
            .configure(api::configure_routes)
            .route("/ws", web::get().to(ws::ws_connect))
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
    })
    .bind((host, port))?
    .run()
    .await
}
