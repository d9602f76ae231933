//! Finished-game history persistence.
//!
//! The history sink is a flat document store: every finished game is one
//! zstd-compressed JSON document under `<base_dir>/history/`. Documents
//! are written atomically (write to temp, then rename) with a bounded
//! number of retries; a failed write is logged and never fails the move
//! that finished the game.
//!
//! ```text
//! <base_dir>/
//!   history/            # finished games (.json.zst)
//! ```

use crate::game::Game;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;
use uuid::Uuid;

/// zstd compression level (19 = near-maximum compression for small data).
const ZSTD_COMPRESSION_LEVEL: i32 = 19;

/// How many times a history write is attempted before giving up.
const WRITE_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// Finished-game document
// ---------------------------------------------------------------------------

/// The document persisted for a finished game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinishedGame {
    /// Document id.
    #[schema(value_type = String)]
    pub id: Uuid,
    /// The room the game was played in.
    pub room: String,
    /// The overall result.
    pub winner: Option<Winner>,
    pub main_board_outcome: BoardOutcome,
    pub secondary_board_outcome: BoardOutcome,
    /// Human-readable move records, oldest first.
    pub moves: Vec<String>,
    /// Unix timestamp when the game finished.
    pub finished_at: u64,
}

impl FinishedGame {
    /// Builds a document from a finished game.
    pub fn from_game(room: &str, game: &Game) -> Self {
        Self {
            id: Uuid::new_v4(),
            room: room.to_string(),
            winner: game.winner,
            main_board_outcome: game.main.outcome,
            secondary_board_outcome: game.secondary.outcome,
            moves: game.moves.clone(),
            finished_at: unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryStore — file-based document store
// ---------------------------------------------------------------------------

/// Manages the finished-game documents on disk.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    history_dir: PathBuf,
}

impl HistoryStore {
    /// Creates a `HistoryStore` under the given base directory, creating
    /// the directory structure if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> io::Result<Self> {
        let history_dir = base_dir.as_ref().join("history");
        fs::create_dir_all(&history_dir)?;
        log::info!("history store initialized at {}", history_dir.display());
        Ok(Self { history_dir })
    }

    fn document_path(&self, id: &Uuid) -> PathBuf {
        self.history_dir.join(format!("{}.json.zst", id))
    }

    /// Writes one document: JSON, zstd-compressed, atomic rename.
    pub fn save(&self, doc: &FinishedGame) -> Result<(), String> {
        let json =
            serde_json::to_vec(doc).map_err(|e| format!("failed to encode document: {}", e))?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_COMPRESSION_LEVEL)
            .map_err(|e| format!("zstd compression failed: {}", e))?;

        let path = self.document_path(&doc.id);
        let temp_path = self.history_dir.join(format!("{}.json.zst.tmp", doc.id));
        fs::write(&temp_path, &compressed).map_err(|e| format!("failed to write temp file: {}", e))?;
        fs::rename(&temp_path, &path).map_err(|e| format!("failed to rename temp file: {}", e))?;

        log::debug!(
            "saved finished game {} ({} bytes compressed, {} moves)",
            doc.id,
            compressed.len(),
            doc.moves.len()
        );
        Ok(())
    }

    /// Fire-and-forget persistence with bounded retry. Failures are
    /// logged; the committed in-memory game is unaffected either way.
    pub fn persist_with_retry(&self, doc: &FinishedGame) {
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.save(doc) {
                Ok(()) => {
                    log::info!(
                        "persisted finished game {} for room {} ({} moves)",
                        doc.id,
                        doc.room,
                        doc.moves.len()
                    );
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "history write for {} failed (attempt {}/{}): {}",
                        doc.id,
                        attempt,
                        WRITE_ATTEMPTS,
                        e
                    );
                }
            }
        }
        log::error!(
            "giving up on history write for {} after {} attempts",
            doc.id,
            WRITE_ATTEMPTS
        );
    }

    /// Loads one document by id.
    pub fn load(&self, id: &Uuid) -> Result<FinishedGame, String> {
        let path = self.document_path(id);
        let compressed =
            fs::read(&path).map_err(|e| format!("failed to read document {}: {}", id, e))?;
        let json = zstd::decode_all(compressed.as_slice())
            .map_err(|e| format!("zstd decompression failed: {}", e))?;
        serde_json::from_slice(&json).map_err(|e| format!("failed to decode document {}: {}", id, e))
    }

    /// Loads every stored document, newest first. Unreadable files are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<FinishedGame>, String> {
        let entries = fs::read_dir(&self.history_dir)
            .map_err(|e| format!("failed to read history directory: {}", e))?;

        let mut games = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("failed to read entry: {}", e))?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if let Some(id_str) = filename.strip_suffix(".json.zst")
                && let Ok(id) = Uuid::parse_str(id_str)
            {
                match self.load(&id) {
                    Ok(doc) => games.push(doc),
                    Err(e) => log::warn!("skipping unreadable history document {}: {}", id, e),
                }
            }
        }

        games.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(games)
    }
}

// ---------------------------------------------------------------------------
// Utility: current unix timestamp
// ---------------------------------------------------------------------------

/// Returns the current Unix timestamp in seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (HistoryStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("twofold_test_{}", Uuid::new_v4()));
        let store = HistoryStore::new(&dir).unwrap();
        (store, dir)
    }

    fn sample_doc(room: &str) -> FinishedGame {
        FinishedGame {
            id: Uuid::new_v4(),
            room: room.to_string(),
            winner: Some(Winner::White),
            main_board_outcome: BoardOutcome::WhiteWins,
            secondary_board_outcome: BoardOutcome::Active,
            moves: vec!["[main] white: e2-e4".to_string()],
            finished_at: unix_timestamp(),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let (store, dir) = temp_store();
        let doc = sample_doc("r1");

        store.save(&doc).unwrap();
        let loaded = store.load(&doc.id).unwrap();
        assert_eq!(loaded, doc);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_returns_stored_documents() {
        let (store, dir) = temp_store();
        store.save(&sample_doc("r1")).unwrap();
        store.save(&sample_doc("r2")).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_game_captures_outcomes_and_moves() {
        let mut game = Game::new();
        game.submit(
            Color::White,
            BoardId::Main,
            &MovePayload::simple(Square::new(6, 4), Square::new(4, 4)),
        )
        .unwrap();

        let doc = FinishedGame::from_game("r1", &game);
        assert_eq!(doc.room, "r1");
        assert_eq!(doc.moves.len(), 1);
        assert_eq!(doc.main_board_outcome, BoardOutcome::Active);
    }
}
