//! Game state management for Twofold Chess.
//!
//! This module couples the two boards into one [`Game`] and acts as the
//! coordinator between the board representation and the move generator:
//! it gates each submitted move (turn, phase, check response), delegates
//! validation and application to [`crate::movegen`], applies the
//! variant's capture mirror, re-evaluates both boards, and drives the
//! phase/turn machine.
//!
//! ## Variant rules enforced here
//!
//! - **Capture mirror**: a capture on the main board also removes the
//!   piece with the same id from the secondary board. En passant
//!   captures mirror in both directions.
//! - **Check-response gating**: a side in check must move on the board
//!   the check occurred on; the checking move ends the mover's turn.
//! - **Phase toggle**: after a non-checking move the opponent plays the
//!   other board next; resolved boards are skipped.
//! - **Castle once**: castling on either board clears both castling
//!   rights for that side on both boards.
//! - A checkmate on either board ends the whole game in the mover's
//!   favor; a stalemate freezes that board only, and the game is drawn
//!   when both boards are resolved without a mate.

use crate::movegen::{self, BoardStatus};
use crate::types::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A complete Twofold Chess game: two coupled boards plus the shared
/// turn/phase state. Mutated only through [`Game::submit`] (and the
/// reset paths), always under the owning room's lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// The main board. Captures here mirror onto the secondary board.
    pub main: Board,
    /// The secondary board. Only en passant captures mirror back.
    pub secondary: Board,
    /// Side to move.
    pub turn: Color,
    /// The board the side to move must play on.
    pub active_phase: BoardId,
    /// When set, the side to move is in check on that board and may only
    /// move there.
    pub responding_to_check_on: Option<BoardId>,
    /// Human-readable move records, oldest first.
    pub moves: Vec<String>,
    /// The overall result once the game is over.
    pub winner: Option<Winner>,
    pub game_over: bool,
    pub reset_votes: ResetVotes,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// Creates a new game: the standard start position duplicated on both
    /// boards, White to move on the main board.
    pub fn new() -> Self {
        Self {
            main: Board::starting_position(),
            secondary: Board::starting_position(),
            turn: Color::White,
            active_phase: BoardId::Main,
            responding_to_check_on: None,
            moves: Vec::new(),
            winner: None,
            game_over: false,
            reset_votes: ResetVotes::default(),
        }
    }

    /// Returns the game to the start state, clearing the move history and
    /// any pending reset votes.
    pub fn reset(&mut self) {
        *self = Game::new();
    }

    /// Returns the board with the given id.
    pub fn board(&self, id: BoardId) -> &Board {
        match id {
            BoardId::Main => &self.main,
            BoardId::Secondary => &self.secondary,
        }
    }

    /// Returns a mutable reference to the board with the given id.
    pub fn board_mut(&mut self, id: BoardId) -> &mut Board {
        match id {
            BoardId::Main => &mut self.main,
            BoardId::Secondary => &mut self.secondary,
        }
    }

    /// Verifies that every unresolved board holds exactly one king per
    /// color. A violation means internal state corruption; the session
    /// layer refuses further moves on the room when this fails.
    pub fn kings_intact(&self) -> bool {
        for id in [BoardId::Main, BoardId::Secondary] {
            let board = self.board(id);
            if !board.outcome.is_active() {
                continue;
            }
            if board.count_kind(Color::White, PieceKind::King) != 1
                || board.count_kind(Color::Black, PieceKind::King) != 1
            {
                return false;
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Move submission
    // -----------------------------------------------------------------------

    /// Processes a move submitted by `color` on `board_id`.
    ///
    /// Validates the gate conditions (game over, turn, phase, check
    /// response), resolves the payload against the rules engine, applies
    /// it, mirrors captures, re-evaluates the opponent on both boards,
    /// and advances the phase/turn machine.
    ///
    /// On rejection the game state is unchanged.
    pub fn submit(
        &mut self,
        color: Color,
        board_id: BoardId,
        payload: &MovePayload,
    ) -> Result<(), MoveError> {
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        if color != self.turn {
            return Err(MoveError::NotYourTurn);
        }

        // Phase gate: off-phase moves are allowed only when the phase
        // board is resolved (the phase auto-skips resolved boards); a
        // resolved board never accepts moves.
        if board_id != self.active_phase && self.board(self.active_phase).outcome.is_active() {
            return Err(MoveError::WrongBoard {
                expected: self.active_phase,
                attempted: board_id,
            });
        }
        if !self.board(board_id).outcome.is_active() {
            return Err(MoveError::WrongBoard {
                expected: self.active_phase,
                attempted: board_id,
            });
        }

        if let Some(board) = self.responding_to_check_on
            && board != board_id
        {
            return Err(MoveError::MustRespondToCheckOn {
                board,
                attempted: board_id,
            });
        }

        // Validate against the pre-state and apply.
        let mv = movegen::resolve_move(self.board(board_id), color, payload)?;
        let (next, captured) = movegen::apply_move(self.board(board_id), &mv, color);
        *self.board_mut(board_id) = next;

        // Castling is permitted once per side per game: castling on either
        // board spends the rights on both.
        if mv.is_castling {
            for id in [BoardId::Main, BoardId::Secondary] {
                self.board_mut(id).castling.for_color_mut(color).clear();
            }
        }

        // Capture mirror: main-board captures mirror onto the secondary
        // board by piece id; en passant captures mirror from either board.
        if let Some(captured) = captured
            && (board_id == BoardId::Main || mv.is_en_passant)
        {
            let other = board_id.other();
            if let Some(sq) = self.board_mut(other).remove_piece(captured.color, captured.id) {
                log::debug!(
                    "capture mirror: removed {} {:?} from {} at {}",
                    captured.color,
                    captured.id,
                    other,
                    sq
                );
            }
        }

        self.moves.push(move_record(color, board_id, &mv, captured));

        // Re-evaluate the opponent on both still-active boards.
        let opponent = color.opponent();
        self.responding_to_check_on = None;
        let mut checked: Vec<BoardId> = Vec::new();
        for id in [BoardId::Main, BoardId::Secondary] {
            if !self.board(id).outcome.is_active() {
                continue;
            }
            match movegen::classify(self.board(id), opponent) {
                BoardStatus::Checkmate => {
                    self.board_mut(id).outcome = BoardOutcome::win_for(color);
                }
                BoardStatus::Stalemate => {
                    self.board_mut(id).outcome = BoardOutcome::DrawStalemate;
                }
                BoardStatus::Active => {
                    if movegen::is_in_check(self.board(id), opponent) {
                        checked.push(id);
                    }
                }
            }
        }

        // A checkmate on either board ends the whole game in the mover's
        // favor.
        let mated = [BoardId::Main, BoardId::Secondary].iter().any(|&id| {
            matches!(
                self.board(id).outcome,
                BoardOutcome::WhiteWins | BoardOutcome::BlackWins
            )
        });
        if mated {
            self.game_over = true;
            self.winner = Some(Winner::from(color));
            log::info!("game over: {} wins by checkmate", color);
            return Ok(());
        }

        // Both boards resolved without a mate: drawn game.
        if !self.main.outcome.is_active() && !self.secondary.outcome.is_active() {
            self.game_over = true;
            self.winner = Some(Winner::Draw);
            log::info!("game over: drawn, both boards stalemated");
            return Ok(());
        }

        // Phase and turn transition. A delivered check pins the opponent
        // to the checked board; when the move checks on both boards (the
        // mirror can discover one), the board just played takes priority.
        if !checked.is_empty() {
            let board = if checked.contains(&board_id) {
                board_id
            } else {
                checked[0]
            };
            self.responding_to_check_on = Some(board);
            self.active_phase = board;
        } else {
            let other = board_id.other();
            self.active_phase = if self.board(other).outcome.is_active() {
                other
            } else {
                board_id
            };
        }
        self.turn = opponent;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Builds the client-facing snapshot of the full game state.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            main_board: self.main.encode_grid(),
            secondary_board: self.secondary.encode_grid(),
            turn: self.turn,
            active_board_phase: self.active_phase,
            moves: self.moves.clone(),
            winner: self.winner,
            game_over: self.game_over,
            main_board_outcome: self.main.outcome,
            secondary_board_outcome: self.secondary.outcome,
            is_responding_to_check_on_board: self.responding_to_check_on,
            en_passant_target: EnPassantTargets {
                main: self.main.en_passant,
                secondary: self.secondary.en_passant,
            },
            castling_rights: BoardCastlingRights {
                main: self.main.castling,
                secondary: self.secondary.castling,
            },
            reset_votes: self.reset_votes,
        }
    }
}

/// Formats a human-readable move record, e.g. `[main] white: e2-e4`,
/// `[secondary] black: e4xd3 e.p.`, `[main] white: O-O`.
fn move_record(color: Color, board: BoardId, mv: &Move, captured: Option<Piece>) -> String {
    let notation = if mv.is_castling {
        if mv.to.col == 6 { "O-O" } else { "O-O-O" }.to_string()
    } else {
        let sep = if captured.is_some() { 'x' } else { '-' };
        let mut s = format!("{}{}{}", mv.from.to_algebraic(), sep, mv.to.to_algebraic());
        if let Some(promo) = mv.promotion {
            s.push('=');
            s.push(promo.letter());
        }
        if mv.is_en_passant {
            s.push_str(" e.p.");
        }
        s
    };
    format!("[{}] {}: {}", board, color, notation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(row: u8, col: u8) -> Square {
        Square::new(row, col)
    }

    fn mv(from: Square, to: Square) -> MovePayload {
        MovePayload::simple(from, to)
    }

    fn king(color: Color) -> Piece {
        Piece::new(PieceKind::King, color, PieceId::King)
    }

    /// Board with only the two kings on their home squares and no rights.
    fn bare_board() -> Board {
        let mut board = Board::default();
        board.castling.white.clear();
        board.castling.black.clear();
        board.set(sq(7, 4), Some(king(Color::White)));
        board.set(sq(0, 4), Some(king(Color::Black)));
        board
    }

    #[test]
    fn turn_and_phase_alternate_between_boards() {
        let mut game = Game::new();

        game.submit(Color::White, BoardId::Main, &mv(sq(6, 4), sq(4, 4)))
            .unwrap();
        assert_eq!(game.turn, Color::Black);
        assert_eq!(game.active_phase, BoardId::Secondary);

        // Black must follow the phase.
        assert_eq!(
            game.submit(Color::Black, BoardId::Main, &mv(sq(1, 4), sq(3, 4))),
            Err(MoveError::WrongBoard {
                expected: BoardId::Secondary,
                attempted: BoardId::Main,
            })
        );

        game.submit(Color::Black, BoardId::Secondary, &mv(sq(1, 4), sq(3, 4)))
            .unwrap();
        assert_eq!(game.turn, Color::White);
        assert_eq!(game.active_phase, BoardId::Main);
        assert_eq!(game.moves.len(), 2);
    }

    #[test]
    fn rejects_out_of_turn_moves() {
        let mut game = Game::new();
        assert_eq!(
            game.submit(Color::Black, BoardId::Main, &mv(sq(1, 4), sq(3, 4))),
            Err(MoveError::NotYourTurn)
        );
    }

    #[test]
    fn scholars_mate_on_main_ends_the_game() {
        let mut game = Game::new();

        // With pure alternation White stays on main and Black on
        // secondary; Black plays quiet developing moves there.
        let plies: [(Color, BoardId, (u8, u8), (u8, u8)); 7] = [
            (Color::White, BoardId::Main, (6, 4), (4, 4)),      // e2-e4
            (Color::Black, BoardId::Secondary, (1, 4), (3, 4)), // e7-e5
            (Color::White, BoardId::Main, (7, 3), (3, 7)),      // Qd1-h5
            (Color::Black, BoardId::Secondary, (0, 1), (2, 2)), // Nb8-c6
            (Color::White, BoardId::Main, (7, 5), (4, 2)),      // Bf1-c4
            (Color::Black, BoardId::Secondary, (0, 6), (2, 5)), // Ng8-f6
            (Color::White, BoardId::Main, (3, 7), (1, 5)),      // Qh5xf7#
        ];
        for (color, board, from, to) in plies {
            game.submit(color, board, &mv(sq(from.0, from.1), sq(to.0, to.1)))
                .unwrap();
        }

        assert_eq!(game.main.outcome, BoardOutcome::WhiteWins);
        assert!(game.game_over);
        assert_eq!(game.winner, Some(Winner::White));

        // No further moves on either board.
        assert_eq!(
            game.submit(Color::Black, BoardId::Secondary, &mv(sq(3, 4), sq(4, 4))),
            Err(MoveError::GameOver)
        );
    }

    #[test]
    fn main_capture_mirrors_to_secondary_by_id() {
        let mut game = Game::new();
        game.main = bare_board();
        game.secondary = bare_board();

        // White knight on e4 (main) captures the black knight on d6; the
        // secondary board holds a black piece with the same id on g8.
        game.main.set(
            sq(4, 4),
            Some(Piece::new(
                PieceKind::Knight,
                Color::White,
                PieceId::KingsideKnight,
            )),
        );
        game.main.set(
            sq(2, 3),
            Some(Piece::new(
                PieceKind::Knight,
                Color::Black,
                PieceId::KingsideKnight,
            )),
        );
        game.secondary.set(
            sq(0, 6),
            Some(Piece::new(
                PieceKind::Knight,
                Color::Black,
                PieceId::KingsideKnight,
            )),
        );

        game.submit(Color::White, BoardId::Main, &mv(sq(4, 4), sq(2, 3)))
            .unwrap();

        assert!(game.secondary.get(sq(0, 6)).is_none());
        assert!(
            game.secondary
                .find_piece(Color::Black, PieceId::KingsideKnight)
                .is_none()
        );
    }

    #[test]
    fn secondary_capture_does_not_mirror_to_main() {
        let mut game = Game::new();
        game.main = bare_board();
        game.secondary = bare_board();
        game.active_phase = BoardId::Secondary;

        game.secondary.set(
            sq(4, 4),
            Some(Piece::new(
                PieceKind::Knight,
                Color::White,
                PieceId::KingsideKnight,
            )),
        );
        game.secondary.set(
            sq(2, 3),
            Some(Piece::new(
                PieceKind::Knight,
                Color::Black,
                PieceId::KingsideKnight,
            )),
        );
        game.main.set(
            sq(0, 6),
            Some(Piece::new(
                PieceKind::Knight,
                Color::Black,
                PieceId::KingsideKnight,
            )),
        );

        game.submit(Color::White, BoardId::Secondary, &mv(sq(4, 4), sq(2, 3)))
            .unwrap();

        // The main-board piece with the same id is untouched.
        assert!(game.main.get(sq(0, 6)).is_some());
    }

    #[test]
    fn secondary_en_passant_mirrors_to_main() {
        let mut game = Game::new();
        game.secondary = bare_board();
        game.active_phase = BoardId::Secondary;

        // Secondary: white pawn e5, black pawn just double-pushed d7-d5.
        game.secondary.set(
            sq(3, 4),
            Some(Piece::new(PieceKind::Pawn, Color::White, PieceId::Pawn(5))),
        );
        game.secondary.set(
            sq(3, 3),
            Some(Piece::new(PieceKind::Pawn, Color::Black, PieceId::Pawn(4))),
        );
        game.secondary.en_passant = Some(sq(2, 3));

        // Main still has the black d-pawn on its home square.
        assert!(game.main.get(sq(1, 3)).is_some());

        game.submit(Color::White, BoardId::Secondary, &mv(sq(3, 4), sq(2, 3)))
            .unwrap();

        // The en passant capture mirrored back onto the main board.
        assert!(game.main.find_piece(Color::Black, PieceId::Pawn(4)).is_none());
        assert!(game.main.get(sq(1, 3)).is_none());
    }

    #[test]
    fn delivered_check_pins_the_opponent_to_that_board() {
        let mut game = Game::new();
        game.main = bare_board();
        game.main.set(
            sq(7, 3),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::QueensideRook,
            )),
        );

        // Rd1-d8+ on main.
        game.submit(Color::White, BoardId::Main, &mv(sq(7, 3), sq(0, 3)))
            .unwrap();
        assert_eq!(game.responding_to_check_on, Some(BoardId::Main));
        assert_eq!(game.active_phase, BoardId::Main);
        assert_eq!(game.turn, Color::Black);

        // Black may not play the secondary board while in check on main.
        assert_eq!(
            game.submit(Color::Black, BoardId::Secondary, &mv(sq(1, 4), sq(3, 4))),
            Err(MoveError::MustRespondToCheckOn {
                board: BoardId::Main,
                attempted: BoardId::Secondary,
            })
        );

        // Ke8xd8 resolves the check; the gate clears.
        game.submit(Color::Black, BoardId::Main, &mv(sq(0, 4), sq(0, 3)))
            .unwrap();
        assert_eq!(game.responding_to_check_on, None);
        assert_eq!(game.turn, Color::White);
        assert_eq!(game.active_phase, BoardId::Secondary);

        // The captured rook mirrored off the secondary board.
        assert!(
            game.secondary
                .find_piece(Color::White, PieceId::QueensideRook)
                .is_none()
        );
    }

    #[test]
    fn castling_on_one_board_spends_the_rights_on_both() {
        let mut game = Game::new();
        game.main = bare_board();
        game.secondary = bare_board();
        for id in [BoardId::Main, BoardId::Secondary] {
            game.board_mut(id).castling.white = SideCastlingRights::default();
            game.board_mut(id).set(
                sq(7, 7),
                Some(Piece::new(
                    PieceKind::Rook,
                    Color::White,
                    PieceId::KingsideRook,
                )),
            );
        }

        // White castles kingside on main.
        game.submit(Color::White, BoardId::Main, &mv(sq(7, 4), sq(7, 6)))
            .unwrap();
        assert!(game.moves.last().unwrap().contains("O-O"));
        assert!(!game.secondary.castling.white.kingside);
        assert!(!game.secondary.castling.white.queenside);

        // A later castle attempt on the secondary board is rejected.
        game.turn = Color::White;
        game.active_phase = BoardId::Secondary;
        assert_eq!(
            game.submit(Color::White, BoardId::Secondary, &mv(sq(7, 4), sq(7, 6))),
            Err(MoveError::PathBlocked)
        );
    }

    #[test]
    fn en_passant_target_lives_one_move_per_board() {
        let mut game = Game::new();

        game.submit(Color::White, BoardId::Main, &mv(sq(6, 4), sq(4, 4)))
            .unwrap();
        assert_eq!(game.main.en_passant, Some(sq(5, 4)));

        // A move on the other board leaves the target armed.
        game.submit(Color::Black, BoardId::Secondary, &mv(sq(1, 4), sq(3, 4)))
            .unwrap();
        assert_eq!(game.main.en_passant, Some(sq(5, 4)));
        assert_eq!(game.secondary.en_passant, Some(sq(2, 4)));

        // The next move on the main board clears it.
        game.submit(Color::White, BoardId::Main, &mv(sq(7, 6), sq(5, 5)))
            .unwrap();
        assert_eq!(game.main.en_passant, None);
    }

    #[test]
    fn stalemate_freezes_one_board_and_play_continues() {
        let mut game = Game::new();
        // Main: white to stalemate black with Qd7-c7.
        game.main = Board::default();
        game.main.castling.white.clear();
        game.main.castling.black.clear();
        game.main.set(sq(0, 0), Some(king(Color::Black)));
        game.main.set(sq(2, 1), Some(king(Color::White)));
        game.main.set(
            sq(1, 3),
            Some(Piece::new(PieceKind::Queen, Color::White, PieceId::Queen)),
        );

        game.submit(Color::White, BoardId::Main, &mv(sq(1, 3), sq(1, 2)))
            .unwrap();
        assert_eq!(game.main.outcome, BoardOutcome::DrawStalemate);
        assert!(!game.game_over);
        assert_eq!(game.active_phase, BoardId::Secondary);
        assert_eq!(game.turn, Color::Black);

        // The frozen board no longer accepts moves.
        game.turn = Color::White;
        assert!(matches!(
            game.submit(Color::White, BoardId::Main, &mv(sq(2, 1), sq(2, 2))),
            Err(MoveError::WrongBoard { .. })
        ));
    }

    #[test]
    fn both_boards_stalemated_draws_the_game() {
        let mut game = Game::new();
        game.main = bare_board();
        game.main.outcome = BoardOutcome::DrawStalemate;

        // Secondary: white to stalemate black with Qd7-c7.
        game.secondary = Board::default();
        game.secondary.castling.white.clear();
        game.secondary.castling.black.clear();
        game.secondary.set(sq(0, 0), Some(king(Color::Black)));
        game.secondary.set(sq(2, 1), Some(king(Color::White)));
        game.secondary.set(
            sq(1, 3),
            Some(Piece::new(PieceKind::Queen, Color::White, PieceId::Queen)),
        );
        game.active_phase = BoardId::Secondary;

        game.submit(Color::White, BoardId::Secondary, &mv(sq(1, 3), sq(1, 2)))
            .unwrap();
        assert_eq!(game.secondary.outcome, BoardOutcome::DrawStalemate);
        assert!(game.game_over);
        assert_eq!(game.winner, Some(Winner::Draw));
    }

    #[test]
    fn snapshot_encodes_pawn_ids_and_state() {
        let game = Game::new();
        let snap = game.snapshot();

        assert_eq!(snap.turn, Color::White);
        assert_eq!(snap.active_board_phase, BoardId::Main);
        assert!(!snap.game_over);
        // Black back rank on row 0, pawn ids on row 1.
        assert_eq!(snap.main_board[0][4].as_deref(), Some("k"));
        assert_eq!(snap.main_board[1][0].as_deref(), Some("p1"));
        assert_eq!(snap.main_board[6][7].as_deref(), Some("P8"));
        assert_eq!(snap.main_board[7][3].as_deref(), Some("Q"));
        assert!(snap.main_board[4][4].is_none());
    }

    #[test]
    fn game_serde_round_trip() {
        let mut game = Game::new();
        game.submit(Color::White, BoardId::Main, &mv(sq(6, 4), sq(4, 4)))
            .unwrap();
        game.submit(Color::Black, BoardId::Secondary, &mv(sq(1, 3), sq(3, 3)))
            .unwrap();

        let json = serde_json::to_string(&game).unwrap();
        let restored: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, game);
    }

    #[test]
    fn kings_intact_detects_a_missing_king() {
        let mut game = Game::new();
        assert!(game.kings_intact());
        game.main.set(sq(0, 4), None);
        assert!(!game.kings_intact());

        // A resolved board is exempt.
        game.main.outcome = BoardOutcome::DrawStalemate;
        assert!(game.kings_intact());
    }
}
