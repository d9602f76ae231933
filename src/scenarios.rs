//! Preset game states for the debug setup endpoint and tests.
//!
//! Each scenario is a small hand-built position demonstrating one rule:
//! one move away from checkmate or stalemate, an in-check state with the
//! response gate armed, a pawn ready to promote, castling-ready rooks,
//! and an armed en passant capture. Installing a preset replaces a
//! room's game wholesale; this is the only non-move path that mutates a
//! game and the HTTP route for it exists only in debug builds.

use crate::game::Game;
use crate::types::*;

/// Names of all available scenarios.
pub const SCENARIO_NAMES: &[&str] = &[
    "checkmate",
    "stalemate",
    "in_check",
    "promotion",
    "castling",
    "en_passant",
];

/// Builds the preset game for the given scenario name.
///
/// Accepts hyphenated forms and the `-ready` suffix used by older
/// clients (`en-passant-ready`, `castling-ready`). Returns `None` for
/// unknown names.
pub fn build(name: &str) -> Option<Game> {
    let normalized = name.replace('-', "_");
    let normalized = normalized.strip_suffix("_ready").unwrap_or(&normalized);
    match normalized {
        "checkmate" => Some(checkmate_in_one()),
        "stalemate" => Some(stalemate_in_one()),
        "in_check" => Some(in_check()),
        "promotion" => Some(promotion_ready()),
        "castling" => Some(castling_ready()),
        "en_passant" => Some(en_passant_ready()),
        _ => None,
    }
}

fn king(color: Color) -> Piece {
    Piece::new(PieceKind::King, color, PieceId::King)
}

/// Empty board holding only the two kings on their home squares, with
/// castling rights spent.
fn bare_board() -> Board {
    let mut board = Board::default();
    board.castling.white.clear();
    board.castling.black.clear();
    board.set(Square::new(7, 4), Some(king(Color::White)));
    board.set(Square::new(0, 4), Some(king(Color::Black)));
    board
}

fn game_with_main(main: Board) -> Game {
    let mut game = Game::new();
    game.main = main;
    game.secondary = bare_board();
    game
}

/// White mates in one on main: Rf1-f8#.
fn checkmate_in_one() -> Game {
    let mut main = Board::default();
    main.castling.white.clear();
    main.castling.black.clear();
    main.set(Square::new(0, 7), Some(king(Color::Black)));
    main.set(Square::new(2, 6), Some(king(Color::White)));
    main.set(
        Square::new(7, 5),
        Some(Piece::new(
            PieceKind::Rook,
            Color::White,
            PieceId::KingsideRook,
        )),
    );
    game_with_main(main)
}

/// White stalemates in one on main: Qd7-c7.
fn stalemate_in_one() -> Game {
    let mut main = Board::default();
    main.castling.white.clear();
    main.castling.black.clear();
    main.set(Square::new(0, 0), Some(king(Color::Black)));
    main.set(Square::new(2, 1), Some(king(Color::White)));
    main.set(
        Square::new(1, 3),
        Some(Piece::new(PieceKind::Queen, Color::White, PieceId::Queen)),
    );
    game_with_main(main)
}

/// Black is in check on main (white rook on e1 down the open e-file)
/// with the response gate armed.
fn in_check() -> Game {
    let mut main = bare_board();
    main.set(
        Square::new(7, 4),
        Some(Piece::new(
            PieceKind::Rook,
            Color::White,
            PieceId::QueensideRook,
        )),
    );
    main.set(Square::new(7, 6), Some(king(Color::White)));

    let mut game = game_with_main(main);
    game.turn = Color::Black;
    game.active_phase = BoardId::Main;
    game.responding_to_check_on = Some(BoardId::Main);
    game
}

/// White pawn on e7 ready to promote on main.
fn promotion_ready() -> Game {
    let mut main = Board::default();
    main.castling.white.clear();
    main.castling.black.clear();
    main.set(Square::new(7, 6), Some(king(Color::White)));
    main.set(Square::new(1, 7), Some(king(Color::Black)));
    main.set(
        Square::new(1, 4),
        Some(Piece::new(PieceKind::Pawn, Color::White, PieceId::Pawn(5))),
    );
    game_with_main(main)
}

/// White may castle either side on main.
fn castling_ready() -> Game {
    let mut main = bare_board();
    main.castling.white = CastlingRights::default().white;
    main.set(
        Square::new(7, 0),
        Some(Piece::new(
            PieceKind::Rook,
            Color::White,
            PieceId::QueensideRook,
        )),
    );
    main.set(
        Square::new(7, 7),
        Some(Piece::new(
            PieceKind::Rook,
            Color::White,
            PieceId::KingsideRook,
        )),
    );
    game_with_main(main)
}

/// White can capture en passant on main (black d-pawn just double
/// pushed); the secondary board keeps its full start position so the
/// mirror is observable.
fn en_passant_ready() -> Game {
    let mut main = bare_board();
    main.set(
        Square::new(3, 4),
        Some(Piece::new(PieceKind::Pawn, Color::White, PieceId::Pawn(5))),
    );
    main.set(
        Square::new(3, 3),
        Some(Piece::new(PieceKind::Pawn, Color::Black, PieceId::Pawn(4))),
    );
    main.en_passant = Some(Square::new(2, 3));

    let mut game = Game::new();
    game.main = main;
    game
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen;

    #[test]
    fn all_scenarios_build_with_intact_kings() {
        for name in SCENARIO_NAMES {
            let game = build(name).unwrap();
            assert!(game.kings_intact(), "scenario {} lost a king", name);
            assert!(!game.game_over);
        }
    }

    #[test]
    fn scenario_names_normalize() {
        assert!(build("en-passant-ready").is_some());
        assert!(build("castling-ready").is_some());
        assert!(build("in-check").is_some());
        assert!(build("nonsense").is_none());
    }

    #[test]
    fn checkmate_scenario_mates_in_one() {
        let mut game = build("checkmate").unwrap();
        game.submit(
            Color::White,
            BoardId::Main,
            &MovePayload::simple(Square::new(7, 5), Square::new(0, 5)),
        )
        .unwrap();
        assert!(game.game_over);
        assert_eq!(game.winner, Some(Winner::White));
        assert_eq!(game.main.outcome, BoardOutcome::WhiteWins);
    }

    #[test]
    fn stalemate_scenario_freezes_the_board() {
        let mut game = build("stalemate").unwrap();
        game.submit(
            Color::White,
            BoardId::Main,
            &MovePayload::simple(Square::new(1, 3), Square::new(1, 2)),
        )
        .unwrap();
        assert_eq!(game.main.outcome, BoardOutcome::DrawStalemate);
        assert!(!game.game_over);
    }

    #[test]
    fn in_check_scenario_requires_a_main_response() {
        let mut game = build("in_check").unwrap();
        assert!(movegen::is_in_check(&game.main, Color::Black));
        assert_eq!(
            game.submit(
                Color::Black,
                BoardId::Secondary,
                &MovePayload::simple(Square::new(0, 4), Square::new(1, 4)),
            ),
            Err(MoveError::MustRespondToCheckOn {
                board: BoardId::Main,
                attempted: BoardId::Secondary,
            })
        );

        game.submit(
            Color::Black,
            BoardId::Main,
            &MovePayload::simple(Square::new(0, 4), Square::new(1, 3)),
        )
        .unwrap();
        assert_eq!(game.responding_to_check_on, None);
    }

    #[test]
    fn en_passant_scenario_mirrors_the_captured_pawn() {
        let mut game = build("en_passant").unwrap();
        game.submit(
            Color::White,
            BoardId::Main,
            &MovePayload::simple(Square::new(3, 4), Square::new(2, 3)),
        )
        .unwrap();
        assert!(game.main.find_piece(Color::Black, PieceId::Pawn(4)).is_none());
        assert!(
            game.secondary
                .find_piece(Color::Black, PieceId::Pawn(4))
                .is_none()
        );
    }
}
