//! Move generation and validation for the Twofold Chess rules engine.
//!
//! This module implements legal move generation for a single board:
//!
//! - Piece movement patterns (King, Queen, Rook, Bishop, Knight, Pawn)
//! - Castling (kingside and queenside, with all conditions)
//! - En passant captures
//! - Pawn promotion (explicit choice required, the promoted piece keeps
//!   the pawn's id)
//! - Check detection and prevention (no move may leave the own king in
//!   check)
//! - Checkmate / stalemate classification
//!
//! The two-board coupling (capture mirror, phase machine) lives in
//! [`crate::game`]; everything here operates on one [`Board`] at a time.

use crate::types::*;

// ---------------------------------------------------------------------------
// Attack detection
// ---------------------------------------------------------------------------

/// Returns `true` if the given square is attacked by any piece of `by`.
///
/// This is used for:
/// - Check detection (is the king attacked?)
/// - Castling validation (king must not pass through or land on attacked
///   squares)
///
/// The scan is direct and never consults legality filtering, so it cannot
/// recurse through "does moving here cause check?".
pub fn attacks_square(board: &Board, sq: Square, by: Color) -> bool {
    // Knight attacks
    let knight_offsets: [(i8, i8); 8] = [
        (-2, -1), (-2, 1), (-1, -2), (-1, 2),
        (1, -2), (1, 2), (2, -1), (2, 1),
    ];
    for &(dr, dc) in &knight_offsets {
        if let Some(from) = sq.offset(dr, dc)
            && let Some(piece) = board.get(from)
            && piece.color == by
            && piece.kind == PieceKind::Knight
        {
            return true;
        }
    }

    // King attacks (one square in any direction)
    for dr in -1..=1i8 {
        for dc in -1..=1i8 {
            if dr == 0 && dc == 0 {
                continue;
            }
            if let Some(from) = sq.offset(dr, dc)
                && let Some(piece) = board.get(from)
                && piece.color == by
                && piece.kind == PieceKind::King
            {
                return true;
            }
        }
    }

    // Pawn attacks: diagonals only, no forward pushes. The attacking pawn
    // stands one row behind the target from its own marching direction.
    let dir = by.pawn_direction();
    for dc in [-1i8, 1] {
        if let Some(from) = sq.offset(-dir, dc)
            && let Some(piece) = board.get(from)
            && piece.color == by
            && piece.kind == PieceKind::Pawn
        {
            return true;
        }
    }

    // Sliding pieces along rays
    let bishop_dirs: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
    let rook_dirs: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

    for &(dr, dc) in &bishop_dirs {
        let mut cur = sq;
        while let Some(next) = cur.offset(dr, dc) {
            if let Some(piece) = board.get(next) {
                if piece.color == by
                    && (piece.kind == PieceKind::Bishop || piece.kind == PieceKind::Queen)
                {
                    return true;
                }
                break;
            }
            cur = next;
        }
    }

    for &(dr, dc) in &rook_dirs {
        let mut cur = sq;
        while let Some(next) = cur.offset(dr, dc) {
            if let Some(piece) = board.get(next) {
                if piece.color == by
                    && (piece.kind == PieceKind::Rook || piece.kind == PieceKind::Queen)
                {
                    return true;
                }
                break;
            }
            cur = next;
        }
    }

    false
}

/// Returns `true` if the king of the given color is currently in check.
pub fn is_in_check(board: &Board, side: Color) -> bool {
    if let Some(king_sq) = board.find_king(side) {
        attacks_square(board, king_sq, side.opponent())
    } else {
        // No king found. The coordinator refuses further moves on a board
        // in this state before it ever reaches the generator.
        false
    }
}

// ---------------------------------------------------------------------------
// Pseudo-legal move generation (before check filtering)
// ---------------------------------------------------------------------------

/// Direction vectors for sliding pieces.
const ROOK_DIRS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const QUEEN_DIRS: [(i8, i8); 8] = [
    (-1, 0), (1, 0), (0, -1), (0, 1),
    (-1, -1), (-1, 1), (1, -1), (1, 1),
];

/// Generates the pseudo-legal moves for the piece on `from`.
///
/// "Pseudo-legal" means the moves follow piece movement rules but may
/// leave the own king in check; [`legal_moves`] filters those out.
/// Castling is not produced here — it is appended by the legality layer
/// with its full condition set.
pub fn pseudo_legal_moves(board: &Board, from: Square) -> Vec<Move> {
    let mut moves = Vec::new();
    if let Some(piece) = board.get(from) {
        pseudo_moves_for(board, from, piece, &mut moves);
    }
    moves
}

fn pseudo_moves_for(board: &Board, from: Square, piece: Piece, moves: &mut Vec<Move>) {
    match piece.kind {
        PieceKind::King => king_steps(board, from, piece.color, moves),
        PieceKind::Queen => sliding_moves(board, from, piece.color, &QUEEN_DIRS, moves),
        PieceKind::Rook => sliding_moves(board, from, piece.color, &ROOK_DIRS, moves),
        PieceKind::Bishop => sliding_moves(board, from, piece.color, &BISHOP_DIRS, moves),
        PieceKind::Knight => knight_moves(board, from, piece.color, moves),
        PieceKind::Pawn => pawn_moves(board, from, piece.color, moves),
    }
}

/// Kings are never capture targets.
fn capturable(target: Piece, color: Color) -> bool {
    target.color != color && target.kind != PieceKind::King
}

/// Generates sliding piece moves (rook, bishop, queen).
fn sliding_moves(
    board: &Board,
    from: Square,
    color: Color,
    directions: &[(i8, i8)],
    moves: &mut Vec<Move>,
) {
    for &(dr, dc) in directions {
        let mut cur = from;
        while let Some(to) = cur.offset(dr, dc) {
            match board.get(to) {
                None => {
                    moves.push(Move::simple(from, to));
                    cur = to;
                }
                Some(target) => {
                    if capturable(target, color) {
                        moves.push(Move::simple(from, to));
                    }
                    break;
                }
            }
        }
    }
}

/// Generates knight moves. Knights are blocked only by friendly pieces.
fn knight_moves(board: &Board, from: Square, color: Color, moves: &mut Vec<Move>) {
    let offsets: [(i8, i8); 8] = [
        (-2, -1), (-2, 1), (-1, -2), (-1, 2),
        (1, -2), (1, 2), (2, -1), (2, 1),
    ];
    for &(dr, dc) in &offsets {
        if let Some(to) = from.offset(dr, dc) {
            match board.get(to) {
                None => moves.push(Move::simple(from, to)),
                Some(target) => {
                    if capturable(target, color) {
                        moves.push(Move::simple(from, to));
                    }
                }
            }
        }
    }
}

/// Generates plain king steps (one square in any direction).
fn king_steps(board: &Board, from: Square, color: Color, moves: &mut Vec<Move>) {
    for dr in -1..=1i8 {
        for dc in -1..=1i8 {
            if dr == 0 && dc == 0 {
                continue;
            }
            if let Some(to) = from.offset(dr, dc) {
                match board.get(to) {
                    None => moves.push(Move::simple(from, to)),
                    Some(target) => {
                        if capturable(target, color) {
                            moves.push(Move::simple(from, to));
                        }
                    }
                }
            }
        }
    }
}

/// Generates pawn moves (forward, double push, captures, en passant,
/// promotion).
fn pawn_moves(board: &Board, from: Square, color: Color, moves: &mut Vec<Move>) {
    let dir = color.pawn_direction();
    let start_row = color.pawn_start_row();
    let promo_row = color.promotion_row();

    // Helper adding a move, fanned out into the four promotion choices
    // when the destination is the last row.
    let mut add_move = |from: Square, to: Square, is_ep: bool| {
        if to.row == promo_row {
            for kind in [
                PieceKind::Queen,
                PieceKind::Rook,
                PieceKind::Bishop,
                PieceKind::Knight,
            ] {
                moves.push(Move {
                    from,
                    to,
                    promotion: Some(kind),
                    is_castling: false,
                    is_en_passant: false,
                });
            }
        } else {
            moves.push(Move {
                from,
                to,
                promotion: None,
                is_castling: false,
                is_en_passant: is_ep,
            });
        }
    };

    // Single step forward
    if let Some(one_ahead) = from.offset(dir, 0)
        && board.get(one_ahead).is_none()
    {
        add_move(from, one_ahead, false);

        // Double step from the starting row
        if from.row == start_row
            && let Some(two_ahead) = from.offset(dir * 2, 0)
            && board.get(two_ahead).is_none()
        {
            add_move(from, two_ahead, false);
        }
    }

    // Diagonal captures
    for dc in [-1i8, 1] {
        if let Some(to) = from.offset(dir, dc) {
            if let Some(target) = board.get(to)
                && capturable(target, color)
            {
                add_move(from, to, false);
            }

            if let Some(ep_sq) = board.en_passant
                && to == ep_sq
            {
                add_move(from, to, true);
            }
        }
    }
}

/// Appends the available castling moves for a king standing on its home
/// square. All four conditions are checked:
///
/// - The side still has the right for that wing on this board.
/// - The rook of the correct color stands on the relevant corner.
/// - All squares between king and rook are empty.
/// - The king is not in check, does not cross an attacked square, and
///   does not land on one.
fn castling_moves(board: &Board, from: Square, color: Color, moves: &mut Vec<Move>) {
    let rights = board.castling.for_color(color);
    let row = color.back_row();
    let king_start = Square::new(row, 4);

    if from != king_start {
        return;
    }
    if attacks_square(board, from, color.opponent()) {
        return;
    }

    let rook_on = |col: u8| {
        matches!(
            board.get(Square::new(row, col)),
            Some(Piece { kind: PieceKind::Rook, color: c, .. }) if c == color
        )
    };
    let empty = |col: u8| board.get(Square::new(row, col)).is_none();
    let safe = |col: u8| !attacks_square(board, Square::new(row, col), color.opponent());

    if rights.kingside && rook_on(7) && empty(5) && empty(6) && safe(5) && safe(6) {
        moves.push(Move {
            from,
            to: Square::new(row, 6),
            promotion: None,
            is_castling: true,
            is_en_passant: false,
        });
    }

    // b-file may be attacked; only the king's own path (d, c) must be safe.
    if rights.queenside && rook_on(0) && empty(1) && empty(2) && empty(3) && safe(3) && safe(2) {
        moves.push(Move {
            from,
            to: Square::new(row, 2),
            promotion: None,
            is_castling: true,
            is_en_passant: false,
        });
    }
}

// ---------------------------------------------------------------------------
// Legal move generation (with check filtering)
// ---------------------------------------------------------------------------

/// Generates the legal moves for the piece of `side` on `from`.
///
/// A legal move is a pseudo-legal move (plus castling) that does not leave
/// the own king attacked on the resulting board, verified by simulating
/// the move on a copy.
pub fn legal_moves(board: &Board, from: Square, side: Color) -> Vec<Move> {
    let piece = match board.get(from) {
        Some(p) if p.color == side => p,
        _ => return Vec::new(),
    };

    let mut candidates = Vec::new();
    pseudo_moves_for(board, from, piece, &mut candidates);
    if piece.kind == PieceKind::King {
        castling_moves(board, from, side, &mut candidates);
    }

    candidates.retain(|mv| {
        let (next, _) = apply_move(board, mv, side);
        !is_in_check(&next, side)
    });
    candidates
}

/// Returns `true` if `side` has at least one legal move on the board.
/// Enumerates squares and stops at the first hit.
pub fn has_any_legal_move(board: &Board, side: Color) -> bool {
    for row in 0..8u8 {
        for col in 0..8u8 {
            let sq = Square::new(row, col);
            if let Some(piece) = board.get(sq)
                && piece.color == side
                && !legal_moves(board, sq, side).is_empty()
            {
                return true;
            }
        }
    }
    false
}

/// Status of one side on one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardStatus {
    Active,
    Checkmate,
    Stalemate,
}

/// Classifies the position for `side`: no legal move means checkmate when
/// in check, stalemate otherwise.
pub fn classify(board: &Board, side: Color) -> BoardStatus {
    if has_any_legal_move(board, side) {
        BoardStatus::Active
    } else if is_in_check(board, side) {
        BoardStatus::Checkmate
    } else {
        BoardStatus::Stalemate
    }
}

// ---------------------------------------------------------------------------
// Move application
// ---------------------------------------------------------------------------

/// Applies a validated move and returns the successor board together with
/// the captured piece, if any. The input board is untouched.
///
/// Handles:
/// - Normal moves and captures
/// - Castling (the rook hops to the square the king crossed)
/// - En passant (the captured pawn is removed from its standing square)
/// - Promotion (the pawn is replaced; the promoted piece keeps the pawn's
///   id so the capture mirror still resolves it on the coupled board)
/// - Castling-rights bookkeeping and the single-lived en passant target
pub fn apply_move(board: &Board, mv: &Move, color: Color) -> (Board, Option<Piece>) {
    let mut next = board.clone();
    let piece = next.get(mv.from).expect("no piece on origin square");

    let captured = if mv.is_en_passant {
        // The captured pawn stands one row behind the destination from
        // the capturer's perspective.
        let standing = Square::new((mv.to.row as i8 - color.pawn_direction()) as u8, mv.to.col);
        let captured = next.get(standing);
        next.set(standing, None);
        captured
    } else {
        next.get(mv.to)
    };

    next.set(mv.from, None);

    if mv.is_castling {
        let row = mv.from.row;
        if mv.to.col == 6 {
            // Kingside: rook h -> f
            let rook = next.get(Square::new(row, 7));
            next.set(Square::new(row, 7), None);
            next.set(Square::new(row, 5), rook);
        } else if mv.to.col == 2 {
            // Queenside: rook a -> d
            let rook = next.get(Square::new(row, 0));
            next.set(Square::new(row, 0), None);
            next.set(Square::new(row, 3), rook);
        }
    }

    let placed = if let Some(promo) = mv.promotion {
        Piece::new(promo, color, piece.id)
    } else {
        piece
    };
    next.set(mv.to, Some(placed));

    // Rights clear for a king move, or when a rook leaves or is captured
    // on its home corner.
    if piece.kind == PieceKind::King {
        next.castling.for_color_mut(color).clear();
    }
    for sq in [mv.from, mv.to] {
        match (sq.row, sq.col) {
            (7, 0) => next.castling.white.queenside = false,
            (7, 7) => next.castling.white.kingside = false,
            (0, 0) => next.castling.black.queenside = false,
            (0, 7) => next.castling.black.kingside = false,
            _ => {}
        }
    }

    // The target is single-lived on this board: every move clears it and
    // only a double pawn push re-arms it.
    next.en_passant = None;
    if piece.kind == PieceKind::Pawn && (mv.to.row as i8 - mv.from.row as i8).abs() == 2 {
        next.en_passant = Some(Square::new(
            (mv.from.row as i8 + color.pawn_direction()) as u8,
            mv.from.col,
        ));
    }

    (next, captured)
}

// ---------------------------------------------------------------------------
// Wire move resolution
// ---------------------------------------------------------------------------

/// Resolves an untrusted client payload into a validated [`Move`], or a
/// typed rejection explaining why no legal move matches.
///
/// The advisory fields of the payload (`piece`, `captured`, `castle`,
/// `en_passant`) are never consulted: castling and en passant are derived
/// from the authoritative board.
pub fn resolve_move(board: &Board, side: Color, payload: &MovePayload) -> Result<Move, MoveError> {
    let piece = match board.get(payload.from) {
        Some(p) if p.color == side => p,
        _ => return Err(MoveError::NoSuchPiece),
    };

    let needs_promotion = piece.kind == PieceKind::Pawn && payload.to.row == side.promotion_row();
    let promotion = if needs_promotion {
        match payload.promotion.as_deref() {
            Some(code) => {
                Some(PieceKind::from_promotion_code(code).ok_or(MoveError::PromotionRequired)?)
            }
            None => return Err(MoveError::PromotionRequired),
        }
    } else {
        None
    };

    let legal = legal_moves(board, payload.from, side);
    if let Some(mv) = legal
        .iter()
        .find(|m| m.to == payload.to && m.promotion == promotion)
    {
        return Ok(*mv);
    }

    // No legal match: classify the rejection.

    // A king sliding two columns from its home square is a castle attempt;
    // an unavailable castle (rights gone, path blocked, squares attacked)
    // reads as an unreachable square.
    let king_start = Square::new(side.back_row(), 4);
    if piece.kind == PieceKind::King
        && payload.from == king_start
        && payload.to.row == side.back_row()
        && (payload.to.col == 2 || payload.to.col == 6)
    {
        return Err(MoveError::PathBlocked);
    }

    if let Some(target) = board.get(payload.to)
        && target.color == side
    {
        return Err(MoveError::DestinationBlocked);
    }

    // Pseudo-legal but filtered means the simulation left the king
    // attacked.
    let mut pseudo = Vec::new();
    pseudo_moves_for(board, payload.from, piece, &mut pseudo);
    if pseudo.iter().any(|m| m.to == payload.to) {
        return Err(MoveError::MovesIntoCheck);
    }

    Err(MoveError::PathBlocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn king(color: Color) -> Piece {
        Piece::new(PieceKind::King, color, PieceId::King)
    }

    fn bare_kings() -> Board {
        let mut board = Board::default();
        board.castling.white.clear();
        board.castling.black.clear();
        board.set(Square::new(7, 4), Some(king(Color::White)));
        board.set(Square::new(0, 4), Some(king(Color::Black)));
        board
    }

    fn all_legal_moves(board: &Board, side: Color) -> Vec<Move> {
        let mut moves = Vec::new();
        for row in 0..8u8 {
            for col in 0..8u8 {
                moves.extend(legal_moves(board, Square::new(row, col), side));
            }
        }
        moves
    }

    #[test]
    fn starting_position_has_20_moves() {
        let board = Board::starting_position();
        assert_eq!(all_legal_moves(&board, Color::White).len(), 20);
        assert_eq!(all_legal_moves(&board, Color::Black).len(), 20);
    }

    #[test]
    fn pseudo_legal_moves_ignore_check() {
        let mut board = bare_kings();
        // Pinned knight: no legal moves, but the pseudo-legal set still
        // has all eight jumps minus the off-board ones.
        board.set(
            Square::new(6, 4),
            Some(Piece::new(
                PieceKind::Knight,
                Color::White,
                PieceId::KingsideKnight,
            )),
        );
        board.set(
            Square::new(0, 4),
            Some(Piece::new(
                PieceKind::Rook,
                Color::Black,
                PieceId::KingsideRook,
            )),
        );
        board.set(Square::new(0, 0), Some(king(Color::Black)));

        assert!(!pseudo_legal_moves(&board, Square::new(6, 4)).is_empty());
        assert!(legal_moves(&board, Square::new(6, 4), Color::White).is_empty());
        assert!(pseudo_legal_moves(&board, Square::new(4, 4)).is_empty());
    }

    #[test]
    fn starting_position_not_in_check() {
        let board = Board::starting_position();
        assert!(!is_in_check(&board, Color::White));
        assert!(!is_in_check(&board, Color::Black));
    }

    #[test]
    fn pinned_knight_moves_into_check() {
        let mut board = bare_kings();
        // White knight on e2 pinned by the black rook on e8.
        board.set(
            Square::new(6, 4),
            Some(Piece::new(
                PieceKind::Knight,
                Color::White,
                PieceId::KingsideKnight,
            )),
        );
        board.set(
            Square::new(0, 4),
            Some(Piece::new(
                PieceKind::Rook,
                Color::Black,
                PieceId::KingsideRook,
            )),
        );
        board.set(Square::new(0, 0), Some(king(Color::Black)));

        assert!(legal_moves(&board, Square::new(6, 4), Color::White).is_empty());

        let payload = MovePayload::simple(Square::new(6, 4), Square::new(4, 3));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::MovesIntoCheck)
        );
    }

    #[test]
    fn resolve_move_rejections() {
        let board = Board::starting_position();

        // Empty origin square
        let payload = MovePayload::simple(Square::new(4, 4), Square::new(3, 4));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::NoSuchPiece)
        );

        // Opponent's piece on the origin square
        let payload = MovePayload::simple(Square::new(1, 4), Square::new(2, 4));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::NoSuchPiece)
        );

        // Friendly piece on the target square
        let payload = MovePayload::simple(Square::new(7, 0), Square::new(6, 0));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::DestinationBlocked)
        );

        // Rook cannot jump over its own pawn
        let payload = MovePayload::simple(Square::new(7, 0), Square::new(4, 0));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::PathBlocked)
        );
    }

    #[test]
    fn en_passant_capture_generated_and_applied() {
        let mut board = bare_kings();
        // White pawn e5, black pawn just double-pushed d7-d5.
        board.set(
            Square::new(3, 4),
            Some(Piece::new(PieceKind::Pawn, Color::White, PieceId::Pawn(5))),
        );
        board.set(
            Square::new(3, 3),
            Some(Piece::new(PieceKind::Pawn, Color::Black, PieceId::Pawn(4))),
        );
        board.en_passant = Some(Square::new(2, 3));

        let moves = legal_moves(&board, Square::new(3, 4), Color::White);
        let ep: Vec<_> = moves.iter().filter(|m| m.is_en_passant).collect();
        assert_eq!(ep.len(), 1);
        assert_eq!(ep[0].to, Square::new(2, 3));

        let (next, captured) = apply_move(&board, ep[0], Color::White);
        assert_eq!(
            captured,
            Some(Piece::new(PieceKind::Pawn, Color::Black, PieceId::Pawn(4)))
        );
        assert!(next.get(Square::new(3, 3)).is_none());
        assert!(next.en_passant.is_none());
    }

    #[test]
    fn double_push_arms_en_passant_target() {
        let board = Board::starting_position();
        let mv = Move::simple(Square::new(6, 4), Square::new(4, 4));
        let (next, captured) = apply_move(&board, &mv, Color::White);
        assert!(captured.is_none());
        assert_eq!(next.en_passant, Some(Square::new(5, 4)));

        // Any following move on this board clears the target.
        let mv = Move::simple(Square::new(7, 6), Square::new(5, 5));
        let (next, _) = apply_move(&next, &mv, Color::White);
        assert!(next.en_passant.is_none());
    }

    #[test]
    fn castling_available_in_clear_position() {
        let mut board = bare_kings();
        board.castling.white = SideCastlingRights::default();
        board.set(
            Square::new(7, 0),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::QueensideRook,
            )),
        );
        board.set(
            Square::new(7, 7),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::KingsideRook,
            )),
        );

        let moves = legal_moves(&board, Square::new(7, 4), Color::White);
        let castles: Vec<_> = moves.iter().filter(|m| m.is_castling).collect();
        assert_eq!(castles.len(), 2);
    }

    #[test]
    fn castling_blocked_by_attack_on_crossing_square() {
        let mut board = bare_kings();
        board.castling.white = SideCastlingRights::default();
        board.set(
            Square::new(7, 7),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::KingsideRook,
            )),
        );
        // Black rook on f8 attacks f1, the square the king would cross.
        board.set(
            Square::new(0, 5),
            Some(Piece::new(
                PieceKind::Rook,
                Color::Black,
                PieceId::KingsideRook,
            )),
        );

        let moves = legal_moves(&board, Square::new(7, 4), Color::White);
        assert!(!moves.iter().any(|m| m.is_castling));

        let payload = MovePayload::simple(Square::new(7, 4), Square::new(7, 6));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::PathBlocked)
        );
    }

    #[test]
    fn castling_applies_rook_hop_and_clears_rights() {
        let mut board = bare_kings();
        board.castling.white = SideCastlingRights::default();
        board.set(
            Square::new(7, 7),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::KingsideRook,
            )),
        );

        let mv = Move {
            from: Square::new(7, 4),
            to: Square::new(7, 6),
            promotion: None,
            is_castling: true,
            is_en_passant: false,
        };
        let (next, captured) = apply_move(&board, &mv, Color::White);
        assert!(captured.is_none());
        assert_eq!(next.get(Square::new(7, 6)).map(|p| p.kind), Some(PieceKind::King));
        assert_eq!(next.get(Square::new(7, 5)).map(|p| p.kind), Some(PieceKind::Rook));
        assert!(next.get(Square::new(7, 7)).is_none());
        assert!(!next.castling.white.kingside);
        assert!(!next.castling.white.queenside);
    }

    #[test]
    fn promotion_requires_explicit_choice() {
        let mut board = bare_kings();
        board.set(Square::new(0, 4), None);
        board.set(Square::new(0, 0), Some(king(Color::Black)));
        board.set(
            Square::new(1, 7),
            Some(Piece::new(PieceKind::Pawn, Color::White, PieceId::Pawn(8))),
        );

        let mut payload = MovePayload::simple(Square::new(1, 7), Square::new(0, 7));
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::PromotionRequired)
        );

        payload.promotion = Some("K".to_string());
        assert_eq!(
            resolve_move(&board, Color::White, &payload),
            Err(MoveError::PromotionRequired)
        );

        payload.promotion = Some("Q".to_string());
        let mv = resolve_move(&board, Color::White, &payload).unwrap();
        let (next, _) = apply_move(&board, &mv, Color::White);
        let promoted = next.get(Square::new(0, 7)).unwrap();
        assert_eq!(promoted.kind, PieceKind::Queen);
        // Identity survives promotion; the capture mirror depends on it.
        assert_eq!(promoted.id, PieceId::Pawn(8));
    }

    #[test]
    fn classify_back_rank_mate() {
        let mut board = Board::default();
        board.castling.white.clear();
        board.castling.black.clear();
        board.set(Square::new(0, 7), Some(king(Color::Black)));
        board.set(Square::new(2, 6), Some(king(Color::White)));
        board.set(
            Square::new(0, 5),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::KingsideRook,
            )),
        );
        assert_eq!(classify(&board, Color::Black), BoardStatus::Checkmate);
    }

    #[test]
    fn classify_corner_stalemate() {
        let mut board = Board::default();
        board.castling.white.clear();
        board.castling.black.clear();
        board.set(Square::new(0, 0), Some(king(Color::Black)));
        board.set(Square::new(2, 1), Some(king(Color::White)));
        board.set(
            Square::new(1, 2),
            Some(Piece::new(PieceKind::Queen, Color::White, PieceId::Queen)),
        );
        assert_eq!(classify(&board, Color::Black), BoardStatus::Stalemate);
        assert_eq!(classify(&board, Color::White), BoardStatus::Active);
    }

    // Test-only inverse: rebuild the prior board from the move record, the
    // captured piece, and the prior ancillary state.
    fn undo(
        post: &Board,
        pre: &Board,
        mv: &Move,
        color: Color,
        captured: Option<Piece>,
    ) -> Board {
        let mut board = post.clone();
        board.set(mv.from, pre.get(mv.from));
        board.set(mv.to, None);
        if mv.is_en_passant {
            let standing =
                Square::new((mv.to.row as i8 - color.pawn_direction()) as u8, mv.to.col);
            board.set(standing, captured);
        } else {
            board.set(mv.to, captured);
        }
        if mv.is_castling {
            let row = mv.from.row;
            if mv.to.col == 6 {
                let rook = board.get(Square::new(row, 5));
                board.set(Square::new(row, 5), None);
                board.set(Square::new(row, 7), rook);
            } else {
                let rook = board.get(Square::new(row, 3));
                board.set(Square::new(row, 3), None);
                board.set(Square::new(row, 0), rook);
            }
        }
        board.castling = pre.castling;
        board.en_passant = pre.en_passant;
        board
    }

    #[test]
    fn apply_then_undo_reproduces_prior_board() {
        // Quiet move, capture, double push, and castle, each from a
        // position where the move is legal.
        let board = Board::starting_position();
        for mv in [
            Move::simple(Square::new(7, 6), Square::new(5, 5)),
            Move::simple(Square::new(6, 4), Square::new(4, 4)),
        ] {
            let (post, captured) = apply_move(&board, &mv, Color::White);
            assert_eq!(undo(&post, &board, &mv, Color::White, captured), board);
        }

        let mut board = bare_kings();
        board.castling.white = SideCastlingRights::default();
        board.set(
            Square::new(7, 7),
            Some(Piece::new(
                PieceKind::Rook,
                Color::White,
                PieceId::KingsideRook,
            )),
        );
        board.set(
            Square::new(6, 0),
            Some(Piece::new(PieceKind::Rook, Color::Black, PieceId::QueensideRook)),
        );
        let castle = Move {
            from: Square::new(7, 4),
            to: Square::new(7, 6),
            promotion: None,
            is_castling: true,
            is_en_passant: false,
        };
        let (post, captured) = apply_move(&board, &castle, Color::White);
        assert_eq!(undo(&post, &board, &castle, Color::White, captured), board);

        // Rook takes rook
        let capture = Move::simple(Square::new(7, 7), Square::new(6, 7));
        board.set(
            Square::new(6, 7),
            Some(Piece::new(PieceKind::Rook, Color::Black, PieceId::KingsideRook)),
        );
        let (post, captured) = apply_move(&board, &capture, Color::White);
        assert_eq!(captured.map(|p| p.color), Some(Color::Black));
        assert_eq!(undo(&post, &board, &capture, Color::White, captured), board);
    }
}
