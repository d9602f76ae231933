//! Core types for the Twofold Chess server.
//!
//! This module defines the fundamental data structures used throughout the
//! server: piece identity, board representation, move encoding, per-board
//! outcomes, and the wire-level payloads exchanged with clients. Twofold
//! Chess is played on two coupled 8×8 boards; captures on the main board
//! remove the piece with the same identity from the secondary board, so
//! every piece carries a stable [`PieceId`] in addition to kind and color.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Represents the color (side) of a chess piece or player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// The White side (back rank on row 7).
    White,
    /// The Black side (back rank on row 0).
    Black,
}

impl Color {
    /// Returns the opposite color.
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Returns the row index pawns of this color start on.
    /// White pawns start on row 6, Black pawns on row 1.
    pub fn pawn_start_row(self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    /// Returns the row index pawns of this color promote on.
    pub fn promotion_row(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    /// Returns the back-rank row index for this color.
    pub fn back_row(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    /// Returns the row direction pawns move: -1 for White, +1 for Black.
    /// Row 0 is Black's back rank, so White marches toward smaller rows.
    pub fn pawn_direction(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// Piece kind & identity
// ---------------------------------------------------------------------------

/// Represents a chess piece type (without color or identity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceKind {
    /// Returns the upper-case letter for this kind.
    pub fn letter(self) -> char {
        match self {
            PieceKind::King => 'K',
            PieceKind::Queen => 'Q',
            PieceKind::Rook => 'R',
            PieceKind::Bishop => 'B',
            PieceKind::Knight => 'N',
            PieceKind::Pawn => 'P',
        }
    }

    /// Parses a promotion code ("Q", "R", "B", "N") into a kind.
    /// King and Pawn are not valid promotion targets and return `None`.
    pub fn from_promotion_code(code: &str) -> Option<PieceKind> {
        match code {
            "Q" => Some(PieceKind::Queen),
            "R" => Some(PieceKind::Rook),
            "B" => Some(PieceKind::Bishop),
            "N" => Some(PieceKind::Knight),
            _ => None,
        }
    }
}

/// Stable identity of a piece within one color on one board.
///
/// The capture mirror removes the piece with the same id from the coupled
/// board, so every piece needs a label that survives moves and promotion.
/// Back-rank pieces are labelled by their home file; pawns carry their home
/// file number (1..=8). A promoted piece keeps its pawn id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceId {
    QueensideRook,
    QueensideKnight,
    QueensideBishop,
    Queen,
    King,
    KingsideBishop,
    KingsideKnight,
    KingsideRook,
    Pawn(u8),
}

/// A chess piece with kind, color, and stable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    pub id: PieceId,
}

impl Piece {
    /// Creates a new piece.
    pub fn new(kind: PieceKind, color: Color, id: PieceId) -> Self {
        Self { kind, color, id }
    }

    /// Encodes the piece as the wire cell string: a single letter,
    /// uppercase for White and lowercase for Black. Pawns encode their
    /// id as `P1`..`P8` / `p1`..`p8` so clients can track identity.
    pub fn encode(self) -> String {
        let s = match (self.kind, self.id) {
            (PieceKind::Pawn, PieceId::Pawn(n)) => format!("P{}", n),
            _ => self.kind.letter().to_string(),
        };
        match self.color {
            Color::White => s,
            Color::Black => s.to_lowercase(),
        }
    }
}

// ---------------------------------------------------------------------------
// Square
// ---------------------------------------------------------------------------

/// Represents a square using 0-based row and column indices.
///
/// Row 0 is Black's back rank (rank 8), row 7 is White's back rank
/// (rank 1). Column 0 is the a-file. On the wire a square is the
/// two-element array `[row, col]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    /// Creates a new square from 0-based row and column.
    /// Panics in debug builds if row or col >= 8.
    pub fn new(row: u8, col: u8) -> Self {
        debug_assert!(row < 8 && col < 8, "Square out of bounds");
        Self { row, col }
    }

    /// Returns a new square offset by `(dr, dc)`, or `None` if out of bounds.
    pub fn offset(self, dr: i8, dc: i8) -> Option<Square> {
        let r = self.row as i8 + dr;
        let c = self.col as i8 + dc;
        if (0..8).contains(&r) && (0..8).contains(&c) {
            Some(Square::new(r as u8, c as u8))
        } else {
            None
        }
    }

    /// Converts the square to algebraic notation (e.g. "e4").
    pub fn to_algebraic(self) -> String {
        format!("{}{}", (b'a' + self.col) as char, 8 - self.row)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

impl Serialize for Square {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.row, self.col].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [row, col] = <[u8; 2]>::deserialize(deserializer)?;
        if row < 8 && col < 8 {
            Ok(Square { row, col })
        } else {
            Err(D::Error::custom(format!(
                "square [{}, {}] out of range",
                row, col
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Castling rights
// ---------------------------------------------------------------------------

/// Castling rights for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct SideCastlingRights {
    /// Whether kingside castling (short castling) is still available.
    #[serde(rename = "K")]
    pub kingside: bool,
    /// Whether queenside castling (long castling) is still available.
    #[serde(rename = "Q")]
    pub queenside: bool,
}

impl SideCastlingRights {
    /// Clears both rights. Rights are monotonic: once cleared they are
    /// never re-asserted within a game.
    pub fn clear(&mut self) {
        self.kingside = false;
        self.queenside = false;
    }
}

impl Default for SideCastlingRights {
    fn default() -> Self {
        Self {
            kingside: true,
            queenside: true,
        }
    }
}

/// Castling rights for both sides of one board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct CastlingRights {
    #[serde(rename = "White")]
    pub white: SideCastlingRights,
    #[serde(rename = "Black")]
    pub black: SideCastlingRights,
}

impl CastlingRights {
    /// Returns the castling rights for the given color.
    pub fn for_color(&self, color: Color) -> &SideCastlingRights {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// Returns a mutable reference to the rights for the given color.
    pub fn for_color_mut(&mut self, color: Color) -> &mut SideCastlingRights {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

// ---------------------------------------------------------------------------
// Board identity & outcome
// ---------------------------------------------------------------------------

/// Identifies one of the two coupled boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoardId {
    Main,
    Secondary,
}

impl BoardId {
    /// Returns the other board.
    pub fn other(self) -> BoardId {
        match self {
            BoardId::Main => BoardId::Secondary,
            BoardId::Secondary => BoardId::Main,
        }
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardId::Main => write!(f, "main"),
            BoardId::Secondary => write!(f, "secondary"),
        }
    }
}

/// Terminal status of a single board.
///
/// A resolved board is frozen; play continues on the other board until it
/// also resolves or a checkmate ends the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoardOutcome {
    Active,
    WhiteWins,
    BlackWins,
    DrawStalemate,
}

impl BoardOutcome {
    /// Returns `true` while the board is still playable.
    pub fn is_active(self) -> bool {
        matches!(self, BoardOutcome::Active)
    }

    /// Returns the winning outcome for the given color.
    pub fn win_for(color: Color) -> BoardOutcome {
        match color {
            Color::White => BoardOutcome::WhiteWins,
            Color::Black => BoardOutcome::BlackWins,
        }
    }
}

/// The overall result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl From<Color> for Winner {
    fn from(color: Color) -> Winner {
        match color {
            Color::White => Winner::White,
            Color::Black => Winner::Black,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::White => write!(f, "white"),
            Winner::Black => write!(f, "black"),
            Winner::Draw => write!(f, "draw"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reset votes
// ---------------------------------------------------------------------------

/// Per-color reset votes. A multiplayer game restarts only when both
/// colors have voted; the votes clear on reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResetVotes {
    #[serde(rename = "White")]
    pub white: bool,
    #[serde(rename = "Black")]
    pub black: bool,
}

impl ResetVotes {
    /// Returns a mutable reference to the vote for the given color.
    pub fn for_color_mut(&mut self, color: Color) -> &mut bool {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// Returns `true` when both colors have voted.
    pub fn both(self) -> bool {
        self.white && self.black
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// One 8×8 board plus the ancillary state legality depends on.
///
/// Cells are indexed `squares[row][col]`. The board is a plain value with
/// no shared substructure so legality checks can simulate moves on a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub squares: [[Option<Piece>; 8]; 8],
    pub castling: CastlingRights,
    /// The square a pawn could capture to on the next move on this board.
    /// Lives for exactly one move on this board.
    pub en_passant: Option<Square>,
    pub outcome: BoardOutcome,
}

impl Default for Board {
    /// Returns an empty, active board.
    fn default() -> Self {
        Self {
            squares: [[None; 8]; 8],
            castling: CastlingRights::default(),
            en_passant: None,
            outcome: BoardOutcome::Active,
        }
    }
}

impl Board {
    /// Returns the piece at the given square, if any.
    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.row as usize][sq.col as usize]
    }

    /// Sets (or clears) the piece at the given square.
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[sq.row as usize][sq.col as usize] = piece;
    }

    /// Creates the standard starting position with stable piece ids.
    pub fn starting_position() -> Self {
        let mut board = Board::default();

        let back_rank: [(PieceKind, PieceId); 8] = [
            (PieceKind::Rook, PieceId::QueensideRook),
            (PieceKind::Knight, PieceId::QueensideKnight),
            (PieceKind::Bishop, PieceId::QueensideBishop),
            (PieceKind::Queen, PieceId::Queen),
            (PieceKind::King, PieceId::King),
            (PieceKind::Bishop, PieceId::KingsideBishop),
            (PieceKind::Knight, PieceId::KingsideKnight),
            (PieceKind::Rook, PieceId::KingsideRook),
        ];

        for color in [Color::White, Color::Black] {
            for (col, &(kind, id)) in back_rank.iter().enumerate() {
                board.set(
                    Square::new(color.back_row(), col as u8),
                    Some(Piece::new(kind, color, id)),
                );
            }
            for col in 0..8u8 {
                board.set(
                    Square::new(color.pawn_start_row(), col),
                    Some(Piece::new(PieceKind::Pawn, color, PieceId::Pawn(col + 1))),
                );
            }
        }

        board
    }

    /// Finds the king square for the given color.
    /// Returns `None` if the king is not on the board.
    pub fn find_king(&self, color: Color) -> Option<Square> {
        self.find_where(|p| p.kind == PieceKind::King && p.color == color)
    }

    /// Finds the square of the piece with the given color and id.
    pub fn find_piece(&self, color: Color, id: PieceId) -> Option<Square> {
        self.find_where(|p| p.color == color && p.id == id)
    }

    /// Removes the piece with the given color and id, returning the square
    /// it stood on. Used by the capture mirror; a missing piece is a no-op.
    pub fn remove_piece(&mut self, color: Color, id: PieceId) -> Option<Square> {
        let sq = self.find_piece(color, id)?;
        self.set(sq, None);
        Some(sq)
    }

    /// Counts the pieces of the given color and kind.
    pub fn count_kind(&self, color: Color, kind: PieceKind) -> usize {
        let mut count = 0;
        for row in &self.squares {
            for cell in row {
                if let Some(p) = cell
                    && p.color == color
                    && p.kind == kind
                {
                    count += 1;
                }
            }
        }
        count
    }

    /// Encodes the board as the wire grid: 8 rows of 8 cells, each a
    /// piece string or null.
    pub fn encode_grid(&self) -> Vec<Vec<Option<String>>> {
        self.squares
            .iter()
            .map(|row| row.iter().map(|cell| cell.map(Piece::encode)).collect())
            .collect()
    }

    fn find_where(&self, pred: impl Fn(&Piece) -> bool) -> Option<Square> {
        for row in 0..8u8 {
            for col in 0..8u8 {
                let sq = Square::new(row, col);
                if let Some(piece) = self.get(sq)
                    && pred(&piece)
                {
                    return Some(sq);
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Internal move representation
// ---------------------------------------------------------------------------

/// Internal representation of a validated move (used by the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub is_castling: bool,
    pub is_en_passant: bool,
}

impl Move {
    /// Creates a simple move (no promotion, no castling, no en passant).
    pub fn simple(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
            is_castling: false,
            is_en_passant: false,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_castling {
            return if self.to.col == 6 {
                write!(f, "O-O")
            } else {
                write!(f, "O-O-O")
            };
        }
        write!(f, "{}{}", self.from.to_algebraic(), self.to.to_algebraic())?;
        if let Some(promo) = self.promotion {
            write!(f, "={}", promo.letter())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire move payload
// ---------------------------------------------------------------------------

/// A move as submitted by a client over the event channel.
///
/// Only `from`, `to`, and `promotion` are trusted. The `piece`, `captured`,
/// `castle`, and `en_passant` fields (and any board snapshot the client
/// attaches) are advisory: the server derives all of them from its own
/// authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovePayload {
    /// Origin square as `[row, col]`.
    #[schema(value_type = Vec<u8>)]
    pub from: Square,
    /// Target square as `[row, col]`.
    #[schema(value_type = Vec<u8>)]
    pub to: Square,
    /// Advisory piece label; ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece: Option<String>,
    /// Advisory captured-piece label; ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<String>,
    /// Advisory castle flag ("kingside"/"queenside"); ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub castle: Option<String>,
    /// Advisory en passant flag; ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en_passant: Option<bool>,
    /// Promotion choice: "Q", "R", "B", or "N". Required when a pawn
    /// reaches the last row; there is no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MovePayload {
    /// Creates a plain from/to payload (tests and internal callers).
    pub fn simple(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            piece: None,
            captured: None,
            castle: None,
            en_passant: None,
            promotion: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Move rejection reasons
// ---------------------------------------------------------------------------

/// Why a submitted move was rejected. The game state is unchanged in
/// every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// The game has already ended.
    GameOver,
    /// It is the other side's turn.
    NotYourTurn,
    /// The move targets a board other than the active phase.
    WrongBoard { expected: BoardId, attempted: BoardId },
    /// The side to move is in check and must respond on the given board.
    MustRespondToCheckOn { board: BoardId, attempted: BoardId },
    /// There is no piece of the mover's color on the origin square.
    NoSuchPiece,
    /// The move would leave the mover's own king attacked.
    MovesIntoCheck,
    /// The target square holds a friendly piece.
    DestinationBlocked,
    /// The piece cannot reach the target: geometry, a blocked ray, or an
    /// unavailable castle.
    PathBlocked,
    /// A pawn reached the last row without a valid promotion choice.
    PromotionRequired,
}

impl MoveError {
    /// The board the client was expected to play on, if the rejection
    /// carries one.
    pub fn expected_board(&self) -> Option<BoardId> {
        match self {
            MoveError::WrongBoard { expected, .. } => Some(*expected),
            MoveError::MustRespondToCheckOn { board, .. } => Some(*board),
            _ => None,
        }
    }

    /// The board the client actually targeted, if the rejection carries one.
    pub fn attempted_board(&self) -> Option<BoardId> {
        match self {
            MoveError::WrongBoard { attempted, .. }
            | MoveError::MustRespondToCheckOn { attempted, .. } => Some(*attempted),
            _ => None,
        }
    }
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::GameOver => write!(f, "The game is already over"),
            MoveError::NotYourTurn => write!(f, "It is not your turn"),
            MoveError::WrongBoard {
                expected,
                attempted,
            } => write!(
                f,
                "Wrong board: expected a move on {}, got {}",
                expected, attempted
            ),
            MoveError::MustRespondToCheckOn { board, .. } => {
                write!(f, "You are in check and must respond on the {} board", board)
            }
            MoveError::NoSuchPiece => {
                write!(f, "No piece of yours on the origin square")
            }
            MoveError::MovesIntoCheck => {
                write!(f, "That move would leave your king in check")
            }
            MoveError::DestinationBlocked => {
                write!(f, "The target square holds one of your own pieces")
            }
            MoveError::PathBlocked => {
                write!(f, "The piece cannot reach that square")
            }
            MoveError::PromotionRequired => {
                write!(f, "Promotion requires choosing a queen, rook, bishop or knight")
            }
        }
    }
}

impl std::error::Error for MoveError {}

// ---------------------------------------------------------------------------
// Game snapshot (wire shape)
// ---------------------------------------------------------------------------

/// En passant targets for both boards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct EnPassantTargets {
    #[schema(value_type = Option<Vec<u8>>)]
    pub main: Option<Square>,
    #[schema(value_type = Option<Vec<u8>>)]
    pub secondary: Option<Square>,
}

/// Castling rights for both boards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct BoardCastlingRights {
    pub main: CastlingRights,
    pub secondary: CastlingRights,
}

/// The full game state broadcast to clients.
///
/// Sent as `game_state` on join, `game_update` after a move, and
/// `game_reset` after a reset. Cells are piece strings (uppercase White,
/// lowercase Black; pawns `P1`..`P8`) or null.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GameSnapshot {
    #[serde(rename = "mainBoard")]
    pub main_board: Vec<Vec<Option<String>>>,
    #[serde(rename = "secondaryBoard")]
    pub secondary_board: Vec<Vec<Option<String>>>,
    pub turn: Color,
    pub active_board_phase: BoardId,
    /// Human-readable move records, oldest first.
    pub moves: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    pub game_over: bool,
    pub main_board_outcome: BoardOutcome,
    pub secondary_board_outcome: BoardOutcome,
    pub is_responding_to_check_on_board: Option<BoardId>,
    pub en_passant_target: EnPassantTargets,
    pub castling_rights: BoardCastlingRights,
    pub reset_votes: ResetVotes,
}
