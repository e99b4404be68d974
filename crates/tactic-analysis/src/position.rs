//! Board positions and moves.
//!
//! [`Position`] wraps a raw `shakmaty` setup rather than a validated
//! [`Chess`] position: a board rebuilt from facts may be incomplete or
//! contradictory, and it must still be representable. Legality only matters
//! when legal moves are generated, at which point the setup is validated.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::{
    Bitboard, Board, CastlingMode, CastlingSide, Chess, Color, EnPassantMode, FromSetup, Piece,
    Position as _, PositionError, Role, Setup, Square,
};
use thiserror::Error;
use tracing::warn;

/// Errors from parsing positions and moves.
#[derive(Error, Debug)]
pub enum PositionParseError {
    /// The FEN string is malformed.
    #[error("Invalid FEN '{fen}': {reason}")]
    InvalidFen {
        /// The rejected FEN.
        fen: String,
        /// Parser message.
        reason: String,
    },
    /// The move is not of the form `e2e4`.
    #[error("Invalid move: {0}")]
    InvalidMove(String),
}

/// A move as a pair of squares, without promotion information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
}

impl Move {
    /// Creates a move between two squares.
    pub fn new(from: Square, to: Square) -> Self {
        Self { from, to }
    }

    /// Converts a legal `shakmaty` move, mapping castling to the king's
    /// destination (`e1g1`) as in standard UCI notation.
    pub fn from_legal(mv: &shakmaty::Move) -> Option<Self> {
        mv.to_uci(CastlingMode::Standard).to_string().parse().ok()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}

impl FromStr for Move {
    type Err = PositionParseError;

    /// Parses UCI notation; a trailing promotion letter is accepted and ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PositionParseError::InvalidMove(s.to_string());
        if !(4..=5).contains(&s.len()) || !s.is_ascii() {
            return Err(invalid());
        }
        let from = s[0..2].parse::<Square>().map_err(|_| invalid())?;
        let to = s[2..4].parse::<Square>().map_err(|_| invalid())?;
        Ok(Self { from, to })
    }
}

/// Castling rights as four independent flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights {
    /// White may castle kingside.
    pub white_kingside: bool,
    /// White may castle queenside.
    pub white_queenside: bool,
    /// Black may castle kingside.
    pub black_kingside: bool,
    /// Black may castle queenside.
    pub black_queenside: bool,
}

impl CastlingRights {
    /// Returns the flag for one color and side.
    pub fn has(&self, color: Color, side: CastlingSide) -> bool {
        match (color, side) {
            (Color::White, CastlingSide::KingSide) => self.white_kingside,
            (Color::White, CastlingSide::QueenSide) => self.white_queenside,
            (Color::Black, CastlingSide::KingSide) => self.black_kingside,
            (Color::Black, CastlingSide::QueenSide) => self.black_queenside,
        }
    }

    /// Sets the flag for one color and side.
    pub fn set(&mut self, color: Color, side: CastlingSide, value: bool) {
        let flag = match (color, side) {
            (Color::White, CastlingSide::KingSide) => &mut self.white_kingside,
            (Color::White, CastlingSide::QueenSide) => &mut self.white_queenside,
            (Color::Black, CastlingSide::KingSide) => &mut self.black_kingside,
            (Color::Black, CastlingSide::QueenSide) => &mut self.black_queenside,
        };
        *flag = value;
    }

    /// The rook square whose presence in a setup's castling mask encodes this right.
    fn rook_square(color: Color, side: CastlingSide) -> Square {
        match (color, side) {
            (Color::White, CastlingSide::KingSide) => Square::H1,
            (Color::White, CastlingSide::QueenSide) => Square::A1,
            (Color::Black, CastlingSide::KingSide) => Square::H8,
            (Color::Black, CastlingSide::QueenSide) => Square::A8,
        }
    }

    fn from_mask(mask: Bitboard) -> Self {
        let mut rights = Self::default();
        for (color, side) in CASTLING_ORDER {
            rights.set(color, side, mask.contains(Self::rook_square(color, side)));
        }
        rights
    }

    fn to_mask(self) -> Bitboard {
        CASTLING_ORDER
            .iter()
            .filter(|(color, side)| self.has(*color, *side))
            .fold(Bitboard::EMPTY, |mask, (color, side)| {
                mask | Bitboard::from_square(Self::rook_square(*color, *side))
            })
    }
}

/// Fixed order in which castling rights are listed.
pub const CASTLING_ORDER: [(Color, CastlingSide); 4] = [
    (Color::White, CastlingSide::KingSide),
    (Color::White, CastlingSide::QueenSide),
    (Color::Black, CastlingSide::KingSide),
    (Color::Black, CastlingSide::QueenSide),
];

/// An immutable board state: occupancy, side to move and castling rights.
///
/// Positions taken from real games also carry the en passant square and the
/// move counters so the oracle can be given the exact FEN.
#[derive(Debug, Clone)]
pub struct Position {
    setup: Setup,
}

impl Position {
    /// Creates a position with no pieces, white to move and no castling rights.
    pub fn empty() -> Self {
        Self {
            setup: Setup::empty(),
        }
    }

    /// Builds a position from explicit parts.
    pub fn from_parts(board: Board, turn: Color, castling: CastlingRights) -> Self {
        let mut setup = Setup::empty();
        setup.board = board;
        setup.turn = turn;
        setup.castling_rights = castling.to_mask();
        Self { setup }
    }

    /// Captures the state of a legal position.
    pub fn from_chess(chess: &Chess) -> Self {
        Self {
            setup: chess.clone().into_setup(EnPassantMode::Legal),
        }
    }

    /// Parses a FEN string.
    ///
    /// # Errors
    ///
    /// Returns [`PositionParseError::InvalidFen`] if the FEN is malformed.
    pub fn from_fen(fen: &str) -> Result<Self, PositionParseError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e: shakmaty::fen::ParseFenError| PositionParseError::InvalidFen {
                fen: fen.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            setup: parsed.into_setup(),
        })
    }

    /// The standard starting position.
    pub fn starting() -> Self {
        Self::from_chess(&Chess::default())
    }

    /// Renders the position as FEN.
    pub fn fen(&self) -> String {
        Fen::from_setup(self.setup.clone()).to_string()
    }

    /// Returns the piece placement.
    pub fn board(&self) -> &Board {
        &self.setup.board
    }

    /// Returns the piece on a square.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.setup.board.piece_at(square)
    }

    /// Returns the side to move.
    pub fn turn(&self) -> Color {
        self.setup.turn
    }

    /// Returns the castling rights.
    pub fn castling(&self) -> CastlingRights {
        CastlingRights::from_mask(self.setup.castling_rights)
    }

    /// Returns the number of occupied squares.
    pub fn piece_count(&self) -> usize {
        self.setup.board.occupied().count()
    }

    /// Returns true if both positions have the same occupancy, side to move
    /// and castling rights. En passant and move counters are ignored.
    pub fn same_state(&self, other: &Position) -> bool {
        self.setup.board == other.setup.board
            && self.setup.turn == other.setup.turn
            && self.castling() == other.castling()
    }

    /// Validates the setup as a standard chess position.
    ///
    /// # Errors
    ///
    /// Returns the `shakmaty` error for impossible setups (missing kings,
    /// side not to move in check, and so on).
    pub fn to_chess(&self) -> Result<Chess, PositionError<Chess>> {
        let mut setup = self.setup.clone();
        if setup.fullmoves.get() == 0 {
            setup.fullmoves = NonZeroU32::MIN;
        }
        Chess::from_setup(setup, CastlingMode::Standard)
    }

    /// Enumerates the legal moves, in `shakmaty` generation order.
    ///
    /// An invalid setup has no legal moves; the reason is logged.
    pub fn legal_moves(&self) -> Vec<Move> {
        match self.to_chess() {
            Ok(chess) => chess.legal_moves().iter().filter_map(Move::from_legal).collect(),
            Err(e) => {
                warn!("No legal moves for invalid position {}: {}", self.fen(), e);
                Vec::new()
            }
        }
    }

    /// Returns the UCI string for a move, adding a queen promotion for
    /// pawns reaching the last rank.
    pub fn to_uci(&self, mv: Move) -> String {
        let promotes = matches!(
            self.piece_at(mv.from),
            Some(Piece { role: Role::Pawn, .. })
        ) && (mv.to.rank() == shakmaty::Rank::First || mv.to.rank() == shakmaty::Rank::Eighth);
        if promotes {
            format!("{}q", mv)
        } else {
            mv.to_string()
        }
    }

    /// Plays a move given as a square pair, preferring a queen promotion.
    ///
    /// Returns `None` if the move is not legal here.
    pub fn play(&self, mv: Move) -> Option<Position> {
        let mut chess = self.to_chess().ok()?;
        let legal = chess.legal_moves();
        let chosen = legal
            .iter()
            .filter(|m| Move::from_legal(m) == Some(mv))
            .find(|m| matches!(m.promotion(), None | Some(Role::Queen)))?
            .clone();
        chess.play_unchecked(&chosen);
        Some(Position::from_chess(&chess))
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::starting()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITALIAN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";

    #[test]
    fn test_move_parse_and_display() {
        let mv: Move = "e2e4".parse().unwrap();
        assert_eq!(mv.from, Square::E2);
        assert_eq!(mv.to, Square::E4);
        assert_eq!(mv.to_string(), "e2e4");
        let promo: Move = "a7a8q".parse().unwrap();
        assert_eq!(promo.to, Square::A8);
        assert!("e2".parse::<Move>().is_err());
        assert!("z9e4".parse::<Move>().is_err());
    }

    #[test]
    fn test_starting_position() {
        let pos = Position::starting();
        assert_eq!(pos.piece_count(), 32);
        assert_eq!(pos.turn(), Color::White);
        let rights = pos.castling();
        assert!(rights.white_kingside && rights.white_queenside);
        assert!(rights.black_kingside && rights.black_queenside);
        assert_eq!(pos.legal_moves().len(), 20);
    }

    #[test]
    fn test_fen_roundtrip() {
        let pos = Position::from_fen(ITALIAN).unwrap();
        assert_eq!(pos.fen(), ITALIAN);
        assert_eq!(pos.turn(), Color::Black);
    }

    #[test]
    fn test_invalid_fen() {
        let err = Position::from_fen("not a fen").unwrap_err();
        assert!(matches!(err, PositionParseError::InvalidFen { .. }));
    }

    #[test]
    fn test_castling_moves_use_king_destination() {
        let pos =
            Position::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let moves = pos.legal_moves();
        assert!(moves.contains(&"e1g1".parse().unwrap()));
        assert!(moves.contains(&"e1c1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_setup_has_no_legal_moves() {
        let mut board = Board::empty();
        board.set_piece_at(Square::E1, Piece { color: Color::White, role: Role::King });
        let pos = Position::from_parts(board, Color::White, CastlingRights::default());
        assert!(pos.to_chess().is_err());
        assert!(pos.legal_moves().is_empty());
    }

    #[test]
    fn test_to_uci_adds_promotion() {
        let pos = Position::from_fen("8/4P3/8/8/8/8/k7/4K3 w - - 0 1").unwrap();
        assert_eq!(pos.to_uci("e7e8".parse().unwrap()), "e7e8q");
        assert_eq!(pos.to_uci("e1d1".parse().unwrap()), "e1d1");
    }

    #[test]
    fn test_play() {
        let pos = Position::starting();
        let after = pos.play("e2e4".parse().unwrap()).unwrap();
        assert_eq!(after.turn(), Color::Black);
        assert!(after.piece_at(Square::E4).is_some());
        assert!(pos.play("e2e5".parse().unwrap()).is_none());
    }

    #[test]
    fn test_same_state_ignores_counters() {
        let a = Position::from_fen("8/8/8/8/8/8/k7/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("8/8/8/8/8/8/k7/4K3 w - - 12 40").unwrap();
        assert!(a.same_state(&b));
        let c = Position::from_fen("8/8/8/8/8/8/k7/4K3 b - - 0 1").unwrap();
        assert!(!a.same_state(&c));
    }
}
