//! Conversion between positions and declarative fact lists.
//!
//! A position is encoded as one `contents(Color, Piece, File, Rank)` fact per
//! occupied square in square order (a1, b1, ... h8), then `turn(Color)`, then
//! one `kingside_castle(Color)` or `queenside_castle(Color)` fact per held
//! right, white before black and kingside before queenside. Files and ranks
//! are 1-indexed integers.

use std::fmt;

use logic::Term;
use shakmaty::{Board, CastlingSide, Color, File, Piece, Rank, Role, Square};
use thiserror::Error;

use crate::position::{CastlingRights, Position, CASTLING_ORDER};

/// Errors from reading a fact list out of a logic term.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    /// The term is not a proper list.
    #[error("Position term is not a list: {0}")]
    NotAList(String),
    /// A list element does not have one of the encoded shapes.
    #[error("Unknown fact: {0}")]
    UnknownFact(String),
}

/// A single fact about a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fact {
    /// A piece on a square.
    Contents {
        /// Piece owner.
        color: Color,
        /// Piece kind.
        role: Role,
        /// Occupied square.
        square: Square,
    },
    /// The side to move.
    Turn(Color),
    /// A held castling right.
    Castle(Color, CastlingSide),
}

impl Fact {
    /// Converts the fact to a logic term.
    pub fn to_term(&self) -> Term {
        match *self {
            Fact::Contents {
                color,
                role,
                square,
            } => Term::compound(
                "contents",
                vec![
                    Term::atom(color_name(color)),
                    Term::atom(role_name(role)),
                    Term::int(i64::from(u32::from(square.file())) + 1),
                    Term::int(i64::from(u32::from(square.rank())) + 1),
                ],
            ),
            Fact::Turn(color) => Term::compound("turn", vec![Term::atom(color_name(color))]),
            Fact::Castle(color, side) => {
                let functor = match side {
                    CastlingSide::KingSide => "kingside_castle",
                    CastlingSide::QueenSide => "queenside_castle",
                };
                Term::compound(functor, vec![Term::atom(color_name(color))])
            }
        }
    }

    /// Reads a fact from a logic term.
    ///
    /// # Errors
    ///
    /// Returns [`FactError::UnknownFact`] for any other shape.
    pub fn from_term(term: &Term) -> Result<Self, FactError> {
        let unknown = || FactError::UnknownFact(term.to_string());
        let compound = term.as_compound().ok_or_else(unknown)?;
        let atom_at = |i: usize| compound.args.get(i).and_then(Term::as_atom);
        match (&*compound.functor, compound.args.len()) {
            ("contents", 4) => {
                let color = atom_at(0).and_then(color_from_name).ok_or_else(unknown)?;
                let role = atom_at(1).and_then(role_from_name).ok_or_else(unknown)?;
                let coord = |i: usize| {
                    compound.args[i]
                        .as_int()
                        .filter(|v| (1..=8).contains(v))
                        .map(|v| (v - 1) as u32)
                };
                let file = coord(2).ok_or_else(unknown)?;
                let rank = coord(3).ok_or_else(unknown)?;
                let square = Square::from_coords(File::new(file), Rank::new(rank));
                Ok(Fact::Contents {
                    color,
                    role,
                    square,
                })
            }
            ("turn", 1) => atom_at(0)
                .and_then(color_from_name)
                .map(Fact::Turn)
                .ok_or_else(unknown),
            ("kingside_castle", 1) => atom_at(0)
                .and_then(color_from_name)
                .map(|c| Fact::Castle(c, CastlingSide::KingSide))
                .ok_or_else(unknown),
            ("queenside_castle", 1) => atom_at(0)
                .and_then(color_from_name)
                .map(|c| Fact::Castle(c, CastlingSide::QueenSide))
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

/// The ordered facts describing one position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FactList {
    facts: Vec<Fact>,
}

impl FactList {
    /// Wraps facts in the given order.
    pub fn new(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    /// Returns the facts in order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Returns the number of facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if there are no facts.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Returns the number of `contents` facts.
    pub fn contents_count(&self) -> usize {
        self.facts
            .iter()
            .filter(|f| matches!(f, Fact::Contents { .. }))
            .count()
    }

    /// Rebuilds a position from the facts.
    ///
    /// The board starts empty with white to move and no castling rights;
    /// facts are applied in any order, later ones overwriting earlier ones.
    /// An incomplete list yields a position that may not be legal chess.
    pub fn decode(&self) -> Position {
        let mut board = Board::empty();
        let mut turn = Color::White;
        let mut castling = CastlingRights::default();
        for fact in &self.facts {
            match *fact {
                Fact::Contents {
                    color,
                    role,
                    square,
                } => {
                    board.set_piece_at(square, Piece { color, role });
                }
                Fact::Turn(color) => turn = color,
                Fact::Castle(color, side) => castling.set(color, side, true),
            }
        }
        Position::from_parts(board, turn, castling)
    }

    /// Converts the facts to a logic list term.
    pub fn to_term(&self) -> Term {
        Term::list(self.facts.iter().map(Fact::to_term).collect())
    }

    /// Reads facts from a logic list term.
    ///
    /// # Errors
    ///
    /// Returns [`FactError`] if the term is not a list or holds an unknown fact.
    pub fn from_term(term: &Term) -> Result<Self, FactError> {
        let items = term
            .list_items()
            .ok_or_else(|| FactError::NotAList(term.to_string()))?;
        items
            .iter()
            .map(Fact::from_term)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl<'a> IntoIterator for &'a FactList {
    type Item = &'a Fact;
    type IntoIter = std::slice::Iter<'a, Fact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}

impl Position {
    /// Encodes the position as facts.
    pub fn encode(&self) -> FactList {
        let mut facts: Vec<Fact> = Square::ALL
            .iter()
            .filter_map(|&square| {
                self.piece_at(square).map(|piece| Fact::Contents {
                    color: piece.color,
                    role: piece.role,
                    square,
                })
            })
            .collect();
        facts.push(Fact::Turn(self.turn()));
        let castling = self.castling();
        facts.extend(
            CASTLING_ORDER
                .iter()
                .filter(|(color, side)| castling.has(*color, *side))
                .map(|&(color, side)| Fact::Castle(color, side)),
        );
        FactList::new(facts)
    }
}

/// Returns `white` or `black`.
pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// Parses `white` or `black`.
pub fn color_from_name(name: &str) -> Option<Color> {
    match name {
        "white" => Some(Color::White),
        "black" => Some(Color::Black),
        _ => None,
    }
}

/// Returns the lowercase English piece name.
pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "pawn",
        Role::Knight => "knight",
        Role::Bishop => "bishop",
        Role::Rook => "rook",
        Role::Queen => "queen",
        Role::King => "king",
    }
}

/// Parses a lowercase English piece name.
pub fn role_from_name(name: &str) -> Option<Role> {
    match name {
        "pawn" => Some(Role::Pawn),
        "knight" => Some(Role::Knight),
        "bishop" => Some(Role::Bishop),
        "rook" => Some(Role::Rook),
        "queen" => Some(Role::Queen),
        "king" => Some(Role::King),
        _ => None,
    }
}

/// Returns the atom naming a square, such as `e4`.
pub fn square_atom(square: Square) -> Term {
    Term::atom(&square.to_string())
}

/// Reads a square from an atom such as `e4`.
pub fn square_from_term(term: &Term) -> Option<Square> {
    term.as_atom().and_then(|name| name.parse().ok())
}
