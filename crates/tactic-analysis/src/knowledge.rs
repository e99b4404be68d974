//! Chess background knowledge for tactic rules.
//!
//! [`install`] registers the native predicates rule bodies are built from.
//! Every predicate that inspects the board takes the position's fact list as
//! its last argument and enumerates all bindings consistent with the
//! arguments it was given.

use std::collections::HashMap;

use logic::{Clause, LogicError, Machine, Term};
use shakmaty::{attacks, Bitboard, Color, Role, Square};

use crate::facts::{
    color_from_name, color_name, role_from_name, role_name, square_atom, square_from_term,
    FactList,
};
use crate::position::{Move, Position};

/// Predicates whose natural order in a rule body comes first.
const PRECEDENCE: [(&str, u8); 7] = [
    ("make_move", 0),
    ("legal_move", 0),
    ("attacks", 1),
    ("behind", 1),
    ("piece_at", 2),
    ("different_pos", 3),
    ("other_side", 3),
];

/// Registers the chess predicates on a machine.
pub fn install(machine: &mut Machine) {
    machine.register("piece_at", 4, piece_at);
    machine.register("attacks", 3, attacks_pred);
    machine.register("behind", 4, behind);
    machine.register("make_move", 4, make_move);
    machine.register("other_side", 2, other_side);
    machine.register("different_pos", 2, different_pos);
}

/// Ordering of body predicates in normalized rules.
///
/// Generators emit bodies in arbitrary order; sorting them so move
/// generators come before the relations that test their results keeps the
/// search space small.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    precedence: HashMap<String, u8>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            precedence: PRECEDENCE
                .iter()
                .map(|(name, rank)| (name.to_string(), *rank))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Returns the precedence of a predicate; unknown predicates sort last.
    pub fn precedence(&self, name: &str) -> u8 {
        self.precedence.get(name).copied().unwrap_or(u8::MAX)
    }

    /// Returns true if the predicate is part of the vocabulary.
    pub fn contains(&self, name: &str) -> bool {
        self.precedence.contains_key(name)
    }

    /// Adds or overrides a predicate's precedence.
    pub fn insert(&mut self, name: &str, precedence: u8) {
        self.precedence.insert(name.to_string(), precedence);
    }

    /// Stable-sorts a clause body by precedence.
    pub fn order_body(&self, clause: &mut Clause) {
        clause.body.sort_by_key(|goal| {
            goal.indicator()
                .map_or(u8::MAX, |(name, _)| self.precedence(name))
        });
    }
}

// Argument readers return `None` when a bound argument has the wrong type.
// Such a goal has no solutions, so the other clauses of a rule still run.

/// `Some(None)` for an unbound argument, `Some(Some(square))` for a square.
fn square_arg(term: &Term) -> Option<Option<Square>> {
    match term {
        Term::Var(_) => Some(None),
        _ => square_from_term(term).map(Some),
    }
}

fn color_arg(term: &Term) -> Option<Option<Color>> {
    match term {
        Term::Var(_) => Some(None),
        _ => term.as_atom().and_then(color_from_name).map(Some),
    }
}

fn role_arg(term: &Term) -> Option<Option<Role>> {
    match term {
        Term::Var(_) => Some(None),
        _ => term.as_atom().and_then(role_from_name).map(Some),
    }
}

/// The position must be bound; `Ok(None)` if it is not a fact list.
fn position_arg(predicate: &str, term: &Term) -> Result<Option<Position>, LogicError> {
    if let Term::Var(_) = term {
        return Err(LogicError::Instantiation(format!(
            "{} needs a bound position",
            predicate
        )));
    }
    Ok(FactList::from_term(term).ok().map(|facts| facts.decode()))
}

/// Restricts candidates to the bound square, if any.
fn candidates(bound: Option<Square>, pool: Bitboard) -> Bitboard {
    match bound {
        Some(square) => pool & Bitboard::from_square(square),
        None => pool,
    }
}

fn piece_at(args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
    let Some(position) = position_arg("piece_at/4", &args[3])? else {
        return Ok(Vec::new());
    };
    let (Some(square), Some(color), Some(role)) =
        (square_arg(&args[0]), color_arg(&args[1]), role_arg(&args[2]))
    else {
        return Ok(Vec::new());
    };
    let occupied = position.board().occupied();
    Ok(candidates(square, occupied)
        .into_iter()
        .filter_map(|sq| position.piece_at(sq).map(|piece| (sq, piece)))
        .filter(|(_, piece)| color.map_or(true, |c| c == piece.color))
        .filter(|(_, piece)| role.map_or(true, |r| r == piece.role))
        .map(|(sq, piece)| {
            vec![
                square_atom(sq),
                Term::atom(color_name(piece.color)),
                Term::atom(role_name(piece.role)),
                args[3].clone(),
            ]
        })
        .collect())
}

fn attacks_pred(args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
    let Some(position) = position_arg("attacks/3", &args[2])? else {
        return Ok(Vec::new());
    };
    let (Some(from), Some(to)) = (square_arg(&args[0]), square_arg(&args[1])) else {
        return Ok(Vec::new());
    };
    let board = position.board();
    let mut solutions = Vec::new();
    for attacker in candidates(from, board.occupied()) {
        let targets = candidates(to, board.attacks_from(attacker));
        for target in targets {
            solutions.push(vec![
                square_atom(attacker),
                square_atom(target),
                args[2].clone(),
            ]);
        }
    }
    Ok(solutions)
}

fn behind(args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
    let Some(position) = position_arg("behind/4", &args[3])? else {
        return Ok(Vec::new());
    };
    let (Some(front), Some(middle), Some(back)) = (
        square_arg(&args[0]),
        square_arg(&args[1]),
        square_arg(&args[2]),
    ) else {
        return Ok(Vec::new());
    };
    let occupied = position.board().occupied();
    let mut solutions = Vec::new();
    for f in candidates(front, occupied) {
        for m in candidates(middle, occupied) {
            if m == f || attacks::ray(f, m).is_empty() || (attacks::between(f, m) & occupied).any()
            {
                continue;
            }
            let beyond = attacks::ray(f, m) & !attacks::between(f, m);
            for b in candidates(back, occupied & beyond) {
                if b == f || b == m || !attacks::between(f, b).contains(m) {
                    continue;
                }
                if (attacks::between(m, b) & occupied).any() {
                    continue;
                }
                solutions.push(vec![
                    square_atom(f),
                    square_atom(m),
                    square_atom(b),
                    args[3].clone(),
                ]);
            }
        }
    }
    Ok(solutions)
}

fn make_move(args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
    let Some(position) = position_arg("make_move/4", &args[2])? else {
        return Ok(Vec::new());
    };
    let (Some(from), Some(to)) = (square_arg(&args[0]), square_arg(&args[1])) else {
        return Ok(Vec::new());
    };
    Ok(position
        .legal_moves()
        .into_iter()
        .filter(|mv| from.map_or(true, |sq| sq == mv.from))
        .filter(|mv| to.map_or(true, |sq| sq == mv.to))
        .filter_map(|mv: Move| {
            position.play(mv).map(|next| {
                vec![
                    square_atom(mv.from),
                    square_atom(mv.to),
                    args[2].clone(),
                    next.encode().to_term(),
                ]
            })
        })
        .collect())
}

fn other_side(args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
    let (Some(color), Some(other)) = (color_arg(&args[0]), color_arg(&args[1])) else {
        return Ok(Vec::new());
    };
    Ok([Color::White, Color::Black]
        .into_iter()
        .filter(|c| color.map_or(true, |bound| bound == *c))
        .filter(|c| other.map_or(true, |bound| bound == !*c))
        .map(|c| vec![Term::atom(color_name(c)), Term::atom(color_name(!c))])
        .collect())
}

fn different_pos(args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
    let (Some(a), Some(b)) = (square_arg(&args[0]), square_arg(&args[1])) else {
        return Ok(Vec::new());
    };
    let all = Bitboard::FULL;
    let mut solutions = Vec::new();
    for x in candidates(a, all) {
        for y in candidates(b, all) {
            if x != y {
                solutions.push(vec![square_atom(x), square_atom(y)]);
            }
        }
    }
    Ok(solutions)
}
