//! Matching a candidate tactic rule against a position.

use std::time::Duration;

use logic::{Clause, LogicError, Machine, Query, QueryLimits, Term};
use thiserror::Error;
use tracing::{debug, warn};

use crate::facts::{square_atom, square_from_term};
use crate::position::{Move, Position};

/// Default number of suggested moves requested per position.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// Default wall-clock budget for one query.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(5);

/// Errors that abort matching a rule.
#[derive(Error, Debug)]
pub enum MatchError {
    /// The rule head is not `name(Position, From, To)`.
    #[error("Rule head must have arity 3: {0}")]
    InvalidRule(String),
    /// The solver failed for a reason other than a resource limit.
    #[error(transparent)]
    Logic(#[from] LogicError),
}

/// Bounds for a single match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Maximum number of suggested moves.
    pub suggestion_limit: usize,
    /// Wall-clock limit for the query.
    pub time_limit: Duration,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            time_limit: DEFAULT_TIME_LIMIT,
        }
    }
}

/// Outcome of matching a rule against one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The query hit its time limit or goal-depth guard.
    NoResult,
    /// The query completed without solutions.
    NoMatch,
    /// Suggested moves in solver order, at most `suggestion_limit`.
    Matched(Vec<Move>),
}

/// Queries `rule` for moves in `position`.
///
/// The rule and one `legal_move(From, To, Pos)` fact per legal move are
/// asserted for the duration of the call only; the machine's database is
/// back to its previous state when this returns, whatever the outcome.
///
/// # Errors
///
/// - [`MatchError::InvalidRule`] if the head does not have arity 3
/// - [`MatchError::Logic`] for solver errors other than timeouts and the depth guard
pub fn match_tactic(
    machine: &mut Machine,
    rule: &Clause,
    position: &Position,
    options: &MatchOptions,
) -> Result<MatchResult, MatchError> {
    let (head, arity) = rule.indicator();
    if arity != 3 {
        return Err(MatchError::InvalidRule(rule.to_string()));
    }
    let head = head.to_string();

    let facts = position.encode();
    let pos_term = facts.to_term();
    // Legal moves come from the board rebuilt from facts, as rules see it.
    let legal_moves = facts.decode().legal_moves();

    let mut scope = machine.scope();
    scope.assertz(rule.clone());
    for mv in &legal_moves {
        scope.assertz(Clause::fact(Term::compound(
            "legal_move",
            vec![square_atom(mv.from), square_atom(mv.to), pos_term.clone()],
        )));
    }

    let query = Query::new(
        vec![Term::compound(
            &head,
            vec![pos_term, Term::var(0), Term::var(1)],
        )],
        vec!["From".to_string(), "To".to_string()],
    );
    let limits = QueryLimits::default()
        .with_max_solutions(options.suggestion_limit)
        .with_time_limit(options.time_limit);

    let solutions = match scope.query(&query, &limits) {
        Ok(solutions) => solutions,
        Err(e) if e.is_resource_limit() => {
            warn!("Query for {} stopped: {}", head, e);
            return Ok(MatchResult::NoResult);
        }
        Err(e) => return Err(e.into()),
    };

    if solutions.is_empty() {
        return Ok(MatchResult::NoMatch);
    }

    let moves = solutions
        .iter()
        .filter_map(|solution| {
            let from = solution.get("From").and_then(square_from_term);
            let to = solution.get("To").and_then(square_from_term);
            match (from, to) {
                (Some(from), Some(to)) => Some(Move::new(from, to)),
                _ => {
                    debug!("Dropping non-square solution: {}", solution);
                    None
                }
            }
        })
        .collect();
    Ok(MatchResult::Matched(moves))
}
