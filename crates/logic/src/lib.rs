//! A small Prolog engine for matching tactic rules against chess positions.
//!
//! The engine covers what the tactic harness needs from a logic-programming
//! system and nothing more:
//!
//! - [`Term`], [`Clause`] and [`Query`] values, parsed from Prolog syntax by
//!   [`parse_clause`], [`parse_program`] and [`parse_query`]
//! - a mutable [`Database`] with `assertz`/`retract`
//! - a depth-first SLD solver in [`Machine::query`], bounded by a wall-clock
//!   limit, a solution count and a goal-depth guard ([`QueryLimits`])
//! - native predicates through the [`Builtin`] trait
//! - [`AssertionScope`], which retracts everything it asserted when dropped
//!
//! # Example
//!
//! ```
//! use logic::{parse_clause, parse_query, Machine, QueryLimits};
//!
//! let mut machine = Machine::new();
//! machine.consult("other_side(white, black). other_side(black, white).").unwrap();
//!
//! let mut scope = machine.scope();
//! scope.assertz(parse_clause("enemy(X, Y) :- other_side(X, Y)").unwrap());
//! let query = parse_query("enemy(white, Who)").unwrap();
//! let solutions = scope.query(&query, &QueryLimits::default()).unwrap();
//! assert_eq!(solutions[0].get("Who").unwrap().to_string(), "black");
//! drop(scope);
//!
//! assert!(!machine.database().contains("enemy", 2));
//! ```

mod builtin;
mod clause;
mod database;
mod machine;
mod parser;
mod scope;
mod term;

pub use builtin::Builtin;
pub use clause::{Clause, Query};
pub use database::{ClauseId, Database};
pub use machine::{Machine, QueryLimits, Solution, DEFAULT_MAX_GOAL_DEPTH};
pub use parser::{parse_clause, parse_program, parse_query, ParseError};
pub use scope::AssertionScope;
pub use term::{Compound, Term, TermDisplay, VarId, CONS, NIL};

use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading programs or running queries.
#[derive(Error, Debug)]
pub enum LogicError {
    /// Program or query text could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A program file could not be read.
    #[error("failed to read program: {0}")]
    Io(#[from] std::io::Error),
    /// The query ran longer than its time limit.
    #[error("query exceeded its time limit of {0:?}")]
    Timeout(Duration),
    /// The pending goal list grew past the configured depth.
    #[error("query exceeded the goal depth limit of {0}")]
    DepthExceeded(usize),
    /// A goal called a predicate with no clauses and no native implementation.
    #[error("unknown procedure {name}/{arity}")]
    UnknownPredicate {
        /// Predicate name.
        name: String,
        /// Predicate arity.
        arity: usize,
    },
    /// A goal or builtin argument was an unbound variable where a value is required.
    #[error("arguments are not sufficiently instantiated: {0}")]
    Instantiation(String),
    /// A builtin received an argument of the wrong kind.
    #[error("type error in {predicate}: expected {expected}, found {found}")]
    Type {
        /// The predicate that rejected the argument.
        predicate: String,
        /// Description of the accepted values.
        expected: String,
        /// The offending term.
        found: String,
    },
}

impl LogicError {
    /// Returns true for the errors that mean a query was cut off rather than wrong.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, LogicError::Timeout(_) | LogicError::DepthExceeded(_))
    }
}
