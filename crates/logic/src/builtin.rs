//! Native predicates.

use crate::term::Term;
use crate::LogicError;

/// A predicate implemented in Rust.
///
/// The solver resolves the call's arguments against the current bindings and
/// passes them in; unbound arguments arrive as [`Term::Var`]. The
/// implementation returns every argument tuple that satisfies the predicate.
/// The solver then unifies each tuple with the arguments in order, one
/// alternative per tuple, so a tuple may leave an argument as it came in.
pub trait Builtin {
    /// Enumerates the solutions for the given arguments.
    ///
    /// # Errors
    ///
    /// Implementations return [`LogicError::Instantiation`] or
    /// [`LogicError::Type`] when the arguments cannot be interpreted.
    fn solve(&self, args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError>;
}

impl<F> Builtin for F
where
    F: Fn(&[Term]) -> Result<Vec<Vec<Term>>, LogicError>,
{
    fn solve(&self, args: &[Term]) -> Result<Vec<Vec<Term>>, LogicError> {
        self(args)
    }
}
