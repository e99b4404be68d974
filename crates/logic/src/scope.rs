//! Scoped assertions with guaranteed retraction.

use crate::clause::{Clause, Query};
use crate::database::ClauseId;
use crate::machine::{Machine, QueryLimits, Solution};
use crate::LogicError;

/// Temporarily extends a [`Machine`]'s database.
///
/// Every clause asserted through the scope is retracted, newest first, when
/// the scope is dropped. Because `Drop` runs on every exit path (normal
/// return, early `?` return, or unwinding), the database always returns to
/// the state it had when the scope was opened.
pub struct AssertionScope<'m> {
    machine: &'m mut Machine,
    asserted: Vec<ClauseId>,
}

impl<'m> AssertionScope<'m> {
    pub(crate) fn new(machine: &'m mut Machine) -> Self {
        Self {
            machine,
            asserted: Vec::new(),
        }
    }

    /// Asserts a clause for the lifetime of the scope.
    pub fn assertz(&mut self, clause: Clause) -> ClauseId {
        let id = self.machine.assertz(clause);
        self.asserted.push(id);
        id
    }

    /// Runs a query against the extended database.
    ///
    /// # Errors
    ///
    /// See [`Machine::query`].
    pub fn query(&self, query: &Query, limits: &QueryLimits) -> Result<Vec<Solution>, LogicError> {
        self.machine.query(query, limits)
    }

    /// Returns the number of clauses asserted through this scope.
    pub fn len(&self) -> usize {
        self.asserted.len()
    }

    /// Returns true if nothing has been asserted yet.
    pub fn is_empty(&self) -> bool {
        self.asserted.is_empty()
    }
}

impl Drop for AssertionScope<'_> {
    fn drop(&mut self) {
        while let Some(id) = self.asserted.pop() {
            self.machine.retract(id);
        }
    }
}
