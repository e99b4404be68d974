//! The mutable clause store.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::rc::Rc;

use crate::clause::Clause;

/// Handle to one asserted clause, used to retract exactly that clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClauseId(u64);

#[derive(Debug, Clone)]
struct StoredClause {
    id: ClauseId,
    clause: Rc<Clause>,
}

/// Clauses grouped by predicate indicator, kept in assertion order.
#[derive(Debug, Clone, Default)]
pub struct Database {
    predicates: BTreeMap<(String, usize), Vec<StoredClause>>,
    next_id: u64,
}

impl Database {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause after all existing clauses of its predicate.
    pub fn assertz(&mut self, clause: Clause) -> ClauseId {
        let id = ClauseId(self.next_id);
        self.next_id += 1;
        let (name, arity) = clause.indicator();
        self.predicates
            .entry((name.to_string(), arity))
            .or_default()
            .push(StoredClause {
                id,
                clause: Rc::new(clause),
            });
        id
    }

    /// Removes the clause with the given id, returning it if it was present.
    pub fn retract(&mut self, id: ClauseId) -> Option<Rc<Clause>> {
        let mut emptied = None;
        let mut removed = None;
        for (key, clauses) in self.predicates.iter_mut() {
            if let Some(index) = clauses.iter().position(|c| c.id == id) {
                removed = Some(clauses.remove(index).clause);
                if clauses.is_empty() {
                    emptied = Some(key.clone());
                }
                break;
            }
        }
        if let Some(key) = emptied {
            self.predicates.remove(&key);
        }
        removed
    }

    /// Removes every clause of `name/arity`, returning how many were removed.
    pub fn retract_all(&mut self, name: &str, arity: usize) -> usize {
        self.predicates
            .remove(&(name.to_string(), arity))
            .map_or(0, |clauses| clauses.len())
    }

    /// Returns true if at least one clause of `name/arity` is stored.
    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.predicates.contains_key(&(name.to_string(), arity))
    }

    /// Returns a snapshot of the clauses of `name/arity` in assertion order.
    ///
    /// The snapshot is unaffected by later asserts and retracts.
    pub fn clauses(&self, name: &str, arity: usize) -> Vec<Rc<Clause>> {
        self.predicates
            .get(&(name.to_string(), arity))
            .map(|clauses| clauses.iter().map(|c| Rc::clone(&c.clause)).collect())
            .unwrap_or_default()
    }

    /// Returns the total number of stored clauses.
    pub fn len(&self) -> usize {
        self.predicates.values().map(Vec::len).sum()
    }

    /// Returns true if no clauses are stored.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Renders all clauses as program text, one clause per line.
    ///
    /// Predicates appear in name order and clauses in assertion order, so two
    /// databases with equal listings answer every query identically.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for clauses in self.predicates.values() {
            for stored in clauses {
                let _ = writeln!(out, "{}", stored.clause);
            }
        }
        out
    }
}
