//! Clauses and queries.

use std::fmt;

use crate::term::{Term, VarId};

/// A program clause `head :- body1, ..., bodyN.`
///
/// Variables are numbered locally from zero; `var_names[i]` is the source
/// name of variable `i` (`_` for anonymous variables).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// The clause head.
    pub head: Term,
    /// The body goals, empty for facts.
    pub body: Vec<Term>,
    /// Source names of the clause's variables.
    pub var_names: Vec<String>,
}

impl Clause {
    /// Creates a fact from a head term.
    ///
    /// Any variables in `head` are treated as unnamed.
    pub fn fact(head: Term) -> Self {
        let var_names = (0..head.max_var().map_or(0, |v| v + 1))
            .map(|i| format!("_G{}", i))
            .collect();
        Self {
            head,
            body: Vec::new(),
            var_names,
        }
    }

    /// Returns the number of distinct variables in the clause.
    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    /// Returns the name and arity of the clause head.
    pub fn indicator(&self) -> (&str, usize) {
        self.head.indicator().unwrap_or(("", 0))
    }

    /// Returns true if the clause has no body.
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head.display_with(&self.var_names))?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            for (i, goal) in self.body.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", goal.display_with(&self.var_names))?;
            }
        }
        write!(f, ".")
    }
}

/// A conjunctive query with named variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Goals solved left to right.
    pub goals: Vec<Term>,
    /// Source names of the query's variables, indexed by variable id.
    pub var_names: Vec<String>,
}

impl Query {
    /// Creates a query from goals built with variable ids `0..var_names.len()`.
    pub fn new(goals: Vec<Term>, var_names: Vec<String>) -> Self {
        Self { goals, var_names }
    }

    /// Returns the number of query variables.
    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    /// Returns the id of the first variable with the given name.
    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.var_names.iter().position(|n| n == name)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, goal) in self.goals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", goal.display_with(&self.var_names))?;
        }
        Ok(())
    }
}
