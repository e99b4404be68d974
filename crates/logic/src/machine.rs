//! The solver: depth-first SLD resolution over a [`Database`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::builtin::Builtin;
use crate::clause::{Clause, Query};
use crate::database::{ClauseId, Database};
use crate::parser::{parse_program, parse_query};
use crate::scope::AssertionScope;
use crate::term::{Term, VarId};
use crate::LogicError;

/// Default bound on the number of pending goals.
pub const DEFAULT_MAX_GOAL_DEPTH: usize = 100_000;

/// How often (in resolution steps) the wall clock is checked.
const CLOCK_INTERVAL: u64 = 256;

/// Bounds applied to a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLimits {
    /// Stop after this many solutions.
    pub max_solutions: Option<usize>,
    /// Abort with [`LogicError::Timeout`] after this much wall-clock time.
    pub time_limit: Option<Duration>,
    /// Abort with [`LogicError::DepthExceeded`] when more goals than this are pending.
    pub max_goal_depth: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_solutions: None,
            time_limit: None,
            max_goal_depth: DEFAULT_MAX_GOAL_DEPTH,
        }
    }
}

impl QueryLimits {
    /// Limits the number of solutions returned.
    pub fn with_max_solutions(mut self, max: usize) -> Self {
        self.max_solutions = Some(max);
        self
    }

    /// Limits the wall-clock time spent on the query.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Bindings of the named query variables for one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    bindings: Vec<(String, Term)>,
}

impl Solution {
    /// Returns the value bound to the named variable.
    ///
    /// A variable left unbound by the answer maps to a [`Term::Var`].
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, term)| term)
    }

    /// Iterates over `(name, value)` pairs in query order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(n, t)| (n.as_str(), t))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bindings.is_empty() {
            return write!(f, "true");
        }
        for (i, (name, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, term)?;
        }
        Ok(())
    }
}

/// A clause database plus native predicates.
///
/// The machine is the single owner of the shared logic state: callers assert
/// and retract through `&mut Machine` (or an [`AssertionScope`]) and query
/// through `&Machine`.
#[derive(Default)]
pub struct Machine {
    database: Database,
    builtins: HashMap<(String, usize), Rc<dyn Builtin>>,
}

impl Machine {
    /// Creates a machine with an empty database and no native predicates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native predicate, replacing any previous one with the same indicator.
    pub fn register(&mut self, name: &str, arity: usize, builtin: impl Builtin + 'static) {
        self.builtins
            .insert((name.to_string(), arity), Rc::new(builtin));
    }

    /// Returns true if a native predicate is registered for `name/arity`.
    pub fn has_builtin(&self, name: &str, arity: usize) -> bool {
        self.builtins.contains_key(&(name.to_string(), arity))
    }

    /// Returns the clause database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Appends a clause to the database.
    pub fn assertz(&mut self, clause: Clause) -> ClauseId {
        self.database.assertz(clause)
    }

    /// Removes a previously asserted clause.
    pub fn retract(&mut self, id: ClauseId) -> bool {
        self.database.retract(id).is_some()
    }

    /// Parses program text and asserts every clause, returning the clause count.
    ///
    /// # Errors
    ///
    /// Returns [`LogicError::Parse`] without asserting anything if the text is invalid.
    pub fn consult(&mut self, text: &str) -> Result<usize, LogicError> {
        let clauses = parse_program(text)?;
        let count = clauses.len();
        for clause in clauses {
            self.database.assertz(clause);
        }
        Ok(count)
    }

    /// Reads and consults a program file.
    ///
    /// # Errors
    ///
    /// Returns [`LogicError::Io`] if the file cannot be read, or
    /// [`LogicError::Parse`] if it is not a valid program.
    pub fn consult_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, LogicError> {
        let text = std::fs::read_to_string(path)?;
        self.consult(&text)
    }

    /// Opens a scope whose assertions are retracted when it is dropped.
    pub fn scope(&mut self) -> AssertionScope<'_> {
        AssertionScope::new(self)
    }

    /// Parses and runs a query.
    ///
    /// # Errors
    ///
    /// See [`Machine::query`]; parse failures are reported as [`LogicError::Parse`].
    pub fn query_text(&self, text: &str, limits: &QueryLimits) -> Result<Vec<Solution>, LogicError> {
        let query = parse_query(text)?;
        self.query(&query, limits)
    }

    /// Runs a query and collects its solutions in resolution order.
    ///
    /// # Errors
    ///
    /// - [`LogicError::Timeout`] if the time limit elapses
    /// - [`LogicError::DepthExceeded`] if the pending goal list outgrows the limit
    /// - [`LogicError::UnknownPredicate`] when calling an undefined procedure
    /// - errors raised by native predicates
    pub fn query(&self, query: &Query, limits: &QueryLimits) -> Result<Vec<Solution>, LogicError> {
        Solver::new(self, limits).run(query)
    }
}

/// Variable bindings with a trail for undoing them on backtracking.
struct Bindings {
    slots: Vec<Option<Term>>,
    trail: Vec<VarId>,
}

impl Bindings {
    fn new(vars: usize) -> Self {
        Self {
            slots: vec![None; vars],
            trail: Vec::new(),
        }
    }

    /// Reserves `count` fresh variables and returns the first id.
    fn allocate(&mut self, count: usize) -> VarId {
        let offset = self.slots.len();
        self.slots.resize(offset + count, None);
        offset
    }

    fn mark(&self) -> (usize, usize) {
        (self.trail.len(), self.slots.len())
    }

    fn restore(&mut self, (trail_len, slots_len): (usize, usize)) {
        while self.trail.len() > trail_len {
            if let Some(var) = self.trail.pop() {
                self.slots[var] = None;
            }
        }
        self.slots.truncate(slots_len);
    }

    fn deref(&self, term: &Term) -> Term {
        let mut current = term;
        while let Term::Var(id) = current {
            match &self.slots[*id] {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current.clone()
    }

    fn bind(&mut self, var: VarId, value: Term) {
        self.slots[var] = Some(value);
        self.trail.push(var);
    }

    fn unify(&mut self, a: &Term, b: &Term) -> bool {
        let a = self.deref(a);
        let b = self.deref(b);
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) if x == y => true,
            (Term::Var(x), _) => {
                self.bind(*x, b.clone());
                true
            }
            (_, Term::Var(y)) => {
                self.bind(*y, a.clone());
                true
            }
            (Term::Atom(x), Term::Atom(y)) => x == y,
            (Term::Int(x), Term::Int(y)) => x == y,
            (Term::Compound(x), Term::Compound(y)) => {
                if Rc::ptr_eq(x, y) {
                    return true;
                }
                if x.functor != y.functor || x.args.len() != y.args.len() {
                    return false;
                }
                if x.is_ground() && y.is_ground() {
                    return x.args == y.args;
                }
                x.args
                    .iter()
                    .zip(y.args.iter())
                    .all(|(p, q)| self.unify(p, q))
            }
            _ => false,
        }
    }

    /// Applies the current bindings throughout a term.
    fn resolve(&self, term: &Term) -> Term {
        let term = self.deref(term);
        if term.is_ground() {
            return term;
        }
        term.map_vars(&mut |id| {
            let bound = self.deref(&Term::Var(id));
            match bound {
                Term::Var(_) => bound,
                other => self.resolve(&other),
            }
        })
    }
}

/// Pending goals as a shared linked list.
#[derive(Clone, Default)]
struct Goals(Option<Rc<GoalNode>>);

struct GoalNode {
    goal: Term,
    next: Goals,
    depth: usize,
}

// Unlinks the tail iteratively; a recursive drop of a runaway goal list
// overflows the stack.
impl Drop for GoalNode {
    fn drop(&mut self) {
        let mut next = self.next.0.take();
        while let Some(node) = next {
            match Rc::try_unwrap(node) {
                Ok(mut node) => next = node.next.0.take(),
                Err(_) => break,
            }
        }
    }
}

impl Goals {
    fn depth(&self) -> usize {
        self.0.as_ref().map_or(0, |node| node.depth)
    }

    fn push(&self, goal: Term) -> Goals {
        Goals(Some(Rc::new(GoalNode {
            goal,
            depth: self.depth() + 1,
            next: self.clone(),
        })))
    }

    fn prepend(&self, goals: Vec<Term>) -> Goals {
        goals
            .into_iter()
            .rev()
            .fold(self.clone(), |acc, goal| acc.push(goal))
    }
}

enum Alternatives {
    Clauses {
        clauses: Vec<Rc<Clause>>,
        next: usize,
    },
    Tuples {
        args: Vec<Term>,
        tuples: Vec<Vec<Term>>,
        next: usize,
    },
}

struct ChoicePoint {
    goal: Term,
    rest: Goals,
    mark: (usize, usize),
    alternatives: Alternatives,
}

struct Solver<'m> {
    machine: &'m Machine,
    limits: &'m QueryLimits,
    started: Instant,
    steps: u64,
}

impl<'m> Solver<'m> {
    fn new(machine: &'m Machine, limits: &'m QueryLimits) -> Self {
        Self {
            machine,
            limits,
            started: Instant::now(),
            steps: 0,
        }
    }

    fn tick(&mut self) -> Result<(), LogicError> {
        self.steps += 1;
        if self.steps % CLOCK_INTERVAL == 0 {
            if let Some(limit) = self.limits.time_limit {
                if self.started.elapsed() >= limit {
                    return Err(LogicError::Timeout(limit));
                }
            }
        }
        Ok(())
    }

    fn run(mut self, query: &Query) -> Result<Vec<Solution>, LogicError> {
        let mut solutions = Vec::new();
        if self.limits.max_solutions == Some(0) {
            return Ok(solutions);
        }

        let mut bindings = Bindings::new(query.var_count());
        let mut stack: Vec<ChoicePoint> = Vec::new();
        let mut goals = Goals::default().prepend(query.goals.clone());

        loop {
            self.tick()?;
            let next = match goals.0.clone() {
                None => {
                    solutions.push(Self::extract(query, &bindings));
                    if self.limits.max_solutions == Some(solutions.len()) {
                        break;
                    }
                    None
                }
                Some(node) => {
                    if node.depth > self.limits.max_goal_depth {
                        return Err(LogicError::DepthExceeded(self.limits.max_goal_depth));
                    }
                    let goal = bindings.deref(&node.goal);
                    self.step(goal, node.next.clone(), &mut bindings, &mut stack)?
                }
            };
            goals = match next {
                Some(goals) => goals,
                None => match self.backtrack(&mut bindings, &mut stack)? {
                    Some(goals) => goals,
                    None => break,
                },
            };
        }

        Ok(solutions)
    }

    fn extract(query: &Query, bindings: &Bindings) -> Solution {
        let values = query
            .var_names
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.starts_with('_'))
            .map(|(id, name)| (name.clone(), bindings.resolve(&Term::Var(id))))
            .collect();
        Solution { bindings: values }
    }

    /// Executes one goal, returning the goals left to prove or `None` on failure.
    fn step(
        &mut self,
        goal: Term,
        rest: Goals,
        bindings: &mut Bindings,
        stack: &mut Vec<ChoicePoint>,
    ) -> Result<Option<Goals>, LogicError> {
        let Some((name, arity)) = goal.indicator() else {
            return Err(LogicError::Instantiation(format!(
                "goal {}",
                bindings.resolve(&goal)
            )));
        };

        let args: &[Term] = match &goal {
            Term::Compound(c) => &c.args,
            _ => &[],
        };

        match (name, arity) {
            ("true", 0) => return Ok(Some(rest)),
            ("fail", 0) | ("false", 0) => return Ok(None),
            ("=", 2) => {
                let ok = bindings.unify(&args[0], &args[1]);
                return Ok(ok.then_some(rest));
            }
            ("\\=", 2) => {
                let mark = bindings.mark();
                let unifiable = bindings.unify(&args[0], &args[1]);
                bindings.restore(mark);
                return Ok((!unifiable).then_some(rest));
            }
            ("==", 2) => {
                let same = bindings.resolve(&args[0]) == bindings.resolve(&args[1]);
                return Ok(same.then_some(rest));
            }
            ("\\==", 2) => {
                let same = bindings.resolve(&args[0]) == bindings.resolve(&args[1]);
                return Ok((!same).then_some(rest));
            }
            _ => {}
        }

        let key = (name.to_string(), arity);
        let alternatives = if let Some(builtin) = self.machine.builtins.get(&key) {
            let resolved: Vec<Term> = args.iter().map(|a| bindings.resolve(a)).collect();
            let tuples = builtin.solve(&resolved)?;
            Alternatives::Tuples {
                args: resolved,
                tuples,
                next: 0,
            }
        } else if self.machine.database.contains(name, arity) {
            Alternatives::Clauses {
                clauses: self.machine.database.clauses(name, arity),
                next: 0,
            }
        } else {
            return Err(LogicError::UnknownPredicate {
                name: name.to_string(),
                arity,
            });
        };

        let choice = ChoicePoint {
            mark: bindings.mark(),
            goal,
            rest,
            alternatives,
        };
        self.resume(choice, bindings, stack)
    }

    /// Tries the remaining alternatives of a choice point until one unifies.
    ///
    /// The choice point goes back on the stack if untried alternatives remain.
    fn resume(
        &mut self,
        mut choice: ChoicePoint,
        bindings: &mut Bindings,
        stack: &mut Vec<ChoicePoint>,
    ) -> Result<Option<Goals>, LogicError> {
        loop {
            self.tick()?;
            bindings.restore(choice.mark);
            let (goals, more) = match &mut choice.alternatives {
                Alternatives::Clauses { clauses, next } => {
                    let Some(clause) = clauses.get(*next).cloned() else {
                        return Ok(None);
                    };
                    *next += 1;
                    let offset = bindings.allocate(clause.var_count());
                    let head = clause.head.offset_vars(offset);
                    if !bindings.unify(&head, &choice.goal) {
                        continue;
                    }
                    let body = clause
                        .body
                        .iter()
                        .map(|goal| goal.offset_vars(offset))
                        .collect();
                    (choice.rest.prepend(body), *next < clauses.len())
                }
                Alternatives::Tuples { args, tuples, next } => {
                    let Some(tuple) = tuples.get(*next) else {
                        return Ok(None);
                    };
                    *next += 1;
                    let matched = tuple.len() == args.len()
                        && args
                            .iter()
                            .zip(tuple.iter())
                            .all(|(arg, value)| bindings.unify(arg, value));
                    if !matched {
                        continue;
                    }
                    (choice.rest.clone(), *next < tuples.len())
                }
            };
            if more {
                stack.push(choice);
            }
            return Ok(Some(goals));
        }
    }

    fn backtrack(
        &mut self,
        bindings: &mut Bindings,
        stack: &mut Vec<ChoicePoint>,
    ) -> Result<Option<Goals>, LogicError> {
        while let Some(choice) = stack.pop() {
            if let Some(goals) = self.resume(choice, bindings, stack)? {
                return Ok(Some(goals));
            }
        }
        Ok(None)
    }
}
