//! Prolog terms.
//!
//! Terms are immutable and cheap to clone: compound terms sit behind an
//! [`Rc`] and remember whether they contain variables, so ground subterms
//! (such as a whole encoded chess position) are shared rather than copied
//! when a clause is renamed or a solution is resolved.

use std::fmt;
use std::rc::Rc;

/// Index of a variable, either local to a clause or global in a solver store.
pub type VarId = usize;

/// Functor of a list cell.
pub const CONS: &str = ".";

/// The empty list atom.
pub const NIL: &str = "[]";

/// Infix operators accepted by the parser and printed infix by [`fmt::Display`].
pub const INFIX_OPERATORS: [&str; 4] = ["=", "\\=", "==", "\\=="];

/// A Prolog term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A symbolic constant such as `white` or `e4`.
    Atom(Rc<str>),
    /// An integer constant.
    Int(i64),
    /// A logic variable.
    Var(VarId),
    /// A compound term `functor(arg1, ..., argN)` with at least one argument.
    Compound(Rc<Compound>),
}

/// The payload of a compound term.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Compound {
    /// The functor name.
    pub functor: Rc<str>,
    /// The arguments, never empty.
    pub args: Vec<Term>,
    ground: bool,
}

impl Compound {
    /// Returns true if no variable occurs anywhere inside this term.
    pub fn is_ground(&self) -> bool {
        self.ground
    }

    /// Returns the number of arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl Term {
    /// Creates an atom.
    pub fn atom(name: &str) -> Self {
        Term::Atom(Rc::from(name))
    }

    /// Creates an integer.
    pub fn int(value: i64) -> Self {
        Term::Int(value)
    }

    /// Creates a variable reference.
    pub fn var(id: VarId) -> Self {
        Term::Var(id)
    }

    /// Creates a compound term. A functor with no arguments is an atom.
    pub fn compound(functor: &str, args: Vec<Term>) -> Self {
        Self::compound_rc(Rc::from(functor), args)
    }

    fn compound_rc(functor: Rc<str>, args: Vec<Term>) -> Self {
        if args.is_empty() {
            return Term::Atom(functor);
        }
        let ground = args.iter().all(Term::is_ground);
        Term::Compound(Rc::new(Compound {
            functor,
            args,
            ground,
        }))
    }

    /// Creates a proper list from its items.
    pub fn list(items: Vec<Term>) -> Self {
        Self::list_with_tail(items, Term::atom(NIL))
    }

    /// Creates a list from its items followed by an arbitrary tail.
    pub fn list_with_tail(items: Vec<Term>, tail: Term) -> Self {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Term::compound(CONS, vec![item, acc]))
    }

    /// Returns true if no variable occurs in this term.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Atom(_) | Term::Int(_) => true,
            Term::Var(_) => false,
            Term::Compound(c) => c.ground,
        }
    }

    /// Returns the atom's name, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the compound payload, if this is a compound term.
    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Term::Compound(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the name and arity of a callable term.
    ///
    /// Atoms are callable with arity zero; numbers and variables are not.
    pub fn indicator(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(name) => Some((name, 0)),
            Term::Compound(c) => Some((&c.functor, c.args.len())),
            _ => None,
        }
    }

    /// Returns the items of a proper, fully built list.
    ///
    /// Returns `None` for partial lists (variable tail) and non-lists.
    pub fn list_items(&self) -> Option<Vec<Term>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Term::Atom(name) if &**name == NIL => return Some(items),
                Term::Compound(c) if &*c.functor == CONS && c.args.len() == 2 => {
                    items.push(c.args[0].clone());
                    cursor = &c.args[1];
                }
                _ => return None,
            }
        }
    }

    /// Returns the highest variable id occurring in this term.
    pub fn max_var(&self) -> Option<VarId> {
        match self {
            Term::Var(id) => Some(*id),
            Term::Compound(c) if !c.ground => c.args.iter().filter_map(Term::max_var).max(),
            _ => None,
        }
    }

    /// Returns a copy with every variable id shifted by `offset`.
    ///
    /// Ground subterms are shared with the original.
    pub fn offset_vars(&self, offset: VarId) -> Term {
        match self {
            Term::Var(id) => Term::Var(id + offset),
            Term::Compound(c) if !c.ground => Term::compound_rc(
                Rc::clone(&c.functor),
                c.args.iter().map(|a| a.offset_vars(offset)).collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Rebuilds the term, replacing each variable by the result of `f`.
    pub fn map_vars(&self, f: &mut impl FnMut(VarId) -> Term) -> Term {
        match self {
            Term::Var(id) => f(*id),
            Term::Compound(c) if !c.ground => Term::compound_rc(
                Rc::clone(&c.functor),
                c.args.iter().map(|a| a.map_vars(f)).collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Wraps the term for display with named variables.
    ///
    /// Variable `i` is printed as `names[i]` when present, `_G{i}` otherwise.
    pub fn display_with<'a>(&'a self, names: &'a [String]) -> TermDisplay<'a> {
        TermDisplay { term: self, names }
    }
}

impl From<&str> for Term {
    fn from(name: &str) -> Self {
        Term::atom(name)
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Int(value)
    }
}

/// Display adapter produced by [`Term::display_with`].
pub struct TermDisplay<'a> {
    term: &'a Term,
    names: &'a [String],
}

impl TermDisplay<'_> {
    fn child<'b>(&'b self, term: &'b Term) -> TermDisplay<'b> {
        TermDisplay {
            term,
            names: self.names,
        }
    }
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.term {
            Term::Atom(name) => write_atom(f, name),
            Term::Int(value) => write!(f, "{}", value),
            Term::Var(id) => match self.names.get(*id) {
                Some(name) => write!(f, "{}", name),
                None => write!(f, "_G{}", id),
            },
            Term::Compound(c) if &*c.functor == CONS && c.args.len() == 2 => {
                write!(f, "[{}", self.child(&c.args[0]))?;
                let mut tail = &c.args[1];
                loop {
                    match tail {
                        Term::Atom(name) if &**name == NIL => break,
                        Term::Compound(cell) if &*cell.functor == CONS && cell.args.len() == 2 => {
                            write!(f, ", {}", self.child(&cell.args[0]))?;
                            tail = &cell.args[1];
                        }
                        other => {
                            write!(f, "|{}", self.child(other))?;
                            break;
                        }
                    }
                }
                write!(f, "]")
            }
            Term::Compound(c) if c.args.len() == 2 && INFIX_OPERATORS.contains(&&*c.functor) => {
                write!(
                    f,
                    "{} {} {}",
                    self.child(&c.args[0]),
                    c.functor,
                    self.child(&c.args[1])
                )
            }
            Term::Compound(c) => {
                write_atom(f, &c.functor)?;
                write!(f, "(")?;
                for (i, arg) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.child(arg))?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_with(&[]))
    }
}

/// Writes an atom, quoting it unless it is a plain lowercase identifier.
fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = name == NIL
        || name.starts_with(|c: char| c.is_ascii_lowercase())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        write!(f, "{}", name)
    } else {
        write!(f, "'{}'", name.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_without_args_is_atom() {
        assert_eq!(Term::compound("turn", vec![]), Term::atom("turn"));
    }

    #[test]
    fn test_groundness_is_tracked() {
        let ground = Term::compound("turn", vec![Term::atom("white")]);
        let open = Term::compound("turn", vec![Term::var(0)]);
        assert!(ground.is_ground());
        assert!(!open.is_ground());
        assert!(!Term::list(vec![ground, open]).is_ground());
    }

    #[test]
    fn test_list_items_roundtrip() {
        let items = vec![Term::atom("a"), Term::int(2), Term::atom("c")];
        let list = Term::list(items.clone());
        assert_eq!(list.list_items(), Some(items));
        assert_eq!(Term::atom(NIL).list_items(), Some(vec![]));
    }

    #[test]
    fn test_partial_list_has_no_items() {
        let partial = Term::list_with_tail(vec![Term::atom("a")], Term::var(3));
        assert_eq!(partial.list_items(), None);
    }

    #[test]
    fn test_offset_vars_shares_ground_parts() {
        let term = Term::compound(
            "f",
            vec![Term::var(0), Term::compound("g", vec![Term::atom("x")])],
        );
        let shifted = term.offset_vars(10);
        assert_eq!(shifted.max_var(), Some(10));
        let (Some(before), Some(after)) = (term.as_compound(), shifted.as_compound()) else {
            panic!("expected compounds");
        };
        match (&before.args[1], &after.args[1]) {
            (Term::Compound(a), Term::Compound(b)) => assert!(Rc::ptr_eq(a, b)),
            _ => panic!("expected shared compound"),
        }
    }

    #[test]
    fn test_display() {
        let term = Term::compound(
            "contents",
            vec![Term::atom("white"), Term::atom("pawn"), Term::int(5), Term::int(2)],
        );
        assert_eq!(term.to_string(), "contents(white, pawn, 5, 2)");

        let list = Term::list_with_tail(vec![Term::atom("a"), Term::atom("b")], Term::var(0));
        assert_eq!(list.to_string(), "[a, b|_G0]");

        let names = vec!["From".to_string(), "To".to_string()];
        let neq = Term::compound("\\=", vec![Term::var(0), Term::var(1)]);
        assert_eq!(neq.display_with(&names).to_string(), "From \\= To");
    }

    #[test]
    fn test_display_quotes_unusual_atoms() {
        assert_eq!(Term::atom("Hello world").to_string(), "'Hello world'");
        assert_eq!(Term::atom("e4").to_string(), "e4");
        assert_eq!(Term::atom(NIL).to_string(), "[]");
    }
}
