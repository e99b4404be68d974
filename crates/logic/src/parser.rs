//! Parser for the Prolog subset used by tactic rules and background knowledge.
//!
//! Supported syntax:
//!
//! - atoms (`white`, `e4`, `'quoted atom'`), integers (`-3`), variables
//!   (`From`, `_Tmp`, anonymous `_`)
//! - compound terms `f(a, B)` and lists `[a, b | T]`
//! - clauses `head.` and `head :- goal, goal.`
//! - the infix goals `=`, `\=`, `==` and `\==`
//! - `%` line comments

use std::collections::HashMap;

use thiserror::Error;

use crate::clause::{Clause, Query};
use crate::term::{Term, INFIX_OPERATORS};

/// Error produced when source text cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct ParseError {
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Atom(String),
    Var(String),
    Int(i64),
    Symbol(&'static str),
    End,
    Eof,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

const SYMBOLS: [&str; 10] = [":-", "\\==", "\\=", "==", "=", "(", ")", "[", "]", "|"];

fn tokenize(text: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut line_start = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i - line_start + 1;
        let error = move |message: String| ParseError {
            line,
            column,
            message,
        };

        if c == '\n' {
            line += 1;
            i += 1;
            line_start = i;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '%' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        let start = i;
        let token = if c.is_ascii_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if c.is_ascii_lowercase() {
                Token::Atom(word)
            } else {
                Token::Var(word)
            }
        } else if c.is_ascii_digit()
            || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            let value = digits
                .parse()
                .map_err(|_| error(format!("integer out of range: {}", digits)))?;
            Token::Int(value)
        } else if c == '\'' {
            i += 1;
            let mut name = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(error("unterminated quoted atom".to_string())),
                    Some('\\') if chars.get(i + 1) == Some(&'\'') => {
                        name.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        name.push(ch);
                        i += 1;
                    }
                }
            }
            Token::Atom(name)
        } else if c == ',' {
            i += 1;
            Token::Symbol(",")
        } else if c == '.' {
            i += 1;
            Token::End
        } else if let Some(symbol) = SYMBOLS
            .iter()
            .find(|s| chars[i..].iter().take(s.len()).copied().eq(s.chars()))
        {
            i += symbol.len();
            Token::Symbol(*symbol)
        } else {
            return Err(error(format!("unexpected character '{}'", c)));
        };

        tokens.push(Spanned {
            token,
            line,
            column,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
        column: chars.len() - line_start + 1,
    });
    Ok(tokens)
}

/// Maps variable names of one clause to local ids.
#[derive(Default)]
struct VarScope {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl VarScope {
    fn lookup(&mut self, name: &str) -> Term {
        if name == "_" {
            self.names.push("_".to_string());
            return Term::var(self.names.len() - 1);
        }
        if let Some(&id) = self.index.get(name) {
            return Term::var(id);
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        Term::var(id)
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    vars: VarScope,
}

impl Parser {
    fn new(text: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(text)?,
            pos: 0,
            vars: VarScope::default(),
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let spanned = &self.tokens[self.pos];
        ParseError {
            line: spanned.line,
            column: spanned.column,
            message: message.into(),
        }
    }

    fn expect(&mut self, symbol: &str) -> Result<(), ParseError> {
        match self.peek() {
            Token::Symbol(s) if *s == symbol => {
                self.next();
                Ok(())
            }
            other => Err(self.error(format!("expected '{}', found {:?}", symbol, other))),
        }
    }

    fn eat(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Token::Symbol(s) if *s == symbol) {
            self.next();
            true
        } else {
            false
        }
    }

    fn term(&mut self) -> Result<Term, ParseError> {
        let start = self.pos;
        match self.next() {
            Token::Var(name) => Ok(self.vars.lookup(&name)),
            Token::Int(value) => Ok(Term::int(value)),
            Token::Atom(name) => {
                if self.eat("(") {
                    let mut args = vec![self.term()?];
                    while self.eat(",") {
                        args.push(self.term()?);
                    }
                    self.expect(")")?;
                    Ok(Term::compound(&name, args))
                } else {
                    Ok(Term::atom(&name))
                }
            }
            Token::Symbol("[") => {
                if self.eat("]") {
                    return Ok(Term::list(Vec::new()));
                }
                let mut items = vec![self.term()?];
                while self.eat(",") {
                    items.push(self.term()?);
                }
                let tail = if self.eat("|") {
                    self.term()?
                } else {
                    Term::list(Vec::new())
                };
                self.expect("]")?;
                Ok(Term::list_with_tail(items, tail))
            }
            other => {
                self.pos = start;
                Err(self.error(format!("expected a term, found {:?}", other)))
            }
        }
    }

    fn goal(&mut self) -> Result<Term, ParseError> {
        let left = self.term()?;
        if let Token::Symbol(op) = *self.peek() {
            if INFIX_OPERATORS.contains(&op) {
                self.next();
                let right = self.term()?;
                return Ok(Term::compound(op, vec![left, right]));
            }
        }
        if matches!(left, Term::Var(_) | Term::Int(_)) {
            return Err(self.error("goal must be an atom or compound term"));
        }
        Ok(left)
    }

    fn goals(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut goals = vec![self.goal()?];
        while self.eat(",") {
            goals.push(self.goal()?);
        }
        Ok(goals)
    }

    /// Parses one clause; the terminating `.` is required unless `lenient`.
    fn clause(&mut self, lenient: bool) -> Result<Clause, ParseError> {
        self.vars = VarScope::default();
        let head = self.term()?;
        if head.indicator().is_none() {
            return Err(self.error("clause head must be an atom or compound term"));
        }
        let body = if self.eat(":-") { self.goals()? } else { Vec::new() };
        match self.peek() {
            Token::End => {
                self.next();
            }
            Token::Eof if lenient => {}
            other => return Err(self.error(format!("expected '.', found {:?}", other))),
        }
        Ok(Clause {
            head,
            body,
            var_names: std::mem::take(&mut self.vars.names),
        })
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }
}

/// Parses a single clause. The trailing `.` may be omitted.
///
/// # Errors
///
/// Returns a [`ParseError`] if the text is not exactly one clause.
pub fn parse_clause(text: &str) -> Result<Clause, ParseError> {
    let mut parser = Parser::new(text)?;
    let clause = parser.clause(true)?;
    if !parser.at_eof() {
        return Err(parser.error("unexpected text after clause"));
    }
    Ok(clause)
}

/// Parses a program: zero or more clauses, each terminated by `.`.
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered.
pub fn parse_program(text: &str) -> Result<Vec<Clause>, ParseError> {
    let mut parser = Parser::new(text)?;
    let mut clauses = Vec::new();
    while !parser.at_eof() {
        clauses.push(parser.clause(false)?);
    }
    Ok(clauses)
}

/// Parses a query such as `legal_move(From, To, Pos), From \= To`.
///
/// A trailing `.` is accepted.
///
/// # Errors
///
/// Returns a [`ParseError`] if the text is not a conjunction of goals.
pub fn parse_query(text: &str) -> Result<Query, ParseError> {
    let mut parser = Parser::new(text)?;
    let goals = parser.goals()?;
    if matches!(parser.peek(), Token::End) {
        parser.next();
    }
    if !parser.at_eof() {
        return Err(parser.error("unexpected text after query"));
    }
    Ok(Query::new(goals, std::mem::take(&mut parser.vars.names)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fact() {
        let clause = parse_clause("turn(white).").unwrap();
        assert!(clause.is_fact());
        assert_eq!(clause.indicator(), ("turn", 1));
        assert_eq!(clause.var_count(), 0);
    }

    #[test]
    fn test_parse_rule_shares_variables() {
        let clause =
            parse_clause("f(Pos, From, To) :- legal_move(From, To, Pos), attacks(To, _, Pos)")
                .unwrap();
        assert_eq!(clause.body.len(), 2);
        assert_eq!(clause.var_names, vec!["Pos", "From", "To", "_"]);
        let goal = clause.body[0].as_compound().unwrap();
        assert_eq!(goal.args[0], Term::var(1));
        assert_eq!(goal.args[2], Term::var(0));
    }

    #[test]
    fn test_anonymous_variables_are_distinct() {
        let clause = parse_clause("p(_, _).").unwrap();
        assert_eq!(clause.var_count(), 2);
    }

    #[test]
    fn test_display_roundtrip() {
        let text = "f(Pos, From, To) :- piece_at(From, white, knight, Pos), From \\= To, other_side(white, S).";
        let clause = parse_clause(text).unwrap();
        assert_eq!(clause.to_string(), text);
        assert_eq!(parse_clause(&clause.to_string()).unwrap(), clause);
    }

    #[test]
    fn test_parse_lists() {
        let clause = parse_clause("p([a, 1 | T], [], T).").unwrap();
        let args = &clause.head.as_compound().unwrap().args;
        assert_eq!(args[1].list_items(), Some(vec![]));
        assert_eq!(args[0].to_string(), "[a, 1|_G0]");
    }

    #[test]
    fn test_parse_program_with_comments() {
        let program = "% background knowledge\nother(white, black).\nother(black, white). % symmetric\n";
        let clauses = parse_program(program).unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[1].to_string(), "other(black, white).");
    }

    #[test]
    fn test_program_requires_terminator() {
        let err = parse_program("a. b").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("expected '.'"));
    }

    #[test]
    fn test_parse_negative_and_quoted() {
        let clause = parse_clause("score('mate in', -3)").unwrap();
        let args = &clause.head.as_compound().unwrap().args;
        assert_eq!(args[0].as_atom(), Some("mate in"));
        assert_eq!(args[1].as_int(), Some(-3));
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query("legal_move(From, To, P), From \\== To.").unwrap();
        assert_eq!(query.goals.len(), 2);
        assert_eq!(query.var_id("To"), Some(1));
        assert_eq!(query.to_string(), "legal_move(From, To, P), From \\== To");
    }

    #[test]
    fn test_reject_variable_goal() {
        assert!(parse_clause("p :- X").is_err());
        assert!(parse_clause("X :- p").is_err());
    }

    #[test]
    fn test_error_position() {
        let err = parse_clause("p(a,\n  #)").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }
}
