//! Reading candidate rules from a hypothesis-space file.
//!
//! The file holds one clause per line. Blank lines and lines starting with
//! `%` are skipped. Each rule's body is reordered by the vocabulary's
//! predicate precedence.

use logic::{parse_clause, Clause, ParseError};
use std::path::Path;
use tactic_analysis::Vocabulary;
use thiserror::Error;

/// Errors from reading a rules file.
#[derive(Error, Debug)]
pub enum RuleFileError {
    /// The file could not be read.
    #[error("Failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    /// A line is not a valid clause.
    #[error("Line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// The parse error.
        #[source]
        source: ParseError,
    },
    /// A rule head is not `name(Position, From, To)`.
    #[error("Line {line}: rule head must have arity 3, found {name}/{arity}")]
    BadHead {
        /// 1-based line number.
        line: usize,
        /// Head name.
        name: String,
        /// Head arity.
        arity: usize,
    },
}

/// Reads and normalizes the rules in a file.
pub fn read_rules(path: &Path, vocabulary: &Vocabulary) -> Result<Vec<Clause>, RuleFileError> {
    let content = std::fs::read_to_string(path)?;
    parse_rules(&content, vocabulary)
}

/// Parses and normalizes rules from text.
pub fn parse_rules(content: &str, vocabulary: &Vocabulary) -> Result<Vec<Clause>, RuleFileError> {
    let mut rules = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let text = line.trim();
        if text.is_empty() || text.starts_with('%') {
            continue;
        }
        let line = index + 1;
        let mut clause = parse_clause(text).map_err(|source| RuleFileError::Parse { line, source })?;
        let (name, arity) = clause.indicator();
        if arity != 3 {
            return Err(RuleFileError::BadHead {
                line,
                name: name.to_string(),
                arity,
            });
        }
        vocabulary.order_body(&mut clause);
        rules.push(clause);
    }
    Ok(rules)
}
