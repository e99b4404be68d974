//! Engine evaluation types.

use serde::Serialize;

/// Default magnitude a forced mate collapses to when scoring.
pub const DEFAULT_MATE_SCORE: i32 = 2000;

/// An engine evaluation from the point of view of the side to move.
///
/// Evaluations can be either centipawn scores (for normal positions)
/// or mate scores (when a forced mate is found).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Evaluation {
    /// Centipawn evaluation (positive = side to move is better)
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated)
    Mate(i32),
}

impl Evaluation {
    /// Builds an evaluation from the `score cp` / `score mate` fields of a
    /// UCI info line. A mate score wins over a centipawn score.
    pub fn from_uci_score(cp: Option<i32>, mate: Option<i32>) -> Option<Self> {
        match (cp, mate) {
            (_, Some(m)) => Some(Evaluation::Mate(m)),
            (Some(c), None) => Some(Evaluation::Centipawns(c)),
            (None, None) => None,
        }
    }

    /// Collapses the evaluation to a single integer.
    ///
    /// Mates are mapped near `±mate_score` so shorter mates score further
    /// from zero: `Mate(n)` with `n > 0` gives `mate_score - n`, otherwise
    /// `-mate_score - n`.
    pub fn score(&self, mate_score: i32) -> i32 {
        match *self {
            Evaluation::Centipawns(cp) => cp,
            Evaluation::Mate(n) if n > 0 => mate_score - n,
            Evaluation::Mate(n) => -mate_score - n,
        }
    }

    /// Returns true for a forced mate in either direction.
    pub fn is_mate(&self) -> bool {
        matches!(self, Evaluation::Mate(_))
    }
}
