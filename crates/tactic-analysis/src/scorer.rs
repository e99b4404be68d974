//! Divergence between suggested moves and the oracle's ranking.

use serde::Serialize;
use thiserror::Error;

use crate::evaluation::Evaluation;

/// Errors from scoring.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreError {
    /// The oracle returned no moves, so the average is undefined.
    #[error("Oracle ranking is empty")]
    EmptyOracle,
}

/// Divergence of one suggestion list from the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Score {
    /// Sum of per-rank errors weighted by `1 / log2(rank + 2)`.
    pub rank_discounted: f64,
    /// Sum of per-rank errors divided by the oracle list length.
    pub average: f64,
}

/// Compares suggested move evaluations with the oracle's, rank by rank.
///
/// Lists are paired positionally up to the shorter length. The average
/// divides by the number of oracle moves, not the number of pairs, so an
/// oracle list longer than the suggestions lowers it.
///
/// # Errors
///
/// Returns [`ScoreError::EmptyOracle`] if `oracle` is empty.
pub fn score(
    suggested: &[Evaluation],
    oracle: &[Evaluation],
    mate_score: i32,
) -> Result<Score, ScoreError> {
    if oracle.is_empty() {
        return Err(ScoreError::EmptyOracle);
    }
    let errors = suggested.iter().zip(oracle).map(|(s, o)| {
        (i64::from(s.score(mate_score)) - i64::from(o.score(mate_score))).abs() as f64
    });
    let (rank_discounted, total) = errors
        .enumerate()
        .fold((0.0_f64, 0.0_f64), |(discounted, total), (rank, error)| {
            (
                discounted + error / ((rank + 2) as f64).log2(),
                total + error,
            )
        });
    Ok(Score {
        rank_discounted,
        average: total / oracle.len() as f64,
    })
}
