//! Per-rule metric totals.

use serde::Serialize;
use tracing::{debug, info};

use crate::scorer::Score;

/// Running totals for one rule over a stream of positions.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    positions: usize,
    matches: usize,
    empty_suggestions: usize,
    suggestions: usize,
    divergence: f64,
    average_divergence: f64,
}

impl MetricsAccumulator {
    /// Creates empty totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a position the rule did not match.
    pub fn record_no_match(&mut self) {
        self.positions += 1;
    }

    /// Records a match that produced no usable suggestions.
    pub fn record_empty_match(&mut self) {
        self.positions += 1;
        self.matches += 1;
        self.empty_suggestions += 1;
    }

    /// Records a scored match.
    pub fn record_match(&mut self, suggestions: usize, score: Score) {
        self.positions += 1;
        self.matches += 1;
        self.suggestions += suggestions;
        self.divergence += score.rank_discounted;
        self.average_divergence += score.average;
    }

    /// Positions processed so far.
    pub fn positions(&self) -> usize {
        self.positions
    }

    /// Closes the totals into a record for `rule`.
    pub fn finish(self, rule: impl Into<String>) -> RuleMetrics {
        RuleMetrics {
            rule: rule.into(),
            total_positions: self.positions,
            total_matches: self.matches,
            empty_suggestions: self.empty_suggestions,
            num_suggestions: self.suggestions,
            divergence: self.divergence,
            avg: self.average_divergence,
        }
    }
}

/// Final metrics for one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleMetrics {
    /// The rule text.
    pub rule: String,
    /// Positions the rule was evaluated on.
    pub total_positions: usize,
    /// Positions the rule matched.
    pub total_matches: usize,
    /// Matches that produced no usable moves.
    pub empty_suggestions: usize,
    /// Suggested moves scored in total.
    pub num_suggestions: usize,
    /// Summed rank-discounted divergence.
    pub divergence: f64,
    /// Summed average divergence.
    pub avg: f64,
}

impl RuleMetrics {
    /// Logs the summary at `info` if anything matched, otherwise at `debug`.
    pub fn log_summary(&self) {
        if self.total_matches > 0 {
            info!(
                "{} matched {}/{} positions ({} empty), {} suggestions, divergence {:.2}, avg {:.2}",
                self.rule,
                self.total_matches,
                self.total_positions,
                self.empty_suggestions,
                self.num_suggestions,
                self.divergence,
                self.avg
            );
        } else {
            debug!(
                "{} matched none of {} positions",
                self.rule, self.total_positions
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates() {
        let mut acc = MetricsAccumulator::new();
        acc.record_no_match();
        acc.record_empty_match();
        acc.record_match(
            2,
            Score {
                rank_discounted: 30.0,
                average: 15.0,
            },
        );
        acc.record_match(
            1,
            Score {
                rank_discounted: 10.0,
                average: 5.0,
            },
        );
        assert_eq!(acc.positions(), 4);
        let metrics = acc.finish("f(P, F, T) :- legal_move(F, T, P).");
        assert_eq!(metrics.total_positions, 4);
        assert_eq!(metrics.total_matches, 3);
        assert_eq!(metrics.empty_suggestions, 1);
        assert_eq!(metrics.num_suggestions, 3);
        assert_eq!(metrics.divergence, 40.0);
        assert_eq!(metrics.avg, 20.0);
    }

    #[test]
    fn test_serializes() {
        let metrics = MetricsAccumulator::new().finish("r");
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["rule"], "r");
        assert_eq!(json["total_positions"], 0);
        assert_eq!(json["avg"], 0.0);
    }
}
