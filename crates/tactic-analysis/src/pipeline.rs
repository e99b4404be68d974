//! Evaluating a rule over a stream of positions.

use logic::{Clause, Machine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::EngineError;
use crate::evaluation::{Evaluation, DEFAULT_MATE_SCORE};
use crate::matcher::{match_tactic, MatchOptions, MatchResult};
use crate::metrics::{MetricsAccumulator, RuleMetrics};
use crate::oracle::{Oracle, OracleError, SupervisedOracle};
use crate::position::{Move, Position};
use crate::scorer::score;

/// What to do when a query for one position runs out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Stop evaluating the rule and discard its partial metrics.
    #[default]
    AbortRule,
    /// Leave the position out and continue with the next one.
    SkipPosition,
}

/// Errors that stop a whole run rather than a single rule.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The oracle could not be kept running.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Settings for evaluating rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Bounds for each query.
    pub matching: MatchOptions,
    /// Magnitude mates collapse to when scoring.
    pub mate_score: i32,
    /// Reaction to query timeouts.
    pub timeout_policy: TimeoutPolicy,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            matching: MatchOptions::default(),
            mate_score: DEFAULT_MATE_SCORE,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Every position was processed.
    Completed(RuleMetrics),
    /// The rule was abandoned; its partial metrics were discarded.
    Aborted {
        /// The rule text.
        rule: String,
        /// Positions processed before the rule was abandoned.
        positions_seen: usize,
        /// Why it was abandoned.
        reason: String,
    },
}

impl RuleOutcome {
    /// Returns the metrics of a completed rule.
    pub fn metrics(&self) -> Option<&RuleMetrics> {
        match self {
            RuleOutcome::Completed(metrics) => Some(metrics),
            RuleOutcome::Aborted { .. } => None,
        }
    }
}

/// Matches rules against positions and scores them with an oracle.
///
/// The logic machine and the oracle are borrowed for the evaluator's
/// lifetime and reused for every rule and position.
pub struct RuleEvaluator<'a, O, L> {
    machine: &'a mut Machine,
    oracle: &'a mut SupervisedOracle<O, L>,
    options: EvaluationOptions,
}

impl<'a, O, L> RuleEvaluator<'a, O, L>
where
    O: Oracle,
    L: FnMut() -> Result<O, EngineError>,
{
    /// Creates an evaluator over shared resources.
    pub fn new(
        machine: &'a mut Machine,
        oracle: &'a mut SupervisedOracle<O, L>,
        options: EvaluationOptions,
    ) -> Self {
        Self {
            machine,
            oracle,
            options,
        }
    }

    /// Evaluates `rule` over `positions`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Oracle`] only when the oracle cannot be
    /// relaunched; every other failure is confined to a position or to
    /// this rule.
    pub fn evaluate(
        &mut self,
        rule: &Clause,
        positions: &[Position],
    ) -> Result<RuleOutcome, PipelineError> {
        let text = rule.to_string();
        let mut acc = MetricsAccumulator::new();

        for (index, position) in positions.iter().enumerate() {
            let result = match match_tactic(self.machine, rule, position, &self.options.matching)
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("Abandoning {}: {}", text, e);
                    return Ok(RuleOutcome::Aborted {
                        rule: text,
                        positions_seen: acc.positions(),
                        reason: e.to_string(),
                    });
                }
            };

            match result {
                MatchResult::NoResult => match self.options.timeout_policy {
                    TimeoutPolicy::AbortRule => {
                        return Ok(RuleOutcome::Aborted {
                            rule: text,
                            positions_seen: acc.positions(),
                            reason: format!("query stopped at position {}", index),
                        });
                    }
                    TimeoutPolicy::SkipPosition => {
                        debug!("Skipping position {} for {}", index, text);
                    }
                },
                MatchResult::NoMatch => acc.record_no_match(),
                MatchResult::Matched(moves) if moves.is_empty() => acc.record_empty_match(),
                MatchResult::Matched(moves) => {
                    if let Some((suggested, best)) = self.consult_oracle(position, &moves)? {
                        match score(&suggested, &best, self.options.mate_score) {
                            Ok(s) => {
                                debug!(
                                    "Position {}: {} suggestions, divergence {:.2}",
                                    index,
                                    moves.len(),
                                    s.rank_discounted
                                );
                                acc.record_match(moves.len(), s);
                            }
                            Err(e) => warn!("Dropping position {}: {}", position, e),
                        }
                    }
                }
            }
        }

        let metrics = acc.finish(text);
        metrics.log_summary();
        Ok(RuleOutcome::Completed(metrics))
    }

    /// Returns the evaluations of the suggestions and of the oracle's own
    /// top moves, or `None` if the position has to be dropped.
    fn consult_oracle(
        &mut self,
        position: &Position,
        moves: &[Move],
    ) -> Result<Option<(Vec<Evaluation>, Vec<Evaluation>)>, PipelineError> {
        let evaluations = self
            .oracle
            .evaluate_moves(position, moves)
            .and_then(|suggested| {
                let best = self.oracle.top_moves(position, moves.len())?;
                Ok((suggested, best))
            });
        match evaluations {
            Ok((suggested, best)) => Ok(Some((
                suggested.iter().map(|m| m.evaluation).collect(),
                best.iter().map(|m| m.evaluation).collect(),
            ))),
            Err(e) if e.is_recoverable() => {
                warn!("Dropping position {}: {}", position, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
