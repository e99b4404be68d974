//! Chess tactic rule matching and scoring.
//!
//! This crate matches candidate tactic rules, written as logic clauses,
//! against chess positions and scores the suggested moves against a UCI
//! engine's ranking.
//!
//! # Overview
//!
//! - [`Position`] / [`FactList`] - Positions and their fact encoding
//! - [`knowledge`] - Chess predicates available to rule bodies
//! - [`match_tactic`] - Runs one rule against one position
//! - [`score`] - Rank-discounted divergence from the engine's ranking
//! - [`AnalysisEngine`] / [`SupervisedOracle`] - The engine and its crash supervisor
//! - [`RuleEvaluator`] - Runs a rule over many positions and totals the metrics
//!
//! # Example
//!
//! ```ignore
//! use tactic_analysis::{knowledge, EngineOracle, EvaluationOptions, RestartPolicy,
//!     RuleEvaluator, SupervisedOracle};
//!
//! let mut machine = logic::Machine::new();
//! knowledge::install(&mut machine);
//! let mut oracle = SupervisedOracle::new(|| EngineOracle::launch("stockfish", 1), RestartPolicy::default());
//! let mut evaluator = RuleEvaluator::new(&mut machine, &mut oracle, EvaluationOptions::default());
//! let outcome = evaluator.evaluate(&rule, &positions)?;
//! ```

pub mod engine;
pub mod evaluation;
pub mod facts;
pub mod knowledge;
pub mod matcher;
pub mod metrics;
pub mod oracle;
pub mod pipeline;
pub mod position;
pub mod scorer;

pub use engine::{AnalysisEngine, EngineError, PvLine};
pub use evaluation::{Evaluation, DEFAULT_MATE_SCORE};
pub use facts::{Fact, FactError, FactList};
pub use knowledge::Vocabulary;
pub use matcher::{match_tactic, MatchError, MatchOptions, MatchResult};
pub use metrics::{MetricsAccumulator, RuleMetrics};
pub use oracle::{EngineOracle, Oracle, OracleError, RankedMove, RestartPolicy, SupervisedOracle};
pub use pipeline::{EvaluationOptions, PipelineError, RuleEvaluator, RuleOutcome, TimeoutPolicy};
pub use position::{CastlingRights, Move, Position, PositionParseError};
pub use scorer::{score, Score, ScoreError};
