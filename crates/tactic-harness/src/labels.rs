//! Labelled example generation.
//!
//! For every position the oracle ranks the top `ratio + 1` moves. The best
//! move becomes a positive example, the rest negative ones.

use crate::report::LabelledExample;
use tactic_analysis::{EngineError, Oracle, OracleError, Position, SupervisedOracle};
use tracing::{debug, warn};

/// Labels the oracle's top moves in each position.
///
/// Positions the oracle fails on are skipped.
///
/// # Errors
///
/// Returns the oracle error only when it can no longer be relaunched.
pub fn label_positions<O, L>(
    oracle: &mut SupervisedOracle<O, L>,
    positions: &[Position],
    ratio: usize,
) -> Result<Vec<LabelledExample>, OracleError>
where
    O: Oracle,
    L: FnMut() -> Result<O, EngineError>,
{
    let mut examples = Vec::with_capacity(positions.len() * (ratio + 1));
    for position in positions {
        let ranked = match oracle.top_moves(position, ratio + 1) {
            Ok(ranked) => ranked,
            Err(e) if e.is_recoverable() => {
                warn!("Skipping {}: {}", position, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        debug!("{} ranked moves for {}", ranked.len(), position);
        let fen = position.fen();
        examples.extend(ranked.iter().enumerate().map(|(rank, ranked_move)| LabelledExample {
            fen: fen.clone(),
            uci: position.to_uci(ranked_move.mv),
            label: u8::from(rank == 0),
        }));
    }
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactic_analysis::{Evaluation, Move, RankedMove, RestartPolicy};

    struct FirstMoves;

    impl Oracle for FirstMoves {
        fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, EngineError> {
            Ok(position
                .legal_moves()
                .into_iter()
                .take(n)
                .map(|mv| RankedMove {
                    evaluation: Evaluation::Centipawns(0),
                    mv,
                })
                .collect())
        }

        fn evaluate_moves(&mut self, _: &Position, _: &[Move]) -> Result<Vec<RankedMove>, EngineError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_labels_best_move_positive() {
        let mut oracle = SupervisedOracle::new(|| Ok(FirstMoves), RestartPolicy::default());
        let positions = vec![Position::starting(), Position::starting()];
        let examples = label_positions(&mut oracle, &positions, 3).unwrap();
        assert_eq!(examples.len(), 8);
        let labels: Vec<u8> = examples.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![1, 0, 0, 0, 1, 0, 0, 0]);
        assert!(examples.iter().all(|e| e.fen == Position::starting().fen()));
    }

    #[test]
    fn test_short_ranking_gives_fewer_negatives() {
        // Only three king moves are legal.
        let position = Position::from_fen("k7/8/8/8/8/8/8/7K w - - 0 1").unwrap();
        let mut oracle = SupervisedOracle::new(|| Ok(FirstMoves), RestartPolicy::default());
        let examples = label_positions(&mut oracle, &[position], 5).unwrap();
        assert_eq!(examples.len(), 3);
        assert_eq!(examples.iter().filter(|e| e.label == 1).count(), 1);
    }

    #[test]
    fn test_launch_failure_is_fatal() {
        let mut oracle = SupervisedOracle::new(
            || Err::<FirstMoves, _>(EngineError::NotFound("nowhere".to_string())),
            RestartPolicy {
                max_consecutive_restarts: 0,
            },
        );
        let result = label_positions(&mut oracle, &[Position::starting()], 1);
        assert!(matches!(result, Err(OracleError::RestartsExhausted { .. })));
    }
}
