//! End-to-end tests: configuration, rule files, positions and reports.

use logic::Machine;
use std::fs;
use tactic_analysis::{
    knowledge, EngineError, Evaluation, Move, Oracle, Position, RankedMove, RuleEvaluator,
    RuleOutcome, SupervisedOracle, Vocabulary,
};
use tactic_harness::config::HarnessConfig;
use tactic_harness::{labels, positions, report, rules};

const RULES: &str = "\
% knight forks king and queen
fork(P, F, T) :- piece_at(T, C, knight, N), make_move(F, T, P, N), attacks(T, A, N), piece_at(A, O, king, N), other_side(C, O), attacks(T, B, N), piece_at(B, O, queen, N).

% any king move
king_move(P, F, T) :- piece_at(F, white, king, P), legal_move(F, T, P).
";

const FENS: &str = "\
# fork available
3q3k/8/8/6N1/8/8/8/K7 w - - 0 1
rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1
";

/// Suggestions score 20, the engine's own moves 100.
struct StubOracle;

impl Oracle for StubOracle {
    fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, EngineError> {
        Ok(position
            .legal_moves()
            .into_iter()
            .take(n)
            .map(|mv| RankedMove {
                evaluation: Evaluation::Centipawns(100),
                mv,
            })
            .collect())
    }

    fn evaluate_moves(&mut self, _: &Position, moves: &[Move]) -> Result<Vec<RankedMove>, EngineError> {
        Ok(moves
            .iter()
            .map(|&mv| RankedMove {
                evaluation: Evaluation::Centipawns(20),
                mv,
            })
            .collect())
    }
}

#[test]
fn test_metrics_flow_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = dir.path().join("rules.pl");
    let fens_path = dir.path().join("positions.txt");
    let config_path = dir.path().join("tactics.toml");
    let output_path = dir.path().join("metrics_data.csv");
    fs::write(&rules_path, RULES).unwrap();
    fs::write(&fens_path, FENS).unwrap();
    fs::write(
        &config_path,
        format!(
            "positions_path = {:?}\noutput_path = {:?}\nsuggestion_limit = 2\n",
            fens_path.to_str().unwrap(),
            output_path.to_str().unwrap()
        ),
    )
    .unwrap();

    let config = HarnessConfig::load(&config_path).unwrap();
    let rules = rules::read_rules(&rules_path, &Vocabulary::default()).unwrap();
    assert_eq!(rules.len(), 2);
    // make_move now precedes piece_at.
    assert!(rules[0].to_string().starts_with("fork(P, F, T) :- make_move("));
    let positions = positions::load(&config).unwrap();
    assert_eq!(positions.len(), 2);

    let mut machine = Machine::new();
    knowledge::install(&mut machine);
    let mut oracle = SupervisedOracle::new(|| Ok(StubOracle), config.restart_policy());
    let mut evaluator =
        RuleEvaluator::new(&mut machine, &mut oracle, config.evaluation_options());
    let metrics: Vec<_> = rules
        .iter()
        .map(|rule| match evaluator.evaluate(rule, &positions).unwrap() {
            RuleOutcome::Completed(metrics) => metrics,
            other => panic!("Expected Completed, got {:?}", other),
        })
        .collect();

    assert_eq!(metrics[0].total_positions, 2);
    assert_eq!(metrics[0].total_matches, 1);
    assert_eq!(metrics[0].num_suggestions, 1);
    assert_eq!(metrics[0].divergence, 80.0);
    // The king cannot move in the starting position.
    assert_eq!(metrics[1].total_matches, 1);
    assert_eq!(metrics[1].num_suggestions, 2);

    report::write_metrics(&config.output_path, &metrics).unwrap();
    let content = fs::read_to_string(&output_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "text,total_positions,total_matches,num_suggestions,divergence,avg"
    );
    assert!(lines[1].starts_with("\"fork(P, F, T) :- "));
    assert!(lines[1].ends_with(",2,1,1,80.0,80.0"));
    assert!(machine.database().is_empty());
}

#[test]
fn test_gen_examples_flow() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("examples.csv");
    let positions = positions::parse_fen_list(FENS).unwrap();
    let mut oracle = SupervisedOracle::new(|| Ok(StubOracle), Default::default());
    let examples = labels::label_positions(&mut oracle, &positions, 2).unwrap();
    report::write_examples(&out, &examples).unwrap();

    let content = fs::read_to_string(&out).unwrap();
    let rows: Vec<&str> = content.lines().skip(1).collect();
    assert_eq!(rows.len(), 6);
    assert!(rows[0].starts_with("3q3k/8/8/6N1/8/8/8/K7 w - - 0 1,"));
    assert!(rows[0].ends_with(",1"));
    assert!(rows[1].ends_with(",0"));
}
