//! Integration tests for rule matching, scoring and the UCI oracle.

use logic::{parse_clause, Machine};
use proptest::prelude::*;
use tactic_analysis::{
    knowledge, match_tactic, EngineError, EngineOracle, Evaluation, EvaluationOptions,
    MatchOptions, MatchResult, Move, Oracle, Position, RankedMove, RestartPolicy, RuleEvaluator,
    RuleOutcome, SupervisedOracle,
};

const FORK_RULE: &str = "fork(P, F, T) :- make_move(F, T, P, N), piece_at(T, C, knight, N), \
     attacks(T, A, N), piece_at(A, O, king, N), other_side(C, O), \
     attacks(T, B, N), piece_at(B, O, queen, N)";

/// Black king h8 and queen d8; the white knight on g5 forks them from f7.
const FORK_FEN: &str = "3q3k/8/8/6N1/8/8/8/K7 w - - 0 1";

fn machine() -> Machine {
    let mut machine = Machine::new();
    knowledge::install(&mut machine);
    machine
}

#[test]
fn test_fork_rule_finds_knight_fork() {
    let mut machine = machine();
    let rule = parse_clause(FORK_RULE).unwrap();
    let position = Position::from_fen(FORK_FEN).unwrap();
    let result = match_tactic(&mut machine, &rule, &position, &MatchOptions::default()).unwrap();
    assert_eq!(
        result,
        MatchResult::Matched(vec!["g5f7".parse::<Move>().unwrap()])
    );
    assert!(machine.database().is_empty());
}

#[test]
fn test_fork_rule_no_match_in_starting_position() {
    let mut machine = machine();
    let rule = parse_clause(FORK_RULE).unwrap();
    let result = match_tactic(
        &mut machine,
        &rule,
        &Position::starting(),
        &MatchOptions::default(),
    )
    .unwrap();
    assert_eq!(result, MatchResult::NoMatch);
}

/// Every suggestion is worth 0; the best move is worth 80.
struct FlatOracle;

impl Oracle for FlatOracle {
    fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, EngineError> {
        Ok(position
            .legal_moves()
            .into_iter()
            .take(n)
            .map(|mv| RankedMove {
                evaluation: Evaluation::Centipawns(80),
                mv,
            })
            .collect())
    }

    fn evaluate_moves(
        &mut self,
        _position: &Position,
        moves: &[Move],
    ) -> Result<Vec<RankedMove>, EngineError> {
        Ok(moves
            .iter()
            .map(|&mv| RankedMove {
                evaluation: Evaluation::Centipawns(50),
                mv,
            })
            .collect())
    }
}

#[test]
fn test_pipeline_over_positions() {
    let mut machine = machine();
    let mut oracle = SupervisedOracle::new(|| Ok(FlatOracle), RestartPolicy::default());
    let positions = vec![
        Position::from_fen(FORK_FEN).unwrap(),
        Position::starting(),
        Position::from_fen(FORK_FEN).unwrap(),
    ];
    let rule = parse_clause(FORK_RULE).unwrap();
    let mut evaluator = RuleEvaluator::new(&mut machine, &mut oracle, EvaluationOptions::default());
    let outcome = evaluator.evaluate(&rule, &positions).unwrap();
    let metrics = match outcome {
        RuleOutcome::Completed(metrics) => metrics,
        other => panic!("Expected Completed, got {:?}", other),
    };
    assert_eq!(metrics.total_positions, 3);
    assert_eq!(metrics.total_matches, 2);
    assert_eq!(metrics.num_suggestions, 2);
    assert_eq!(metrics.divergence, 60.0);
    assert_eq!(metrics.avg, 60.0);
    assert!(machine.database().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_match_restores_database(
        rule_index in 0usize..4,
        fen_index in 0usize..3,
        limit in 0usize..5,
    ) {
        let rules = [
            "f(P, F, T) :- legal_move(F, T, P)",
            "f(P, F, T) :- legal_move(F, T, P), attacks(T, A, P), piece_at(A, black, king, P)",
            FORK_RULE,
            "f(P, F, T) :- legal_move(F, T, P), missing(F)",
        ];
        let fens = [
            FORK_FEN,
            "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
            "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
        ];
        let mut machine = machine();
        machine.consult("keep(1). keep(2).").unwrap();
        let before = machine.database().listing();
        let options = MatchOptions { suggestion_limit: limit, ..MatchOptions::default() };
        let rule = parse_clause(rules[rule_index]).unwrap();
        let position = Position::from_fen(fens[fen_index]).unwrap();
        let _ = match_tactic(&mut machine, &rule, &position, &options);
        prop_assert_eq!(machine.database().listing(), before);
    }
}

#[cfg(unix)]
mod fake_engine {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    const RESPONSIVE: &str = r#"#!/bin/sh
while read line; do
  case "$line" in
    uci) echo "id name FakeFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    *searchmoves*)
      mv=${line##* }
      echo "info depth 1 multipv 1 score cp 10 nodes 20 pv $mv"
      echo "bestmove $mv" ;;
    go*)
      echo "info depth 1 multipv 1 score cp 50 nodes 20 pv e2e4 e7e5"
      echo "info depth 1 multipv 2 score cp 40 nodes 20 pv d2d4"
      echo "info depth 1 multipv 3 score mate 4 nodes 20 pv g1f3"
      echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

    const CRASHING: &str = r#"#!/bin/sh
while read line; do
  case "$line" in
    uci) echo "id name CrashFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) exit 1 ;;
  esac
done
"#;

    // Floods the first search past the line limit before answering.
    const CHATTY: &str = r#"#!/bin/sh
searches=0
while read line; do
  case "$line" in
    uci) echo "id name ChattyFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      searches=$((searches + 1))
      if [ "$searches" -eq 1 ]; then
        i=0
        while [ "$i" -lt 1005 ]; do echo "info string thinking"; i=$((i + 1)); done
        echo "bestmove a2a3"
      else
        echo "info depth 1 multipv 1 score cp 30 nodes 1 pv e2e4"
        echo "bestmove e2e4"
      fi ;;
    quit) exit 0 ;;
  esac
done
"#;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_fake_engine_ranking_and_crash_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let responsive = write_script(dir.path(), "responsive.sh", RESPONSIVE);
        let crashing = write_script(dir.path(), "crashing.sh", CRASHING);

        let mut oracle = EngineOracle::launch(responsive.to_str().unwrap(), 1).unwrap();
        assert_eq!(oracle.name(), "FakeFish");
        let position = Position::starting();
        let top = oracle.top_moves(&position, 3).unwrap();
        let moves: Vec<String> = top.iter().map(|m| m.mv.to_string()).collect();
        assert_eq!(moves, vec!["e2e4", "d2d4", "g1f3"]);
        assert_eq!(top[2].evaluation, Evaluation::Mate(4));
        let evaluated = oracle
            .evaluate_moves(&position, &["b1c3".parse().unwrap()])
            .unwrap();
        assert_eq!(evaluated[0].evaluation, Evaluation::Centipawns(10));

        let path = crashing.to_str().unwrap().to_string();
        let mut supervised = SupervisedOracle::new(
            move || EngineOracle::launch(&path, 1),
            RestartPolicy::default(),
        );
        let result = supervised.top_moves(&position, 1);
        assert!(matches!(
            result,
            Err(tactic_analysis::OracleError::Crashed(_))
        ));
        assert_eq!(supervised.restarts(), 1);
        assert!(supervised.is_running());
    }

    #[test]
    fn test_unfinished_search_output_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let chatty = write_script(dir.path(), "chatty.sh", CHATTY);
        let path = chatty.to_str().unwrap().to_string();
        let mut supervised = SupervisedOracle::new(
            move || EngineOracle::launch(&path, 1),
            RestartPolicy::default(),
        );
        let position = Position::starting();

        let first = supervised.top_moves(&position, 1);
        assert!(matches!(
            first,
            Err(tactic_analysis::OracleError::Failed(EngineError::InvalidResponse(_)))
        ));

        // The stale "bestmove a2a3" must not answer the next search.
        let second = supervised.top_moves(&position, 1).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].mv.to_string(), "e2e4");
        assert_eq!(second[0].evaluation, Evaluation::Centipawns(30));
        assert_eq!(supervised.restarts(), 0);
    }
}

#[test]
#[ignore = "requires Stockfish"]
fn test_stockfish_top_moves() {
    let mut oracle = EngineOracle::launch("stockfish", 8).expect("stockfish on PATH");
    let top = oracle.top_moves(&Position::starting(), 3).unwrap();
    assert_eq!(top.len(), 3);
    let legal = Position::starting().legal_moves();
    assert!(top.iter().all(|m| legal.contains(&m.mv)));
}

#[test]
#[ignore = "requires Stockfish"]
fn test_stockfish_finds_fork() {
    let mut oracle = EngineOracle::launch("stockfish", 10).expect("stockfish on PATH");
    let position = Position::from_fen(FORK_FEN).unwrap();
    let top = oracle.top_moves(&position, 1).unwrap();
    assert_eq!(top[0].mv.to_string(), "g5f7");
    let evaluated = oracle.evaluate_moves(&position, &[top[0].mv]).unwrap();
    assert_eq!(evaluated.len(), 1);
}
