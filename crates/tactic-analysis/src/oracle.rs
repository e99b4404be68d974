//! Move-ranking oracles and crash supervision.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::{AnalysisEngine, EngineError};
use crate::evaluation::Evaluation;
use crate::position::{Move, Position};

/// A move with the oracle's evaluation of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMove {
    /// Evaluation from the side to move.
    pub evaluation: Evaluation,
    /// The move.
    pub mv: Move,
}

/// Something that ranks and evaluates moves.
pub trait Oracle {
    /// Returns up to `n` distinct best moves, best first.
    ///
    /// # Arguments
    ///
    /// * `position` - The position to search
    /// * `n` - Maximum number of moves to return
    ///
    /// # Returns
    ///
    /// Ranked moves with evaluations from the side to move. Fewer than `n`
    /// when the position has fewer legal moves.
    fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, EngineError>;

    /// Evaluates each move with the search restricted to it.
    ///
    /// # Arguments
    ///
    /// * `position` - The position the moves are played from
    /// * `moves` - Moves to evaluate
    ///
    /// # Returns
    ///
    /// One entry per evaluated move, in the order given. Moves the oracle
    /// cannot evaluate are left out, so the result may be shorter than
    /// `moves`.
    fn evaluate_moves(
        &mut self,
        position: &Position,
        moves: &[Move],
    ) -> Result<Vec<RankedMove>, EngineError>;
}

/// An [`Oracle`] backed by a UCI engine searching to a fixed depth.
pub struct EngineOracle {
    engine: AnalysisEngine,
    depth: u32,
}

impl EngineOracle {
    /// Launches the engine at `engine_path`.
    ///
    /// # Arguments
    ///
    /// * `engine_path` - Command name or path of the UCI engine executable
    /// * `depth` - Search depth used for every request
    ///
    /// # Errors
    ///
    /// Any launch error from [`AnalysisEngine::new`].
    pub fn launch(engine_path: &str, depth: u32) -> Result<Self, EngineError> {
        let engine = AnalysisEngine::new(engine_path)?;
        info!("Launched {} (depth {})", engine.name(), depth);
        Ok(Self { engine, depth })
    }

    /// Returns the engine's name.
    pub fn name(&self) -> &str {
        self.engine.name()
    }
}

impl Oracle for EngineOracle {
    fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, EngineError> {
        let lines = self.engine.analyze_fen(&position.fen(), self.depth, n)?;
        Ok(lines
            .iter()
            .filter_map(|line| {
                let mv = line.first_move()?.parse().ok()?;
                Some(RankedMove {
                    evaluation: line.evaluation,
                    mv,
                })
            })
            .take(n)
            .collect())
    }

    fn evaluate_moves(
        &mut self,
        position: &Position,
        moves: &[Move],
    ) -> Result<Vec<RankedMove>, EngineError> {
        let fen = position.fen();
        let mut ranked = Vec::with_capacity(moves.len());
        for &mv in moves {
            let uci = position.to_uci(mv);
            match self.engine.analyze_root_move(&fen, &uci, self.depth)? {
                Some(line) => ranked.push(RankedMove {
                    evaluation: line.evaluation,
                    mv,
                }),
                None => debug!("No evaluation for {} in {}", uci, fen),
            }
        }
        Ok(ranked)
    }
}

/// Errors from a supervised oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle crashed during the request and has been relaunched.
    #[error("Oracle crashed: {0}")]
    Crashed(#[source] EngineError),
    /// The oracle failed without crashing.
    #[error("Oracle request failed: {0}")]
    Failed(#[source] EngineError),
    /// Relaunching kept failing.
    #[error("Oracle could not be relaunched after {attempts} attempts: {last}")]
    RestartsExhausted {
        /// Consecutive launch attempts made.
        attempts: u32,
        /// The last launch error.
        #[source]
        last: EngineError,
    },
}

impl OracleError {
    /// Returns true if only the in-flight request was lost.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, OracleError::RestartsExhausted { .. })
    }
}

/// Bounds on relaunching a crashed oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Launches allowed without a successful request in between.
    pub max_consecutive_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_restarts: 3,
        }
    }
}

/// Owns an oracle process and relaunches it when it crashes.
///
/// The launcher is called lazily on first use and after every crash. A
/// request that crashes the oracle is not retried: it fails with
/// [`OracleError::Crashed`] and the next request goes to the new process.
pub struct SupervisedOracle<O, L> {
    launcher: L,
    oracle: Option<O>,
    policy: RestartPolicy,
    consecutive_launches: u32,
    restarts: u32,
}

impl<O, L> SupervisedOracle<O, L>
where
    O: Oracle,
    L: FnMut() -> Result<O, EngineError>,
{
    /// Creates a supervisor; nothing is launched until the first request.
    ///
    /// # Arguments
    ///
    /// * `launcher` - Starts a fresh oracle; called lazily and after crashes
    /// * `policy` - Bounds on consecutive launches
    pub fn new(launcher: L, policy: RestartPolicy) -> Self {
        Self {
            launcher,
            oracle: None,
            policy,
            consecutive_launches: 0,
            restarts: 0,
        }
    }

    /// Number of relaunches after crashes so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Returns true if an oracle process is currently held.
    pub fn is_running(&self) -> bool {
        self.oracle.is_some()
    }

    /// Ranks the best `n` moves. See [`Oracle::top_moves`].
    ///
    /// # Errors
    ///
    /// - `OracleError::Crashed` if the oracle had to be relaunched
    /// - `OracleError::Failed` if the request failed but the process is usable
    /// - `OracleError::RestartsExhausted` if no oracle could be launched
    pub fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, OracleError> {
        self.call(|oracle| oracle.top_moves(position, n))
    }

    /// Evaluates given moves. See [`Oracle::evaluate_moves`].
    ///
    /// # Errors
    ///
    /// Same as [`SupervisedOracle::top_moves`].
    pub fn evaluate_moves(
        &mut self,
        position: &Position,
        moves: &[Move],
    ) -> Result<Vec<RankedMove>, OracleError> {
        self.call(|oracle| oracle.evaluate_moves(position, moves))
    }

    fn call<T>(
        &mut self,
        request: impl FnOnce(&mut O) -> Result<T, EngineError>,
    ) -> Result<T, OracleError> {
        let oracle = match self.oracle.take() {
            Some(oracle) => oracle,
            None => self.launch()?,
        };
        match request(self.oracle.insert(oracle)) {
            Ok(value) => {
                self.consecutive_launches = 0;
                Ok(value)
            }
            Err(e) if e.is_crash() => {
                warn!("Oracle crashed: {}", e);
                self.oracle = None;
                self.restarts += 1;
                let fresh = self.launch()?;
                self.oracle = Some(fresh);
                Err(OracleError::Crashed(e))
            }
            Err(e) => Err(OracleError::Failed(e)),
        }
    }

    fn launch(&mut self) -> Result<O, OracleError> {
        loop {
            self.consecutive_launches += 1;
            match (self.launcher)() {
                Ok(oracle) => return Ok(oracle),
                Err(e) if self.consecutive_launches > self.policy.max_consecutive_restarts => {
                    return Err(OracleError::RestartsExhausted {
                        attempts: self.consecutive_launches,
                        last: e,
                    });
                }
                Err(e) => warn!(
                    "Oracle launch attempt {} failed: {}",
                    self.consecutive_launches, e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Ranks legal moves in generation order; crashes on the listed calls.
    struct ScriptedOracle {
        calls: Rc<Cell<u32>>,
        crash_on: Vec<u32>,
    }

    impl Oracle for ScriptedOracle {
        fn top_moves(&mut self, position: &Position, n: usize) -> Result<Vec<RankedMove>, EngineError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.crash_on.contains(&call) {
                return Err(EngineError::Terminated);
            }
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

        fn evaluate_moves(
            &mut self,
            _position: &Position,
            moves: &[Move],
        ) -> Result<Vec<RankedMove>, EngineError> {
            Ok(moves
                .iter()
                .map(|&mv| RankedMove {
                    evaluation: Evaluation::Centipawns(0),
                    mv,
                })
                .collect())
        }
    }

    #[test]
    fn test_lazy_launch() {
        let launches = Cell::new(0);
        let calls = Rc::new(Cell::new(0));
        let mut oracle = SupervisedOracle::new(
            || {
                launches.set(launches.get() + 1);
                Ok(ScriptedOracle {
                    calls: Rc::clone(&calls),
                    crash_on: vec![],
                })
            },
            RestartPolicy::default(),
        );
        assert!(!oracle.is_running());
        let moves = oracle.top_moves(&Position::starting(), 3).unwrap();
        assert_eq!(moves.len(), 3);
        assert!(oracle.is_running());
        oracle.top_moves(&Position::starting(), 1).unwrap();
        drop(oracle);
        assert_eq!(launches.get(), 1);
    }

    #[test]
    fn test_relaunches_once_per_crash() {
        let launches = Cell::new(0);
        let calls = Rc::new(Cell::new(0));
        let mut oracle = SupervisedOracle::new(
            || {
                launches.set(launches.get() + 1);
                Ok(ScriptedOracle {
                    calls: Rc::clone(&calls),
                    crash_on: vec![2],
                })
            },
            RestartPolicy::default(),
        );
        let position = Position::starting();
        assert!(oracle.top_moves(&position, 1).is_ok());
        let crashed = oracle.top_moves(&position, 1);
        assert!(matches!(crashed, Err(OracleError::Crashed(EngineError::Terminated))));
        assert!(crashed.unwrap_err().is_recoverable());
        assert!(oracle.top_moves(&position, 1).is_ok());
        assert_eq!(oracle.restarts(), 1);
        drop(oracle);
        assert_eq!(launches.get(), 2);
    }

    #[test]
    fn test_gives_up_after_restart_budget() {
        let launches = Cell::new(0);
        let mut oracle = SupervisedOracle::new(
            || -> Result<ScriptedOracle, EngineError> {
                launches.set(launches.get() + 1);
                Err(EngineError::InitFailed)
            },
            RestartPolicy {
                max_consecutive_restarts: 2,
            },
        );
        let result = oracle.top_moves(&Position::starting(), 1);
        match result {
            Err(OracleError::RestartsExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected RestartsExhausted, got {:?}", other.map(|_| ())),
        }
        drop(oracle);
        assert_eq!(launches.get(), 3);
    }

    #[test]
    fn test_non_crash_errors_keep_process() {
        struct Broken;
        impl Oracle for Broken {
            fn top_moves(&mut self, _: &Position, _: usize) -> Result<Vec<RankedMove>, EngineError> {
                Err(EngineError::InvalidResponse("garbled".to_string()))
            }
            fn evaluate_moves(&mut self, _: &Position, _: &[Move]) -> Result<Vec<RankedMove>, EngineError> {
                Ok(vec![])
            }
        }
        let mut oracle = SupervisedOracle::new(|| Ok(Broken), RestartPolicy::default());
        let result = oracle.top_moves(&Position::starting(), 1);
        assert!(matches!(result, Err(OracleError::Failed(_))));
        assert!(oracle.is_running());
        assert_eq!(oracle.restarts(), 0);
    }

    #[test]
    fn test_out_of_sync_output_relaunches() {
        struct Desynced;
        impl Oracle for Desynced {
            fn top_moves(&mut self, _: &Position, _: usize) -> Result<Vec<RankedMove>, EngineError> {
                Err(EngineError::OutOfSync)
            }
            fn evaluate_moves(&mut self, _: &Position, _: &[Move]) -> Result<Vec<RankedMove>, EngineError> {
                Ok(vec![])
            }
        }
        let launches = Cell::new(0);
        let mut oracle = SupervisedOracle::new(
            || {
                launches.set(launches.get() + 1);
                Ok(Desynced)
            },
            RestartPolicy::default(),
        );
        let result = oracle.top_moves(&Position::starting(), 1);
        assert!(matches!(result, Err(OracleError::Crashed(EngineError::OutOfSync))));
        assert_eq!(oracle.restarts(), 1);
        drop(oracle);
        assert_eq!(launches.get(), 2);
    }
}
