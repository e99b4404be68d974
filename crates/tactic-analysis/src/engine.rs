//! UCI engine wrapper used as the move-ranking oracle.

use crate::Evaluation;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Lines read while waiting for `uciok`, `readyok` or `bestmove` before the
/// engine is considered unresponsive.
pub const MAX_UCI_LINES: usize = 1000;

/// Failures talking to the oracle process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Reading from or writing to the engine process failed.
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// No executable at the configured path.
    #[error("Oracle engine not found: {0}")]
    NotFound(String),
    /// The `uci`/`isready` handshake did not complete.
    #[error("UCI handshake failed")]
    InitFailed,
    /// A reply the protocol does not allow here.
    #[error("Unexpected UCI output: {0}")]
    InvalidResponse(String),
    /// The engine process closed its output.
    #[error("Engine terminated unexpectedly")]
    Terminated,
    /// The engine's output can no longer be matched to the commands sent.
    #[error("Engine output is out of step with its commands")]
    OutOfSync,
}

impl EngineError {
    /// Returns true if the engine process is gone or unusable and must be relaunched.
    pub fn is_crash(&self) -> bool {
        match self {
            EngineError::Terminated | EngineError::OutOfSync => true,
            EngineError::Io(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}

/// One principal variation reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PvLine {
    /// 1-based rank of the line in multi-PV mode.
    pub multipv: usize,
    /// Depth of the last completed iteration.
    pub depth: u32,
    /// The evaluation of the line, from the side to move.
    pub evaluation: Evaluation,
    /// Nodes searched, 0 when not reported.
    pub nodes: u64,
    /// The principal variation in UCI notation.
    pub pv: Vec<String>,
}

impl PvLine {
    /// The first move of the variation.
    pub fn first_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }
}

/// A UCI engine process ranking moves for the oracle.
///
/// Requests are strictly sequential: every command is answered before the
/// next one is sent.
pub struct AnalysisEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    name: String,
    // Last MultiPV value sent with setoption.
    multipv: usize,
}

impl AnalysisEngine {
    /// Spawns the engine and performs the UCI handshake.
    ///
    /// A bare command name such as `stockfish` is resolved through `PATH`;
    /// anything with a directory component must exist.
    ///
    /// # Arguments
    ///
    /// * `engine_path` - Command name or path of the UCI engine executable
    ///
    /// # Returns
    ///
    /// An engine that has answered `uciok` and `readyok`.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound` if an explicit engine path doesn't exist
    /// - `EngineError::Io` if the engine process fails to start
    /// - `EngineError::InitFailed` if the handshake does not complete
    pub fn new(engine_path: &str) -> Result<Self, EngineError> {
        let path = Path::new(engine_path);
        if path.components().count() > 1 && !path.exists() {
            return Err(EngineError::NotFound(engine_path.to_string()));
        }

        let mut process = Command::new(engine_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EngineError::NotFound(engine_path.to_string()),
                _ => EngineError::Io(e),
            })?;

        let stdin = process.stdin.take().ok_or(EngineError::InitFailed)?;
        let stdout = process.stdout.take().ok_or(EngineError::InitFailed)?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            name: String::new(),
            multipv: 1,
        };
        engine.init_uci()?;
        Ok(engine)
    }

    fn init_uci(&mut self) -> Result<(), EngineError> {
        self.send_command("uci")?;

        let mut name = String::new();
        let acknowledged = self.read_until(|line| {
            if let Some(id) = line.strip_prefix("id name ") {
                name = id.to_string();
            }
            line == "uciok"
        })?;
        if !acknowledged {
            return Err(EngineError::InitFailed);
        }

        if name.is_empty() {
            name.push_str("unnamed engine");
        }
        self.name = name;
        self.wait_ready()
    }

    /// The `id name` the engine announced.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Searches a position and returns up to `multipv` lines, best first.
    ///
    /// # Arguments
    ///
    /// * `fen` - Position in FEN notation
    /// * `depth` - Search depth passed to `go depth`
    /// * `multipv` - Number of principal variations to ask for (at least 1)
    ///
    /// # Returns
    ///
    /// The last reported line for each PV rank, ordered by rank. The engine
    /// may report fewer lines than asked for.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidResponse` if no `bestmove` arrives within
    ///   [`MAX_UCI_LINES`] lines; the search is stopped and drained first
    /// - `EngineError::OutOfSync` if the stopped search never ends
    /// - `EngineError::Terminated` or `EngineError::Io` if the process is gone
    pub fn analyze_fen(
        &mut self,
        fen: &str,
        depth: u32,
        multipv: usize,
    ) -> Result<Vec<PvLine>, EngineError> {
        self.set_multipv(multipv.max(1))?;
        self.send_command(&format!("position fen {}", fen))?;
        self.run_search(&format!("go depth {}", depth))
    }

    /// Searches a position with the root restricted to a single move.
    ///
    /// # Arguments
    ///
    /// * `fen` - Position in FEN notation
    /// * `uci_move` - The only root move searched, in UCI notation
    /// * `depth` - Search depth passed to `go depth`
    ///
    /// # Returns
    ///
    /// The line starting with `uci_move`, or `None` if the engine reported
    /// none, which happens when the move is not legal in the position.
    ///
    /// # Errors
    ///
    /// Same as [`AnalysisEngine::analyze_fen`].
    pub fn analyze_root_move(
        &mut self,
        fen: &str,
        uci_move: &str,
        depth: u32,
    ) -> Result<Option<PvLine>, EngineError> {
        self.set_multipv(1)?;
        self.send_command(&format!("position fen {}", fen))?;
        let lines = self.run_search(&format!("go depth {} searchmoves {}", depth, uci_move))?;
        Ok(lines
            .into_iter()
            .next()
            .filter(|line| line.first_move() == Some(uci_move)))
    }

    fn set_multipv(&mut self, multipv: usize) -> Result<(), EngineError> {
        if self.multipv != multipv {
            self.send_command(&format!("setoption name MultiPV value {}", multipv))?;
            self.wait_ready()?;
            self.multipv = multipv;
        }
        Ok(())
    }

    /// Runs a `go` command and collects the final line for each PV rank.
    fn run_search(&mut self, go: &str) -> Result<Vec<PvLine>, EngineError> {
        self.send_command(go)?;

        let mut lines: Vec<PvLine> = Vec::new();
        let finished = self.read_until(|line| {
            if !line.starts_with("info ") {
                return line.starts_with("bestmove");
            }
            if let Some(parsed) = Self::parse_info_line(line) {
                match lines.iter_mut().find(|l| l.multipv == parsed.multipv) {
                    Some(existing) => *existing = parsed,
                    None => lines.push(parsed),
                }
            }
            false
        })?;
        if !finished {
            self.abort_search()?;
            return Err(EngineError::InvalidResponse(format!(
                "no bestmove after {} lines",
                MAX_UCI_LINES
            )));
        }

        lines.sort_by_key(|l| l.multipv);
        debug!("{} returned {} lines for '{}'", self.name, lines.len(), go);
        Ok(lines)
    }

    /// Parses a UCI info line carrying a score and a principal variation.
    ///
    /// Format: "info depth X multipv K score cp Y nodes Z pv move1 move2 ..."
    /// Bound scores and lines without a PV are ignored.
    fn parse_info_line(line: &str) -> Option<PvLine> {
        let mut tokens = line.split_whitespace();
        let mut depth: Option<u32> = None;
        let mut multipv = 1;
        let mut cp: Option<i32> = None;
        let mut mate: Option<i32> = None;
        let mut nodes = 0;
        let mut pv = Vec::new();

        while let Some(token) = tokens.next() {
            match token {
                "depth" => depth = tokens.next().and_then(|v| v.parse().ok()),
                "multipv" => multipv = tokens.next().and_then(|v| v.parse().ok()).unwrap_or(1),
                "nodes" => nodes = tokens.next().and_then(|v| v.parse().ok()).unwrap_or(0),
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|v| v.parse().ok());
                    match kind {
                        Some("cp") => cp = value,
                        Some("mate") => mate = value,
                        _ => {}
                    }
                }
                "lowerbound" | "upperbound" => return None,
                // The variation runs to the end of the line.
                "pv" => pv = tokens.by_ref().map(str::to_string).collect(),
                _ => {}
            }
        }

        if pv.is_empty() {
            return None;
        }
        Some(PvLine {
            multipv,
            depth: depth?,
            evaluation: Evaluation::from_uci_score(cp, mate)?,
            nodes,
            pv,
        })
    }

    /// Stops the running search and discards its output up to `bestmove`,
    /// so the next request does not read a stale reply.
    fn abort_search(&mut self) -> Result<(), EngineError> {
        debug!("Stopping unfinished search on {}", self.name);
        self.send_command("stop")?;
        if self.read_until(|line| line.starts_with("bestmove"))? {
            Ok(())
        } else {
            Err(EngineError::OutOfSync)
        }
    }

    fn wait_ready(&mut self) -> Result<(), EngineError> {
        self.send_command("isready")?;
        if self.read_until(|line| line == "readyok")? {
            Ok(())
        } else {
            Err(EngineError::InitFailed)
        }
    }

    /// Feeds output lines to `done` until it returns true.
    ///
    /// Returns false if [`MAX_UCI_LINES`] lines went by first.
    fn read_until(&mut self, mut done: impl FnMut(&str) -> bool) -> Result<bool, EngineError> {
        for _ in 0..MAX_UCI_LINES {
            let line = self.read_line()?;
            if done(&line) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn send_command(&mut self, command: &str) -> Result<(), EngineError> {
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let bytes = self.stdout.read_line(&mut line)?;
        if bytes == 0 {
            return Err(EngineError::Terminated);
        }
        Ok(line.trim().to_string())
    }
}

impl Drop for AnalysisEngine {
    fn drop(&mut self) {
        let _ = self.send_command("quit");
        let _ = self.process.wait();
    }
}
