//! Position sources: FEN lists and seeded PGN sampling.

use crate::config::HarnessConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use pgn_reader::{BufferedReader, RawHeader, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position as _};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tactic_analysis::{Position, PositionParseError};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from reading positions.
#[derive(Error, Debug)]
pub enum PositionSourceError {
    /// The source file could not be read.
    #[error("Failed to read positions: {0}")]
    Io(#[from] std::io::Error),
    /// A line of a FEN list is not valid FEN.
    #[error("Line {line}: {source}")]
    InvalidFen {
        /// 1-based line number.
        line: usize,
        /// The parse error.
        #[source]
        source: PositionParseError,
    },
    /// Neither a FEN list nor a PGN file was configured.
    #[error("No position source configured (set positions_path or pgn_path)")]
    NoSource,
}

/// How many games and positions to draw from a PGN file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    /// Games drawn from the file.
    pub num_games: usize,
    /// Positions drawn from each game.
    pub pos_per_game: usize,
    /// Seed for the draw.
    pub seed: u64,
}

impl Sampling {
    /// Sampling settings from the configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            num_games: config.num_games,
            pos_per_game: config.pos_per_game,
            seed: config.seed,
        }
    }
}

/// Loads the evaluation positions named by the configuration.
///
/// A FEN list takes precedence over PGN sampling.
pub fn load(config: &HarnessConfig) -> Result<Vec<Position>, PositionSourceError> {
    if let Some(path) = &config.positions_path {
        debug!("Reading positions from {}", path.display());
        return read_fen_list(path);
    }
    if let Some(path) = &config.pgn_path {
        debug!("Sampling positions from {}", path.display());
        return sample_pgn_file(path, Sampling::from_config(config));
    }
    Err(PositionSourceError::NoSource)
}

/// Reads one FEN per line, skipping blank lines and `#` comments.
pub fn read_fen_list(path: &Path) -> Result<Vec<Position>, PositionSourceError> {
    let content = std::fs::read_to_string(path)?;
    parse_fen_list(&content)
}

/// Parses the contents of a FEN list.
pub fn parse_fen_list(content: &str) -> Result<Vec<Position>, PositionSourceError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            Position::from_fen(line).map_err(|source| PositionSourceError::InvalidFen {
                line: i + 1,
                source,
            })
        })
        .collect()
}

/// Samples positions from the games in a PGN file.
pub fn sample_pgn_file(path: &Path, sampling: Sampling) -> Result<Vec<Position>, PositionSourceError> {
    let games = read_games(File::open(path)?)?;
    Ok(sample_games(&games, sampling))
}

/// Samples positions from PGN text.
pub fn sample_pgn(pgn: &str, sampling: Sampling) -> Result<Vec<Position>, PositionSourceError> {
    let games = read_games(pgn.as_bytes())?;
    Ok(sample_games(&games, sampling))
}

/// Draws `num_games` games, then up to `pos_per_game` positions from each.
///
/// The same seed always gives the same sample.
pub fn sample_games(games: &[Vec<Position>], sampling: Sampling) -> Vec<Position> {
    let mut rng = StdRng::seed_from_u64(sampling.seed);
    let mut positions = Vec::new();
    for candidates in games.choose_multiple(&mut rng, sampling.num_games) {
        positions.extend(
            candidates
                .choose_multiple(&mut rng, sampling.pos_per_game)
                .cloned(),
        );
    }
    positions
}

/// Replays every game in a PGN stream.
///
/// Each entry holds the positions after each move of one game except the
/// last. Variations are skipped; a game whose movetext stops being legal
/// keeps the positions before the illegal move.
pub fn read_games<R: Read>(reader: R) -> io::Result<Vec<Vec<Position>>> {
    let mut reader = BufferedReader::new(reader);
    let mut replay = GameReplay::default();
    let mut games = Vec::new();
    while let Some(positions) = reader.read_game(&mut replay)? {
        games.push(positions);
    }
    debug!("Read {} games", games.len());
    Ok(games)
}

#[derive(Default)]
struct GameReplay {
    chess: Chess,
    positions: Vec<Position>,
    stopped: bool,
}

impl Visitor for GameReplay {
    type Result = Vec<Position>;

    fn begin_game(&mut self) {
        self.chess = Chess::default();
        self.positions.clear();
        self.stopped = false;
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        if key != b"FEN" {
            return;
        }
        let start: Option<Chess> = Fen::from_ascii(value.as_bytes())
            .ok()
            .and_then(|fen| fen.into_position(CastlingMode::Standard).ok());
        match start {
            Some(chess) => self.chess = chess,
            None => {
                warn!("Ignoring game with unusable FEN header");
                self.stopped = true;
            }
        }
    }

    fn san(&mut self, san_plus: SanPlus) {
        if self.stopped {
            return;
        }
        match san_plus.san.to_move(&self.chess) {
            Ok(mv) => {
                self.chess.play_unchecked(&mv);
                self.positions.push(Position::from_chess(&self.chess));
            }
            Err(_) => {
                warn!("Stopping game replay at illegal move '{}'", san_plus);
                self.stopped = true;
            }
        }
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn end_game(&mut self) -> Self::Result {
        let mut positions = std::mem::take(&mut self.positions);
        positions.pop();
        positions
    }
}
