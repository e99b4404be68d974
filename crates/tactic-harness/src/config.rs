//! Configuration file loading for the tactic harness.
//!
//! Settings are read from a TOML file (`tactics.toml` by default). Every
//! field has a default, so a missing file or an empty one yields a usable
//! configuration; command-line flags override individual values afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tactic_analysis::{EvaluationOptions, MatchOptions, RestartPolicy, TimeoutPolicy};
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Harness configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Path to the UCI engine used as oracle.
    /// Defaults to "stockfish" (assumes it's in PATH).
    #[serde(default = "default_engine_path")]
    pub engine_path: String,
    /// Search depth for every oracle request. Defaults to 1.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Optional Prolog program consulted before any rule is evaluated.
    #[serde(default)]
    pub background_knowledge: Option<PathBuf>,
    /// PGN file positions are sampled from.
    #[serde(default)]
    pub pgn_path: Option<PathBuf>,
    /// File with one FEN per line; takes precedence over `pgn_path`.
    #[serde(default)]
    pub positions_path: Option<PathBuf>,
    /// Number of games sampled from the PGN file. Defaults to 10.
    #[serde(default = "default_sample_size")]
    pub num_games: usize,
    /// Positions sampled from each game. Defaults to 10.
    #[serde(default = "default_sample_size")]
    pub pos_per_game: usize,
    /// Seed for position sampling. Defaults to 1.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Maximum suggested moves per position. Defaults to 3.
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
    /// Per-query time limit in seconds. Defaults to 5.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,
    /// Value forced mates collapse to. Defaults to 2000.
    #[serde(default = "default_mate_score")]
    pub mate_score: i32,
    /// Maximum number of rules evaluated per run. Defaults to 100.
    #[serde(default = "default_tactics_limit")]
    pub tactics_limit: usize,
    /// Oracle relaunches allowed without a successful request. Defaults to 3.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Reaction to a query timeout. Defaults to aborting the rule.
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    /// Where metrics are written; `.json` selects JSON output.
    /// Defaults to "metrics_data.csv".
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_depth() -> u32 {
    1
}

fn default_sample_size() -> usize {
    10
}

fn default_seed() -> u64 {
    1
}

fn default_suggestion_limit() -> usize {
    3
}

fn default_time_limit_secs() -> u64 {
    5
}

fn default_mate_score() -> i32 {
    tactic_analysis::DEFAULT_MATE_SCORE
}

fn default_tactics_limit() -> usize {
    100
}

fn default_max_restarts() -> u32 {
    3
}

fn default_output_path() -> PathBuf {
    PathBuf::from("metrics_data.csv")
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            depth: default_depth(),
            background_knowledge: None,
            pgn_path: None,
            positions_path: None,
            num_games: default_sample_size(),
            pos_per_game: default_sample_size(),
            seed: default_seed(),
            suggestion_limit: default_suggestion_limit(),
            time_limit_secs: default_time_limit_secs(),
            mate_score: default_mate_score(),
            tactics_limit: default_tactics_limit(),
            max_restarts: default_max_restarts(),
            timeout_policy: TimeoutPolicy::default(),
            output_path: default_output_path(),
        }
    }
}

impl HarnessConfig {
    /// Loads the configuration from `path`.
    ///
    /// Returns the defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// [`ConfigError::ParseError`] if it contains invalid TOML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path, `tactics.toml` in the
    /// current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("tactics.toml")
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 {
            return Err(ConfigError::Invalid {
                field: "depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.time_limit_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "time_limit_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mate_score <= 0 {
            return Err(ConfigError::Invalid {
                field: "mate_score",
                reason: format!("must be positive, got {}", self.mate_score),
            });
        }
        Ok(())
    }

    /// Settings for the rule evaluator.
    pub fn evaluation_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            matching: MatchOptions {
                suggestion_limit: self.suggestion_limit,
                time_limit: Duration::from_secs(self.time_limit_secs),
            },
            mate_score: self.mate_score,
            timeout_policy: self.timeout_policy,
        }
    }

    /// Relaunch bounds for the oracle.
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            max_consecutive_restarts: self.max_restarts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config: HarnessConfig = toml::from_str("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.engine_path, "stockfish");
        assert_eq!(config.depth, 1);
        assert_eq!(config.num_games, 10);
        assert_eq!(config.pos_per_game, 10);
        assert_eq!(config.seed, 1);
        assert_eq!(config.suggestion_limit, 3);
        assert_eq!(config.time_limit_secs, 5);
        assert_eq!(config.mate_score, 2000);
        assert_eq!(config.tactics_limit, 100);
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.timeout_policy, TimeoutPolicy::AbortRule);
        assert_eq!(config.output_path, PathBuf::from("metrics_data.csv"));
        assert!(config.pgn_path.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let toml_content = r#"
engine_path = "/opt/stockfish/stockfish"
depth = 4
pgn_path = "data/games.pgn"
background_knowledge = "bk.pl"
suggestion_limit = 5
timeout_policy = "skip_position"
output_path = "out/metrics.json"
"#;
        let config: HarnessConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.engine_path, "/opt/stockfish/stockfish");
        assert_eq!(config.depth, 4);
        assert_eq!(config.pgn_path, Some(PathBuf::from("data/games.pgn")));
        assert_eq!(config.background_knowledge, Some(PathBuf::from("bk.pl")));
        assert_eq!(config.timeout_policy, TimeoutPolicy::SkipPosition);
        assert_eq!(config.seed, 1);

        let options = config.evaluation_options();
        assert_eq!(options.matching.suggestion_limit, 5);
        assert_eq!(options.matching.time_limit, Duration::from_secs(5));
        assert_eq!(options.timeout_policy, TimeoutPolicy::SkipPosition);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result: Result<HarnessConfig, _> = toml::from_str("timeout_policy = \"retry\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("tactics.toml")).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tactics.toml");
        std::fs::write(&path, "seed = 42\nmax_restarts = 0\n").unwrap();
        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.restart_policy().max_consecutive_restarts, 0);

        std::fs::write(&path, "depth = 0\n").unwrap();
        match HarnessConfig::load(&path) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "depth"),
            other => panic!("Expected Invalid, got {:?}", other),
        }

        std::fs::write(&path, "depth = [").unwrap();
        assert!(matches!(
            HarnessConfig::load(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_path() {
        assert_eq!(HarnessConfig::config_path(), PathBuf::from("tactics.toml"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = HarnessConfig {
            pgn_path: Some(PathBuf::from("games.pgn")),
            seed: 7,
            ..HarnessConfig::default()
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: HarnessConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }
}
