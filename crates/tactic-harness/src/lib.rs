//! Command-line harness for evaluating chess tactic rules.
//!
//! The `tactics` binary reads candidate rules from a file, matches each one
//! against a set of positions, scores the suggested moves with a UCI engine
//! and writes one row of metrics per rule. It can also generate labelled
//! move examples and print the fact encoding of a position.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with per-field defaults
//! - [`positions`]: FEN lists and seeded PGN sampling
//! - [`rules`]: rule-file reading and body normalization
//! - [`report`]: CSV and JSON writers
//! - [`labels`]: labelled example generation

pub mod config;
pub mod labels;
pub mod positions;
pub mod report;
pub mod rules;
