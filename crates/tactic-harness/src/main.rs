use anyhow::Context;
use clap::{Parser, Subcommand};
use logic::Machine;
use std::path::{Path, PathBuf};
use tactic_analysis::{
    knowledge, EngineOracle, Position, RuleEvaluator, RuleOutcome, SupervisedOracle, Vocabulary,
};
use tactic_harness::config::HarnessConfig;
use tactic_harness::{labels, positions, report, rules};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "tactics")]
#[command(about = "Score chess tactic rules against a UCI engine")]
struct Cli {
    /// Configuration file (defaults to tactics.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Maximum log level
    #[arg(long, global = true, default_value = "info")]
    log: Level,
    /// UCI engine executable
    #[arg(long, global = true)]
    engine: Option<String>,
    /// Search depth for engine requests
    #[arg(long, global = true)]
    depth: Option<u32>,
    /// PGN file to sample positions from
    #[arg(long, global = true)]
    pgn: Option<PathBuf>,
    /// File with one FEN per line
    #[arg(long, global = true)]
    positions: Option<PathBuf>,
    /// Seed for position sampling
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every rule in a file and write its metrics
    Metrics {
        /// File with one rule per line
        rules_file: PathBuf,
        /// Maximum number of rules to evaluate
        #[arg(long)]
        tactics_limit: Option<usize>,
        /// Metrics output file (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Prolog program consulted before evaluation
        #[arg(long)]
        background: Option<PathBuf>,
    },
    /// Write labelled move examples from engine rankings
    GenExamples {
        /// Output CSV file
        out: PathBuf,
        /// Negative examples per position
        #[arg(long, default_value = "3")]
        ratio: usize,
    },
    /// Print the fact encoding of a position
    Facts {
        /// Position in FEN
        fen: String,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<HarnessConfig> {
        let path = self.config.clone().unwrap_or_else(HarnessConfig::config_path);
        let mut config = HarnessConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        if let Some(engine) = &self.engine {
            config.engine_path = engine.clone();
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(pgn) = &self.pgn {
            config.pgn_path = Some(pgn.clone());
        }
        if let Some(positions) = &self.positions {
            config.positions_path = Some(positions.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log).init();

    let mut config = cli.load_config()?;

    match cli.command {
        Commands::Metrics {
            rules_file,
            tactics_limit,
            output,
            background,
        } => {
            if let Some(limit) = tactics_limit {
                config.tactics_limit = limit;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if background.is_some() {
                config.background_knowledge = background;
            }
            config.validate()?;
            run_metrics(&config, &rules_file)
        }
        Commands::GenExamples { out, ratio } => {
            config.validate()?;
            run_gen_examples(&config, &out, ratio)
        }
        Commands::Facts { fen } => {
            let position = Position::from_fen(&fen)?;
            println!("{}", position.encode().to_term());
            Ok(())
        }
    }
}

fn run_metrics(config: &HarnessConfig, rules_file: &Path) -> anyhow::Result<()> {
    let mut machine = Machine::new();
    knowledge::install(&mut machine);
    if let Some(path) = &config.background_knowledge {
        let loaded = machine
            .consult_file(path)
            .with_context(|| format!("Failed to consult {}", path.display()))?;
        info!("Loaded {} background clauses from {}", loaded, path.display());
    }

    let rules = rules::read_rules(rules_file, &Vocabulary::default())
        .with_context(|| format!("Failed to read rules from {}", rules_file.display()))?;
    let positions = positions::load(config)?;
    info!(
        "Evaluating {} of {} rules over {} positions",
        rules.len().min(config.tactics_limit),
        rules.len(),
        positions.len()
    );

    let engine_path = config.engine_path.clone();
    let depth = config.depth;
    let mut oracle = SupervisedOracle::new(
        move || EngineOracle::launch(&engine_path, depth),
        config.restart_policy(),
    );
    let mut evaluator =
        RuleEvaluator::new(&mut machine, &mut oracle, config.evaluation_options());

    let mut metrics = Vec::new();
    for rule in rules.iter().take(config.tactics_limit) {
        match evaluator.evaluate(rule, &positions)? {
            RuleOutcome::Completed(rule_metrics) => metrics.push(rule_metrics),
            RuleOutcome::Aborted {
                rule,
                positions_seen,
                reason,
            } => warn!(
                "Discarded {} after {} positions: {}",
                rule, positions_seen, reason
            ),
        }
    }
    info!("% Calculated metrics for {} tactics", metrics.len());
    if oracle.restarts() > 0 {
        warn!("Engine was relaunched {} times", oracle.restarts());
    }

    report::write_metrics(&config.output_path, &metrics)?;
    info!("Wrote metrics to {}", config.output_path.display());
    Ok(())
}

fn run_gen_examples(config: &HarnessConfig, out: &Path, ratio: usize) -> anyhow::Result<()> {
    let positions = positions::load(config)?;
    let engine_path = config.engine_path.clone();
    let depth = config.depth;
    let mut oracle = SupervisedOracle::new(
        move || EngineOracle::launch(&engine_path, depth),
        config.restart_policy(),
    );
    let examples = labels::label_positions(&mut oracle, &positions, ratio)?;
    report::write_examples(out, &examples)?;
    info!(
        "Wrote {} examples from {} positions to {}",
        examples.len(),
        positions.len(),
        out.display()
    );
    Ok(())
}
