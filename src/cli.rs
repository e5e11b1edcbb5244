use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agro-dss",
    version,
    about = "Agronomic decision support: evaluate field telemetry against a ruleset"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override history data directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a metrics input document and print the result as JSON
    Evaluate(EvaluateArgs),
    /// Check a ruleset document for structural and per-rule problems
    Validate(RulesetArgs),
    /// List the rules of a ruleset
    Rules(RulesetArgs),
    /// Show recently recorded evaluations
    History {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Also print each run's execution log
        #[arg(long)]
        log: bool,
    },
    /// Interactive configuration setup
    Init,
}

#[derive(Args)]
pub struct RulesetArgs {
    /// Ruleset document (.json, or YAML); defaults to the configured or bundled ruleset
    #[arg(short, long)]
    pub ruleset: Option<PathBuf>,
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Evaluation input document (JSON): organizationId, optional ids, metrics
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub ruleset: RulesetArgs,

    /// Override the maximum number of enabled rules
    #[arg(long)]
    pub max_rules: Option<usize>,

    /// Override the whole-pass budget in milliseconds
    #[arg(long)]
    pub max_total_ms: Option<u64>,

    /// Override the per-rule budget in milliseconds
    #[arg(long)]
    pub max_rule_ms: Option<u64>,

    /// Do not record this evaluation in the local history
    #[arg(long)]
    pub no_history: bool,
}
