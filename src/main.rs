mod cli;
mod config;
mod db;
mod error;
mod logic;
mod models;

use anyhow::{bail, Context};
use clap::Parser;
use cli::{Cli, Commands, EvaluateArgs, RulesetArgs};
use config::Config;
use db::Database;
use logic::rules::loader;
use logic::DecisionEngine;
use models::{EvaluationInput, EvaluationResult, RuleEntry, SlaOverrides};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON result
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init = cli.command {
        let (_, path) = Config::setup_interactive()?;
        tracing::info!(path = %path.display(), "Config written");
        return Ok(());
    }

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Evaluate(args) => run_evaluate(&config, cli.data_dir.as_ref(), args),
        Commands::Validate(args) => run_validate(&config, args),
        Commands::Rules(args) => run_rules(&config, args),
        Commands::History { limit, log } => run_history(cli.data_dir.as_ref(), limit, log),
        Commands::Init => Ok(()),
    }
}

fn run_evaluate(config: &Config, data_dir: Option<&PathBuf>, args: EvaluateArgs) -> anyhow::Result<()> {
    let input_str = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input {:?}", args.input))?;
    let input: EvaluationInput =
        serde_json::from_str(&input_str).context("Input is not a valid evaluation document")?;

    check_input(&input)?;

    let document = config
        .ruleset_document(args.ruleset.ruleset.as_deref())
        .context("Failed to load ruleset")?;

    let overrides = SlaOverrides {
        max_rules: args.max_rules,
        max_total_evaluation_ms: args.max_total_ms,
        max_rule_evaluation_ms: args.max_rule_ms,
    };
    if !overrides.is_empty() {
        tracing::debug!(?overrides, "Applying SLA overrides from command line");
    }
    let sla = overrides.apply(config.sla.into());

    let engine = DecisionEngine::new(document, sla);
    let result = engine.evaluate(&input);

    if config.history.enabled && !args.no_history {
        match Database::open(data_dir).and_then(|db| db.record_run(&input, &result)) {
            Ok(run_id) => tracing::debug!(run_id = %run_id, "Recorded evaluation"),
            Err(e) => tracing::warn!("Failed to record evaluation history: {}", e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    let status = exit_status(&result);
    if status != 0 {
        std::process::exit(status);
    }

    Ok(())
}

/// Reject inputs the engine should never see.
fn check_input(input: &EvaluationInput) -> anyhow::Result<()> {
    if input.organization_id.trim().is_empty() {
        bail!("organizationId is required");
    }
    if input.metrics.is_empty() {
        bail!("metrics must contain at least one reading");
    }
    Ok(())
}

/// 2 when the pass never started, 0 otherwise. Budget breaches mid-pass
/// still produce a usable result.
fn exit_status(result: &EvaluationResult) -> i32 {
    if result.was_aborted() {
        2
    } else {
        0
    }
}

fn run_validate(config: &Config, args: RulesetArgs) -> anyhow::Result<()> {
    let document = config
        .ruleset_document(args.ruleset.as_deref())
        .context("Failed to load ruleset")?;

    let problems = loader::structural_problems(&document);
    if !problems.is_empty() {
        println!("Ruleset is invalid:");
        for problem in &problems {
            println!("  - {}", problem);
        }
        std::process::exit(1);
    }

    let ruleset = match loader::load(&document) {
        Ok(ruleset) => ruleset,
        Err(errors) => bail!("Ruleset rejected: {:?}", errors),
    };

    println!(
        "Ruleset {} ({} rules, {} enabled)",
        ruleset.version,
        ruleset.entries.len(),
        ruleset.enabled_count()
    );

    let mut issues = 0;
    for entry in &ruleset.entries {
        if let RuleEntry::Malformed(m) = entry {
            println!("  ! {}: {}", m.id, m.reason);
            issues += 1;
        }
    }
    for id in loader::duplicate_ids(&ruleset) {
        println!("  ! duplicate rule id: {}", id);
        issues += 1;
    }

    if issues > 0 {
        println!("{} problem(s) found", issues);
        std::process::exit(1);
    }

    println!("OK");
    Ok(())
}

fn run_rules(config: &Config, args: RulesetArgs) -> anyhow::Result<()> {
    let document = config
        .ruleset_document(args.ruleset.as_deref())
        .context("Failed to load ruleset")?;

    let ruleset = match loader::load(&document) {
        Ok(ruleset) => ruleset,
        Err(errors) => bail!("Ruleset rejected: {:?}", errors),
    };

    println!(
        "{} {}",
        ruleset.name.as_deref().unwrap_or("Ruleset"),
        ruleset.version
    );
    if let Some(description) = &ruleset.description {
        println!("{}", description);
    }

    for entry in &ruleset.entries {
        let enabled = if entry.is_enabled() { "on " } else { "off" };
        match entry {
            RuleEntry::Valid(rule) => {
                let joiner = if rule.all_conditions_required { " AND " } else { " OR " };
                let conditions: Vec<String> =
                    rule.conditions.iter().map(|c| c.to_string()).collect();
                println!(
                    "  [{}] {:<28} {:<8} {}",
                    enabled,
                    rule.id,
                    rule.severity.as_str(),
                    rule.title
                );
                if !conditions.is_empty() {
                    println!("        when {}", conditions.join(joiner));
                }
            }
            RuleEntry::Malformed(m) => {
                println!("  [{}] {:<28} malformed: {}", enabled, m.id, m.reason);
            }
        }
    }

    Ok(())
}

fn run_history(data_dir: Option<&PathBuf>, limit: usize, show_log: bool) -> anyhow::Result<()> {
    let db = Database::open(data_dir).context("Failed to open history database")?;
    let runs = db.recent_runs(limit)?;

    if runs.is_empty() {
        println!("No evaluations recorded in {}", db.path().display());
        return Ok(());
    }

    for run in runs {
        let errors: Vec<&str> = run.errors.iter().map(|e| e.as_str()).collect();
        println!(
            "{}  {}  {:<14} {:<20} v{:<8} {:>3} alert(s) {:>8.2} ms {}",
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            run.id,
            run.organization_id,
            run.location(),
            run.ruleset_version,
            run.alert_count,
            run.total_evaluation_ms,
            errors.join(",")
        );

        for alert in db.run_alerts(&run.id)? {
            println!("      {:<8} {}", alert.severity.as_str(), alert.title);
        }

        if show_log {
            for entry in db.run_log(&run.id)? {
                println!(
                    "      - {:<28} {:<9} {}/{} {:>8.3} ms {}{}",
                    entry.rule_id,
                    entry.status.as_str(),
                    entry.matched_conditions,
                    entry.conditions.len(),
                    entry.elapsed_ms,
                    entry.error_code.map(|c| c.as_str()).unwrap_or(""),
                    entry
                        .message
                        .as_deref()
                        .map(|m| format!(" {}", m))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
