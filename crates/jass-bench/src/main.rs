use std::path::PathBuf;

use clap::Parser;

use jass_bench::arena::ArenaRunner;
use jass_bench::config::{ArenaConfig, ResolvedOutputs};
use jass_bench::logging::init_logging;

/// Arena harness pitting Jass card-play agents against each other.
#[derive(Debug, Parser)]
#[command(
    name = "jass-bench",
    author,
    version,
    about = "Deterministic Jass arena harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/arena.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of deals to play.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Override the RNG seed for deal generation.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Play every deal once instead of replaying it with partnerships swapped.
    #[arg(long)]
    no_swap: bool,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ArenaConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(games) = cli.games {
        config.deals.games = games;
    }

    if let Some(seed) = cli.seed {
        config.deals.seed = Some(seed);
    }

    if cli.no_swap {
        config.deals.swap_teams = false;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let games = config.deals.games;
    let names: Vec<&str> = config.agents.iter().map(|a| a.name.as_str()).collect();

    println!(
        "Loaded configuration '{run_id}': {} ({games} game{})",
        names.join(" vs "),
        if games == 1 { "" } else { "s" }
    );

    let _logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = ArenaRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: arena execution skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Arena complete for '{run_id}': {} games × {} orientations → {} rows at {}",
        summary.games_played,
        summary.orientations,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }

    Ok(())
}
