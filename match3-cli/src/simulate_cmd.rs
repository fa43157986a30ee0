//! Simulate command - batch autoplay for level balancing
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_levels(), report_results()
//! - Level 3: simulation (match3-sim)
//! - Level 4: formatting utilities

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use match3_core::{GameConfig, Level, Strategy};
use match3_sim::{simulate_catalog, LevelReport, SimConfig};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SimulateArgs {
    /// Level JSON file (defaults to the demo level)
    #[arg(long, value_name = "FILE", conflicts_with = "config")]
    pub level: Option<PathBuf>,

    /// Game config JSON file; every level in its catalog is simulated
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sessions per level
    #[arg(long, default_value = "100")]
    pub games: usize,

    /// Play sessions in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Base seed; session i uses seed + i
    #[arg(long)]
    pub seed: Option<u64>,

    /// Swap limit per session
    #[arg(long, default_value = "100")]
    pub max_moves: u32,

    /// Pick any potential match instead of the largest
    #[arg(long)]
    pub random: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run simulate command
///
/// 1. Load the level or the catalog
/// 2. Simulate every level
/// 3. Report results
pub fn run(args: SimulateArgs) -> Result<()> {
    let levels = load_levels(&args)?;
    let config = sim_config(&args);

    tracing::info!(
        "Simulating {} level(s), {} games each (parallel={})",
        levels.len(),
        config.games,
        config.parallel
    );

    let reports = simulate_catalog(&levels, &config);
    report_results(&reports, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn load_levels(args: &SimulateArgs) -> Result<Vec<Level>> {
    match &args.config {
        Some(path) => {
            let config = GameConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            if config.levels.is_empty() {
                anyhow::bail!("Config {} has no levels", path.display());
            }
            Ok(config.levels)
        }
        None => Ok(vec![crate::load_level(args.level.as_deref())?]),
    }
}

fn sim_config(args: &SimulateArgs) -> SimConfig {
    let strategy = if args.random { Strategy::Random } else { Strategy::Greedy };
    let mut config = SimConfig::new(args.games)
        .with_parallel(args.parallel)
        .with_max_moves(args.max_moves)
        .with_strategy(strategy);
    config.seed = args.seed;
    config
}

fn report_results(reports: &[LevelReport], args: &SimulateArgs) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(reports).context("Failed to serialize results")?;
        println!("{}", json);
    } else {
        for report in reports {
            print_text_report(report);
        }
    }
    Ok(())
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_text_report(report: &LevelReport) {
    let result = &report.result;

    println!("\n=== Level {}: {} ===", report.index, report.name);
    println!("Sessions:   {}", result.sessions_played);
    println!(
        "Completed:  {} ({:.1}%)",
        result.completed,
        result.completion_rate() * 100.0
    );
    println!(
        "Failed:     {} ({:.1}%)",
        result.failed,
        result.failure_rate() * 100.0
    );
    println!("Abandoned:  {}", result.abandoned);
    if result.faulted > 0 {
        println!("Faulted:    {}", result.faulted);
    }
    println!("Avg moves:  {:.1}", result.avg_moves());
    println!("Avg score:  {:.0}", result.avg_score());
    println!("Avg stars:  {:.2}", result.avg_stars());
}
