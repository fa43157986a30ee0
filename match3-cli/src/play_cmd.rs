//! Play command - autoplay one level
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_engine(), play(), report_results()
//! - Level 3: event printing
//! - Level 4: formatting utilities

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use match3_core::{AutoPlayer, Event, GameConfig, Level, Match3Engine, PlaySummary, Strategy};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct PlayArgs {
    /// Level JSON file (defaults to the demo level)
    #[arg(long, value_name = "FILE")]
    pub level: Option<PathBuf>,

    /// Random seed for the board and the bot
    #[arg(long)]
    pub seed: Option<u64>,

    /// Swap limit before the level is abandoned
    #[arg(long, default_value = "100")]
    pub max_moves: u32,

    /// Pick any potential match instead of the largest
    #[arg(long)]
    pub random: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Print every gameplay event as a JSON line
    #[arg(long)]
    pub events: bool,
}

/// Play result with the final board
#[derive(Serialize)]
struct PlayReport {
    level: String,
    seed: Option<u64>,
    #[serde(flatten)]
    summary: PlaySummary,
    board: String,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run play command
///
/// 1. Load the level and start an engine
/// 2. Autoplay until the level ends
/// 3. Report results
pub fn run(args: PlayArgs) -> Result<()> {
    let level = crate::load_level(args.level.as_deref())?;

    tracing::info!("Playing '{}' (seed={:?}, max_moves={})", level.name, args.seed, args.max_moves);

    let mut engine = build_engine(&level, &args)?;
    let summary = play(&mut engine, &args)?;

    let report = PlayReport {
        level: level.name.clone(),
        seed: args.seed,
        summary,
        board: engine.board().to_string(),
    };
    report_results(&report, &args);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn build_engine(level: &Level, args: &PlayArgs) -> Result<Match3Engine> {
    let mut config = GameConfig::for_level(level.clone());
    config.seed = args.seed;

    let mut engine = Match3Engine::new(config).context("Failed to create engine")?;
    if args.events {
        engine.subscribe(print_event);
    }
    engine.start_level(0).context("Failed to start level")?;
    Ok(engine)
}

fn play(engine: &mut Match3Engine, args: &PlayArgs) -> Result<PlaySummary> {
    let strategy = if args.random { Strategy::Random } else { Strategy::Greedy };
    let mut bot = match args.seed {
        Some(seed) => AutoPlayer::with_seed(strategy, seed),
        None => AutoPlayer::new(strategy),
    };
    let summary = bot
        .play_level(engine, args.max_moves)
        .context("Engine stopped during autoplay")?;
    Ok(summary)
}

fn report_results(report: &PlayReport, args: &PlayArgs) {
    if args.json {
        print_json_results(report);
    } else {
        print_text_results(report);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn print_event(event: &Event) {
    if let Ok(line) = serde_json::to_string(event) {
        println!("{}", line);
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_json_results(report: &PlayReport) {
    if let Ok(json) = serde_json::to_string_pretty(report) {
        println!("{}", json);
    }
}

fn print_text_results(report: &PlayReport) {
    let summary = &report.summary;

    println!("\n=== {} ===", report.level);
    println!("Outcome:  {:?}", summary.outcome);
    println!("Moves:    {}", summary.moves);
    println!("Score:    {}", summary.score);
    println!("Stars:    {}", stars(summary.stars));
    if summary.shuffles > 0 {
        println!("Shuffles: {}", summary.shuffles);
    }
    println!("\n{}", report.board);
}

fn stars(count: u8) -> String {
    (0..3).map(|i| if i < count { '*' } else { '.' }).collect()
}
