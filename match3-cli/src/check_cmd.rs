//! Check command - validate a level and summarize it

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use match3_core::{GameConfig, Level, Match3Engine, MoveLimit};

#[derive(Args)]
pub struct CheckArgs {
    /// Level JSON file (defaults to the demo level)
    #[arg(long, value_name = "FILE")]
    pub level: Option<PathBuf>,

    /// Seed for the sample board
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// Validate the level, deal a sample board and print a summary
pub fn run(args: CheckArgs) -> Result<()> {
    let level = crate::load_level(args.level.as_deref())?;

    let config = GameConfig::for_level(level.clone()).with_seed(args.seed);
    let mut engine = Match3Engine::new(config).context("Failed to create engine")?;
    engine.start_level(0).context("Failed to deal the level")?;

    print_summary(&level);
    println!("\nSample board (seed {}):", args.seed);
    println!("{}", engine.board());
    let swaps = engine.potential_matches();
    println!("Playable swaps: {}", swaps.len());

    if swaps.is_empty() {
        tracing::warn!("Sample board has no playable swap; the engine will shuffle it");
    }
    Ok(())
}

fn print_summary(level: &Level) {
    let colors: Vec<&str> = level.colors.iter().map(|c| c.label()).collect();

    println!("Level '{}' is valid", level.name);
    println!("Size:     {}x{}", level.rows(), level.columns());
    println!("Colors:   {}", colors.join(", "));
    match level.moves {
        MoveLimit::Unlimited => println!("Moves:    unlimited"),
        MoveLimit::Limited(n) => println!("Moves:    {}", n),
    }
    if let Some(target) = level.score_target {
        println!("Score:    {}", target);
    }
    println!("Shells:   {}", level.shell_count());
    println!("Blocks:   {}", level.block_count());
    for target in &level.color_targets {
        println!("Collect:  {} x{}", target.count, target.color.label());
    }
}
