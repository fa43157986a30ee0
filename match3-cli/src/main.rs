//! Match-3 CLI - Command-line interface
//!
//! Commands:
//! - play: Autoplay a single level and report the result
//! - simulate: Play many seeded sessions for level balancing
//! - check: Validate a level file and print a summary

mod check_cmd;
mod play_cmd;
mod simulate_cmd;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "match3")]
#[command(about = "Match-3 level player and balancer")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Autoplay a single level
    Play(play_cmd::PlayArgs),
    /// Simulate many sessions of a level
    Simulate(simulate_cmd::SimulateArgs),
    /// Validate a level file
    Check(check_cmd::CheckArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Play(args) => play_cmd::run(args),
        Commands::Simulate(args) => simulate_cmd::run(args),
        Commands::Check(args) => check_cmd::run(args),
    }
}

/// `RUST_LOG` wins over the default level
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the level file, or the built-in demo level
pub(crate) fn load_level(path: Option<&std::path::Path>) -> anyhow::Result<match3_core::Level> {
    use anyhow::Context;

    match path {
        Some(path) => match3_core::Level::load(path)
            .with_context(|| format!("Failed to load level: {}", path.display())),
        None => {
            tracing::info!("No level file given, using the demo level");
            Ok(match3_core::Level::default())
        }
    }
}
