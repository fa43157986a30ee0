//! Match-3 Sim - Level balancing through autoplay
//!
//! This crate runs the autoplay bot over levels in bulk:
//! - Seeded single sessions
//! - Batches of sessions per level, sequential or parallel
//! - Completion/failure statistics for a level catalog
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: simulate_catalog (orchestration)
//! - Level 2: simulate_level (phases)
//! - Level 3: play_session (steps)
//! - Level 4: utilities, configuration

mod config;
mod session_runner;
mod simulation;

pub use config::SimConfig;
pub use session_runner::{SessionOutcome, SessionRunner};
pub use simulation::{simulate_level, SimulationResult};

use match3_core::Level;

/// Statistics for one level of a catalog
#[derive(Clone, Debug, serde::Serialize)]
pub struct LevelReport {
    pub index: usize,
    pub name: String,
    pub result: SimulationResult,
}

/// Simulate every level of a catalog (Level 1 orchestration)
pub fn simulate_catalog(levels: &[Level], config: &SimConfig) -> Vec<LevelReport> {
    levels
        .iter()
        .enumerate()
        .map(|(index, level)| {
            tracing::info!("Simulating level {} '{}' ({} games)", index, level.name, config.games);
            let result = simulate_level(level, config);
            tracing::info!(
                "Level '{}': {:.1}% completed, avg score {:.0}",
                level.name,
                result.completion_rate() * 100.0,
                result.avg_score()
            );
            LevelReport {
                index,
                name: level.name.clone(),
                result,
            }
        })
        .collect()
}
