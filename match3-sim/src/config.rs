//! Simulation configuration
//!
//! Level 4 - Configuration types

use match3_core::{Strategy, Timings};

/// Configuration for a batch of autoplayed sessions
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Sessions played per level
    pub games: usize,
    /// Base seed; session `i` uses `seed + i`
    pub seed: Option<u64>,
    /// Whether to play sessions in parallel
    pub parallel: bool,
    /// Swap limit per session (levels without a move limit are abandoned here)
    pub max_moves: u32,
    /// How the bot picks swaps
    pub strategy: Strategy,
    /// Engine timings; the clock is settled, so only ordering matters
    pub timings: Timings,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            games: 100,
            seed: None,
            parallel: true,
            max_moves: 100,
            strategy: Strategy::Greedy,
            timings: Timings::instant(),
        }
    }
}

impl SimConfig {
    /// Create config with the given number of sessions
    pub fn new(games: usize) -> Self {
        Self {
            games,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_moves(mut self, max_moves: u32) -> Self {
        self.max_moves = max_moves;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Base seed, falling back to 42 like the session runner
    pub fn base_seed(&self) -> u64 {
        self.seed.unwrap_or(42)
    }
}
