//! Batch simulation of a level
//!
//! Level 2 - Phase-level implementation

use rayon::prelude::*;
use serde::Serialize;

use match3_core::Level;

use crate::config::SimConfig;
use crate::session_runner::{SessionOutcome, SessionRunner};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Aggregated statistics of autoplayed sessions
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SimulationResult {
    pub sessions_played: usize,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
    /// Sessions stopped by an engine error
    pub faulted: usize,
    pub total_moves: u64,
    pub total_score: u64,
    pub total_stars: u64,
    pub total_shuffles: u64,
}

impl SimulationResult {
    /// Create empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Combine with another result
    pub fn combine(&mut self, other: &SimulationResult) {
        self.sessions_played += other.sessions_played;
        self.completed += other.completed;
        self.failed += other.failed;
        self.abandoned += other.abandoned;
        self.faulted += other.faulted;
        self.total_moves += other.total_moves;
        self.total_score += other.total_score;
        self.total_stars += other.total_stars;
        self.total_shuffles += other.total_shuffles;
    }

    /// Record one finished session
    pub fn record(&mut self, outcome: &SessionOutcome) {
        self.sessions_played += 1;
        if outcome.completed() {
            self.completed += 1;
        } else if outcome.failed() {
            self.failed += 1;
        } else {
            self.abandoned += 1;
        }
        self.total_moves += u64::from(outcome.summary.moves);
        self.total_score += u64::from(outcome.summary.score);
        self.total_stars += u64::from(outcome.summary.stars);
        self.total_shuffles += u64::from(outcome.summary.shuffles);
    }

    /// Sessions that produced an outcome
    fn finished(&self) -> usize {
        self.sessions_played - self.faulted
    }

    pub fn completion_rate(&self) -> f32 {
        ratio(self.completed as f64, self.sessions_played)
    }

    pub fn failure_rate(&self) -> f32 {
        ratio(self.failed as f64, self.sessions_played)
    }

    pub fn avg_moves(&self) -> f32 {
        ratio(self.total_moves as f64, self.finished())
    }

    pub fn avg_score(&self) -> f32 {
        ratio(self.total_score as f64, self.finished())
    }

    pub fn avg_stars(&self) -> f32 {
        ratio(self.total_stars as f64, self.finished())
    }
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Play `config.games` seeded sessions of a level
pub fn simulate_level(level: &Level, config: &SimConfig) -> SimulationResult {
    if config.games == 0 {
        return SimulationResult::empty();
    }

    let seeds = prepare_seeds(config);
    let outcomes = if config.parallel {
        seeds
            .par_iter()
            .map(|&seed| play_seeded(level, config, seed))
            .collect::<Vec<_>>()
    } else {
        seeds
            .iter()
            .map(|&seed| play_seeded(level, config, seed))
            .collect::<Vec<_>>()
    };

    aggregate_outcomes(outcomes)
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn prepare_seeds(config: &SimConfig) -> Vec<u64> {
    let base_seed = config.base_seed();
    (0..config.games)
        .map(|i| base_seed.wrapping_add(i as u64))
        .collect()
}

/// Play one session; engine errors are reported as `None`
fn play_seeded(level: &Level, config: &SimConfig, seed: u64) -> Option<SessionOutcome> {
    let mut runner = SessionRunner::new(config.clone());
    runner.reset_seed(seed);
    match runner.play_session(level) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!("Session seed={} on '{}' faulted: {}", seed, level.name, e);
            None
        }
    }
}

fn aggregate_outcomes(outcomes: Vec<Option<SessionOutcome>>) -> SimulationResult {
    let mut result = SimulationResult::empty();
    for outcome in outcomes {
        match outcome {
            Some(outcome) => result.record(&outcome),
            None => {
                result.sessions_played += 1;
                result.faulted += 1;
            }
        }
    }
    result
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn ratio(total: f64, count: usize) -> f32 {
    if count == 0 {
        0.0
    } else {
        (total / count as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match3_core::ALL_COLORS;

    fn limited_level() -> Level {
        Level::filled("balance", 7, 7, &ALL_COLORS)
            .with_moves(5)
            .with_score_target(400)
    }

    #[test]
    fn test_empty_result() {
        let result = SimulationResult::empty();
        assert_eq!(result.sessions_played, 0);
        assert_eq!(result.completion_rate(), 0.0);
        assert_eq!(result.avg_score(), 0.0);
    }

    #[test]
    fn test_zero_games() {
        let result = simulate_level(&limited_level(), &SimConfig::new(0));
        assert_eq!(result, SimulationResult::empty());
    }

    #[test]
    fn test_sessions_are_counted() {
        let config = SimConfig::new(6).with_seed(3).with_parallel(false);
        let result = simulate_level(&limited_level(), &config);

        assert_eq!(result.sessions_played, 6);
        assert_eq!(result.faulted, 0);
        assert_eq!(result.completed + result.failed + result.abandoned, 6);
        assert!(result.avg_moves() <= 5.0);
        assert!(result.completion_rate() + result.failure_rate() <= 1.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = SimConfig::new(8).with_seed(11).with_parallel(false);
        let parallel = sequential.clone().with_parallel(true);
        let level = limited_level();

        assert_eq!(
            simulate_level(&level, &sequential),
            simulate_level(&level, &parallel)
        );
    }

    #[test]
    fn test_combine() {
        let config = SimConfig::new(3).with_seed(1).with_parallel(false);
        let a = simulate_level(&limited_level(), &config);
        let b = simulate_level(&limited_level(), &config.clone().with_seed(50));

        let mut total = a.clone();
        total.combine(&b);
        assert_eq!(total.sessions_played, 6);
        assert_eq!(total.total_score, a.total_score + b.total_score);
        assert_eq!(total.completed, a.completed + b.completed);
    }
}
