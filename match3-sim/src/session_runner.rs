//! Session runner - plays single autoplayed levels
//!
//! Level 3 - Step-level implementation

use serde::Serialize;

use match3_core::{AutoPlayer, EngineResult, GameConfig, Level, LevelOutcome, Match3Engine, PlaySummary};

use crate::config::SimConfig;

/// Outcome of a single autoplayed session
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    /// Seed the engine and the bot were created with
    pub seed: u64,
    /// What the bot achieved
    pub summary: PlaySummary,
}

impl SessionOutcome {
    pub fn completed(&self) -> bool {
        self.summary.outcome == LevelOutcome::Completed
    }

    pub fn failed(&self) -> bool {
        self.summary.outcome == LevelOutcome::Failed
    }

    /// Session hit the runner's swap limit or got stuck
    pub fn abandoned(&self) -> bool {
        self.summary.outcome == LevelOutcome::Abandoned
    }
}

/// Runner that plays sessions with the autoplay bot
pub struct SessionRunner {
    config: SimConfig,
    /// Random seed counter
    seed_counter: u64,
}

impl SessionRunner {
    pub fn new(config: SimConfig) -> Self {
        let seed_counter = config.base_seed();
        Self {
            config,
            seed_counter,
        }
    }

    /// Play one session of the level with the next seed
    pub fn play_session(&mut self, level: &Level) -> EngineResult<SessionOutcome> {
        let seed = self.next_seed();
        let config = GameConfig::for_level(level.clone())
            .with_seed(seed)
            .with_timings(self.config.timings.clone());

        let mut engine = Match3Engine::new(config)?;
        engine.start_level(0)?;

        let mut bot = AutoPlayer::with_seed(self.config.strategy, seed);
        let summary = bot.play_level(&mut engine, self.config.max_moves)?;

        tracing::debug!(
            "Session seed={} {:?}: {} moves, score {}",
            seed,
            summary.outcome,
            summary.moves,
            summary.score
        );

        Ok(SessionOutcome { seed, summary })
    }

    /// Get next seed for the engine and bot
    fn next_seed(&mut self) -> u64 {
        let seed = self.seed_counter;
        self.seed_counter = self.seed_counter.wrapping_add(1);
        seed
    }

    /// Reset seed counter
    pub fn reset_seed(&mut self, seed: u64) {
        self.seed_counter = seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match3_core::ALL_COLORS;

    fn runner() -> SessionRunner {
        SessionRunner::new(SimConfig::new(1).with_seed(5).with_max_moves(20))
    }

    #[test]
    fn test_session_ends_level() {
        let level = Level::filled("session", 7, 7, &ALL_COLORS).with_moves(6);
        let outcome = runner().play_session(&level).unwrap();

        assert_eq!(outcome.seed, 5);
        assert!(outcome.summary.moves <= 6);
        assert!(outcome.completed() || outcome.failed() || outcome.abandoned());
    }

    #[test]
    fn test_seed_counter_advances() {
        let level = Level::filled("session", 6, 6, &ALL_COLORS).with_moves(3);
        let mut runner = runner();
        let first = runner.play_session(&level).unwrap();
        let second = runner.play_session(&level).unwrap();
        assert_eq!(first.seed, 5);
        assert_eq!(second.seed, 6);

        runner.reset_seed(5);
        let replay = runner.play_session(&level).unwrap();
        assert_eq!(replay, first);
    }

    #[test]
    fn test_easy_target_completes() {
        let level = Level::filled("easy", 7, 7, &ALL_COLORS).with_score_target(30);
        let outcome = runner().play_session(&level).unwrap();
        assert!(outcome.completed());
        assert_eq!(outcome.summary.stars, 3);
    }
}
