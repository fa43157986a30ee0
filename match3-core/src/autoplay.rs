//! Autoplay bot for simulations and the CLI

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::board::CellPos;
use crate::config::PowerUp;
use crate::engine::{Match3Engine, PowerUpOutcome, SessionState};
use crate::error::EngineResult;
use crate::events::LevelOutcome;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Consecutive turns without a successful swap before giving up
const MAX_STUCK_TURNS: u32 = 3;

// ============================================================================
// AUTOPLAYER
// ============================================================================

/// How the bot picks among potential matches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Largest match, random tie-break
    #[default]
    Greedy,
    /// Any potential match
    Random,
}

/// Result of one autoplayed level
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaySummary {
    pub outcome: LevelOutcome,
    pub moves: u32,
    pub score: u32,
    pub stars: u8,
    pub shuffles: u32,
}

pub struct AutoPlayer {
    pub strategy: Strategy,
    rng: ChaCha8Rng,
}

impl AutoPlayer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            rng: ChaCha8Rng::seed_from_u64(42),
        }
    }

    pub fn with_seed(strategy: Strategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Pick a swap from the engine's current potential matches
    ///
    /// Hints count shells by color, so candidates are kept only when the swap
    /// really resolves.
    pub fn choose(&mut self, engine: &Match3Engine) -> Option<(CellPos, CellPos)> {
        let mut candidates = engine.potential_matches();
        candidates.retain(|m| engine.detector().swap_forms_match(engine.board(), m.from, m.to));
        if candidates.is_empty() {
            return None;
        }
        if self.strategy == Strategy::Greedy {
            let best = candidates.iter().map(|m| m.cells.len()).max().unwrap_or(0);
            candidates.retain(|m| m.cells.len() == best);
        }
        candidates.choose(&mut self.rng).map(|m| (m.from, m.to))
    }

    /// Play the started level until it ends or `max_moves` swaps are made
    ///
    /// A level still running at the limit is abandoned.
    pub fn play_level(&mut self, engine: &mut Match3Engine, max_moves: u32) -> EngineResult<PlaySummary> {
        let mut shuffles = 0;
        let mut stuck = 0;

        while engine.state() == SessionState::Idle && engine.moves_made() < max_moves {
            if stuck >= MAX_STUCK_TURNS {
                tracing::warn!("No playable swap after {} tries", stuck);
                break;
            }
            match self.choose(engine) {
                Some((from, to)) => {
                    let before = engine.moves_made();
                    engine.request_swap(from, to)?;
                    engine.settle()?;
                    if engine.moves_made() > before {
                        stuck = 0;
                    } else {
                        stuck += 1;
                    }
                }
                None => {
                    stuck += 1;
                    shuffles += 1;
                    let outcome = engine.apply_power_up(PowerUp::Shuffle, None)?;
                    if outcome != PowerUpOutcome::Applied {
                        // Out of charges: idle until the hint scan reshuffles
                        let wait = engine.config().timings.potential_match();
                        engine.advance(wait)?;
                    }
                }
            }
        }

        if engine.state() != SessionState::Ended {
            engine.end_level()?;
        }

        let score = engine.objectives().score;
        Ok(PlaySummary {
            outcome: engine.outcome().unwrap_or(LevelOutcome::Abandoned),
            moves: engine.moves_made(),
            score,
            stars: engine.level().map_or(0, |l| l.stars(score)),
            shuffles,
        })
    }
}
