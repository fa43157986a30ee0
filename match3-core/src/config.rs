//! Game configuration: rule thresholds, timings, power-up inventory and the level catalog

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::level::Level;

// ============================================================================
// RULES
// ============================================================================

/// Match thresholds and scoring
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Shortest run that counts as a match
    pub minimum_matches: usize,
    /// Matches this large create a row/column-clear carrier
    pub minimum_matches_for_bonus: usize,
    /// Matches this large create a color bomb instead
    pub minimum_matches_for_color_bomb: usize,
    pub score_per_piece: u32,
    pub score_per_special_piece: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            minimum_matches: 3,
            minimum_matches_for_bonus: 4,
            minimum_matches_for_color_bomb: 5,
            score_per_piece: 10,
            score_per_special_piece: 20,
        }
    }
}

impl RulesConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.minimum_matches < 2 {
            return Err(format!("minimum_matches must be at least 2, got {}", self.minimum_matches));
        }
        if self.minimum_matches_for_bonus < self.minimum_matches {
            return Err("minimum_matches_for_bonus is below minimum_matches".to_string());
        }
        if self.minimum_matches_for_color_bomb < self.minimum_matches_for_bonus {
            return Err("minimum_matches_for_color_bomb is below minimum_matches_for_bonus".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// TIMINGS
// ============================================================================

/// Phase delays in milliseconds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub swap: u64,
    pub before_collapse: u64,
    pub collapse: u64,
    pub after_collapse: u64,
    /// Idle time before the hint scan runs
    pub potential_match: u64,
    pub before_color_bomb: u64,
    /// Cells travelled per second while collapsing
    pub collapse_speed_factor: f64,
    pub min_collapse: u64,
    pub max_collapse: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            swap: 200,
            before_collapse: 100,
            collapse: 100,
            after_collapse: 300,
            potential_match: 3000,
            before_color_bomb: 400,
            collapse_speed_factor: 20.0,
            min_collapse: 100,
            max_collapse: 500,
        }
    }
}

impl Timings {
    /// All phases fire immediately
    pub fn instant() -> Self {
        Self {
            swap: 0,
            before_collapse: 0,
            collapse: 0,
            after_collapse: 0,
            before_color_bomb: 0,
            min_collapse: 0,
            max_collapse: 0,
            ..Self::default()
        }
    }

    pub fn swap(&self) -> Duration {
        Duration::from_millis(self.swap)
    }

    pub fn before_collapse(&self) -> Duration {
        Duration::from_millis(self.before_collapse)
    }

    pub fn collapse(&self) -> Duration {
        Duration::from_millis(self.collapse)
    }

    pub fn potential_match(&self) -> Duration {
        Duration::from_millis(self.potential_match)
    }

    pub fn before_color_bomb(&self) -> Duration {
        Duration::from_millis(self.before_color_bomb)
    }

    /// Wait after a collapse, scaled by the longest fall of the step
    pub fn after_collapse(&self, max_distance: usize) -> Duration {
        let travel_ms = if self.collapse_speed_factor > 0.0 {
            (max_distance as f64 / self.collapse_speed_factor * 1000.0) as u64
        } else {
            self.max_collapse
        };
        let travel_ms = travel_ms.clamp(self.min_collapse, self.max_collapse.max(self.min_collapse));
        Duration::from_millis(self.after_collapse.max(travel_ms))
    }
}

// ============================================================================
// POWER-UPS
// ============================================================================

/// Player-triggered board modifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUp {
    /// Turns the target into a row/column-clear carrier
    RowColumn,
    /// Turns the target into a color bomb
    ColorBomb,
    /// Clears the target
    Hammer,
    /// Rearranges the movable pieces
    Shuffle,
}

impl PowerUp {
    pub const ALL: [PowerUp; 4] = [
        PowerUp::RowColumn,
        PowerUp::ColorBomb,
        PowerUp::Hammer,
        PowerUp::Shuffle,
    ];

    pub fn needs_target(self) -> bool {
        !matches!(self, PowerUp::Shuffle)
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerUp::RowColumn => "row_column",
            PowerUp::ColorBomb => "color_bomb",
            PowerUp::Hammer => "hammer",
            PowerUp::Shuffle => "shuffle",
        }
    }
}

/// Remaining charges per power-up; None means unlimited
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerUpInventory {
    pub row_column: Option<u32>,
    pub color_bomb: Option<u32>,
    pub hammer: Option<u32>,
    pub shuffle: Option<u32>,
}

impl Default for PowerUpInventory {
    fn default() -> Self {
        Self::with_charges(3)
    }
}

impl PowerUpInventory {
    pub fn unlimited() -> Self {
        Self {
            row_column: None,
            color_bomb: None,
            hammer: None,
            shuffle: None,
        }
    }

    pub fn with_charges(n: u32) -> Self {
        Self {
            row_column: Some(n),
            color_bomb: Some(n),
            hammer: Some(n),
            shuffle: Some(n),
        }
    }

    fn slot(&mut self, power_up: PowerUp) -> &mut Option<u32> {
        match power_up {
            PowerUp::RowColumn => &mut self.row_column,
            PowerUp::ColorBomb => &mut self.color_bomb,
            PowerUp::Hammer => &mut self.hammer,
            PowerUp::Shuffle => &mut self.shuffle,
        }
    }

    /// Charges left; None for unlimited
    pub fn remaining(&self, power_up: PowerUp) -> Option<u32> {
        match power_up {
            PowerUp::RowColumn => self.row_column,
            PowerUp::ColorBomb => self.color_bomb,
            PowerUp::Hammer => self.hammer,
            PowerUp::Shuffle => self.shuffle,
        }
    }

    pub fn has_charge(&self, power_up: PowerUp) -> bool {
        self.remaining(power_up).map_or(true, |n| n > 0)
    }

    /// Use one charge; false when none are left
    pub fn consume(&mut self, power_up: PowerUp) -> bool {
        match self.slot(power_up) {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

// ============================================================================
// GAME CONFIG
// ============================================================================

/// Everything a session needs besides the player's input
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub rules: RulesConfig,
    pub timings: Timings,
    pub levels: Vec<Level>,
    /// Random seed for reproducibility (None = entropy)
    pub seed: Option<u64>,
    pub power_ups: PowerUpInventory,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            timings: Timings::default(),
            levels: vec![Level::default()],
            seed: None,
            power_ups: PowerUpInventory::default(),
        }
    }
}

impl GameConfig {
    /// Config with a single level
    pub fn for_level(level: Level) -> Self {
        Self {
            levels: vec![level],
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Append a level to the catalog
    pub fn with_level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    pub fn with_levels(mut self, levels: Vec<Level>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_power_ups(mut self, power_ups: PowerUpInventory) -> Self {
        self.power_ups = power_ups;
        self
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: GameConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.rules.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}
