//! Level definitions: layout, spawn settings and objectives

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pieces::{Color, ALL_COLORS};

/// What a layout cell starts with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellSpawn {
    Blue,
    Green,
    Purple,
    Red,
    Yellow,
    Block,
    Shell,
    Empty,
    BoardBomb,
}

impl CellSpawn {
    pub fn color(self) -> Option<Color> {
        match self {
            CellSpawn::Blue => Some(Color::Blue),
            CellSpawn::Green => Some(Color::Green),
            CellSpawn::Purple => Some(Color::Purple),
            CellSpawn::Red => Some(Color::Red),
            CellSpawn::Yellow => Some(Color::Yellow),
            _ => None,
        }
    }

    pub fn from_color(color: Color) -> Self {
        match color {
            Color::Blue => CellSpawn::Blue,
            Color::Green => CellSpawn::Green,
            Color::Purple => CellSpawn::Purple,
            Color::Red => CellSpawn::Red,
            Color::Yellow => CellSpawn::Yellow,
        }
    }

    pub fn is_playable(self) -> bool {
        self != CellSpawn::Empty
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveLimit {
    #[default]
    Unlimited,
    Limited(u32),
}

impl MoveLimit {
    pub fn moves(self) -> Option<u32> {
        match self {
            MoveLimit::Unlimited => None,
            MoveLimit::Limited(n) => Some(n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTarget {
    pub color: Color,
    pub count: u32,
}

/// One playable level
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    /// Rows top to bottom
    pub layout: Vec<Vec<CellSpawn>>,
    /// Colors random spawns draw from
    #[serde(default = "default_colors")]
    pub colors: Vec<Color>,
    #[serde(default = "default_true")]
    pub randomize_colors: bool,
    /// Percent chance a refill spawns a board bomb
    #[serde(default)]
    pub board_bomb_chance: u8,
    #[serde(default = "default_true")]
    pub can_add_bonus: bool,
    #[serde(default = "default_true")]
    pub can_show_hint: bool,
    #[serde(default)]
    pub moves: MoveLimit,
    #[serde(default)]
    pub score_target: Option<u32>,
    #[serde(default)]
    pub color_targets: Vec<ColorTarget>,
}

fn default_colors() -> Vec<Color> {
    ALL_COLORS.to_vec()
}

fn default_true() -> bool {
    true
}

impl Default for Level {
    /// 8x8 demo level with a few obstacles
    fn default() -> Self {
        let mut level = Level::filled("Demo", 8, 8, &ALL_COLORS);
        level.layout[3][3] = CellSpawn::Block;
        level.layout[3][4] = CellSpawn::Block;
        level.layout[6][1] = CellSpawn::Shell;
        level.layout[6][6] = CellSpawn::Shell;
        level.layout[0][0] = CellSpawn::Empty;
        level.layout[0][7] = CellSpawn::Empty;
        level.moves = MoveLimit::Limited(25);
        level.score_target = Some(1500);
        level
    }
}

impl Level {
    /// Fully playable level of random basic pieces
    pub fn filled(name: &str, rows: usize, columns: usize, colors: &[Color]) -> Self {
        let first = colors.first().copied().unwrap_or(Color::Blue);
        Self {
            name: name.to_string(),
            layout: vec![vec![CellSpawn::from_color(first); columns]; rows],
            colors: colors.to_vec(),
            randomize_colors: true,
            board_bomb_chance: 0,
            can_add_bonus: true,
            can_show_hint: true,
            moves: MoveLimit::Unlimited,
            score_target: None,
            color_targets: Vec::new(),
        }
    }

    pub fn with_moves(mut self, moves: u32) -> Self {
        self.moves = MoveLimit::Limited(moves);
        self
    }

    pub fn with_score_target(mut self, target: u32) -> Self {
        self.score_target = Some(target);
        self
    }

    pub fn with_color_target(mut self, color: Color, count: u32) -> Self {
        self.color_targets.push(ColorTarget { color, count });
        self
    }

    pub fn rows(&self) -> usize {
        self.layout.len()
    }

    pub fn columns(&self) -> usize {
        self.layout.first().map_or(0, |r| r.len())
    }

    /// Row-major playable mask
    pub fn playable_mask(&self) -> Vec<bool> {
        self.layout.iter().flatten().map(|c| c.is_playable()).collect()
    }

    fn count_cells(&self, spawn: CellSpawn) -> u32 {
        self.layout.iter().flatten().filter(|&&c| c == spawn).count() as u32
    }

    pub fn shell_count(&self) -> u32 {
        self.count_cells(CellSpawn::Shell)
    }

    pub fn block_count(&self) -> u32 {
        self.count_cells(CellSpawn::Block)
    }

    /// Stars earned for a final score
    pub fn stars(&self, score: u32) -> u8 {
        let Some(target) = self.score_target else { return 0 };
        let target = u64::from(target);
        let score = u64::from(score);
        if score >= target {
            3
        } else if score * 2 >= target {
            2
        } else if score * 3 >= target {
            1
        } else {
            0
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rows() == 0 || self.columns() == 0 {
            return Err(format!("level '{}' has an empty layout", self.name));
        }
        if let Some(row) = self.layout.iter().position(|r| r.len() != self.columns()) {
            return Err(format!(
                "level '{}' row {} has {} cells, expected {}",
                self.name,
                row,
                self.layout[row].len(),
                self.columns()
            ));
        }
        if self.colors.is_empty() {
            return Err(format!("level '{}' has no spawn colors", self.name));
        }
        if self.board_bomb_chance > 100 {
            return Err(format!(
                "level '{}' board_bomb_chance {} exceeds 100",
                self.name, self.board_bomb_chance
            ));
        }
        Ok(())
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read level: {}", path.display()))?;
        let level: Level = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse level: {}", path.display()))?;
        level.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(level)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .with_context(|| format!("Failed to serialize level: {}", self.name))?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write level: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_valid() {
        let level = Level::default();
        assert!(level.validate().is_ok());
        assert_eq!(level.rows(), 8);
        assert_eq!(level.columns(), 8);
        assert_eq!(level.block_count(), 2);
        assert_eq!(level.shell_count(), 2);
        assert_eq!(level.playable_mask().iter().filter(|p| !**p).count(), 2);
    }

    #[test]
    fn test_stars() {
        let level = Level::filled("t", 3, 3, &ALL_COLORS).with_score_target(900);
        assert_eq!(level.stars(900), 3);
        assert_eq!(level.stars(450), 2);
        assert_eq!(level.stars(300), 1);
        assert_eq!(level.stars(299), 0);
        assert_eq!(Level::filled("t", 3, 3, &ALL_COLORS).stars(10_000), 0);
    }

    #[test]
    fn test_validate_rejects_bad_levels() {
        let mut ragged = Level::filled("ragged", 3, 3, &ALL_COLORS);
        ragged.layout[1].pop();
        assert!(ragged.validate().is_err());

        let no_colors = Level::filled("bare", 3, 3, &[]);
        assert!(no_colors.validate().is_err());

        let mut bombs = Level::filled("bombs", 3, 3, &ALL_COLORS);
        bombs.board_bomb_chance = 101;
        assert!(bombs.validate().is_err());
    }

    #[test]
    fn test_parse_json_with_defaults() {
        let json = r#"{
            "name": "tiny",
            "layout": [["RED", "BLOCK"], ["SHELL", "EMPTY"]],
            "moves": {"limited": 5},
            "color_targets": [{"color": "RED", "count": 4}]
        }"#;
        let level: Level = serde_json::from_str(json).unwrap();
        assert_eq!(level.moves, MoveLimit::Limited(5));
        assert_eq!(level.colors.len(), 5);
        assert!(level.can_show_hint);
        assert_eq!(level.block_count(), 1);
        assert_eq!(level.shell_count(), 1);
        assert_eq!(level.color_targets[0].color, Color::Red);
        assert_eq!(level.playable_mask(), vec![true, true, true, false]);
    }

    #[test]
    fn test_save_error_names_path() {
        let path = std::env::temp_dir().join("match3-missing-dir").join("level.json");
        let err = Level::default().save(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("level.json"));
        assert!(err.to_string().starts_with("Failed to write level"));
    }
}
