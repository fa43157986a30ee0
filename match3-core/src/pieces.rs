//! Piece definitions: colors, kinds, bonus flags and the same-type rule

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::board::CellPos;

/// Basic piece color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Blue,
    Green,
    Purple,
    Red,
    Yellow,
}

/// All 5 colors, in declaration order
pub const ALL_COLORS: [Color; 5] = [
    Color::Blue,
    Color::Green,
    Color::Purple,
    Color::Red,
    Color::Yellow,
];

impl Color {
    /// Name used in emitted events
    pub fn label(self) -> &'static str {
        match self {
            Color::Blue => "BLUE",
            Color::Green => "GREEN",
            Color::Purple => "PURPLE",
            Color::Red => "RED",
            Color::Yellow => "YELLOW",
        }
    }

    /// Single-letter board notation (uppercase)
    pub fn symbol(self) -> char {
        match self {
            Color::Blue => 'B',
            Color::Green => 'G',
            Color::Purple => 'P',
            Color::Red => 'R',
            Color::Yellow => 'Y',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'B' => Some(Color::Blue),
            'G' => Some(Color::Green),
            'P' => Some(Color::Purple),
            'R' => Some(Color::Red),
            'Y' => Some(Color::Yellow),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a piece is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Basic(Color),
    Block,
    Shell(Color), // Underlying color is revealed when the shell breaks
    BoardBomb,
    ColorBomb,
}

impl PieceKind {
    /// Color of a basic piece; specials have none
    pub fn color(self) -> Option<Color> {
        match self {
            PieceKind::Basic(color) => Some(color),
            _ => None,
        }
    }

    pub fn is_basic(self) -> bool {
        matches!(self, PieceKind::Basic(_))
    }

    /// Blocks, shells and board bombs never move by swapping
    pub fn is_immovable(self) -> bool {
        matches!(self, PieceKind::Block | PieceKind::Shell(_) | PieceKind::BoardBomb)
    }

    /// Blocks and shells stay in place while the column collapses around them
    pub fn is_anchored(self) -> bool {
        matches!(self, PieceKind::Block | PieceKind::Shell(_))
    }

    /// Blocks and shells are cleared by adjacency, never by color
    pub fn is_obstacle(self) -> bool {
        self.is_anchored()
    }

    /// Name used for shape-destroyed events: the special kind, else the color
    pub fn label(self) -> &'static str {
        match self {
            PieceKind::Basic(color) => color.label(),
            PieceKind::Block => "BLOCK",
            PieceKind::Shell(_) => "SHELL",
            PieceKind::BoardBomb => "BOARD_BOMB",
            PieceKind::ColorBomb => "COLOR_BOMB",
        }
    }

    /// Color a piece compares by in the given mode
    fn match_color(self, mode: MatchMode) -> Option<Color> {
        match (self, mode) {
            (PieceKind::Basic(color), _) => Some(color),
            (PieceKind::Shell(color), MatchMode::Potential) => Some(color),
            _ => None,
        }
    }
}

/// Bonus flags carried by a piece
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bonus(u8);

impl Bonus {
    pub const NONE: Bonus = Bonus(0);
    pub const ROW_COLUMN_CLEAR: Bonus = Bonus(1 << 0);

    pub fn contains(self, other: Bonus) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Bonus) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clears_line(self) -> bool {
        self.contains(Bonus::ROW_COLUMN_CLEAR)
    }
}

/// Unique identity of a live piece
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PieceId(pub u32);

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How same-type comparisons treat shells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Committing real matches: only basic pieces compare by color
    Resolve,
    /// Hint scanning: a shell also compares by its underlying color
    Potential,
}

/// A piece on the board
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub kind: PieceKind,
    pub bonus: Bonus,
    pub pos: CellPos,
}

impl Piece {
    pub fn color(&self) -> Option<Color> {
        self.kind.color()
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn clears_line(&self) -> bool {
        self.bonus.clears_line()
    }

    /// Same-type test used by run scanning
    pub fn is_same_type(&self, other: &Piece, mode: MatchMode) -> bool {
        same_kind(self.kind, other.kind, mode)
    }
}

/// Same-type test on bare kinds
pub fn same_kind(a: PieceKind, b: PieceKind, mode: MatchMode) -> bool {
    match (a.match_color(mode), b.match_color(mode)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
