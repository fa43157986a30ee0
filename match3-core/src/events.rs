//! Gameplay events and the subscriber interface

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::board::{CellPos, PieceMove};
use crate::config::PowerUp;
use crate::pieces::{Color, PieceId};

/// How a level ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOutcome {
    Completed,
    Failed,
    Abandoned,
}

/// Bonus piece created by a large match or a power-up
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    RowColumnClear,
    ColorBomb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SpawnedPiece {
    pub id: PieceId,
    pub pos: CellPos,
    pub label: &'static str,
}

/// Everything observers can see happen during a session
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    LevelStart { level: usize, name: String },
    LevelEnd { outcome: LevelOutcome, score: u32, stars: u8 },
    LevelPaused,
    LevelResumed,

    SelectionChanged { cell: Option<CellPos> },
    SuccessfulMove,
    UnsuccessfulMove,

    ShapesMatched { color: Color, count: u32 },
    ColorMatchOccurred { colors: Vec<Color> },
    ShapeDestroyed { label: &'static str, pos: CellPos },
    RowDestroyed { row: usize, start: CellPos, end: CellPos },
    ColumnDestroyed { column: usize, start: CellPos, end: CellPos },
    ColorBombDetonated { color: Option<Color>, origin: CellPos, targets: Vec<CellPos> },
    BombActivated,
    BonusCreated { kind: BonusKind, pos: CellPos },
    RocksDestroyed { count: u32 },
    ShellsDestroyed { count: u32 },

    PiecesMoved { moves: Vec<PieceMove> },
    PiecesSpawned { pieces: Vec<SpawnedPiece> },
    ShapesShuffled,
    HintAvailable { cells: Vec<CellPos> },
    HintCleared,
    PowerUpApplied { power_up: PowerUp, target: Option<CellPos> },

    ScoresChanged { score: u32 },
    MovesLeftChanged { remaining: u32 },
    ShellsRemainingChanged { remaining: u32 },
    BlocksRemainingChanged { remaining: u32 },
    ColorTargetChanged { color: Color, remaining: u32 },
    ObjectivesCleared,
}

impl Event {
    /// Snake-case event name
    pub fn name(&self) -> &'static str {
        match self {
            Event::LevelStart { .. } => "level_start",
            Event::LevelEnd { .. } => "level_end",
            Event::LevelPaused => "level_paused",
            Event::LevelResumed => "level_resumed",
            Event::SelectionChanged { .. } => "selection_changed",
            Event::SuccessfulMove => "successful_move",
            Event::UnsuccessfulMove => "unsuccessful_move",
            Event::ShapesMatched { .. } => "shapes_matched",
            Event::ColorMatchOccurred { .. } => "color_match_occurred",
            Event::ShapeDestroyed { .. } => "shape_destroyed",
            Event::RowDestroyed { .. } => "row_destroyed",
            Event::ColumnDestroyed { .. } => "column_destroyed",
            Event::ColorBombDetonated { .. } => "color_bomb_detonated",
            Event::BombActivated => "bomb_activated",
            Event::BonusCreated { .. } => "bonus_created",
            Event::RocksDestroyed { .. } => "rocks_destroyed",
            Event::ShellsDestroyed { .. } => "shells_destroyed",
            Event::PiecesMoved { .. } => "pieces_moved",
            Event::PiecesSpawned { .. } => "pieces_spawned",
            Event::ShapesShuffled => "shapes_shuffled",
            Event::HintAvailable { .. } => "hint_available",
            Event::HintCleared => "hint_cleared",
            Event::PowerUpApplied { .. } => "power_up_applied",
            Event::ScoresChanged { .. } => "scores_changed",
            Event::MovesLeftChanged { .. } => "moves_left_changed",
            Event::ShellsRemainingChanged { .. } => "shells_remaining_changed",
            Event::BlocksRemainingChanged { .. } => "blocks_remaining_changed",
            Event::ColorTargetChanged { .. } => "color_target_changed",
            Event::ObjectivesCleared => "objectives_cleared",
        }
    }
}

/// Receives events in emission order
pub trait EventSink {
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> EventSink for F {
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Recording sink; clones share the same buffer
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Drain recorded events
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.name() == name).count()
    }

    /// Index of the first event with this name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.events.borrow().iter().position(|e| e.name() == name)
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}
