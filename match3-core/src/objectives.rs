//! Objectives tracking: score, moves, obstacles and color targets
//!
//! The tracker consumes engine events and answers with the follow-up
//! counter events. Once every target is met it reports objectives cleared
//! a single time and ignores everything after that.

use serde::Serialize;

use crate::config::RulesConfig;
use crate::events::Event;
use crate::level::{ColorTarget, Level, MoveLimit};
use crate::pieces::Color;

/// Targets captured when a level starts
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectiveTargets {
    pub moves: MoveLimit,
    pub score_target: Option<u32>,
    pub shells: u32,
    pub blocks: u32,
    pub color_targets: Vec<ColorTarget>,
}

impl ObjectiveTargets {
    pub fn from_level(level: &Level) -> Self {
        Self {
            moves: level.moves,
            score_target: level.score_target,
            shells: level.shell_count(),
            blocks: level.block_count(),
            color_targets: level.color_targets.clone(),
        }
    }

    /// At least one target that play can satisfy
    fn has_clearable_target(&self) -> bool {
        self.score_target.is_some()
            || self.shells > 0
            || self.blocks > 0
            || self.color_targets.iter().any(|t| t.count > 0)
    }
}

/// Live counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ObjectivesState {
    pub score: u32,
    pub moves_left: Option<u32>,
    pub shells_left: u32,
    pub blocks_left: u32,
    pub colors_left: Vec<(Color, u32)>,
}

#[derive(Clone, Debug)]
pub struct ObjectivesTracker {
    score_per_piece: u32,
    score_per_special_piece: u32,
    targets: ObjectiveTargets,
    state: ObjectivesState,
    cleared: bool,
}

impl ObjectivesTracker {
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            score_per_piece: rules.score_per_piece,
            score_per_special_piece: rules.score_per_special_piece,
            targets: ObjectiveTargets::default(),
            state: ObjectivesState::default(),
            cleared: false,
        }
    }

    /// Reset counters from a level's targets
    pub fn start(&mut self, targets: ObjectiveTargets) {
        self.state = ObjectivesState {
            score: 0,
            moves_left: targets.moves.moves(),
            shells_left: targets.shells,
            blocks_left: targets.blocks,
            colors_left: targets.color_targets.iter().map(|t| (t.color, t.count)).collect(),
        };
        self.targets = targets;
        self.cleared = false;
    }

    pub fn state(&self) -> &ObjectivesState {
        &self.state
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn is_out_of_moves(&self) -> bool {
        self.state.moves_left == Some(0)
    }

    /// Apply an event, returning the counter events it causes
    pub fn handle(&mut self, event: &Event) -> Vec<Event> {
        if self.cleared {
            return Vec::new();
        }

        let mut out = Vec::new();
        match *event {
            Event::SuccessfulMove => {
                if let Some(moves) = self.state.moves_left.as_mut() {
                    *moves = moves.saturating_sub(1);
                    out.push(Event::MovesLeftChanged { remaining: *moves });
                }
            }
            Event::ShapesMatched { color, count } => {
                self.add_score(count * self.score_per_piece, &mut out);
                if let Some((_, left)) = self.state.colors_left.iter_mut().find(|(c, _)| *c == color) {
                    *left = left.saturating_sub(count);
                    out.push(Event::ColorTargetChanged { color, remaining: *left });
                }
            }
            Event::RocksDestroyed { count } => {
                self.add_score(count * self.score_per_special_piece, &mut out);
                self.state.blocks_left = self.state.blocks_left.saturating_sub(count);
                out.push(Event::BlocksRemainingChanged {
                    remaining: self.state.blocks_left,
                });
            }
            Event::ShellsDestroyed { count } => {
                self.add_score(count * self.score_per_special_piece, &mut out);
                self.state.shells_left = self.state.shells_left.saturating_sub(count);
                out.push(Event::ShellsRemainingChanged {
                    remaining: self.state.shells_left,
                });
            }
            _ => return out,
        }

        if self.objectives_met() {
            self.cleared = true;
            out.push(Event::ObjectivesCleared);
        }
        out
    }

    fn add_score(&mut self, points: u32, out: &mut Vec<Event>) {
        self.state.score = self.state.score.saturating_add(points);
        out.push(Event::ScoresChanged {
            score: self.state.score,
        });
    }

    fn objectives_met(&self) -> bool {
        self.targets.has_clearable_target()
            && self.state.shells_left == 0
            && self.state.blocks_left == 0
            && self.state.colors_left.iter().all(|(_, left)| *left == 0)
            && self.targets.score_target.map_or(true, |t| self.state.score >= t)
    }
}
