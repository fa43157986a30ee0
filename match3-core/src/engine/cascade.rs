//! Cascade resolution: clear matches, collapse, refill, rematch

use rustc_hash::FxHashSet;

use super::Match3Engine;
use crate::board::{CellPos, ORTHOGONAL, SURROUNDING};
use crate::error::{EngineError, EngineResult};
use crate::events::{BonusKind, Event, SpawnedPiece};
use crate::matching::MatchSet;
use crate::pieces::{Bonus, Color, Piece, PieceId, PieceKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Swap animation finished; validate the swap
    Swapping,
    /// Undo animation finished
    Reverting,
    /// Color bomb fuse burnt down
    BombFuse,
    BeforeCollapse,
    Collapsing,
    AfterCollapse,
}

/// Bonus piece to create where the swap pivot stood
#[derive(Clone, Copy, Debug)]
pub(crate) struct PendingBonus {
    pub pos: CellPos,
    pub color: Color,
}

/// State of one resolution, carried across phases
#[derive(Clone, Debug)]
pub(crate) struct Cascade {
    pub matches: MatchSet,
    /// Shells losing their layer this step
    pub shells: Vec<PieceId>,
    /// Pull in neighbouring bombs and obstacles
    pub expand: bool,
    /// Resolve even below the minimum run length
    pub force: bool,
    pub color_bomb: bool,
    pub bonus: Option<PendingBonus>,
    pub step: u32,
    removed: usize,
    columns: Vec<usize>,
    /// Pieces that moved, spawned or were uncovered; rematched next step
    settled: Vec<PieceId>,
}

impl Cascade {
    pub fn new(matches: MatchSet) -> Self {
        Self {
            matches,
            shells: Vec::new(),
            expand: true,
            force: false,
            color_bomb: false,
            bonus: None,
            step: 0,
            removed: 0,
            columns: Vec::new(),
            settled: Vec::new(),
        }
    }

    /// First pass of a hammer or color bomb: cleared as given
    pub fn forced(matches: MatchSet) -> Self {
        Self {
            expand: false,
            force: true,
            ..Self::new(matches)
        }
    }
}

impl Match3Engine {
    fn take_cascade(&mut self) -> EngineResult<Cascade> {
        self.cascade
            .take()
            .ok_or_else(|| EngineError::InvariantViolation("no cascade in flight".into()))
    }

    fn piece_copy(&self, id: PieceId) -> EngineResult<Piece> {
        self.board
            .piece(id)
            .copied()
            .ok_or_else(|| EngineError::InvariantViolation(format!("unknown piece {}", id)))
    }

    // ------------------------------------------------------------------------
    // Swap validation
    // ------------------------------------------------------------------------

    pub(super) fn finish_swap(&mut self) -> EngineResult<()> {
        let (first, second) = self
            .pending_swap
            .ok_or_else(|| EngineError::InvariantViolation("no swap in flight".into()))?;
        let a = self.piece_copy(first)?;
        let b = self.piece_copy(second)?;

        if a.kind == PieceKind::ColorBomb || b.kind == PieceKind::ColorBomb {
            self.pending_swap = None;
            return self.detonate_color_bomb(a, b);
        }

        let first_set = self.detector.detect_runs_at(&self.board, first)?;
        let second_set = self.detector.detect_runs_at(&self.board, second)?;
        let line_cleared = first_set.cleared_line() || second_set.cleared_line();
        let pivot = if first_set.is_empty() { b } else { a };

        let mut matches = first_set;
        matches.union(second_set);
        if matches.len() < self.detector.minimum() {
            self.schedule(Phase::Reverting, self.config.timings.swap());
            return Ok(());
        }

        self.pending_swap = None;
        self.moves_made += 1;
        self.emit(Event::SuccessfulMove);

        let can_add_bonus = self.level.as_ref().is_some_and(|l| l.can_add_bonus);
        let mut cascade = Cascade::new(matches);
        if can_add_bonus
            && !line_cleared
            && cascade.matches.len() >= self.config.rules.minimum_matches_for_bonus
        {
            cascade.bonus = pivot.color().map(|color| PendingBonus {
                pos: pivot.pos,
                color,
            });
        }
        self.cascade = Some(cascade);
        self.begin_step()
    }

    pub(super) fn revert_swap(&mut self) -> EngineResult<()> {
        let (first, second) = self
            .pending_swap
            .take()
            .ok_or_else(|| EngineError::InvariantViolation("no swap to revert".into()))?;
        let a = self.piece_copy(first)?.pos;
        let b = self.piece_copy(second)?.pos;
        self.board.swap(first, second)?;
        self.emit(Event::PiecesMoved {
            moves: super::swap_moves(first, a, second, b),
        });
        self.emit(Event::UnsuccessfulMove);
        self.finish_resolution()
    }

    fn detonate_color_bomb(&mut self, a: Piece, b: Piece) -> EngineResult<()> {
        let (bomb, other) = if a.kind == PieceKind::ColorBomb { (a, b) } else { (b, a) };

        let color = other.color();
        let targets: Vec<Piece> = match other.kind {
            PieceKind::ColorBomb => self.board.pieces().filter(|p| p.kind.is_basic()).copied().collect(),
            PieceKind::Basic(c) => self
                .board
                .pieces()
                .filter(|p| p.kind == PieceKind::Basic(c))
                .copied()
                .collect(),
            _ => Vec::new(),
        };

        let mut matches = MatchSet::from_ids(targets.iter().map(|p| p.id));
        matches.insert(bomb.id);
        if other.kind == PieceKind::ColorBomb {
            matches.insert(other.id);
        }
        tracing::debug!(
            "Color bomb {} at {} hits {} pieces of {:?}",
            bomb.id,
            bomb.pos,
            targets.len(),
            color
        );

        self.emit(Event::ColorBombDetonated {
            color,
            origin: bomb.pos,
            targets: targets.iter().map(|p| p.pos).collect(),
        });
        self.moves_made += 1;
        self.emit(Event::SuccessfulMove);

        let mut cascade = Cascade::forced(matches);
        cascade.color_bomb = true;
        self.cascade = Some(cascade);
        self.schedule(Phase::BombFuse, self.config.timings.before_color_bomb());
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Cascade steps
    // ------------------------------------------------------------------------

    /// Expand the current match set and announce cleared lines
    pub(super) fn begin_step(&mut self) -> EngineResult<()> {
        let mut cascade = self.take_cascade()?;
        let resolvable = cascade.force
            || !cascade.shells.is_empty()
            || cascade.matches.len() >= self.detector.minimum();
        if !resolvable {
            return self.finish_resolution();
        }

        self.detonate_board_bombs(&mut cascade);
        if cascade.expand {
            self.collect_adjacent_obstacles(&mut cascade);
        }
        for id in cascade.matches.ids().to_vec() {
            if matches!(self.board.piece(id).map(|p| p.kind), Some(PieceKind::Shell(_))) {
                cascade.matches.remove(id);
                if !cascade.shells.contains(&id) {
                    cascade.shells.push(id);
                }
            }
        }

        let rocks = cascade
            .matches
            .ids()
            .iter()
            .filter(|&&id| self.board.piece(id).is_some_and(|p| p.kind == PieceKind::Block))
            .count() as u32;
        if rocks > 0 {
            self.emit(Event::RocksDestroyed { count: rocks });
        }

        let last_column = self.board.columns().saturating_sub(1);
        let last_row = self.board.rows().saturating_sub(1);
        if let Some(row) = cascade.matches.row_clear {
            self.emit(Event::RowDestroyed {
                row,
                start: CellPos::new(row, 0),
                end: CellPos::new(row, last_column),
            });
        }
        if let Some(column) = cascade.matches.column_clear {
            self.emit(Event::ColumnDestroyed {
                column,
                start: CellPos::new(0, column),
                end: CellPos::new(last_row, column),
            });
        }

        tracing::debug!(
            "Cascade step {}: {} to clear, {} shells",
            cascade.step,
            cascade.matches.len(),
            cascade.shells.len()
        );
        self.cascade = Some(cascade);
        self.schedule(Phase::BeforeCollapse, self.config.timings.before_collapse());
        Ok(())
    }

    /// Board bombs in the set, or touching it, blow up their 3x3 area
    ///
    /// Bombs caught in a blast detonate too, each at most once.
    fn detonate_board_bombs(&self, cascade: &mut Cascade) {
        let is_bomb = |id: &PieceId| self.board.piece(*id).is_some_and(|p| p.kind == PieceKind::BoardBomb);

        let mut queue: Vec<PieceId> = cascade.matches.ids().iter().copied().filter(is_bomb).collect();
        if cascade.expand {
            for &id in cascade.matches.ids() {
                let Some(piece) = self.board.piece(id) else { continue };
                for pos in self.board.neighbors(piece.pos, &ORTHOGONAL) {
                    if let Some(p) = self.board.piece_at(pos) {
                        if p.kind == PieceKind::BoardBomb && !queue.contains(&p.id) {
                            queue.push(p.id);
                        }
                    }
                }
            }
        }

        let mut detonated = FxHashSet::default();
        while let Some(bomb) = queue.pop() {
            if !detonated.insert(bomb) {
                continue;
            }
            cascade.matches.insert(bomb);
            let Some(origin) = self.board.piece(bomb).map(|p| p.pos) else { continue };
            for pos in self.board.neighbors(origin, &SURROUNDING) {
                let Some(p) = self.board.piece_at(pos) else { continue };
                match p.kind {
                    PieceKind::Block | PieceKind::Shell(_) => {}
                    PieceKind::BoardBomb => queue.push(p.id),
                    _ => {
                        cascade.matches.insert(p.id);
                    }
                }
            }
        }
    }

    /// Blocks and shells sharing an edge with a cleared piece
    fn collect_adjacent_obstacles(&self, cascade: &mut Cascade) {
        let mut found = Vec::new();
        for &id in cascade.matches.ids() {
            let Some(piece) = self.board.piece(id) else { continue };
            if piece.kind.is_obstacle() {
                continue;
            }
            for pos in self.board.neighbors(piece.pos, &ORTHOGONAL) {
                if let Some(p) = self.board.piece_at(pos) {
                    if p.kind.is_obstacle() {
                        found.push((p.id, p.kind));
                    }
                }
            }
        }
        for (id, kind) in found {
            match kind {
                PieceKind::Block => {
                    cascade.matches.insert(id);
                }
                _ => {
                    if !cascade.shells.contains(&id) {
                        cascade.shells.push(id);
                    }
                }
            }
        }
    }

    /// Score, remove the matched pieces and crack shells
    pub(super) fn clear_matched(&mut self) -> EngineResult<()> {
        let mut cascade = self.take_cascade()?;

        let mut groups: Vec<(Color, u32)> = Vec::new();
        for &id in cascade.matches.ids() {
            let Some(color) = self.board.piece(id).and_then(|p| p.color()) else { continue };
            match groups.iter_mut().find(|(c, _)| *c == color) {
                Some((_, count)) => *count += 1,
                None => groups.push((color, 1)),
            }
        }
        for &(color, count) in &groups {
            self.emit(Event::ShapesMatched { color, count });
        }
        let repeated: Vec<Color> = groups.iter().filter(|(_, n)| *n > 1).map(|(c, _)| *c).collect();
        if !repeated.is_empty() {
            self.emit(Event::ColorMatchOccurred { colors: repeated });
        }

        for id in cascade.matches.ids().to_vec() {
            let piece = self.board.remove(id)?;
            if !cascade.columns.contains(&piece.pos.column) {
                cascade.columns.push(piece.pos.column);
            }
            self.emit(Event::ShapeDestroyed {
                label: piece.label(),
                pos: piece.pos,
            });
        }
        cascade.removed = cascade.matches.len();

        for id in std::mem::take(&mut cascade.shells) {
            let piece = self.piece_copy(id)?;
            let PieceKind::Shell(color) = piece.kind else { continue };
            self.board.set_kind(id, PieceKind::Basic(color))?;
            self.emit(Event::ShapeDestroyed {
                label: piece.label(),
                pos: piece.pos,
            });
            self.emit(Event::ShellsDestroyed { count: 1 });
            cascade.settled.push(id);
        }

        if cascade.color_bomb {
            cascade.color_bomb = false;
            self.emit(Event::BombActivated);
        }

        self.cascade = Some(cascade);
        self.schedule(Phase::Collapsing, self.config.timings.collapse());
        Ok(())
    }

    /// Place the bonus piece, drop pieces into the holes and refill
    pub(super) fn collapse_and_refill(&mut self) -> EngineResult<()> {
        let mut cascade = self.take_cascade()?;

        if let Some(bonus) = cascade.bonus.take() {
            self.create_bonus(bonus, cascade.removed)?;
        }

        let mut columns = cascade.columns.clone();
        columns.sort_unstable();

        let mut moves = Vec::new();
        for &column in &columns {
            moves.extend(self.board.collapse_column(column)?);
        }

        let mut spawned = Vec::new();
        for &column in &columns {
            for pos in self.board.find_empty_cells_in_column(column)? {
                let kind = self.spawner.refill_kind(&self.board, pos, &mut self.rng);
                let id = self.board.spawn(pos, kind, Bonus::NONE)?;
                spawned.push(SpawnedPiece {
                    id,
                    pos,
                    label: kind.label(),
                });
            }
        }
        self.board.check_invariants()?;

        // Spawned pieces fall in from just above the board
        let longest_fall = moves
            .iter()
            .map(|m| m.distance)
            .chain(spawned.iter().map(|s| s.pos.row + 1))
            .max()
            .unwrap_or(0);

        cascade.settled.extend(moves.iter().map(|m| m.id));
        cascade.settled.extend(spawned.iter().map(|s| s.id));
        if !moves.is_empty() {
            self.emit(Event::PiecesMoved { moves });
        }
        if !spawned.is_empty() {
            self.emit(Event::PiecesSpawned { pieces: spawned });
        }

        self.cascade = Some(cascade);
        self.schedule(Phase::AfterCollapse, self.config.timings.after_collapse(longest_fall));
        Ok(())
    }

    fn create_bonus(&mut self, bonus: PendingBonus, removed: usize) -> EngineResult<()> {
        let (kind, flags, bonus_kind) = if removed >= self.config.rules.minimum_matches_for_color_bomb {
            (PieceKind::ColorBomb, Bonus::NONE, BonusKind::ColorBomb)
        } else {
            (
                PieceKind::Basic(bonus.color),
                Bonus::ROW_COLUMN_CLEAR,
                BonusKind::RowColumnClear,
            )
        };
        if let Some(existing) = self.board.piece_at(bonus.pos).map(|p| p.id) {
            self.board.remove(existing)?;
        }
        self.board.spawn(bonus.pos, kind, flags)?;
        self.emit(Event::BonusCreated {
            kind: bonus_kind,
            pos: bonus.pos,
        });
        Ok(())
    }

    /// Look for new matches among the pieces that just settled
    pub(super) fn rematch(&mut self) -> EngineResult<()> {
        let mut cascade = self.take_cascade()?;
        let settled = std::mem::take(&mut cascade.settled);
        let matches = self.detector.detect_for(&self.board, &settled)?;

        if matches.len() < self.detector.minimum() {
            tracing::debug!("Cascade settled after {} steps", cascade.step + 1);
            return self.finish_resolution();
        }

        let mut next = Cascade::new(matches);
        next.step = cascade.step + 1;
        self.cascade = Some(next);
        self.begin_step()
    }
}
