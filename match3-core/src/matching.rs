//! Match detection: runs through a piece, line-clear expansion and potential-match search

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::board::{Board, CellPos};
use crate::error::{EngineError, EngineResult};
use crate::pieces::{same_kind, MatchMode, PieceId, PieceKind};

/// Pieces to clear, plus the lines a row/column-clear bonus emptied
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchSet {
    pieces: Vec<PieceId>,
    seen: FxHashSet<PieceId>,
    pub row_clear: Option<usize>,
    pub column_clear: Option<usize>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = PieceId>) -> Self {
        let mut set = Self::new();
        set.extend(ids);
        set
    }

    /// Add a piece; false if it was already present
    pub fn insert(&mut self, id: PieceId) -> bool {
        if self.seen.insert(id) {
            self.pieces.push(id);
            true
        } else {
            false
        }
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = PieceId>) {
        for id in ids {
            self.insert(id);
        }
    }

    pub fn remove(&mut self, id: PieceId) -> bool {
        if self.seen.remove(&id) {
            self.pieces.retain(|&p| p != id);
            true
        } else {
            false
        }
    }

    /// Merge another set in, keeping line-clear markers
    pub fn union(&mut self, other: MatchSet) {
        self.row_clear = self.row_clear.or(other.row_clear);
        self.column_clear = self.column_clear.or(other.column_clear);
        self.extend(other.pieces);
    }

    pub fn contains(&self, id: PieceId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Pieces in insertion order
    pub fn ids(&self) -> &[PieceId] {
        &self.pieces
    }

    /// True when a row/column-clear bonus fired inside this set
    pub fn cleared_line(&self) -> bool {
        self.row_clear.is_some() || self.column_clear.is_some()
    }
}

/// A swap that would produce a match, and the pieces that would match
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PotentialMatch {
    pub from: CellPos,
    pub to: CellPos,
    /// Cells the hint highlights, starting with the moved piece
    pub cells: Vec<CellPos>,
}

/// Run scanning with a fixed minimum length
#[derive(Clone, Copy, Debug)]
pub struct MatchDetector {
    minimum: usize,
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

impl Axis {
    fn step(self) -> (isize, isize) {
        match self {
            Axis::Row => (0, 1),
            Axis::Column => (1, 0),
        }
    }
}

impl MatchDetector {
    pub fn new(minimum: usize) -> Self {
        Self { minimum }
    }

    pub fn minimum(&self) -> usize {
        self.minimum
    }

    /// Matches formed through a piece along its row and column
    ///
    /// A run shorter than the minimum contributes nothing. A run containing a
    /// row/column-clear carrier becomes the whole line.
    pub fn detect_runs_at(&self, board: &Board, id: PieceId) -> EngineResult<MatchSet> {
        self.detect_through(board, id, false)
    }

    /// Runs through a piece, with its whole row cleared unconditionally
    pub fn detect_line_clear_at(&self, board: &Board, id: PieceId) -> EngineResult<MatchSet> {
        self.detect_through(board, id, true)
    }

    fn detect_through(&self, board: &Board, id: PieceId, force_row: bool) -> EngineResult<MatchSet> {
        let piece = board
            .piece(id)
            .ok_or_else(|| EngineError::InvariantViolation(format!("unknown piece {}", id)))?;
        let origin = piece.pos;
        let kind = piece.kind;

        let mut result = MatchSet::new();

        let horizontal = self.run_cells(board, origin, kind, Axis::Row, None);
        let horizontal = self.ids_of(board, &horizontal);
        if force_row || self.any_clears_line(board, &horizontal) {
            result.extend(self.whole_line(board, origin, Axis::Row));
            result.row_clear = Some(origin.row);
        } else {
            result.extend(horizontal);
        }

        let vertical = self.run_cells(board, origin, kind, Axis::Column, None);
        let vertical = self.ids_of(board, &vertical);
        if self.any_clears_line(board, &vertical) {
            result.extend(self.whole_line(board, origin, Axis::Column));
            result.column_clear = Some(origin.column);
        } else {
            result.extend(vertical);
        }

        Ok(result)
    }

    /// Union of runs through each basic piece of `ids`; specials are skipped
    pub fn detect_for(&self, board: &Board, ids: &[PieceId]) -> EngineResult<MatchSet> {
        let mut result = MatchSet::new();
        for &id in ids {
            let Some(piece) = board.piece(id) else { continue };
            if !piece.kind.is_basic() || result.contains(id) {
                continue;
            }
            result.union(self.detect_runs_at(board, id)?);
        }
        Ok(result)
    }

    /// True if any run of the minimum length exists right now
    pub fn has_immediate_match(&self, board: &Board) -> bool {
        board.pieces().any(|p| {
            p.kind.is_basic()
                && (self.run_cells(board, p.pos, p.kind, Axis::Row, None).len() >= self.minimum
                    || self.run_cells(board, p.pos, p.kind, Axis::Column, None).len() >= self.minimum)
        })
    }

    /// True if swapping the pieces at `a` and `b` forms a run that resolves
    ///
    /// Unlike `potential_matches`, shells do not count toward the run.
    pub fn swap_forms_match(&self, board: &Board, a: CellPos, b: CellPos) -> bool {
        let (Some(first), Some(second)) = (board.piece_at(a), board.piece_at(b)) else {
            return false;
        };
        let (first, second) = (first.id, second.id);
        let mut trial = board.clone();
        if trial.swap(first, second).is_err() {
            return false;
        }
        [first, second]
            .into_iter()
            .any(|id| self.detect_runs_at(&trial, id).is_ok_and(|m| !m.is_empty()))
    }

    /// First potential match found, as the set of pieces the hint covers
    pub fn detect_all_potential_matches(&self, board: &Board) -> Option<MatchSet> {
        self.potential_matches(board).into_iter().next().map(|m| {
            MatchSet::from_ids(m.cells.iter().filter_map(|&c| board.piece_at(c).map(|p| p.id)))
        })
    }

    /// Every swap of two adjacent basic pieces that would produce a run
    ///
    /// Shells count toward runs here by their underlying color.
    pub fn potential_matches(&self, board: &Board) -> Vec<PotentialMatch> {
        let mut found = Vec::new();
        for pos in board.positions() {
            for (dr, dc) in [(0, 1), (1, 0)] {
                let Some(other) = pos.offset(dr, dc) else { continue };
                let (Some(a), Some(b)) = (board.piece_at(pos), board.piece_at(other)) else {
                    continue;
                };
                if !a.kind.is_basic() || !b.kind.is_basic() || a.kind == b.kind {
                    continue;
                }
                let swap = Some((pos, other));
                // Piece from `pos` lands on `other`, and vice versa
                for (landing, kind, origin) in [(other, a.kind, pos), (pos, b.kind, other)] {
                    let mut cells = vec![origin];
                    for axis in [Axis::Row, Axis::Column] {
                        let run = self.potential_run(board, landing, kind, axis, swap);
                        if run.len() >= self.minimum {
                            cells.extend(run.into_iter().filter(|&c| c != landing));
                        }
                    }
                    if cells.len() > 1 {
                        found.push(PotentialMatch {
                            from: origin,
                            to: landing,
                            cells,
                        });
                    }
                }
            }
        }
        found
    }

    // ------------------------------------------------------------------------
    // Scanning helpers
    // ------------------------------------------------------------------------

    fn potential_run(
        &self,
        board: &Board,
        at: CellPos,
        kind: PieceKind,
        axis: Axis,
        swap: Option<(CellPos, CellPos)>,
    ) -> Vec<CellPos> {
        self.scan(board, at, kind, axis, swap, MatchMode::Potential)
    }

    fn run_cells(
        &self,
        board: &Board,
        at: CellPos,
        kind: PieceKind,
        axis: Axis,
        swap: Option<(CellPos, CellPos)>,
    ) -> Vec<CellPos> {
        let run = self.scan(board, at, kind, axis, swap, MatchMode::Resolve);
        if run.len() >= self.minimum {
            run
        } else {
            Vec::new()
        }
    }

    /// Contiguous same-type cells through `at`, with `at` treated as holding `kind`
    ///
    /// With `swap` set, the two swapped cells report each other's kinds.
    fn scan(
        &self,
        board: &Board,
        at: CellPos,
        kind: PieceKind,
        axis: Axis,
        swap: Option<(CellPos, CellPos)>,
        mode: MatchMode,
    ) -> Vec<CellPos> {
        let kind_at = |pos: CellPos| -> Option<PieceKind> {
            let source = match swap {
                Some((a, b)) if pos == a => b,
                Some((a, b)) if pos == b => a,
                _ => pos,
            };
            board.piece_at(source).map(|p| p.kind)
        };

        let (dr, dc) = axis.step();
        let mut cells = vec![at];
        for sign in [-1isize, 1] {
            let mut cursor = at;
            while let Some(next) = cursor.offset(dr * sign, dc * sign) {
                if !board.contains(next) {
                    break;
                }
                match kind_at(next) {
                    Some(k) if same_kind(kind, k, mode) => {
                        cells.push(next);
                        cursor = next;
                    }
                    _ => break,
                }
            }
        }
        cells.sort();
        cells
    }

    fn ids_of(&self, board: &Board, cells: &[CellPos]) -> Vec<PieceId> {
        cells.iter().filter_map(|&c| board.piece_at(c).map(|p| p.id)).collect()
    }

    fn any_clears_line(&self, board: &Board, ids: &[PieceId]) -> bool {
        ids.iter()
            .any(|&id| board.piece(id).is_some_and(|p| p.clears_line()))
    }

    /// Every basic piece on the line through `pos`
    fn whole_line(&self, board: &Board, pos: CellPos, axis: Axis) -> Vec<PieceId> {
        let cells: Vec<CellPos> = match axis {
            Axis::Row => (0..board.columns()).map(|c| CellPos::new(pos.row, c)).collect(),
            Axis::Column => (0..board.rows()).map(|r| CellPos::new(r, pos.column)).collect(),
        };
        cells
            .into_iter()
            .filter_map(|c| board.piece_at(c))
            .filter(|p| p.kind.is_basic())
            .map(|p| p.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::Bonus;

    fn id_at(board: &Board, row: usize, column: usize) -> PieceId {
        board.piece_at(CellPos::new(row, column)).unwrap().id
    }

    #[test]
    fn test_horizontal_and_vertical_runs() {
        let board = Board::from_rows(&[
            "R R R G",
            "B G R Y",
            "G B R P",
        ])
        .unwrap();
        let detector = MatchDetector::new(3);

        // (0,2) sits on a horizontal and a vertical run
        let set = detector.detect_runs_at(&board, id_at(&board, 0, 2)).unwrap();
        assert_eq!(set.len(), 5);
        assert!(!set.cleared_line());

        let none = detector.detect_runs_at(&board, id_at(&board, 1, 1)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_short_runs_never_match() {
        let board = Board::from_rows(&["R R G R", "G B B Y"]).unwrap();
        let detector = MatchDetector::new(3);
        for piece in board.pieces() {
            let set = detector.detect_runs_at(&board, piece.id).unwrap();
            assert!(set.is_empty());
        }
        assert!(!detector.has_immediate_match(&board));
    }

    #[test]
    fn test_shells_break_runs_when_resolving() {
        let board = Board::from_rows(&["R r R R"]).unwrap();
        let detector = MatchDetector::new(3);
        let set = detector.detect_runs_at(&board, id_at(&board, 0, 0)).unwrap();
        assert!(set.is_empty());
        let set = detector.detect_runs_at(&board, id_at(&board, 0, 3)).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_bonus_carrier_clears_whole_row() {
        let mut board = Board::from_rows(&[
            "R R G Y # B",
            "G B Y P G Y",
        ])
        .unwrap();
        // Carrier completes the red run at (0,2)
        let old = id_at(&board, 0, 2);
        board.remove(old).unwrap();
        let carrier = board
            .spawn(CellPos::new(0, 2), PieceKind::Basic(crate::pieces::Color::Red), Bonus::ROW_COLUMN_CLEAR)
            .unwrap();

        let detector = MatchDetector::new(3);
        let set = detector.detect_runs_at(&board, carrier).unwrap();
        assert_eq!(set.row_clear, Some(0));
        assert_eq!(set.column_clear, None);
        // Block is not part of the line clear
        assert_eq!(set.len(), 5);
        assert!(!set.contains(id_at(&board, 0, 4)));
    }

    #[test]
    fn test_forced_line_clear() {
        let board = Board::from_rows(&["R G B", "Y P G"]).unwrap();
        let detector = MatchDetector::new(3);
        let set = detector.detect_line_clear_at(&board, id_at(&board, 1, 1)).unwrap();
        assert_eq!(set.row_clear, Some(1));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_detect_for_skips_specials() {
        let board = Board::from_rows(&["R R R *", "G B Y P"]).unwrap();
        let detector = MatchDetector::new(3);
        let ids: Vec<PieceId> = board.pieces().map(|p| p.id).collect();
        let set = detector.detect_for(&board, &ids).unwrap();
        assert_eq!(set.len(), 3);
        assert!(!set.contains(id_at(&board, 0, 3)));
    }

    #[test]
    fn test_potential_matches() {
        let board = Board::from_rows(&[
            "R G R",
            "B R Y",
            "G P B",
        ])
        .unwrap();
        let detector = MatchDetector::new(3);
        assert!(!detector.has_immediate_match(&board));

        let found = detector.potential_matches(&board);
        // Swapping (0,1) and (1,1) completes the top row
        assert!(found
            .iter()
            .any(|m| m.from == CellPos::new(1, 1) && m.to == CellPos::new(0, 1) && m.cells.len() == 3));

        let set = detector.detect_all_potential_matches(&board).unwrap();
        assert!(set.len() >= 3);
    }

    #[test]
    fn test_no_potential_matches() {
        let board = Board::from_rows(&[
            "R G B",
            "Y P R",
            "G B Y",
        ])
        .unwrap();
        let detector = MatchDetector::new(3);
        assert!(detector.potential_matches(&board).is_empty());
        assert!(detector.detect_all_potential_matches(&board).is_none());
    }

    #[test]
    fn test_potential_match_counts_shells() {
        // Moving the red at (1,2) up completes R r R while hint scanning
        let board = Board::from_rows(&[
            "R r G",
            "B Y R",
        ])
        .unwrap();
        let detector = MatchDetector::new(3);
        let found = detector.potential_matches(&board);
        assert!(found.iter().any(|m| m.from == CellPos::new(1, 2)));
    }

    #[test]
    fn test_swap_through_shell_is_not_playable() {
        let board = Board::from_rows(&["R r G", "B Y R"]).unwrap();
        let detector = MatchDetector::new(3);

        let candidates = detector.potential_matches(&board);
        assert!(candidates
            .iter()
            .any(|m| m.from == CellPos::new(1, 2) && m.to == CellPos::new(0, 2)));
        assert!(!detector.swap_forms_match(&board, CellPos::new(1, 2), CellPos::new(0, 2)));
    }

    #[test]
    fn test_swap_forms_match() {
        let board = Board::from_rows(&["R R G", "G B R"]).unwrap();
        let detector = MatchDetector::new(3);
        assert!(detector.swap_forms_match(&board, CellPos::new(0, 2), CellPos::new(1, 2)));
        assert!(!detector.swap_forms_match(&board, CellPos::new(0, 0), CellPos::new(1, 0)));
    }
}
