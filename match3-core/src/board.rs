//! Rectangular board of cells and the registry of live pieces
//!
//! Row 0 is the top row. Gravity pulls pieces toward larger row indices.
//! Every live piece is owned by exactly one cell and the registry keeps
//! its recorded position in sync with that cell.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};
use crate::pieces::{Bonus, Color, Piece, PieceId, PieceKind};

/// Grid coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub column: usize,
}

impl CellPos {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Manhattan distance
    pub fn distance_to(&self, other: CellPos) -> usize {
        self.row.abs_diff(other.row) + self.column.abs_diff(other.column)
    }

    /// Shares an edge with `other`
    pub fn is_adjacent(&self, other: CellPos) -> bool {
        self.distance_to(other) == 1
    }

    /// Touches `other` only at a corner
    pub fn is_diagonal(&self, other: CellPos) -> bool {
        self.row.abs_diff(other.row) == 1 && self.column.abs_diff(other.column) == 1
    }

    /// Step by (dr, dc); None when that leaves the non-negative quadrant
    pub fn offset(&self, dr: isize, dc: isize) -> Option<CellPos> {
        let row = self.row.checked_add_signed(dr)?;
        let column = self.column.checked_add_signed(dc)?;
        Some(CellPos::new(row, column))
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Orthogonal steps: up, down, left, right
pub const ORTHOGONAL: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// All eight surrounding steps
pub const SURROUNDING: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A single board cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub occupant: Option<PieceId>,
    pub playable: bool,
}

/// A piece moving from one cell to another
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PieceMove {
    pub id: PieceId,
    pub from: CellPos,
    pub to: CellPos,
    pub distance: usize,
}

/// The grid plus the piece registry
#[derive(Clone, Debug)]
pub struct Board {
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
    pieces: FxHashMap<PieceId, Piece>,
    next_id: u32,
}

impl Board {
    /// Fully playable empty board
    pub fn new(rows: usize, columns: usize) -> Self {
        Self::with_mask(rows, columns, &vec![true; rows * columns])
    }

    /// Empty board with a row-major playable mask; missing entries are playable
    pub fn with_mask(rows: usize, columns: usize, playable: &[bool]) -> Self {
        let cells = (0..rows * columns)
            .map(|i| Cell {
                occupant: None,
                playable: playable.get(i).copied().unwrap_or(true),
            })
            .collect();
        Self {
            rows,
            columns,
            cells,
            pieces: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// Parse the text notation used by fixtures and the CLI
    ///
    /// `R G B P Y` basic pieces, lowercase letters shells of that color,
    /// `#` block, `*` board bomb, `@` color bomb, `.` empty playable cell,
    /// `x` non-playable cell. Whitespace is ignored.
    pub fn from_rows(rows: &[&str]) -> EngineResult<Self> {
        let grid: Vec<Vec<char>> = rows
            .iter()
            .map(|r| r.chars().filter(|c| !c.is_whitespace()).collect())
            .collect();
        let columns = grid.first().map_or(0, |r| r.len());
        if grid.iter().any(|r| r.len() != columns) {
            return Err(EngineError::InvalidLevel("ragged board rows".into()));
        }

        let mask: Vec<bool> = grid.iter().flatten().map(|&c| c != 'x').collect();
        let mut board = Board::with_mask(grid.len(), columns, &mask);

        for (row, line) in grid.iter().enumerate() {
            for (column, &c) in line.iter().enumerate() {
                let pos = CellPos::new(row, column);
                let kind = match c {
                    '.' | 'x' => continue,
                    '#' => PieceKind::Block,
                    '*' => PieceKind::BoardBomb,
                    '@' => PieceKind::ColorBomb,
                    c => match Color::from_symbol(c) {
                        Some(color) if c.is_ascii_uppercase() => PieceKind::Basic(color),
                        Some(color) => PieceKind::Shell(color),
                        None => {
                            return Err(EngineError::InvalidLevel(format!(
                                "unknown board symbol '{}'",
                                c
                            )))
                        }
                    },
                };
                board.spawn(pos, kind, Bonus::NONE)?;
            }
        }
        Ok(board)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        pos.row < self.rows && pos.column < self.columns
    }

    fn index(&self, pos: CellPos) -> EngineResult<usize> {
        if self.contains(pos) {
            Ok(pos.row * self.columns + pos.column)
        } else {
            Err(EngineError::OutOfRange {
                pos,
                rows: self.rows,
                columns: self.columns,
            })
        }
    }

    pub fn get(&self, pos: CellPos) -> EngineResult<Cell> {
        Ok(self.cells[self.index(pos)?])
    }

    pub fn is_playable(&self, pos: CellPos) -> EngineResult<bool> {
        Ok(self.get(pos)?.playable)
    }

    /// Place or clear the occupant of a cell
    ///
    /// Placing moves an existing piece into an empty cell. Clearing retires
    /// whatever piece was there.
    pub fn set(&mut self, pos: CellPos, occupant: Option<PieceId>) -> EngineResult<()> {
        let idx = self.index(pos)?;
        match occupant {
            None => {
                if let Some(id) = self.cells[idx].occupant {
                    self.remove(id)?;
                }
                Ok(())
            }
            Some(id) => {
                if !self.cells[idx].playable {
                    return Err(EngineError::InvariantViolation(format!(
                        "cannot place {} on non-playable cell {}",
                        id, pos
                    )));
                }
                match self.cells[idx].occupant {
                    Some(current) if current == id => return Ok(()),
                    Some(current) => {
                        return Err(EngineError::InvariantViolation(format!(
                            "cell {} already holds {}",
                            pos, current
                        )))
                    }
                    None => {}
                }
                let from = self.require(id)?.pos;
                let from_idx = self.index(from)?;
                if self.cells[from_idx].occupant == Some(id) {
                    self.cells[from_idx].occupant = None;
                }
                self.cells[idx].occupant = Some(id);
                if let Some(piece) = self.pieces.get_mut(&id) {
                    piece.pos = pos;
                }
                Ok(())
            }
        }
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(&id)
    }

    fn require(&self, id: PieceId) -> EngineResult<&Piece> {
        self.pieces
            .get(&id)
            .ok_or_else(|| EngineError::InvariantViolation(format!("unknown piece {}", id)))
    }

    /// Piece occupying a cell; None for empty or off-board cells
    pub fn piece_at(&self, pos: CellPos) -> Option<&Piece> {
        let idx = self.index(pos).ok()?;
        self.cells[idx].occupant.and_then(|id| self.pieces.get(&id))
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Live pieces in row-major order
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.cells
            .iter()
            .filter_map(|c| c.occupant)
            .filter_map(|id| self.pieces.get(&id))
    }

    /// All cell positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = CellPos> {
        let columns = self.columns;
        (0..self.rows * columns).map(move |i| CellPos::new(i / columns, i % columns))
    }

    /// In-range neighbors of `pos` for the given step set
    pub fn neighbors(&self, pos: CellPos, steps: &[(isize, isize)]) -> Vec<CellPos> {
        steps
            .iter()
            .filter_map(|&(dr, dc)| pos.offset(dr, dc))
            .filter(|p| self.contains(*p))
            .collect()
    }

    /// Create a new piece in an empty playable cell
    pub fn spawn(&mut self, pos: CellPos, kind: PieceKind, bonus: Bonus) -> EngineResult<PieceId> {
        let idx = self.index(pos)?;
        let cell = self.cells[idx];
        if !cell.playable {
            return Err(EngineError::InvariantViolation(format!(
                "cannot spawn on non-playable cell {}",
                pos
            )));
        }
        if let Some(current) = cell.occupant {
            return Err(EngineError::InvariantViolation(format!(
                "cannot spawn on {}: occupied by {}",
                pos, current
            )));
        }

        let id = PieceId(self.next_id);
        self.next_id += 1;
        self.pieces.insert(id, Piece { id, kind, bonus, pos });
        self.cells[idx].occupant = Some(id);
        Ok(id)
    }

    /// Retire a piece, vacating its cell
    pub fn remove(&mut self, id: PieceId) -> EngineResult<Piece> {
        let piece = self
            .pieces
            .remove(&id)
            .ok_or_else(|| EngineError::InvariantViolation(format!("unknown piece {}", id)))?;
        let idx = self.index(piece.pos)?;
        if self.cells[idx].occupant == Some(id) {
            self.cells[idx].occupant = None;
        }
        Ok(piece)
    }

    /// Change a piece's kind in place, keeping its identity
    pub fn set_kind(&mut self, id: PieceId, kind: PieceKind) -> EngineResult<()> {
        self.require(id)?;
        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.kind = kind;
        }
        Ok(())
    }

    /// Exchange the cells of two pieces
    pub fn swap(&mut self, a: PieceId, b: PieceId) -> EngineResult<()> {
        let pos_a = self.require(a)?.pos;
        let pos_b = self.require(b)?.pos;
        let idx_a = self.index(pos_a)?;
        let idx_b = self.index(pos_b)?;

        self.cells[idx_a].occupant = Some(b);
        self.cells[idx_b].occupant = Some(a);
        if let Some(piece) = self.pieces.get_mut(&a) {
            piece.pos = pos_b;
        }
        if let Some(piece) = self.pieces.get_mut(&b) {
            piece.pos = pos_a;
        }
        Ok(())
    }

    /// Move a set of pieces to new cells at once
    ///
    /// Every source cell is vacated before any piece lands, so the targets
    /// may overlap the sources.
    pub fn rearrange(&mut self, assignments: &[(PieceId, CellPos)]) -> EngineResult<Vec<PieceMove>> {
        let mut moves = Vec::with_capacity(assignments.len());
        for &(id, _) in assignments {
            let from = self.require(id)?.pos;
            let idx = self.index(from)?;
            self.cells[idx].occupant = None;
        }
        for &(id, to) in assignments {
            let from = self.require(id)?.pos;
            self.set(to, Some(id))?;
            if from != to {
                moves.push(PieceMove {
                    id,
                    from,
                    to,
                    distance: from.distance_to(to),
                });
            }
        }
        Ok(moves)
    }

    /// Playable unoccupied cells of a column, top to bottom
    pub fn find_empty_cells_in_column(&self, column: usize) -> EngineResult<Vec<CellPos>> {
        if column >= self.columns {
            return Err(EngineError::OutOfRange {
                pos: CellPos::new(0, column),
                rows: self.rows,
                columns: self.columns,
            });
        }
        Ok((0..self.rows)
            .map(|row| CellPos::new(row, column))
            .filter(|&pos| {
                let cell = self.cells[pos.row * self.columns + pos.column];
                cell.playable && cell.occupant.is_none()
            })
            .collect())
    }

    /// Let pieces in a column fall into empty playable cells below them
    ///
    /// Blocks and shells hold their cells; other pieces fall past them and
    /// past non-playable gaps. Vertical order of falling pieces is preserved.
    pub fn collapse_column(&mut self, column: usize) -> EngineResult<Vec<PieceMove>> {
        let mut moves = Vec::new();
        // Slots a falling piece may land in, bottom-up
        let mut free: Vec<usize> = Vec::new();
        let mut next_free = 0;

        for row in (0..self.rows).rev() {
            let pos = CellPos::new(row, column);
            let idx = self.index(pos)?;
            let cell = self.cells[idx];
            if !cell.playable {
                continue;
            }
            match cell.occupant {
                None => free.push(row),
                Some(id) => {
                    let kind = self.require(id)?.kind;
                    if kind.is_anchored() {
                        continue;
                    }
                    if next_free < free.len() {
                        let target = CellPos::new(free[next_free], column);
                        next_free += 1;
                        self.set(target, Some(id))?;
                        free.push(row);
                        moves.push(PieceMove {
                            id,
                            from: pos,
                            to: target,
                            distance: pos.distance_to(target),
                        });
                    }
                }
            }
        }
        Ok(moves)
    }

    /// Check that cells and the registry agree
    pub fn check_invariants(&self) -> EngineResult<()> {
        let mut seen = 0;
        for pos in self.positions() {
            let cell = self.cells[pos.row * self.columns + pos.column];
            let Some(id) = cell.occupant else { continue };
            if !cell.playable {
                return Err(EngineError::InvariantViolation(format!(
                    "non-playable cell {} holds {}",
                    pos, id
                )));
            }
            let piece = self.require(id)?;
            if piece.pos != pos {
                return Err(EngineError::InvariantViolation(format!(
                    "{} recorded at {} but found at {}",
                    id, piece.pos, pos
                )));
            }
            seen += 1;
        }
        if seen != self.pieces.len() {
            return Err(EngineError::InvariantViolation(format!(
                "{} pieces registered but {} placed",
                self.pieces.len(),
                seen
            )));
        }
        Ok(())
    }

    fn symbol_at(&self, pos: CellPos) -> char {
        let cell = self.cells[pos.row * self.columns + pos.column];
        if !cell.playable {
            return 'x';
        }
        match self.piece_at(pos).map(|p| p.kind) {
            None => '.',
            Some(PieceKind::Basic(color)) => color.symbol(),
            Some(PieceKind::Shell(color)) => color.symbol().to_ascii_lowercase(),
            Some(PieceKind::Block) => '#',
            Some(PieceKind::BoardBomb) => '*',
            Some(PieceKind::ColorBomb) => '@',
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            let line: String = (0..self.columns)
                .map(|column| {
                    let pos = CellPos::new(row, column);
                    let bonus = self.piece_at(pos).is_some_and(|p| p.clears_line());
                    if bonus {
                        format!("{}+", self.symbol_at(pos))
                    } else {
                        format!("{} ", self.symbol_at(pos))
                    }
                })
                .collect();
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cellpos_geometry() {
        let a = CellPos::new(2, 2);
        assert!(a.is_adjacent(CellPos::new(2, 3)));
        assert!(a.is_adjacent(CellPos::new(1, 2)));
        assert!(!a.is_adjacent(CellPos::new(3, 3)));
        assert!(a.is_diagonal(CellPos::new(3, 3)));
        assert_eq!(CellPos::new(0, 0).offset(-1, 0), None);
        assert_eq!(a.distance_to(CellPos::new(0, 0)), 4);
    }

    #[test]
    fn test_from_rows_and_display() {
        let board = Board::from_rows(&["R G #", "b . x", "* @ Y"]).unwrap();
        assert_eq!(board.rows(), 3);
        assert_eq!(board.columns(), 3);
        assert_eq!(board.piece_count(), 7);
        assert!(!board.is_playable(CellPos::new(1, 2)).unwrap());
        assert_eq!(
            board.piece_at(CellPos::new(1, 0)).map(|p| p.kind),
            Some(PieceKind::Shell(Color::Blue))
        );
        assert_eq!(board.to_string(), "R G #\nb . x\n* @ Y\n");
        board.check_invariants().unwrap();
    }

    #[test]
    fn test_out_of_range() {
        let board = Board::new(3, 3);
        assert!(matches!(
            board.get(CellPos::new(3, 0)),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(board.piece_at(CellPos::new(9, 9)).is_none());
        assert!(board.find_empty_cells_in_column(5).is_err());
    }

    #[test]
    fn test_swap_keeps_identity() {
        let mut board = Board::from_rows(&["R G"]).unwrap();
        let a = board.piece_at(CellPos::new(0, 0)).unwrap().id;
        let b = board.piece_at(CellPos::new(0, 1)).unwrap().id;
        board.swap(a, b).unwrap();
        assert_eq!(board.piece_at(CellPos::new(0, 0)).unwrap().id, b);
        assert_eq!(board.piece(a).unwrap().pos, CellPos::new(0, 1));
        board.check_invariants().unwrap();
    }

    #[test]
    fn test_spawn_rejects_occupied_and_unplayable() {
        let mut board = Board::from_rows(&["R x"]).unwrap();
        let kind = PieceKind::Basic(Color::Red);
        assert!(board.spawn(CellPos::new(0, 0), kind, Bonus::NONE).is_err());
        assert!(board.spawn(CellPos::new(0, 1), kind, Bonus::NONE).is_err());
    }

    #[test]
    fn test_set_and_remove() {
        let mut board = Board::from_rows(&["R .", ". ."]).unwrap();
        let id = board.piece_at(CellPos::new(0, 0)).unwrap().id;
        board.set(CellPos::new(1, 1), Some(id)).unwrap();
        assert!(board.piece_at(CellPos::new(0, 0)).is_none());
        assert_eq!(board.piece(id).unwrap().pos, CellPos::new(1, 1));

        board.set(CellPos::new(1, 1), None).unwrap();
        assert_eq!(board.piece_count(), 0);
        assert!(board.remove(id).is_err());
        board.check_invariants().unwrap();
    }

    #[test]
    fn test_empty_cells_top_to_bottom() {
        let board = Board::from_rows(&[". R", "x .", ". G", "R ."]).unwrap();
        let empty = board.find_empty_cells_in_column(0).unwrap();
        assert_eq!(empty, vec![CellPos::new(0, 0), CellPos::new(2, 0)]);
        let empty = board.find_empty_cells_in_column(1).unwrap();
        assert_eq!(empty, vec![CellPos::new(1, 1), CellPos::new(3, 1)]);
    }

    #[test]
    fn test_collapse_preserves_order() {
        let mut board = Board::from_rows(&["R", "G", ".", "B", "."]).unwrap();
        let r = board.piece_at(CellPos::new(0, 0)).unwrap().id;
        let g = board.piece_at(CellPos::new(1, 0)).unwrap().id;
        let b = board.piece_at(CellPos::new(3, 0)).unwrap().id;

        let moves = board.collapse_column(0).unwrap();
        assert_eq!(board.piece(b).unwrap().pos, CellPos::new(4, 0));
        assert_eq!(board.piece(g).unwrap().pos, CellPos::new(3, 0));
        assert_eq!(board.piece(r).unwrap().pos, CellPos::new(2, 0));
        assert_eq!(moves.len(), 3);
        assert_eq!(moves.iter().map(|m| m.distance).max(), Some(2));
        board.check_invariants().unwrap();
    }

    #[test]
    fn test_collapse_skips_anchored_and_gaps() {
        let mut board = Board::from_rows(&["R", "#", ".", "x", "."]).unwrap();
        let r = board.piece_at(CellPos::new(0, 0)).unwrap().id;
        board.collapse_column(0).unwrap();

        // Falls past the block and the hole in the mask
        assert_eq!(board.piece(r).unwrap().pos, CellPos::new(4, 0));
        assert_eq!(board.piece_at(CellPos::new(1, 0)).map(|p| p.kind), Some(PieceKind::Block));
        board.check_invariants().unwrap();
    }

    #[test]
    fn test_rearrange_overlapping() {
        let mut board = Board::from_rows(&["R G B"]).unwrap();
        let ids: Vec<PieceId> = board.pieces().map(|p| p.id).collect();
        let moves = board
            .rearrange(&[
                (ids[0], CellPos::new(0, 1)),
                (ids[1], CellPos::new(0, 2)),
                (ids[2], CellPos::new(0, 0)),
            ])
            .unwrap();
        assert_eq!(moves.len(), 3);
        assert_eq!(board.to_string(), "B R G\n");
        board.check_invariants().unwrap();
    }
}
