//! Random piece generation for level setup and refills

use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::{Board, CellPos};
use crate::pieces::{Color, PieceKind};

/// Color draws before giving up on avoiding a run
pub const MAX_SPAWN_ATTEMPTS: usize = 64;

/// Spawn settings of the active level
#[derive(Clone, Debug)]
pub struct Spawner {
    pub colors: Vec<Color>,
    pub avoid_runs: bool,
    /// Percent chance a refill spawns a board bomb
    pub board_bomb_chance: u8,
    /// Runs this long are avoided
    pub minimum_matches: usize,
}

impl Spawner {
    pub fn random_color<R: Rng>(&self, rng: &mut R) -> Color {
        self.colors.choose(rng).copied().unwrap_or(Color::Blue)
    }

    /// Percent roll for a board bomb
    pub fn can_spawn_board_bomb<R: Rng>(&self, rng: &mut R) -> bool {
        self.board_bomb_chance > 0 && rng.gen_range(0..100u8) < self.board_bomb_chance
    }

    /// Color for `pos` that does not complete a run with the pieces to its
    /// left or above it
    pub fn color_for<R: Rng>(&self, board: &Board, pos: CellPos, rng: &mut R) -> Color {
        if !self.avoid_runs {
            return self.random_color(rng);
        }
        let mut last = self.random_color(rng);
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            if !self.completes_run(board, pos, last) {
                return last;
            }
            last = self.random_color(rng);
        }
        self.colors
            .iter()
            .copied()
            .find(|&c| !self.completes_run(board, pos, c))
            .unwrap_or(last)
    }

    /// Kind for a refill cell
    pub fn refill_kind<R: Rng>(&self, board: &Board, pos: CellPos, rng: &mut R) -> PieceKind {
        if self.can_spawn_board_bomb(rng) {
            PieceKind::BoardBomb
        } else {
            PieceKind::Basic(self.color_for(board, pos, rng))
        }
    }

    /// The minimum-1 pieces to the left, or above, all share `color`
    fn completes_run(&self, board: &Board, pos: CellPos, color: Color) -> bool {
        let need = self.minimum_matches.saturating_sub(1).max(1);
        [(0isize, -1isize), (-1, 0)].iter().any(|&(dr, dc)| {
            (1..=need as isize).all(|k| {
                pos.offset(dr * k, dc * k)
                    .and_then(|p| board.piece_at(p))
                    .is_some_and(|p| p.color() == Some(color))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::ALL_COLORS;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spawner(colors: &[Color]) -> Spawner {
        Spawner {
            colors: colors.to_vec(),
            avoid_runs: true,
            board_bomb_chance: 0,
            minimum_matches: 3,
        }
    }

    #[test]
    fn test_avoids_horizontal_and_vertical_runs() {
        let board = Board::from_rows(&[". . R", ". . R", "G G ."]).unwrap();
        let spawner = spawner(&[Color::Red, Color::Green, Color::Blue]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            let color = spawner.color_for(&board, CellPos::new(2, 2), &mut rng);
            assert_eq!(color, Color::Blue);
        }
    }

    #[test]
    fn test_fallback_when_every_color_runs() {
        let board = Board::from_rows(&["R R ."]).unwrap();
        let spawner = spawner(&[Color::Red]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(spawner.color_for(&board, CellPos::new(0, 2), &mut rng), Color::Red);
    }

    #[test]
    fn test_board_bomb_chance() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let never = spawner(&ALL_COLORS);
        assert!((0..200).all(|_| !never.can_spawn_board_bomb(&mut rng)));

        let always = Spawner {
            board_bomb_chance: 100,
            ..spawner(&ALL_COLORS)
        };
        assert!((0..200).all(|_| always.can_spawn_board_bomb(&mut rng)));
    }
}
