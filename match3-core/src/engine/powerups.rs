//! Power-ups and board shuffling

use rand::seq::SliceRandom;
use serde::Serialize;

use super::cascade::Cascade;
use super::{Match3Engine, SessionState};
use crate::board::{CellPos, PieceMove};
use crate::config::PowerUp;
use crate::error::EngineResult;
use crate::events::{BonusKind, Event};
use crate::matching::MatchSet;
use crate::pieces::{Bonus, Color, Piece, PieceKind};
use crate::spawn::Spawner;

/// Rearrangements tried before recoloring the board
pub const MAX_SHUFFLE_ATTEMPTS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpRejection {
    /// Session is not waiting for input
    NotIdle,
    NoCharges,
    MissingTarget,
    EmptyTarget,
    /// Target kind cannot take this power-up
    UnsuitableTarget,
    /// Target already is what the power-up would make it
    AlreadyConverted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpOutcome {
    Applied,
    Rejected(PowerUpRejection),
}

impl Match3Engine {
    /// Use a power-up, spending one charge if it applies
    ///
    /// Refusals come back as `Rejected` and change nothing. An off-board
    /// target is an error.
    pub fn apply_power_up(&mut self, power_up: PowerUp, target: Option<CellPos>) -> EngineResult<PowerUpOutcome> {
        let rejection = self.check_power_up(power_up, target)?;
        if let Some(reason) = rejection {
            tracing::warn!("Power-up {} rejected: {:?}", power_up.name(), reason);
            return Ok(PowerUpOutcome::Rejected(reason));
        }

        self.clear_hint();
        self.clear_selection();
        self.inventory.consume(power_up);
        self.emit(Event::PowerUpApplied { power_up, target });

        let piece = target.and_then(|pos| self.board.piece_at(pos).copied());
        let result = match (power_up, piece) {
            (PowerUp::Hammer, Some(piece)) => self.hammer(piece),
            (PowerUp::RowColumn, Some(piece)) => self.convert(
                piece,
                PieceKind::Basic(piece.color().unwrap_or(Color::Blue)),
                Bonus::ROW_COLUMN_CLEAR,
                BonusKind::RowColumnClear,
            ),
            (PowerUp::ColorBomb, Some(piece)) => {
                self.convert(piece, PieceKind::ColorBomb, Bonus::NONE, BonusKind::ColorBomb)
            }
            (PowerUp::Shuffle, _) => {
                self.emit(Event::ShapesShuffled);
                self.shuffle_board()
                    .map(|moves| self.emit(Event::PiecesMoved { moves }))
            }
            _ => Ok(()),
        };
        result.map_err(|e| self.fault(e))?;
        Ok(PowerUpOutcome::Applied)
    }

    fn check_power_up(&self, power_up: PowerUp, target: Option<CellPos>) -> EngineResult<Option<PowerUpRejection>> {
        if !self.state.accepts_input() {
            return Ok(Some(PowerUpRejection::NotIdle));
        }
        if !self.inventory.has_charge(power_up) {
            return Ok(Some(PowerUpRejection::NoCharges));
        }
        if !power_up.needs_target() {
            return Ok(None);
        }
        let Some(pos) = target else {
            return Ok(Some(PowerUpRejection::MissingTarget));
        };
        self.board.get(pos)?;
        let Some(piece) = self.board.piece_at(pos) else {
            return Ok(Some(PowerUpRejection::EmptyTarget));
        };

        let rejection = match power_up {
            PowerUp::RowColumn if piece.clears_line() => Some(PowerUpRejection::AlreadyConverted),
            PowerUp::RowColumn if !piece.kind.is_basic() => Some(PowerUpRejection::UnsuitableTarget),
            PowerUp::ColorBomb if piece.kind == PieceKind::ColorBomb => Some(PowerUpRejection::AlreadyConverted),
            PowerUp::ColorBomb if !piece.kind.is_basic() => Some(PowerUpRejection::UnsuitableTarget),
            _ => None,
        };
        Ok(rejection)
    }

    /// Clear the target; a row/column-clear carrier takes its row with it
    fn hammer(&mut self, piece: Piece) -> EngineResult<()> {
        let cascade = match piece.kind {
            PieceKind::Basic(_) if piece.clears_line() => {
                Cascade::forced(self.detector.detect_line_clear_at(&self.board, piece.id)?)
            }
            PieceKind::Shell(_) => {
                let mut cascade = Cascade::forced(MatchSet::new());
                cascade.shells.push(piece.id);
                cascade
            }
            _ => Cascade::forced(MatchSet::from_ids([piece.id])),
        };
        self.current_power_up = Some(PowerUp::Hammer);
        self.state = SessionState::Resolving;
        self.cascade = Some(cascade);
        self.begin_step()
    }

    /// Replace the target with a bonus piece of the same color
    ///
    /// Nothing resolves afterwards, so `current_power_up` stays unset.
    fn convert(&mut self, piece: Piece, kind: PieceKind, bonus: Bonus, bonus_kind: BonusKind) -> EngineResult<()> {
        self.board.remove(piece.id)?;
        self.board.spawn(piece.pos, kind, bonus)?;
        self.emit(Event::BonusCreated {
            kind: bonus_kind,
            pos: piece.pos,
        });
        Ok(())
    }

    /// Rearrange the basic pieces into a layout with no immediate match and
    /// at least one potential match
    ///
    /// Falls back to recoloring when no arrangement is found.
    pub(super) fn shuffle_board(&mut self) -> EngineResult<Vec<PieceMove>> {
        let movable: Vec<Piece> = self.board.pieces().filter(|p| p.kind.is_basic()).copied().collect();
        if movable.len() < 2 {
            return Ok(Vec::new());
        }
        let cells: Vec<CellPos> = movable.iter().map(|p| p.pos).collect();
        let mut ids: Vec<_> = movable.iter().map(|p| p.id).collect();

        for attempt in 0..MAX_SHUFFLE_ATTEMPTS {
            ids.shuffle(&mut self.rng);
            let assignments: Vec<_> = ids.iter().copied().zip(cells.iter().copied()).collect();
            self.board.rearrange(&assignments)?;
            if !self.detector.has_immediate_match(&self.board)
                && !self.detector.potential_matches(&self.board).is_empty()
            {
                tracing::debug!("Shuffle found a layout after {} attempts", attempt + 1);
                return self.moves_since(&movable);
            }
        }

        tracing::warn!(
            "No playable arrangement after {} shuffles, recoloring",
            MAX_SHUFFLE_ATTEMPTS
        );
        let spawner = Spawner {
            avoid_runs: true,
            board_bomb_chance: 0,
            ..self.spawner.clone()
        };
        for pos in cells {
            let Some(id) = self.board.piece_at(pos).map(|p| p.id) else { continue };
            let color = spawner.color_for(&self.board, pos, &mut self.rng);
            self.board.set_kind(id, PieceKind::Basic(color))?;
        }
        self.moves_since(&movable)
    }

    fn moves_since(&self, before: &[Piece]) -> EngineResult<Vec<PieceMove>> {
        let mut moves = Vec::new();
        for piece in before {
            let Some(now) = self.board.piece(piece.id) else { continue };
            if now.pos != piece.pos {
                moves.push(PieceMove {
                    id: piece.id,
                    from: piece.pos,
                    to: now.pos,
                    distance: piece.pos.distance_to(now.pos),
                });
            }
        }
        self.board.check_invariants()?;
        Ok(moves)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine_with;
    use super::*;
    use crate::events::Event;
    use crate::level::MoveLimit;

    #[test]
    fn test_hammer_clears_target() {
        let (mut engine, log) = engine_with(&["R G B", "Y P R", "G B Y"], MoveLimit::Limited(5));
        let outcome = engine.apply_power_up(PowerUp::Hammer, Some(CellPos::new(1, 1))).unwrap();
        assert_eq!(outcome, PowerUpOutcome::Applied);
        assert_eq!(engine.current_power_up(), Some(PowerUp::Hammer));
        engine.settle().unwrap();

        assert!(log.events().contains(&Event::ShapeDestroyed {
            label: "PURPLE",
            pos: CellPos::new(1, 1)
        }));
        assert_eq!(engine.current_power_up(), None);
        // Power-ups are not moves
        assert_eq!(engine.objectives().moves_left, Some(5));
        assert_eq!(engine.board().piece_count(), 9);
    }

    #[test]
    fn test_hammer_on_carrier_clears_row() {
        let (mut engine, log) = engine_with(&["R G B", "Y P R", "G B Y"], MoveLimit::Unlimited);
        engine.apply_power_up(PowerUp::RowColumn, Some(CellPos::new(1, 0))).unwrap();
        engine.apply_power_up(PowerUp::Hammer, Some(CellPos::new(1, 0))).unwrap();
        engine.settle().unwrap();

        assert!(log.events().iter().any(|e| matches!(e, Event::RowDestroyed { row: 1, .. })));
        let first_pass = log
            .events()
            .iter()
            .skip_while(|e| !matches!(e, Event::RowDestroyed { .. }))
            .filter(|e| matches!(e, Event::ShapeDestroyed { pos, .. } if pos.row == 1))
            .count();
        assert!(first_pass >= 3);
    }

    #[test]
    fn test_hammer_on_shell_cracks_it() {
        let (mut engine, log) = engine_with(&["R G B", "Y b R", "G B Y"], MoveLimit::Unlimited);
        engine.apply_power_up(PowerUp::Hammer, Some(CellPos::new(1, 1))).unwrap();
        engine.settle().unwrap();

        assert!(log.events().contains(&Event::ShellsDestroyed { count: 1 }));
        assert_eq!(
            engine.board().piece_at(CellPos::new(1, 1)).map(|p| p.kind),
            Some(PieceKind::Basic(Color::Blue))
        );
    }

    #[test]
    fn test_beam_and_color_bomb_convert() {
        let (mut engine, log) = engine_with(&["R G B", "Y P R", "G B Y"], MoveLimit::Unlimited);
        let before = engine.board().piece_at(CellPos::new(0, 0)).unwrap().id;

        engine.apply_power_up(PowerUp::RowColumn, Some(CellPos::new(0, 0))).unwrap();
        let carrier = *engine.board().piece_at(CellPos::new(0, 0)).unwrap();
        assert_ne!(carrier.id, before);
        assert!(carrier.clears_line());
        assert_eq!(carrier.kind, PieceKind::Basic(Color::Red));

        engine.apply_power_up(PowerUp::ColorBomb, Some(CellPos::new(2, 2))).unwrap();
        assert_eq!(
            engine.board().piece_at(CellPos::new(2, 2)).map(|p| p.kind),
            Some(PieceKind::ColorBomb)
        );
        assert_eq!(log.count("bonus_created"), 2);
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.current_power_up(), None);

        // Converting a color bomb again is a no-op
        let outcome = engine.apply_power_up(PowerUp::ColorBomb, Some(CellPos::new(2, 2))).unwrap();
        assert_eq!(outcome, PowerUpOutcome::Rejected(PowerUpRejection::AlreadyConverted));
        assert_eq!(log.count("bonus_created"), 2);
    }

    #[test]
    fn test_power_up_rejections() {
        let (mut engine, _log) = engine_with(&["R G #", "Y . R", "G B Y"], MoveLimit::Unlimited);
        let reject = |r| Ok(PowerUpOutcome::Rejected(r));

        assert_eq!(
            engine.apply_power_up(PowerUp::Hammer, None).map_err(|e| e.to_string()),
            reject(PowerUpRejection::MissingTarget)
        );
        assert_eq!(
            engine.apply_power_up(PowerUp::Hammer, Some(CellPos::new(1, 1))).map_err(|e| e.to_string()),
            reject(PowerUpRejection::EmptyTarget)
        );
        assert_eq!(
            engine.apply_power_up(PowerUp::RowColumn, Some(CellPos::new(0, 2))).map_err(|e| e.to_string()),
            reject(PowerUpRejection::UnsuitableTarget)
        );
        assert!(engine.apply_power_up(PowerUp::Hammer, Some(CellPos::new(7, 7))).is_err());

        engine.inventory = crate::config::PowerUpInventory::with_charges(0);
        assert_eq!(
            engine.apply_power_up(PowerUp::Shuffle, None).map_err(|e| e.to_string()),
            reject(PowerUpRejection::NoCharges)
        );
    }

    #[test]
    fn test_charges_are_consumed() {
        let (mut engine, _log) = engine_with(&["R G B", "Y P R", "G B Y"], MoveLimit::Unlimited);
        engine.inventory = crate::config::PowerUpInventory::with_charges(1);
        engine.apply_power_up(PowerUp::Shuffle, None).unwrap();
        assert_eq!(engine.inventory().remaining(PowerUp::Shuffle), Some(0));
        let outcome = engine.apply_power_up(PowerUp::Shuffle, None).unwrap();
        assert_eq!(outcome, PowerUpOutcome::Rejected(PowerUpRejection::NoCharges));
    }

    #[test]
    fn test_shuffle_leaves_a_playable_board() {
        let (mut engine, log) = engine_with(
            &["R G B Y", "Y P R G", "G B Y P", "P R G B"],
            MoveLimit::Unlimited,
        );
        engine.apply_power_up(PowerUp::Shuffle, None).unwrap();

        assert_eq!(log.count("shapes_shuffled"), 1);
        assert_eq!(engine.board().piece_count(), 16);
        assert!(!engine.detector().has_immediate_match(engine.board()));
        engine.board().check_invariants().unwrap();
    }
}
