//! Match-3 session engine
//!
//! Owns the board, drives the resolution state machine on an explicit clock
//! and forwards every event to subscribers. The objectives tracker sees each
//! event first; its follow-up events are published right after the event
//! that caused them.
//!
//! Session states:
//! - `Idle`: waiting for input, hint clock running
//! - `Selecting`: a piece is picked, waiting for the second cell
//! - `Resolving`: a swap or power-up is being resolved phase by phase
//! - `Paused`, `Ended`, `Faulted`: no input accepted

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::time::Duration;

use crate::board::{Board, CellPos, PieceMove};
use crate::config::{GameConfig, PowerUp, PowerUpInventory};
use crate::error::{EngineError, EngineResult, SwapRejection};
use crate::events::{Event, EventSink, LevelOutcome};
use crate::level::{CellSpawn, Level};
use crate::matching::{MatchDetector, MatchSet, PotentialMatch};
use crate::objectives::{ObjectiveTargets, ObjectivesState, ObjectivesTracker};
use crate::pieces::{Bonus, PieceId, PieceKind};
use crate::spawn::Spawner;

mod cascade;
mod powerups;

use cascade::{Cascade, Phase};
pub use powerups::{PowerUpOutcome, PowerUpRejection, MAX_SHUFFLE_ATTEMPTS};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Phases `settle` runs before declaring the cascade stuck
pub const MAX_SETTLE_PHASES: usize = 10_000;

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No level started yet
    Inactive,
    Idle,
    Selecting,
    Resolving,
    Paused,
    Ended,
    /// An invariant broke; only `end_level` or `start_level` are accepted
    Faulted,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Inactive => "inactive",
            SessionState::Idle => "idle",
            SessionState::Selecting => "selecting",
            SessionState::Resolving => "resolving",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
            SessionState::Faulted => "faulted",
        }
    }

    pub fn accepts_input(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Selecting)
    }
}

/// A phase waiting for its timer
#[derive(Clone, Copy, Debug)]
struct Scheduled {
    phase: Phase,
    remaining: Duration,
}

#[derive(Clone, Debug, Default)]
struct HintClock {
    idle: Duration,
    shown: Option<Vec<CellPos>>,
    /// A shuffle left no potential match; wait for the board to change
    stalled: bool,
}

/// Create RNG from optional seed
pub fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

pub struct Match3Engine {
    config: GameConfig,
    detector: MatchDetector,
    rng: ChaCha8Rng,
    board: Board,
    spawner: Spawner,
    level_index: usize,
    level: Option<Level>,
    state: SessionState,
    selection: Option<CellPos>,
    /// Swapped pieces awaiting validation, for the undo
    pending_swap: Option<(PieceId, PieceId)>,
    current_power_up: Option<PowerUp>,
    inventory: PowerUpInventory,
    cascade: Option<Cascade>,
    scheduled: Option<Scheduled>,
    hint: HintClock,
    tracker: ObjectivesTracker,
    sinks: Vec<Box<dyn EventSink>>,
    end_request: Option<LevelOutcome>,
    outcome: Option<LevelOutcome>,
    moves_made: u32,
}

impl Match3Engine {
    pub fn new(config: GameConfig) -> EngineResult<Self> {
        config.rules.validate().map_err(EngineError::InvalidConfig)?;
        let detector = MatchDetector::new(config.rules.minimum_matches);
        let spawner = Spawner {
            colors: Vec::new(),
            avoid_runs: true,
            board_bomb_chance: 0,
            minimum_matches: config.rules.minimum_matches,
        };
        Ok(Self {
            detector,
            rng: create_rng(config.seed),
            board: Board::new(0, 0),
            spawner,
            level_index: 0,
            level: None,
            state: SessionState::Inactive,
            selection: None,
            pending_swap: None,
            current_power_up: None,
            inventory: config.power_ups.clone(),
            cascade: None,
            scheduled: None,
            hint: HintClock::default(),
            tracker: ObjectivesTracker::new(&config.rules),
            sinks: Vec::new(),
            end_request: None,
            outcome: None,
            moves_made: 0,
            config,
        })
    }

    /// Register an observer; it receives every later event in order
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn objectives(&self) -> &ObjectivesState {
        self.tracker.state()
    }

    pub fn selection(&self) -> Option<CellPos> {
        self.selection
    }

    pub fn inventory(&self) -> &PowerUpInventory {
        &self.inventory
    }

    /// Power-up whose cascade is still resolving
    pub fn current_power_up(&self) -> Option<PowerUp> {
        self.current_power_up
    }

    /// Successful swaps this level
    pub fn moves_made(&self) -> u32 {
        self.moves_made
    }

    /// Outcome of the last ended level
    pub fn outcome(&self) -> Option<LevelOutcome> {
        self.outcome
    }

    pub fn detector(&self) -> &MatchDetector {
        &self.detector
    }

    pub fn potential_matches(&self) -> Vec<PotentialMatch> {
        self.detector.potential_matches(&self.board)
    }

    pub fn detect_all_potential_matches(&self) -> Option<MatchSet> {
        self.detector.detect_all_potential_matches(&self.board)
    }

    // ------------------------------------------------------------------------
    // Level lifecycle
    // ------------------------------------------------------------------------

    /// Build the board for a level and start tracking its objectives
    ///
    /// An index past the end of the catalog falls back to level 0.
    pub fn start_level(&mut self, index: usize) -> EngineResult<()> {
        if self.config.levels.is_empty() {
            return Err(EngineError::NoLevels);
        }
        let index = if index < self.config.levels.len() {
            index
        } else {
            tracing::warn!("Level {} does not exist, starting level 0", index);
            0
        };
        let level = self.config.levels[index].clone();
        level.validate().map_err(EngineError::InvalidLevel)?;

        self.reset_session();
        self.spawner = Spawner {
            colors: level.colors.clone(),
            avoid_runs: level.randomize_colors,
            board_bomb_chance: level.board_bomb_chance,
            minimum_matches: self.config.rules.minimum_matches,
        };
        self.board = self.build_board(&level)?;
        self.tracker.start(ObjectiveTargets::from_level(&level));
        self.level_index = index;
        self.state = SessionState::Idle;

        tracing::info!(
            "Level {} '{}' started: {}x{}, {} pieces",
            index,
            level.name,
            self.board.rows(),
            self.board.columns(),
            self.board.piece_count()
        );
        let name = level.name.clone();
        self.level = Some(level);
        self.emit(Event::LevelStart { level: index, name });
        Ok(())
    }

    fn reset_session(&mut self) {
        self.selection = None;
        self.pending_swap = None;
        self.current_power_up = None;
        self.cascade = None;
        self.scheduled = None;
        self.hint = HintClock::default();
        self.end_request = None;
        self.outcome = None;
        self.moves_made = 0;
    }

    fn build_board(&mut self, level: &Level) -> EngineResult<Board> {
        let mut board = Board::with_mask(level.rows(), level.columns(), &level.playable_mask());
        for (row, line) in level.layout.iter().enumerate() {
            for (column, &spawn) in line.iter().enumerate() {
                let pos = CellPos::new(row, column);
                let kind = match spawn {
                    CellSpawn::Empty => continue,
                    CellSpawn::Block => PieceKind::Block,
                    CellSpawn::BoardBomb => PieceKind::BoardBomb,
                    CellSpawn::Shell => PieceKind::Shell(self.spawner.random_color(&mut self.rng)),
                    other => match other.color() {
                        Some(color) if !level.randomize_colors => PieceKind::Basic(color),
                        _ => PieceKind::Basic(self.spawner.color_for(&board, pos, &mut self.rng)),
                    },
                };
                board.spawn(pos, kind, Bonus::NONE)?;
            }
        }
        board.check_invariants()?;
        Ok(board)
    }

    /// End the level now
    ///
    /// Reports a pending completion or failure if one was decided, otherwise
    /// the level is abandoned.
    pub fn end_level(&mut self) -> EngineResult<()> {
        if matches!(self.state, SessionState::Inactive | SessionState::Ended) {
            return Err(EngineError::NotAccepting {
                state: self.state.name(),
            });
        }
        let outcome = self.end_request.take().unwrap_or(LevelOutcome::Abandoned);
        self.finish_level(outcome);
        Ok(())
    }

    fn finish_level(&mut self, outcome: LevelOutcome) {
        self.cascade = None;
        self.scheduled = None;
        self.pending_swap = None;
        self.current_power_up = None;
        self.selection = None;
        self.hint = HintClock::default();
        self.state = SessionState::Ended;
        self.outcome = Some(outcome);

        let score = self.tracker.state().score;
        let stars = self.level.as_ref().map_or(0, |l| l.stars(score));
        tracing::info!(
            "Level {} ended: {:?}, score={}, stars={}, moves={}",
            self.level_index,
            outcome,
            score,
            stars,
            self.moves_made
        );
        self.emit(Event::LevelEnd {
            outcome,
            score,
            stars,
        });
    }

    /// Pause input; an in-flight cascade is resolved first
    ///
    /// The cascade is settled rather than dropped, so the board is never
    /// left half cleared and no continuation needs replaying on resume.
    pub fn pause_level(&mut self) -> EngineResult<()> {
        match self.state {
            SessionState::Idle | SessionState::Selecting | SessionState::Resolving => {}
            state => return Err(EngineError::NotAccepting { state: state.name() }),
        }
        if self.state == SessionState::Resolving {
            self.settle()?;
        }
        if self.state == SessionState::Ended {
            return Ok(());
        }
        self.clear_hint();
        self.clear_selection();
        self.state = SessionState::Paused;
        self.emit(Event::LevelPaused);
        Ok(())
    }

    pub fn resume_level(&mut self) -> EngineResult<()> {
        if self.state != SessionState::Paused {
            return Err(EngineError::NotAccepting {
                state: self.state.name(),
            });
        }
        self.state = SessionState::Idle;
        self.hint = HintClock::default();
        self.emit(Event::LevelResumed);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    fn ensure_accepting(&self) -> EngineResult<()> {
        if self.state.accepts_input() {
            Ok(())
        } else {
            Err(EngineError::NotAccepting {
                state: self.state.name(),
            })
        }
    }

    /// Pick the first cell of a swap
    pub fn select(&mut self, pos: CellPos) -> EngineResult<()> {
        self.ensure_accepting()?;
        self.board.get(pos)?;
        let piece = self.board.piece_at(pos).copied().ok_or(EngineError::InvalidSwap {
            a: pos,
            b: pos,
            reason: SwapRejection::EmptyCell(pos),
        })?;
        if piece.kind.is_immovable() {
            return Err(EngineError::InvalidSwap {
                a: pos,
                b: pos,
                reason: SwapRejection::Immovable(pos),
            });
        }
        self.clear_hint();
        self.selection = Some(pos);
        self.state = SessionState::Selecting;
        self.emit(Event::SelectionChanged { cell: Some(pos) });
        Ok(())
    }

    pub fn cancel_selection(&mut self) {
        if self.state == SessionState::Selecting {
            self.clear_selection();
        }
    }

    fn clear_selection(&mut self) {
        if self.state == SessionState::Selecting {
            self.state = SessionState::Idle;
        }
        if self.selection.take().is_some() {
            self.emit(Event::SelectionChanged { cell: None });
        }
    }

    /// Swap two adjacent pieces and start resolving
    ///
    /// Errors leave the board untouched. A swap that forms no match is
    /// reverted once the swap phase expires.
    pub fn request_swap(&mut self, a: CellPos, b: CellPos) -> EngineResult<()> {
        self.ensure_accepting()?;
        self.board.get(a)?;
        self.board.get(b)?;

        let reject = |reason| EngineError::InvalidSwap { a, b, reason };
        if a == b {
            return Err(reject(SwapRejection::SameCell));
        }
        if a.is_diagonal(b) {
            return Err(reject(SwapRejection::Diagonal));
        }
        if !a.is_adjacent(b) {
            return Err(reject(SwapRejection::NotAdjacent));
        }
        let first = *self
            .board
            .piece_at(a)
            .ok_or(reject(SwapRejection::EmptyCell(a)))?;
        let second = *self
            .board
            .piece_at(b)
            .ok_or(reject(SwapRejection::EmptyCell(b)))?;
        if first.kind.is_immovable() {
            return Err(reject(SwapRejection::Immovable(a)));
        }
        if second.kind.is_immovable() {
            return Err(reject(SwapRejection::Immovable(b)));
        }

        self.clear_hint();
        self.clear_selection();
        self.board.swap(first.id, second.id)?;
        self.pending_swap = Some((first.id, second.id));
        self.state = SessionState::Resolving;
        tracing::debug!("Swap {} {} <-> {} {}", first.id, a, second.id, b);
        self.emit(Event::PiecesMoved {
            moves: swap_moves(first.id, a, second.id, b),
        });
        self.schedule(Phase::Swapping, self.config.timings.swap());
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------------

    fn schedule(&mut self, phase: Phase, delay: Duration) {
        self.scheduled = Some(Scheduled {
            phase,
            remaining: delay,
        });
    }

    /// Advance the session clock, running every phase whose timer expires
    pub fn advance(&mut self, elapsed: Duration) -> EngineResult<()> {
        match self.state {
            SessionState::Resolving => {
                let mut budget = elapsed;
                while self.state == SessionState::Resolving {
                    let Some(scheduled) = self.scheduled.as_mut() else { break };
                    if scheduled.remaining > budget {
                        scheduled.remaining -= budget;
                        break;
                    }
                    budget -= scheduled.remaining;
                    let phase = scheduled.phase;
                    self.scheduled = None;
                    self.run_phase(phase)?;
                }
                Ok(())
            }
            SessionState::Idle => self.tick_hint(elapsed),
            _ => Ok(()),
        }
    }

    /// Run pending phases back to back until the session leaves `Resolving`
    pub fn settle(&mut self) -> EngineResult<()> {
        let mut phases = 0;
        while self.state == SessionState::Resolving {
            phases += 1;
            let Some(scheduled) = self.scheduled.take() else {
                return Err(self.fault(EngineError::InvariantViolation(
                    "resolving with no phase scheduled".into(),
                )));
            };
            if phases > MAX_SETTLE_PHASES {
                return Err(self.fault(EngineError::InvariantViolation(format!(
                    "cascade did not settle after {} phases",
                    MAX_SETTLE_PHASES
                ))));
            }
            self.run_phase(scheduled.phase)?;
        }
        Ok(())
    }

    fn run_phase(&mut self, phase: Phase) -> EngineResult<()> {
        tracing::debug!("Phase {:?}", phase);
        let result = match phase {
            Phase::Swapping => self.finish_swap(),
            Phase::Reverting => self.revert_swap(),
            Phase::BombFuse => self.begin_step(),
            Phase::BeforeCollapse => self.clear_matched(),
            Phase::Collapsing => self.collapse_and_refill(),
            Phase::AfterCollapse => self.rematch(),
        };
        result.map_err(|e| self.fault(e))
    }

    /// Stop the session after a broken invariant
    fn fault(&mut self, error: EngineError) -> EngineError {
        tracing::error!("Session faulted: {}", error);
        self.state = SessionState::Faulted;
        self.cascade = None;
        self.scheduled = None;
        self.pending_swap = None;
        error
    }

    fn finish_resolution(&mut self) -> EngineResult<()> {
        self.cascade = None;
        self.scheduled = None;
        self.pending_swap = None;
        self.current_power_up = None;
        self.state = SessionState::Idle;
        self.hint = HintClock::default();
        if let Some(outcome) = self.end_request.take() {
            self.finish_level(outcome);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Hints
    // ------------------------------------------------------------------------

    fn tick_hint(&mut self, elapsed: Duration) -> EngineResult<()> {
        self.hint.idle += elapsed;
        if self.hint.idle < self.config.timings.potential_match() {
            return Ok(());
        }
        self.hint.idle = Duration::ZERO;

        if let Some(cells) = self.hint.shown.clone() {
            self.emit(Event::HintAvailable { cells });
            return Ok(());
        }

        let candidates = self.detector.potential_matches(&self.board);
        if candidates.is_empty() {
            if self.hint.stalled {
                return Ok(());
            }
            let movable = self.board.pieces().filter(|p| p.kind.is_basic()).count();
            if movable < 2 {
                tracing::warn!("No potential matches and {} movable pieces, not shuffling", movable);
                self.hint.stalled = true;
                return Ok(());
            }
            tracing::debug!("No potential matches, shuffling");
            self.emit(Event::ShapesShuffled);
            let moves = self.shuffle_board().map_err(|e| self.fault(e))?;
            self.emit(Event::PiecesMoved { moves });
            if self.detector.potential_matches(&self.board).is_empty() {
                tracing::warn!("Shuffle found no playable layout, hint scan paused until the board changes");
                self.hint.stalled = true;
            }
            return Ok(());
        }

        let can_show = self.level.as_ref().is_some_and(|l| l.can_show_hint);
        if can_show {
            if let Some(pick) = candidates.choose(&mut self.rng) {
                let cells = pick.cells.clone();
                self.hint.shown = Some(cells.clone());
                self.emit(Event::HintAvailable { cells });
            }
        }
        Ok(())
    }

    fn clear_hint(&mut self) {
        self.hint.idle = Duration::ZERO;
        self.hint.stalled = false;
        if self.hint.shown.take().is_some() {
            self.emit(Event::HintCleared);
        }
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    fn emit(&mut self, event: Event) {
        let follow_ups = self.tracker.handle(&event);
        self.publish(&event);
        for follow_up in follow_ups {
            match follow_up {
                Event::ObjectivesCleared => self.end_request = Some(LevelOutcome::Completed),
                Event::MovesLeftChanged { remaining: 0 } if self.end_request.is_none() => {
                    self.end_request = Some(LevelOutcome::Failed)
                }
                _ => {}
            }
            self.publish(&follow_up);
        }
    }

    fn publish(&mut self, event: &Event) {
        for sink in self.sinks.iter_mut() {
            sink.on_event(event);
        }
    }
}

fn swap_moves(first: PieceId, a: CellPos, second: PieceId, b: CellPos) -> Vec<PieceMove> {
    vec![
        PieceMove {
            id: first,
            from: a,
            to: b,
            distance: 1,
        },
        PieceMove {
            id: second,
            from: b,
            to: a,
            distance: 1,
        },
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Timings;
    use crate::events::EventLog;
    use crate::level::MoveLimit;
    use crate::pieces::{Color, ALL_COLORS};

    /// Engine over a fixed board, no refill randomness in the layout
    pub(crate) fn engine_with(rows: &[&str], moves: MoveLimit) -> (Match3Engine, EventLog) {
        let board = Board::from_rows(rows).unwrap();
        let mut level = Level::filled("fixture", board.rows(), board.columns(), &ALL_COLORS);
        level.randomize_colors = false;
        level.moves = moves;
        level.score_target = Some(100_000);
        for pos in board.positions() {
            let spawn = match board.piece_at(pos).map(|p| p.kind) {
                None if board.is_playable(pos).unwrap() => CellSpawn::Red,
                None => CellSpawn::Empty,
                Some(PieceKind::Basic(color)) => CellSpawn::from_color(color),
                Some(PieceKind::Block) => CellSpawn::Block,
                Some(PieceKind::Shell(_)) => CellSpawn::Shell,
                Some(PieceKind::BoardBomb) => CellSpawn::BoardBomb,
                Some(PieceKind::ColorBomb) => CellSpawn::Red,
            };
            level.layout[pos.row][pos.column] = spawn;
        }
        let config = GameConfig::for_level(level)
            .with_seed(11)
            .with_timings(Timings::instant())
            .with_power_ups(PowerUpInventory::unlimited());
        let mut engine = Match3Engine::new(config).unwrap();
        let log = EventLog::new();
        engine.subscribe(log.clone());
        engine.start_level(0).unwrap();
        // Pin random shell colors, place color bombs and clear empty cells
        for pos in board.positions() {
            match board.piece_at(pos) {
                Some(piece) if matches!(piece.kind, PieceKind::Shell(_) | PieceKind::ColorBomb) => {
                    let id = engine.board.piece_at(pos).unwrap().id;
                    engine.board.set_kind(id, piece.kind).unwrap();
                }
                None if board.is_playable(pos).unwrap() => engine.board.set(pos, None).unwrap(),
                _ => {}
            }
        }
        log.take();
        (engine, log)
    }

    #[test]
    fn test_start_level_emits_level_start() {
        let config = GameConfig::default().with_seed(1);
        let mut engine = Match3Engine::new(config).unwrap();
        let log = EventLog::new();
        engine.subscribe(log.clone());
        engine.start_level(0).unwrap();

        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(log.position("level_start"), Some(0));
        assert_eq!(engine.board().piece_count(), 62);
        engine.board().check_invariants().unwrap();
        // Random fill never starts with a run
        assert!(!engine.detector().has_immediate_match(engine.board()));
    }

    #[test]
    fn test_start_level_out_of_range_uses_first() {
        let mut engine = Match3Engine::new(GameConfig::default().with_seed(2)).unwrap();
        engine.start_level(42).unwrap();
        assert_eq!(engine.level_index(), 0);

        let mut empty = Match3Engine::new(GameConfig::default().with_levels(Vec::new())).unwrap();
        assert!(matches!(empty.start_level(0), Err(EngineError::NoLevels)));
    }

    #[test]
    fn test_same_seed_same_board() {
        let make = || {
            let mut engine = Match3Engine::new(GameConfig::default().with_seed(99)).unwrap();
            engine.start_level(0).unwrap();
            engine.board().to_string()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let mut config = GameConfig::default();
        config.rules.minimum_matches_for_bonus = 2;
        assert!(matches!(Match3Engine::new(config), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_swap_validation() {
        let (mut engine, log) = engine_with(&["R G #", "G B Y", "Y P B"], MoveLimit::Unlimited);
        let before = engine.board().to_string();

        let err = engine.request_swap(CellPos::new(0, 0), CellPos::new(1, 1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSwap { reason: SwapRejection::Diagonal, .. }));
        let err = engine.request_swap(CellPos::new(0, 0), CellPos::new(0, 2)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSwap { reason: SwapRejection::NotAdjacent, .. }));
        let err = engine.request_swap(CellPos::new(0, 1), CellPos::new(0, 2)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSwap { reason: SwapRejection::Immovable(_), .. }));
        let err = engine.request_swap(CellPos::new(0, 0), CellPos::new(0, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSwap { reason: SwapRejection::SameCell, .. }));
        let err = engine.request_swap(CellPos::new(0, 0), CellPos::new(5, 0)).unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange { .. }));

        assert_eq!(engine.board().to_string(), before);
        assert!(log.is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_input_rejected_while_resolving() {
        let (mut engine, _log) = engine_with(&["R G R", "B R Y", "G P B"], MoveLimit::Unlimited);
        engine.request_swap(CellPos::new(0, 1), CellPos::new(1, 1)).unwrap();
        assert_eq!(engine.state(), SessionState::Resolving);
        let err = engine.request_swap(CellPos::new(2, 0), CellPos::new(2, 1)).unwrap_err();
        assert!(matches!(err, EngineError::NotAccepting { state: "resolving" }));
        engine.settle().unwrap();
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_select_and_cancel() {
        let (mut engine, log) = engine_with(&["R G #", "G B Y"], MoveLimit::Unlimited);
        assert!(engine.select(CellPos::new(0, 2)).is_err());
        engine.select(CellPos::new(0, 0)).unwrap();
        assert_eq!(engine.state(), SessionState::Selecting);
        assert_eq!(engine.selection(), Some(CellPos::new(0, 0)));
        engine.cancel_selection();
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(
            log.events(),
            vec![
                Event::SelectionChanged { cell: Some(CellPos::new(0, 0)) },
                Event::SelectionChanged { cell: None },
            ]
        );
    }

    #[test]
    fn test_clock_waits_for_swap_timer() {
        let (mut engine, log) = engine_with(&["R G B", "Y P R", "G B Y"], MoveLimit::Unlimited);
        engine.config.timings.swap = 200;
        engine.request_swap(CellPos::new(0, 0), CellPos::new(0, 1)).unwrap();

        engine.advance(Duration::from_millis(150)).unwrap();
        assert_eq!(engine.state(), SessionState::Resolving);
        assert_eq!(log.count("unsuccessful_move"), 0);

        // Swap phase expires, the undo animation starts
        engine.advance(Duration::from_millis(50)).unwrap();
        assert_eq!(engine.state(), SessionState::Resolving);
        assert_eq!(log.count("unsuccessful_move"), 0);

        engine.advance(Duration::from_millis(200)).unwrap();
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(log.count("unsuccessful_move"), 1);
    }

    #[test]
    fn test_pause_flushes_cascade() {
        let (mut engine, log) = engine_with(&["R G R", "B R Y", "G P B"], MoveLimit::Unlimited);
        engine.request_swap(CellPos::new(0, 1), CellPos::new(1, 1)).unwrap();
        engine.pause_level().unwrap();

        assert_eq!(engine.state(), SessionState::Paused);
        assert!(log.count("shapes_matched") >= 1);
        assert!(log.position("shapes_matched") < log.position("level_paused"));
        assert!(engine.request_swap(CellPos::new(0, 0), CellPos::new(0, 1)).is_err());

        engine.resume_level().unwrap();
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(engine.resume_level().is_err());
    }

    #[test]
    fn test_end_level_abandoned() {
        let (mut engine, log) = engine_with(&["R G B", "Y P R"], MoveLimit::Unlimited);
        engine.end_level().unwrap();
        assert_eq!(engine.state(), SessionState::Ended);
        assert_eq!(engine.outcome(), Some(LevelOutcome::Abandoned));
        assert!(matches!(
            log.events().last(),
            Some(Event::LevelEnd { outcome: LevelOutcome::Abandoned, .. })
        ));
        assert!(engine.end_level().is_err());
    }

    #[test]
    fn test_hint_after_idle_period() {
        let (mut engine, log) = engine_with(&["R G R", "B R Y", "G P B"], MoveLimit::Unlimited);
        let period = engine.config().timings.potential_match();
        engine.advance(period / 2).unwrap();
        assert_eq!(log.count("hint_available"), 0);
        engine.advance(period).unwrap();
        assert_eq!(log.count("hint_available"), 1);

        // Any input clears it
        engine.select(CellPos::new(2, 0)).unwrap();
        assert_eq!(log.count("hint_cleared"), 1);
    }

    #[test]
    fn test_deadlocked_board_shuffles() {
        let (mut engine, log) = engine_with(&["R G B", "Y P R", "G B Y"], MoveLimit::Unlimited);
        assert!(engine.detect_all_potential_matches().is_none());

        let ids_before: Vec<PieceId> = {
            let mut ids: Vec<PieceId> = engine.board().pieces().map(|p| p.id).collect();
            ids.sort();
            ids
        };
        engine.advance(engine.config().timings.potential_match()).unwrap();

        assert_eq!(log.count("shapes_shuffled"), 1);
        let mut ids_after: Vec<PieceId> = engine.board().pieces().map(|p| p.id).collect();
        ids_after.sort();
        assert_eq!(ids_before, ids_after);
        assert!(!engine.detector().has_immediate_match(engine.board()));
        engine.board().check_invariants().unwrap();
    }

    #[test]
    fn test_lone_piece_is_never_shuffled() {
        let (mut engine, log) = engine_with(&["R #", "# #"], MoveLimit::Unlimited);
        let period = engine.config().timings.potential_match();
        for _ in 0..3 {
            engine.advance(period).unwrap();
        }
        assert_eq!(log.count("shapes_shuffled"), 0);
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_unplayable_board_shuffles_once() {
        let (mut engine, log) = engine_with(&["R G #", "# # #"], MoveLimit::Unlimited);
        let period = engine.config().timings.potential_match();
        for _ in 0..4 {
            engine.advance(period).unwrap();
        }
        assert_eq!(log.count("shapes_shuffled"), 1);
        assert_eq!(engine.state(), SessionState::Idle);

        // A fresh input allows one more attempt
        engine.select(CellPos::new(0, 0)).unwrap();
        engine.advance(period).unwrap();
        engine.advance(period).unwrap();
        assert!(log.count("shapes_shuffled") <= 2);
    }

    #[test]
    fn test_tracker_follow_ups_come_right_after() {
        let (mut engine, log) = engine_with(&["R G R", "B R Y", "G P B"], MoveLimit::Limited(10));
        engine.request_swap(CellPos::new(0, 1), CellPos::new(1, 1)).unwrap();
        engine.settle().unwrap();

        let events = log.events();
        let moved = events.iter().position(|e| *e == Event::SuccessfulMove).unwrap();
        assert_eq!(events[moved + 1], Event::MovesLeftChanged { remaining: 9 });
        let matched = events
            .iter()
            .position(|e| matches!(e, Event::ShapesMatched { .. }))
            .unwrap();
        assert_eq!(events[matched], Event::ShapesMatched { color: Color::Red, count: 3 });
        assert_eq!(events[matched + 1], Event::ScoresChanged { score: 30 });
    }
}
