//! Match-3 Core - Gameplay engine
//!
//! This crate provides the core gameplay of a tile-matching puzzle:
//! - Rectangular board with a registry of uniquely identified pieces
//! - Run detection, row/column-clear expansion and potential-match search
//! - Timed resolution state machine (swap, clear, collapse, refill, rematch)
//! - Special pieces: blocks, shells, board bombs, color bombs
//! - Objectives tracking driven by gameplay events
//! - Power-ups and a seeded autoplay bot

pub mod board;
pub mod pieces;
pub mod error;
pub mod matching;
pub mod config;
pub mod level;
pub mod events;
pub mod objectives;
pub mod spawn;
pub mod engine;
pub mod autoplay;

// Re-exports for convenient access
pub use board::{Board, Cell, CellPos, PieceMove};
pub use pieces::{Bonus, Color, MatchMode, Piece, PieceId, PieceKind, ALL_COLORS};
pub use error::{EngineError, EngineResult, SwapRejection};
pub use matching::{MatchDetector, MatchSet, PotentialMatch};
pub use config::{GameConfig, PowerUp, PowerUpInventory, RulesConfig, Timings};
pub use level::{CellSpawn, ColorTarget, Level, MoveLimit};
pub use events::{BonusKind, Event, EventLog, EventSink, LevelOutcome, SpawnedPiece};
pub use objectives::{ObjectiveTargets, ObjectivesState, ObjectivesTracker};
pub use engine::{create_rng, Match3Engine, PowerUpOutcome, PowerUpRejection, SessionState};
pub use autoplay::{AutoPlayer, PlaySummary, Strategy};
