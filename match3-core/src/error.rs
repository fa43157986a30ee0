//! Engine error types

use crate::board::CellPos;

/// Why a swap request was refused before anything moved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapRejection {
    SameCell,
    NotAdjacent,
    Diagonal,
    EmptyCell(CellPos),
    Immovable(CellPos),
}

impl std::fmt::Display for SwapRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapRejection::SameCell => write!(f, "cells are identical"),
            SwapRejection::NotAdjacent => write!(f, "cells are not adjacent"),
            SwapRejection::Diagonal => write!(f, "diagonal swaps are not allowed"),
            SwapRejection::EmptyCell(pos) => write!(f, "no piece at {}", pos),
            SwapRejection::Immovable(pos) => write!(f, "piece at {} cannot move", pos),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cell {pos} is outside the {rows}x{columns} board")]
    OutOfRange { pos: CellPos, rows: usize, columns: usize },

    #[error("invalid swap {a} <-> {b}: {reason}")]
    InvalidSwap {
        a: CellPos,
        b: CellPos,
        reason: SwapRejection,
    },

    #[error("board invariant violated: {0}")]
    InvariantViolation(String),

    #[error("session is {state} and does not accept this request")]
    NotAccepting { state: &'static str },

    #[error("no levels configured")]
    NoLevels,

    #[error("invalid level: {0}")]
    InvalidLevel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
