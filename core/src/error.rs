use thiserror::Error;

use crate::{CellCount, Coord, Coord2};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid board dimensions {0}x{1}")]
    InvalidDimensions(Coord, Coord),
    #[error("Cannot place {requested} mines, only {available} cells available")]
    InfeasibleMineCount {
        requested: CellCount,
        available: CellCount,
    },
    #[error("Blueprint dimensions {0:?} do not match the board")]
    MismatchedBlueprint(Coord2),
}

pub type Result<T> = core::result::Result<T, GameError>;
