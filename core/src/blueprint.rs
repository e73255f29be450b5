use alloc::vec::Vec;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// Minimal wire snapshot of a board: dimensions plus status, mine flag, and
/// adjacency per cell, in the board's logical iteration order. Round-trips
/// losslessly and applying the same blueprint twice yields the same board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    width: Coord,
    height: Coord,
    cells: Vec<Cell>,
}

impl Blueprint {
    /// Assembles a blueprint from raw cells in logical iteration order.
    pub fn from_cells(width: Coord, height: Coord, cells: Vec<Cell>) -> Result<Blueprint> {
        if width == 0 || height == 0 {
            return Err(GameError::InvalidDimensions(width, height));
        }
        if cells.len() != mult(width, height) as usize {
            return Err(GameError::MismatchedBlueprint((width, height)));
        }
        Ok(Blueprint {
            width,
            height,
            cells,
        })
    }

    pub fn size(&self) -> Coord2 {
        (self.width, self.height)
    }

    /// Builds a standalone board from this snapshot, used when a late joiner
    /// receives full state before ever constructing a board locally.
    pub fn to_board(&self) -> Result<Board> {
        if self.width == 0 || self.height == 0 {
            return Err(GameError::InvalidDimensions(self.width, self.height));
        }
        let shape = (self.width, self.height).to_nd_index();
        let cells = Array2::from_shape_vec(shape, self.cells.clone())
            .map_err(|_| GameError::MismatchedBlueprint(self.size()))?;
        Ok(Board::from_cells(cells))
    }
}

impl Board {
    pub fn blueprint(&self) -> Blueprint {
        let (width, height) = self.size();
        Blueprint {
            width,
            height,
            cells: self.cells().iter().copied().collect(),
        }
    }

    /// Overwrites every cell from the blueprint. The board only contributes
    /// its dimensions, which must match.
    pub fn apply_blueprint(&self, blueprint: &Blueprint) -> Result<Board> {
        if blueprint.size() != self.size() {
            return Err(GameError::MismatchedBlueprint(blueprint.size()));
        }
        blueprint.to_board()
    }
}
