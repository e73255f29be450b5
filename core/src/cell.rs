use serde::{Deserialize, Serialize};

/// Player-visible lifecycle of a single cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    #[default]
    Hidden,
    Revealed,
    Flagged,
}

impl CellStatus {
    pub const fn is_unrevealed(self) -> bool {
        matches!(self, Self::Hidden | Self::Flagged)
    }
}

/// One board cell. `adjacent_mines` is only meaningful when `is_mine` is false.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub is_mine: bool,
    pub status: CellStatus,
    pub adjacent_mines: u8,
}

impl Cell {
    pub const fn is_revealed_mine(self) -> bool {
        self.is_mine && matches!(self.status, CellStatus::Revealed)
    }
}
