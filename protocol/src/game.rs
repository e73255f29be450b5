use minemesh_core::{Blueprint, CellCount, Coord};
use serde::{Deserialize, Serialize};

/// Millisecond wall-clock timestamp, always taken from the local clock of
/// whichever node stamps it.
pub type Millis = u64;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub enabled: bool,
    pub minutes: u8,
    pub seconds: u8,
}

/// Lobby configuration, replicated by value: every broadcast replaces the
/// recipient's copy wholesale, there is no field-by-field merge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub width: Coord,
    pub height: Coord,
    pub bomb_count: CellCount,
    pub timer: TimerConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 9,
            height: 9,
            bomb_count: 10,
            timer: TimerConfig::default(),
        }
    }
}

/// Full replicated game snapshot; exists only while a game is active.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub config: GameConfig,
    pub board: Blueprint,
    pub start_time: Millis,
}

/// A single replicated interaction with the board.
///
/// `FirstReveal` carries the mine layout chosen by whichever node clicked
/// first, so that peers without mines yet can adopt it verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellAction {
    Reveal { x: Coord, y: Coord },
    Flag { x: Coord, y: Coord },
    FirstReveal { x: Coord, y: Coord, board: Blueprint },
}

impl CellAction {
    pub fn coords(&self) -> (Coord, Coord) {
        match *self {
            CellAction::Reveal { x, y }
            | CellAction::Flag { x, y }
            | CellAction::FirstReveal { x, y, .. } => (x, y),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameOverReason {
    Won,
    Lost,
    Aborted,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
    pub in_canvas: bool,
}
