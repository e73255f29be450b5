use minemesh_core::Blueprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::*;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The wire envelope. Every frame on a peer link is one JSON object with a
/// `type` discriminator; unknown types fail decoding and are dropped by the
/// receiver without closing the link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    /// Identity exchange, sent first on every new link.
    UserInfo { user_info: UserInfo },
    /// Asks a peer that has not introduced itself yet to do so.
    UserInfoRequest,
    /// Transitive roster gossip.
    KnownUsers { users: Vec<(PeerId, UserInfo)> },
    /// Triggers mesh-completing connections on the receiving side.
    PeerList { peers: Vec<PeerId> },
    Chat {
        sender: PeerId,
        sender_info: UserInfo,
        content: String,
        timestamp: Millis,
    },
    System { content: String, timestamp: Millis },
    /// Lobby configuration broadcast; last write wins.
    GameConfig { config: GameConfig },
    /// Transition to an active game with an empty board.
    GameStart { config: GameConfig, board: Blueprint },
    /// Full board resync for late joiners and post-action catch-up.
    GameState { state: SessionState },
    GameOver { reason: GameOverReason },
    /// Steady-state low-bandwidth board update.
    CellAction { action: CellAction },
    CursorUpdate {
        position: CursorPosition,
        timestamp: Millis,
    },
    /// Pure liveness signal, never a game-state carrier.
    Heartbeat { peer_id: PeerId, timestamp: Millis },
    /// Graceful teardown notice, best-effort.
    Disconnect { peer_id: PeerId, reason: String },
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
