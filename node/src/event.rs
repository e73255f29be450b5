use minemesh_protocol::{
    CursorPosition, GameConfig, GameOverReason, Millis, PeerId, UserInfo,
};

/// Request from the node to its embedder. Commands sit in a queue so several
/// consumers can drain and act on them; the node never touches the
/// rendezvous transport directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Dial the peer through the signaling layer, then report back via
    /// `link_opened` or `connect_failed`.
    Connect(PeerId),
}

/// UI-facing notification. Delivered through a polled queue rather than a
/// single registered callback, so independent listeners cannot overwrite
/// each other.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeEvent {
    PeerJoined {
        peer: PeerId,
        info: UserInfo,
    },
    PeerLeft {
        peer: PeerId,
    },
    ChatReceived {
        sender: PeerId,
        info: UserInfo,
        content: String,
        timestamp: Millis,
    },
    SystemNotice {
        content: String,
        timestamp: Millis,
    },
    ConfigChanged {
        config: GameConfig,
    },
    GameStarted,
    BoardUpdated,
    GameEnded {
        reason: GameOverReason,
    },
    CursorUpdated {
        peer: PeerId,
        position: CursorPosition,
    },
    CursorRemoved {
        peer: PeerId,
    },
    ConnectFailed {
        peer: PeerId,
    },
}
