use minemesh_core::GameError;
use minemesh_protocol::{PeerId, ProtocolError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("No game is active")]
    NotInGame,
    #[error("A game is already active")]
    AlreadyInGame,
    #[error("Peer {0} is unavailable")]
    PeerUnavailable(PeerId),
}

pub type Result<T> = core::result::Result<T, NodeError>;
