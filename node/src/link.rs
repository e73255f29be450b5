use minemesh_protocol::Message;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Link is closed")]
    Closed,
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// One reliable, ordered, bidirectional message channel to a single remote
/// peer. The rendezvous/signaling layer that establishes the underlying
/// channel lives outside this crate; it hands an opened link to
/// [`MeshNode::link_opened`](crate::MeshNode::link_opened) and reports
/// closure through `link_closed`.
pub trait Link {
    fn send(&mut self, message: &Message) -> Result<(), LinkError>;
}

/// Whether the local node initiated the connection. Used only to break
/// symmetry in who pushes initial game state to the other side.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub const fn is_outgoing(self) -> bool {
        matches!(self, Self::Outgoing)
    }
}
