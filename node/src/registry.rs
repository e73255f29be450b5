use std::collections::{HashMap, HashSet};

use minemesh_protocol::{Message, PeerId};

use crate::link::{Direction, Link};

struct Connection {
    link: Box<dyn Link>,
    direction: Direction,
}

/// Owns every live link. One connection per peer: registering again for the
/// same peer replaces the previous link (last write wins), which is also how
/// dial races between two nodes collapse into a single connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PeerId, Connection>,
    /// Peers we dialed (or are still dialing). Consulted by the gossip logic
    /// so that a peer is only ever connected to once.
    initiated: HashSet<PeerId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, peer: PeerId, link: Box<dyn Link>, direction: Direction) {
        if direction.is_outgoing() {
            self.initiated.insert(peer.clone());
        }
        if self.connections.contains_key(&peer) {
            log::debug!("Replacing duplicate connection for {}", peer);
        }
        self.connections.insert(peer, Connection { link, direction });
    }

    /// Remembers an in-flight dial so gossip does not dial the peer twice.
    pub fn mark_initiated(&mut self, peer: PeerId) {
        self.initiated.insert(peer);
    }

    pub fn clear_initiated(&mut self, peer: &PeerId) {
        self.initiated.remove(peer);
    }

    pub fn is_initiated(&self, peer: &PeerId) -> bool {
        self.initiated.contains(peer)
    }

    /// Removes the connection; safe to call for peers that are already gone.
    pub fn close(&mut self, peer: &PeerId) -> bool {
        self.initiated.remove(peer);
        self.connections.remove(peer).is_some()
    }

    pub fn close_all(&mut self) {
        self.connections.clear();
        self.initiated.clear();
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.connections.contains_key(peer)
    }

    pub fn direction(&self, peer: &PeerId) -> Option<Direction> {
        self.connections.get(peer).map(|conn| conn.direction)
    }

    pub fn list_peers(&self) -> Vec<PeerId> {
        self.connections.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn send_to(&mut self, peer: &PeerId, message: &Message) -> bool {
        match self.connections.get_mut(peer) {
            Some(conn) => match conn.link.send(message) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("Send to {} failed: {}", peer, err);
                    false
                }
            },
            None => false,
        }
    }

    /// Best-effort fanout: a failing link never stops delivery to the rest.
    pub fn broadcast(&mut self, message: &Message) {
        for (peer, conn) in self.connections.iter_mut() {
            if let Err(err) = conn.link.send(message) {
                log::warn!("Broadcast to {} failed: {}", peer, err);
            }
        }
    }
}
