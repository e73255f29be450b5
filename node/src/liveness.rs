use std::collections::HashMap;

use minemesh_protocol::{Millis, PeerId};

/// What to do about a peer that has gone quiet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LivenessVerdict {
    /// Attempt a reconnection; the retry budget is not exhausted yet.
    Retry(PeerId),
    /// Retries are spent, run the same cleanup as an explicit disconnect.
    Evict(PeerId),
}

/// Tracks last-heartbeat times and turns prolonged silence into bounded
/// reconnection attempts followed by eviction. Pure bookkeeping, the caller
/// drives it from its own timer and acts on the verdicts.
pub struct LivenessMonitor {
    last_seen: HashMap<PeerId, Millis>,
    retries: HashMap<PeerId, u32>,
    timeout: Millis,
    max_retries: u32,
}

impl LivenessMonitor {
    pub fn new(timeout: Millis, max_retries: u32) -> Self {
        Self {
            last_seen: HashMap::new(),
            retries: HashMap::new(),
            timeout,
            max_retries,
        }
    }

    /// Starts watching a freshly connected peer.
    pub fn track(&mut self, peer: PeerId, now: Millis) {
        self.last_seen.insert(peer.clone(), now);
        self.retries.remove(&peer);
    }

    pub fn note_heartbeat(&mut self, peer: &PeerId, now: Millis) {
        if let Some(seen) = self.last_seen.get_mut(peer) {
            *seen = now;
            self.retries.remove(peer);
        }
    }

    /// Stops watching; also cancels any in-flight reconnection attempt, which
    /// is how an explicit DISCONNECT wins over the retry loop.
    pub fn forget(&mut self, peer: &PeerId) {
        self.last_seen.remove(peer);
        self.retries.remove(peer);
    }

    pub fn is_tracked(&self, peer: &PeerId) -> bool {
        self.last_seen.contains_key(peer)
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
        self.retries.clear();
    }

    pub fn tick(&mut self, now: Millis) -> Vec<LivenessVerdict> {
        let mut verdicts = Vec::new();
        let silent: Vec<PeerId> = self
            .last_seen
            .iter()
            .filter(|&(_, &seen)| now.saturating_sub(seen) > self.timeout)
            .map(|(peer, _)| peer.clone())
            .collect();

        for peer in silent {
            let attempts = self.retries.entry(peer.clone()).or_insert(0);
            *attempts += 1;
            if *attempts > self.max_retries {
                log::warn!("Peer {} unresponsive after {} retries, evicting", peer, self.max_retries);
                self.forget(&peer);
                verdicts.push(LivenessVerdict::Evict(peer));
            } else {
                log::debug!("Peer {} silent, reconnect attempt {}", peer, attempts);
                verdicts.push(LivenessVerdict::Retry(peer));
            }
        }
        verdicts
    }
}
