use std::collections::{HashMap, HashSet};

use minemesh_protocol::{CursorPosition, Millis, PeerId};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CursorSample {
    pub position: CursorPosition,
    pub last_seen: Millis,
}

/// Deduplicates join/leave notifications and expires stale cursors.
///
/// A peer is announced at most once between a join and the matching leave;
/// gossip can deliver the same identity along several paths and only the
/// first sighting should produce a notification.
pub struct PresenceTracker {
    announced: HashSet<PeerId>,
    cursors: HashMap<PeerId, CursorSample>,
    cursor_timeout: Millis,
}

impl PresenceTracker {
    pub fn new(cursor_timeout: Millis) -> Self {
        Self {
            announced: HashSet::new(),
            cursors: HashMap::new(),
            cursor_timeout,
        }
    }

    /// True on the first call per peer, false until the peer leaves.
    pub fn should_notify_join(&mut self, peer: &PeerId) -> bool {
        self.announced.insert(peer.clone())
    }

    pub fn should_notify_leave(&mut self, peer: &PeerId) -> bool {
        self.announced.remove(peer)
    }

    pub fn reset(&mut self) {
        self.announced.clear();
        self.cursors.clear();
    }

    pub fn update_cursor(&mut self, peer: &PeerId, position: CursorPosition, now: Millis) {
        self.cursors.insert(
            peer.clone(),
            CursorSample {
                position,
                last_seen: now,
            },
        );
    }

    pub fn cursor(&self, peer: &PeerId) -> Option<&CursorSample> {
        self.cursors.get(peer)
    }

    pub fn remove_cursor(&mut self, peer: &PeerId) -> bool {
        self.cursors.remove(peer).is_some()
    }

    /// Lets the embedder stop its sweep timer while nothing can expire.
    pub fn has_cursors(&self) -> bool {
        !self.cursors.is_empty()
    }

    /// Drops samples older than the timeout and reports their owners.
    pub fn sweep(&mut self, now: Millis) -> Vec<PeerId> {
        if self.cursors.is_empty() {
            return Vec::new();
        }
        let timeout = self.cursor_timeout;
        let stale: Vec<PeerId> = self
            .cursors
            .iter()
            .filter(|(_, sample)| now.saturating_sub(sample.last_seen) > timeout)
            .map(|(peer, _)| peer.clone())
            .collect();
        for peer in &stale {
            self.cursors.remove(peer);
            log::debug!("Cursor for {} expired", peer);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> CursorPosition {
        CursorPosition {
            x: 1.0,
            y: 2.0,
            in_canvas: true,
        }
    }

    #[test]
    fn join_notifies_once_until_leave() {
        let mut tracker = PresenceTracker::new(1000);
        let peer: PeerId = "a".into();

        assert!(tracker.should_notify_join(&peer));
        assert!(!tracker.should_notify_join(&peer));
        assert!(tracker.should_notify_leave(&peer));
        assert!(!tracker.should_notify_leave(&peer));
        assert!(tracker.should_notify_join(&peer));
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = PresenceTracker::new(1000);
        tracker.should_notify_join(&"a".into());
        tracker.update_cursor(&"a".into(), pos(), 10);

        tracker.reset();
        assert!(tracker.should_notify_join(&"a".into()));
        assert!(!tracker.has_cursors());
    }

    #[test]
    fn sweep_expires_only_stale_cursors() {
        let mut tracker = PresenceTracker::new(100);
        tracker.update_cursor(&"old".into(), pos(), 0);
        tracker.update_cursor(&"fresh".into(), pos(), 90);

        let removed = tracker.sweep(150);
        assert_eq!(removed, vec![PeerId::from("old")]);
        assert!(tracker.cursor(&"fresh".into()).is_some());
        assert!(tracker.cursor(&"old".into()).is_none());
    }

    #[test]
    fn refresh_defers_expiry() {
        let mut tracker = PresenceTracker::new(100);
        tracker.update_cursor(&"a".into(), pos(), 0);
        tracker.update_cursor(&"a".into(), pos(), 80);
        assert!(tracker.sweep(150).is_empty());
    }
}
