use std::collections::{HashMap, HashSet, VecDeque};

use minemesh_core::Coord2;
use minemesh_protocol::{
    CursorPosition, GameConfig, GameOverReason, Message, Millis, PeerId, UserInfo,
};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::Result;
use crate::event::{Command, NodeEvent};
use crate::link::{Direction, Link};
use crate::liveness::{LivenessMonitor, LivenessVerdict};
use crate::presence::PresenceTracker;
use crate::registry::ConnectionRegistry;
use crate::sync::{ApplyOutcome, GamePhase, GameSync};

/// Protocol timing knobs. The liveness timeout must exceed the heartbeat
/// interval or healthy peers get retried.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    pub heartbeat_interval_ms: Millis,
    pub liveness_timeout_ms: Millis,
    pub max_reconnect_attempts: u32,
    pub cursor_timeout_ms: Millis,
    /// Fixed seed for mine placement; `None` seeds from the OS.
    #[serde(skip)]
    pub rng_seed: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 5_000,
            liveness_timeout_ms: 15_000,
            max_reconnect_attempts: 3,
            cursor_timeout_ms: 10_000,
            rng_seed: None,
        }
    }
}

/// One node of the mesh: a single logical actor fed by the embedder with
/// link lifecycle callbacks, raw inbound frames, and timer ticks. Outbound
/// traffic goes through the registered links; dial requests and UI
/// notifications come out of polled queues.
///
/// All handlers run to completion one at a time, so the shared registry and
/// board state need no interior locking; the only races are cross-node and
/// are resolved by the replication rules, not by mutual exclusion.
pub struct MeshNode {
    id: PeerId,
    info: UserInfo,
    config: NodeConfig,
    roster: HashMap<PeerId, UserInfo>,
    registry: ConnectionRegistry,
    presence: PresenceTracker,
    liveness: LivenessMonitor,
    sync: GameSync,
    rng: SmallRng,
    info_requested: HashSet<PeerId>,
    last_heartbeat: Option<Millis>,
    events: VecDeque<NodeEvent>,
    commands: VecDeque<Command>,
}

impl MeshNode {
    pub fn new(id: PeerId, info: UserInfo, config: NodeConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            roster: HashMap::new(),
            registry: ConnectionRegistry::new(),
            presence: PresenceTracker::new(config.cursor_timeout_ms),
            liveness: LivenessMonitor::new(
                config.liveness_timeout_ms,
                config.max_reconnect_attempts,
            ),
            sync: GameSync::new(),
            rng,
            info_requested: HashSet::new(),
            last_heartbeat: None,
            events: VecDeque::new(),
            commands: VecDeque::new(),
            id,
            info,
            config,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn user_info(&self) -> &UserInfo {
        &self.info
    }

    pub fn roster(&self) -> &HashMap<PeerId, UserInfo> {
        &self.roster
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.registry.list_peers()
    }

    pub fn phase(&self) -> GamePhase {
        self.sync.phase()
    }

    pub fn board(&self) -> Option<&minemesh_core::Board> {
        self.sync.board()
    }

    pub fn game_config(&self) -> Option<&GameConfig> {
        self.sync.config()
    }

    pub fn poll_event(&mut self) -> Option<NodeEvent> {
        self.events.pop_front()
    }

    pub fn poll_command(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    // ---- link lifecycle ------------------------------------------------

    /// A new peer link is live. Runs the handshake: identity, roster
    /// gossip, state priming (inbound links only), then the peer list that
    /// lets the other side triangulate the rest of the mesh.
    pub fn link_opened(
        &mut self,
        peer: PeerId,
        link: Box<dyn Link>,
        direction: Direction,
        now: Millis,
    ) {
        log::debug!("Link to {} opened ({:?})", peer, direction);
        self.registry.register(peer.clone(), link, direction);
        self.liveness.track(peer.clone(), now);

        self.registry.send_to(
            &peer,
            &Message::UserInfo {
                user_info: self.info.clone(),
            },
        );

        if !self.roster.is_empty() {
            let users = self
                .roster
                .iter()
                .map(|(id, info)| (id.clone(), info.clone()))
                .collect();
            self.registry.send_to(&peer, &Message::KnownUsers { users });
        }

        // The dialing side is presumed to be joining our view; pushing
        // state on outbound links too would double-prime once the mesh
        // triangulates.
        if direction == Direction::Incoming {
            if let Some(state) = self.sync.session_state() {
                self.registry.send_to(&peer, &Message::GameState { state });
            } else if let Some(config) = self.sync.config() {
                self.registry
                    .send_to(&peer, &Message::GameConfig { config: *config });
            }
        }

        let peers: Vec<PeerId> = self
            .registry
            .list_peers()
            .into_iter()
            .filter(|other| other != &peer)
            .collect();
        if !peers.is_empty() {
            self.registry.send_to(&peer, &Message::PeerList { peers });
        }
    }

    /// The transport noticed the link dropping (not a graceful DISCONNECT).
    pub fn link_closed(&mut self, peer: &PeerId) {
        log::debug!("Link to {} closed", peer);
        self.drop_peer(peer);
    }

    /// A dial we requested could not be completed. No retry; the peer is
    /// abandoned until gossip names it again.
    pub fn connect_failed(&mut self, peer: &PeerId) {
        log::warn!("Peer {} unavailable, abandoning connection attempt", peer);
        self.registry.clear_initiated(peer);
        self.events
            .push_back(NodeEvent::ConnectFailed { peer: peer.clone() });
    }

    // ---- inbound -------------------------------------------------------

    /// Handles one raw frame from a peer. Malformed frames are logged and
    /// dropped; the link stays open. Board-engine failures on remote input
    /// are likewise contained here.
    pub fn handle_message(&mut self, from: &PeerId, bytes: &[u8], now: Millis) {
        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Dropping malformed message from {}: {}", from, err);
                return;
            }
        };
        self.dispatch(from, message, now);
    }

    fn dispatch(&mut self, from: &PeerId, message: Message, now: Millis) {
        match message {
            Message::UserInfo { user_info } => {
                self.info_requested.remove(from);
                self.learn_identity(from.clone(), user_info);
            }
            Message::UserInfoRequest => {
                self.registry.send_to(
                    from,
                    &Message::UserInfo {
                        user_info: self.info.clone(),
                    },
                );
            }
            Message::KnownUsers { users } => {
                for (peer, info) in users {
                    if peer == self.id {
                        continue;
                    }
                    self.learn_identity(peer.clone(), info);
                    self.ensure_connected(&peer);
                }
            }
            Message::PeerList { peers } => {
                for peer in peers {
                    self.ensure_connected(&peer);
                }
            }
            Message::Chat {
                sender,
                sender_info,
                content,
                timestamp,
            } => {
                self.events.push_back(NodeEvent::ChatReceived {
                    sender,
                    info: sender_info,
                    content,
                    timestamp,
                });
            }
            Message::System { content, timestamp } => {
                self.events
                    .push_back(NodeEvent::SystemNotice { content, timestamp });
            }
            Message::GameConfig { config } => {
                self.sync.set_config(config);
                self.events.push_back(NodeEvent::ConfigChanged { config });
            }
            Message::GameStart { config, board } => match self.sync.start_remote(config, &board, now) {
                Ok(()) => self.events.push_back(NodeEvent::GameStarted),
                Err(err) => log::warn!("Rejecting GAME_START from {}: {}", from, err),
            },
            Message::GameState { state } => match self.sync.apply_state(&state, now) {
                Ok(outcome) => self.conclude_quiet(outcome),
                Err(err) => log::warn!("Rejecting GAME_STATE from {}: {}", from, err),
            },
            Message::GameOver { reason } => {
                if self.sync.clear() {
                    self.events.push_back(NodeEvent::GameEnded { reason });
                }
            }
            Message::CellAction { action } => match self.sync.apply_remote(&action) {
                Ok(outcome) => self.conclude(outcome),
                Err(err) => log::warn!("Dropping cell action from {}: {}", from, err),
            },
            Message::CursorUpdate { position, .. } => {
                self.request_identity(from);
                self.presence.update_cursor(from, position, now);
                self.events.push_back(NodeEvent::CursorUpdated {
                    peer: from.clone(),
                    position,
                });
            }
            Message::Heartbeat { .. } => {
                self.request_identity(from);
                self.liveness.note_heartbeat(from, now);
            }
            Message::Disconnect { reason, .. } => {
                log::debug!("Peer {} disconnected: {}", from, reason);
                self.drop_peer(from);
            }
        }
    }

    // ---- timers --------------------------------------------------------

    /// Periodic driver: heartbeat fanout, liveness verdicts, cursor sweep.
    /// Call at least once per heartbeat interval.
    pub fn tick(&mut self, now: Millis) {
        let due = match self.last_heartbeat {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.config.heartbeat_interval_ms,
        };
        if due && !self.registry.is_empty() {
            self.last_heartbeat = Some(now);
            self.registry.broadcast(&Message::Heartbeat {
                peer_id: self.id.clone(),
                timestamp: now,
            });
        }

        for verdict in self.liveness.tick(now) {
            match verdict {
                LivenessVerdict::Retry(peer) => {
                    self.registry.clear_initiated(&peer);
                    self.registry.mark_initiated(peer.clone());
                    self.commands.push_back(Command::Connect(peer));
                }
                LivenessVerdict::Evict(peer) => {
                    log::warn!("Link to {} lost, evicting", peer);
                    self.drop_peer(&peer);
                }
            }
        }

        for peer in self.presence.sweep(now) {
            self.events.push_back(NodeEvent::CursorRemoved { peer });
        }
    }

    // ---- local intents -------------------------------------------------

    pub fn send_chat(&mut self, content: impl Into<String>) {
        self.registry.broadcast(&Message::Chat {
            sender: self.id.clone(),
            sender_info: self.info.clone(),
            content: content.into(),
            timestamp: clock::now_ms(),
        });
    }

    /// Local lobby edit: replace our copy, then broadcast it wholesale.
    pub fn update_config(&mut self, config: GameConfig) {
        self.sync.set_config(config);
        self.registry.broadcast(&Message::GameConfig { config });
        self.events.push_back(NodeEvent::ConfigChanged { config });
    }

    /// Starts a game. Validation happens before anything reaches the wire;
    /// an infeasible config never leaves this node.
    pub fn start_game(&mut self, config: GameConfig, now: Millis) -> Result<()> {
        let state = self.sync.start(config, now)?;
        self.registry.broadcast(&Message::GameStart {
            config,
            board: state.board,
        });
        self.events.push_back(NodeEvent::GameStarted);
        Ok(())
    }

    pub fn reveal(&mut self, coords: Coord2) -> Result<()> {
        let seed = self.rng.random();
        let (action, outcome) = self.sync.local_reveal(coords, seed)?;
        self.share_action(action, outcome);
        Ok(())
    }

    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<()> {
        let (action, outcome) = self.sync.local_flag(coords)?;
        self.share_action(action, outcome);
        Ok(())
    }

    pub fn move_cursor(&mut self, position: CursorPosition) {
        self.registry.broadcast(&Message::CursorUpdate {
            position,
            timestamp: clock::now_ms(),
        });
    }

    /// Graceful teardown: a best-effort DISCONNECT notice, then local
    /// cleanup. The embedder should give the notice a moment to flush
    /// before tearing down the underlying channels.
    pub fn shutdown(&mut self, reason: impl Into<String>) {
        self.registry.broadcast(&Message::Disconnect {
            peer_id: self.id.clone(),
            reason: reason.into(),
        });
        self.registry.close_all();
        self.liveness.clear();
        self.presence.reset();
        self.roster.clear();
        self.sync.clear();
    }

    // ---- internals -----------------------------------------------------

    fn learn_identity(&mut self, peer: PeerId, info: UserInfo) {
        let timestamp = clock::now_ms();
        let name = info.name.clone();
        self.roster.insert(peer.clone(), info.clone());
        if self.presence.should_notify_join(&peer) {
            self.events.push_back(NodeEvent::PeerJoined { peer, info });
            self.events.push_back(NodeEvent::SystemNotice {
                content: format!("{} joined", name),
                timestamp,
            });
        }
    }

    /// Asks a peer that is talking without having introduced itself for its
    /// identity, once.
    fn request_identity(&mut self, peer: &PeerId) {
        if self.roster.contains_key(peer) || !self.info_requested.insert(peer.clone()) {
            return;
        }
        self.registry.send_to(peer, &Message::UserInfoRequest);
    }

    /// Dials a peer unless it is us, already linked, or already being
    /// dialed. This is what turns a rendezvous chain into a full mesh.
    fn ensure_connected(&mut self, peer: &PeerId) {
        if peer == &self.id
            || self.registry.is_connected(peer)
            || self.registry.is_initiated(peer)
        {
            return;
        }
        self.registry.mark_initiated(peer.clone());
        self.commands.push_back(Command::Connect(peer.clone()));
    }

    fn share_action(
        &mut self,
        action: Option<minemesh_protocol::CellAction>,
        outcome: ApplyOutcome,
    ) {
        let Some(action) = action else {
            return;
        };
        self.registry.broadcast(&Message::CellAction { action });
        // cheap catch-up for laggy peers; idempotent on receipt
        if outcome == ApplyOutcome::Updated {
            if let Some(state) = self.sync.session_state() {
                self.registry.broadcast(&Message::GameState { state });
            }
        }
        self.conclude(outcome);
    }

    /// Win/loss is derived independently on every node; whoever observes it
    /// from a cell action reveals the mines, shares the final board, and
    /// tears down.
    fn conclude(&mut self, outcome: ApplyOutcome) {
        let Some(reason) = self.teardown_reason(outcome) else {
            return;
        };
        if let Some(state) = self.sync.finish(reason) {
            self.registry.broadcast(&Message::GameState { state });
            self.registry.broadcast(&Message::GameOver { reason });
            self.events.push_back(NodeEvent::BoardUpdated);
            self.events.push_back(NodeEvent::GameEnded { reason });
        }
    }

    /// Terminal outcome carried by a peer's full-state broadcast: the sender
    /// already shared the final board and follows with GAME_OVER, so tear
    /// down without echoing it back.
    fn conclude_quiet(&mut self, outcome: ApplyOutcome) {
        let Some(reason) = self.teardown_reason(outcome) else {
            return;
        };
        if self.sync.finish(reason).is_some() {
            self.events.push_back(NodeEvent::BoardUpdated);
            self.events.push_back(NodeEvent::GameEnded { reason });
        }
    }

    fn teardown_reason(&mut self, outcome: ApplyOutcome) -> Option<GameOverReason> {
        match outcome {
            ApplyOutcome::Unchanged => None,
            ApplyOutcome::Updated => {
                self.events.push_back(NodeEvent::BoardUpdated);
                None
            }
            ApplyOutcome::Won => Some(GameOverReason::Won),
            ApplyOutcome::Lost => Some(GameOverReason::Lost),
        }
    }

    /// Shared cleanup for explicit disconnects, lost links, and eviction:
    /// no zombie entries stay behind in any component.
    fn drop_peer(&mut self, peer: &PeerId) {
        let known = self.roster.remove(peer);
        self.registry.close(peer);
        self.liveness.forget(peer);
        self.info_requested.remove(peer);
        if self.presence.remove_cursor(peer) {
            self.events
                .push_back(NodeEvent::CursorRemoved { peer: peer.clone() });
        }
        if self.presence.should_notify_leave(peer) {
            let name = known
                .map(|info| info.name)
                .unwrap_or_else(|| peer.to_string());
            self.events
                .push_back(NodeEvent::PeerLeft { peer: peer.clone() });
            self.events.push_back(NodeEvent::SystemNotice {
                content: format!("{} left", name),
                timestamp: clock::now_ms(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::link::LinkError;

    #[derive(Default)]
    struct Recorder {
        sent: Rc<RefCell<Vec<Message>>>,
    }

    impl Link for Recorder {
        fn send(&mut self, message: &Message) -> core::result::Result<(), LinkError> {
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    fn recorder() -> (Box<Recorder>, Rc<RefCell<Vec<Message>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        (
            Box::new(Recorder {
                sent: Rc::clone(&sent),
            }),
            sent,
        )
    }

    fn node(id: &str, config: NodeConfig) -> MeshNode {
        MeshNode::new(
            id.into(),
            UserInfo::new(id, "#00f"),
            NodeConfig {
                rng_seed: Some(42),
                ..config
            },
        )
    }

    fn frame(message: &Message) -> Vec<u8> {
        message.encode().unwrap()
    }

    #[test]
    fn handshake_leads_with_identity() {
        let mut a = node("a", NodeConfig::default());
        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        let sent = sent.borrow();
        assert!(matches!(sent[0], Message::UserInfo { .. }));
        // fresh node, no roster, no game, no other peers
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn incoming_link_is_primed_with_lobby_config() {
        let mut a = node("a", NodeConfig::default());
        a.update_config(GameConfig::default());

        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);
        assert!(
            sent.borrow()
                .iter()
                .any(|m| matches!(m, Message::GameConfig { .. }))
        );
    }

    #[test]
    fn outgoing_link_is_not_primed() {
        let mut a = node("a", NodeConfig::default());
        a.update_config(GameConfig::default());

        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Outgoing, 0);
        assert!(
            !sent
                .borrow()
                .iter()
                .any(|m| matches!(m, Message::GameConfig { .. }))
        );
    }

    #[test]
    fn handshake_names_earlier_peers() {
        let mut a = node("a", NodeConfig::default());
        let (first, _) = recorder();
        a.link_opened("b".into(), first, Direction::Incoming, 0);

        let (second, sent) = recorder();
        a.link_opened("c".into(), second, Direction::Incoming, 0);
        let expected = vec![PeerId::from("b")];
        assert!(
            sent.borrow()
                .iter()
                .any(|m| matches!(m, Message::PeerList { peers } if *peers == expected))
        );
    }

    #[test]
    fn gossip_dials_each_unknown_peer_once() {
        let mut a = node("a", NodeConfig::default());
        let (link, _) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        let peers = vec!["c".into(), "c".into(), "a".into(), "b".into()];
        a.handle_message(&"b".into(), &frame(&Message::PeerList { peers }), 0);

        assert_eq!(a.poll_command(), Some(Command::Connect("c".into())));
        assert_eq!(a.poll_command(), None);
    }

    #[test]
    fn malformed_frame_keeps_link_open() {
        let mut a = node("a", NodeConfig::default());
        let (link, _) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        a.handle_message(&"b".into(), b"{not json", 0);
        assert!(a.connected_peers().contains(&"b".into()));
    }

    #[test]
    fn heartbeats_respect_the_interval() {
        let mut a = node(
            "a",
            NodeConfig {
                heartbeat_interval_ms: 100,
                ..Default::default()
            },
        );
        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        a.tick(0);
        a.tick(50);
        a.tick(100);
        let beats = sent
            .borrow()
            .iter()
            .filter(|m| matches!(m, Message::Heartbeat { .. }))
            .count();
        assert_eq!(beats, 2);
    }

    #[test]
    fn silent_peer_gets_a_reconnect_attempt() {
        let mut a = node(
            "a",
            NodeConfig {
                liveness_timeout_ms: 100,
                max_reconnect_attempts: 1,
                ..Default::default()
            },
        );
        let (link, _) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        a.tick(200);
        assert_eq!(a.poll_command(), Some(Command::Connect("b".into())));
    }

    #[test]
    fn eviction_runs_the_full_cleanup() {
        let mut a = node(
            "a",
            NodeConfig {
                liveness_timeout_ms: 100,
                max_reconnect_attempts: 0,
                ..Default::default()
            },
        );
        let (link, _) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);
        a.handle_message(
            &"b".into(),
            &frame(&Message::UserInfo {
                user_info: UserInfo::new("bea", "#0f0"),
            }),
            0,
        );

        a.tick(200);
        assert!(a.connected_peers().is_empty());
        assert!(a.roster().is_empty());

        let mut saw_leave = false;
        while let Some(event) = a.poll_event() {
            if event == (NodeEvent::PeerLeft { peer: "b".into() }) {
                saw_leave = true;
            }
        }
        assert!(saw_leave);
    }

    #[test]
    fn explicit_disconnect_removes_the_peer() {
        let mut a = node("a", NodeConfig::default());
        let (link, _) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);
        a.handle_message(
            &"b".into(),
            &frame(&Message::Disconnect {
                peer_id: "b".into(),
                reason: "closing tab".into(),
            }),
            0,
        );
        assert!(a.connected_peers().is_empty());
    }

    #[test]
    fn join_is_announced_once_across_gossip_paths() {
        let mut a = node("a", NodeConfig::default());
        let (link, _) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        let info = UserInfo::new("bea", "#0f0");
        a.handle_message(
            &"b".into(),
            &frame(&Message::UserInfo {
                user_info: info.clone(),
            }),
            0,
        );
        a.handle_message(
            &"b".into(),
            &frame(&Message::KnownUsers {
                users: vec![("b".into(), info)],
            }),
            0,
        );

        let joins = std::iter::from_fn(|| a.poll_event())
            .filter(|event| matches!(event, NodeEvent::PeerJoined { .. }))
            .count();
        assert_eq!(joins, 1);
    }

    #[test]
    fn infeasible_start_reaches_nobody() {
        let mut a = node("a", NodeConfig::default());
        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        let config = GameConfig {
            width: 3,
            height: 3,
            bomb_count: 9,
            ..Default::default()
        };
        assert!(a.start_game(config, 0).is_err());
        assert!(
            !sent
                .borrow()
                .iter()
                .any(|m| matches!(m, Message::GameStart { .. }))
        );
    }

    #[test]
    fn local_reveal_broadcasts_action_and_catchup_state() {
        let mut a = node("a", NodeConfig::default());
        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        a.start_game(GameConfig::default(), 0).unwrap();
        a.reveal((4, 4)).unwrap();

        let sent = sent.borrow();
        assert!(sent.iter().any(|m| matches!(m, Message::CellAction { .. })));
        assert!(sent.iter().any(|m| matches!(m, Message::GameState { .. })));
    }

    #[test]
    fn shutdown_sends_disconnect_before_teardown() {
        let mut a = node("a", NodeConfig::default());
        let (link, sent) = recorder();
        a.link_opened("b".into(), link, Direction::Incoming, 0);

        a.shutdown("closing tab");
        assert!(matches!(
            sent.borrow().last(),
            Some(Message::Disconnect { .. })
        ));
        assert!(a.connected_peers().is_empty());
    }
}
