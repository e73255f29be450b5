//! Mesh node runtime: peer links, roster gossip, liveness, cursor presence,
//! and replicated game state behind a single-threaded facade.
//!
//! The node owns no sockets. The embedder opens links (browser data
//! channels, in-memory pipes in tests), feeds inbound frames and timer ticks
//! in, and drains the command and event queues back out.

pub mod clock;
pub mod error;
pub mod event;
pub mod link;
pub mod liveness;
pub mod node;
pub mod presence;
pub mod registry;
pub mod sync;

pub use error::{NodeError, Result};
pub use event::{Command, NodeEvent};
pub use link::{Direction, Link, LinkError};
pub use liveness::{LivenessMonitor, LivenessVerdict};
pub use node::{MeshNode, NodeConfig};
pub use presence::{CursorSample, PresenceTracker};
pub use registry::ConnectionRegistry;
pub use sync::{ApplyOutcome, GamePhase, GameSync};
