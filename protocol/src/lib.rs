pub use game::*;
pub use identity::*;
pub use message::*;

mod game;
mod identity;
mod message;
