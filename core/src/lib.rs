#![no_std]

extern crate alloc;

pub use board::*;
pub use blueprint::*;
pub use cell::*;
pub use error::*;
pub use types::*;

mod board;
mod blueprint;
mod cell;
mod error;
mod types;
