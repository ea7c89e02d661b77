//! Socket ownership, command/reply correlation and event fan-out.

mod core;
mod listeners;
mod pending;

pub use self::core::{Connection, ConnectionStats};
pub use self::pending::PendingReply;
