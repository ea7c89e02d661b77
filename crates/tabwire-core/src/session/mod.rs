//! Page sessions on top of a connection.

mod core;

pub use self::core::{DevTools, SessionState, DEFAULT_COMMAND_TIMEOUT};
