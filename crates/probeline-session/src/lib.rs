//! Request/response sessions over the ping-barrier line protocol.
//!
//! This is the "just works" layer. Spawn or attach to a peer, submit one
//! command at a time, and get back exactly the lines it produced for that
//! command.

pub mod command;
pub mod error;
pub mod launcher;
pub mod session;
pub mod shared;

pub use command::validate_command;
pub use error::{Result, SessionError, UsageError};
pub use launcher::{attach, spawn, spawn_with_config};
#[cfg(unix)]
pub use launcher::attach_unix;
pub use session::{Session, SessionConfig};
pub use shared::SharedSession;
