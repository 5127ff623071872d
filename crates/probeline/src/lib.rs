//! Drive line-oriented child processes with reliable response boundaries.
//!
//! probeline talks to a long-running peer over its stdin/stdout and uses a
//! probe/sentinel barrier (`ping` -> `ok`) to tell where one command's
//! output ends and the next begins.
//!
//! # Crate Structure
//!
//! - [`transport`]: Line transport over child stdio or any duplex stream
//! - [`barrier`]: Ping-barrier drain that yields complete response segments
//! - [`session`]: Request/response sessions (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use probeline_transport::*;
}

/// Re-export barrier types.
pub mod barrier {
    pub use probeline_barrier::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use probeline_session::*;
}
