//! Line-oriented transport to a peer process.
//!
//! Provides a unified interface over the byte streams a peer can be reached by:
//! - the stdio pipes of a spawned child process ([`ChildTransport`])
//! - any already-connected duplex stream ([`StreamTransport`])
//!
//! This is the lowest layer of probeline. Everything else builds on top of
//! the [`LineTransport`] trait provided here.

pub mod codec;
pub mod error;
pub mod process;
pub mod stream;
pub mod traits;

pub use codec::{decode_line, encode_line, LineConfig, DEFAULT_MAX_LINE, DELIMITER};
pub use error::{Result, TransportError};
pub use process::{ChildTransport, ProcessConfig, Terminator};
pub use stream::StreamTransport;
pub use traits::{LineTransport, ReadLine};
