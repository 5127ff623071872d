//! Ping-barrier response delimiting over an unframed line stream.
//!
//! The peer's output carries no length header and no end-of-message marker.
//! To find where one response ends, the reader writes a probe command the
//! peer answers with a single sentinel line, then collects every line that
//! arrives before that sentinel:
//! - blank lines are dropped
//! - the sentinel itself is never part of a segment
//! - end of stream before the sentinel is a protocol fault, never a
//!   silently truncated segment

pub mod config;
pub mod error;
pub mod reader;
pub mod segment;

pub use config::{BarrierConfig, DEFAULT_PROBE, DEFAULT_SENTINEL};
pub use error::{BarrierError, Result};
pub use reader::BarrierReader;
pub use segment::{Segment, LINE_BOUNDARY};
