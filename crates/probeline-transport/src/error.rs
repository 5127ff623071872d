use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in line transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to start the peer process.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The spawned process did not expose the requested stdio pipe.
    #[error("peer process has no {0} pipe")]
    MissingPipe(&'static str),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer emitted a line longer than the configured maximum.
    #[error("line too long ({len} bytes, max {max})")]
    LineTooLong { len: usize, max: usize },

    /// No complete line arrived within the configured read timeout.
    #[error("no line received within {0:?}")]
    Timeout(Duration),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
