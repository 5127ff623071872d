use std::time::Duration;

use probeline_transport::TransportError;

/// Errors that can occur while draining a response segment.
#[derive(Debug, thiserror::Error)]
pub enum BarrierError {
    /// The transport failed to send the probe or read a line.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The peer closed its output before answering the probe.
    #[error("peer output ended before the sentinel ({pending_lines} lines pending)")]
    StreamEnded { pending_lines: usize },

    /// The peer did not answer the probe within the read timeout.
    #[error("sentinel not received within {0:?}")]
    Timeout(Duration),
}

impl BarrierError {
    /// True when the drain failed because the peer stopped answering,
    /// rather than because the byte stream itself failed.
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, Self::StreamEnded { .. } | Self::Timeout(_))
    }
}

impl From<TransportError> for BarrierError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(timeout) => Self::Timeout(timeout),
            other => Self::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BarrierError>;
