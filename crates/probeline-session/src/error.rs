use probeline_barrier::BarrierError;
use probeline_transport::TransportError;

/// The caller broke the command contract. Detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// Commands are single lines.
    #[error("command contains an embedded line break")]
    EmbeddedNewline,

    /// The probe command is reserved for draining.
    #[error("command '{0}' is reserved for the response barrier")]
    ReservedProbe(String),
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command was rejected before anything was sent.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    /// The byte stream to the peer failed.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// A drain did not end at a sentinel.
    #[error("protocol error: {0}")]
    Protocol(BarrierError),

    /// An earlier fault left the session in an undefined state.
    #[error("session is faulted and must be recreated")]
    Faulted,
}

impl SessionError {
    /// True for errors that leave the session unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Usage(_))
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        Self::from(BarrierError::from(err))
    }
}

impl From<BarrierError> for SessionError {
    fn from(err: BarrierError) -> Self {
        match err {
            BarrierError::Transport(err) => Self::Transport(err),
            other => Self::Protocol(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
