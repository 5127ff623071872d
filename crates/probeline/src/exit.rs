use std::fmt;
use std::io;

use probeline_barrier::BarrierError;
use probeline_session::SessionError;
use probeline_transport::TransportError;

// Exit code constants follow sysexits/shell conventions where one exists.
pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
pub const PROTOCOL_FAULT: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const NOT_FOUND: i32 = 127;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Spawn { program, source } => {
            io_error(&format!("{context}: {}", program.display()), source)
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn barrier_error(context: &str, err: BarrierError) -> CliError {
    match err {
        BarrierError::Transport(err) => transport_error(context, err),
        BarrierError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        BarrierError::StreamEnded { .. } => {
            CliError::new(PROTOCOL_FAULT, format!("{context}: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Usage(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Protocol(err) => barrier_error(context, err),
        SessionError::Faulted => CliError::new(PROTOCOL_FAULT, format!("{context}: {err}")),
    }
}
