use std::io::{Read, Write};

use probeline_transport::{ChildTransport, LineConfig, ProcessConfig, StreamTransport};

use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Spawn a peer process and open a session on its stdio.
pub fn spawn(process: ProcessConfig) -> Result<Session<ChildTransport>> {
    spawn_with_config(process, SessionConfig::default())
}

/// Spawn with explicit configuration.
pub fn spawn_with_config(
    process: ProcessConfig,
    config: SessionConfig,
) -> Result<Session<ChildTransport>> {
    let transport = ChildTransport::spawn(process)?;
    Session::open(transport, config)
}

/// Open a session on a duplex stream an external launcher already connected.
pub fn attach<R, W>(
    reader: R,
    writer: W,
    line_config: LineConfig,
    config: SessionConfig,
) -> Result<Session<StreamTransport>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let transport = StreamTransport::with_config(reader, writer, line_config);
    Session::open(transport, config)
}

/// Open a session on a connected Unix socket. Closing the session shuts the
/// socket down, so the peer sees end of stream.
#[cfg(unix)]
pub fn attach_unix(
    stream: std::os::unix::net::UnixStream,
    line_config: LineConfig,
    config: SessionConfig,
) -> Result<Session<StreamTransport>> {
    let transport = StreamTransport::from_unix_stream(stream, line_config)?;
    Session::open(transport, config)
}
