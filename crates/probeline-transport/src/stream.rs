use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::codec::{decode_line, encode_line, line_to_string, LineConfig};
use crate::error::{Result, TransportError};
use crate::traits::{LineTransport, ReadLine};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

enum PumpEvent {
    Line(String),
    Closed(&'static str),
    Failed(&'static str, TransportError),
}

/// Line transport over an already-connected duplex byte stream.
///
/// Every read source is drained by its own pump thread into a single
/// ordered queue, so `read_line` can honor a timeout even on pipes that
/// have no native read timeout. Extra sources added with [`merge`] share
/// the queue; this is how a peer's error output joins its standard output.
///
/// A pump thread owns its reader and only stops at end of stream. Readers
/// that cannot be unblocked by dropping the writer (sockets, for one) need
/// a hook registered with [`on_close`] so that closing the transport also
/// releases the read half; [`from_unix_stream`] registers one.
///
/// [`merge`]: StreamTransport::merge
/// [`on_close`]: StreamTransport::on_close
/// [`from_unix_stream`]: StreamTransport::from_unix_stream
pub struct StreamTransport {
    writer: Option<Box<dyn Write + Send>>,
    shutdown_hooks: Vec<Box<dyn FnOnce() + Send>>,
    events_tx: Sender<PumpEvent>,
    events: Receiver<PumpEvent>,
    open_sources: usize,
    buf: BytesMut,
    config: LineConfig,
    closed: bool,
}

impl StreamTransport {
    /// Create a transport with default configuration.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::with_config(reader, writer, LineConfig::default())
    }

    /// Create a transport with explicit configuration.
    pub fn with_config<R, W>(reader: R, writer: W, config: LineConfig) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (events_tx, events) = mpsc::channel();
        let transport = Self {
            writer: Some(Box::new(writer)),
            shutdown_hooks: Vec::new(),
            events_tx,
            events,
            open_sources: 0,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            closed: false,
        };
        transport.merge_named(reader, "output")
    }

    /// Transport over a connected Unix socket. Closing or dropping the
    /// transport shuts the socket down in both directions, so the peer sees
    /// end of stream and the pump thread exits.
    #[cfg(unix)]
    pub fn from_unix_stream(
        stream: std::os::unix::net::UnixStream,
        config: LineConfig,
    ) -> Result<Self> {
        let writer = stream.try_clone()?;
        let handle = stream.try_clone()?;
        Ok(Self::with_config(stream, writer, config).on_close(move || {
            if let Err(err) = handle.shutdown(std::net::Shutdown::Both) {
                debug!(error = %err, "socket shutdown failed");
            }
        }))
    }

    /// Run `hook` once when the transport is closed or dropped.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.shutdown_hooks.push(Box::new(hook));
        self
    }

    /// Add another read source whose lines interleave with the existing ones.
    pub fn merge<R: Read + Send + 'static>(self, reader: R) -> Self {
        self.merge_named(reader, "merged")
    }

    pub(crate) fn merge_named<R: Read + Send + 'static>(
        mut self,
        reader: R,
        name: &'static str,
    ) -> Self {
        let tx = self.events_tx.clone();
        let max_line_len = self.config.max_line_len;
        let spawned = thread::Builder::new()
            .name(format!("probeline-{name}"))
            .spawn(move || pump(reader, tx, max_line_len, name));
        match spawned {
            Ok(_) => self.open_sources += 1,
            Err(err) => warn!(source = name, error = %err, "failed to start line pump"),
        }
        self
    }

    /// Update the read timeout for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.config.read_timeout = timeout;
    }

    /// Current line configuration.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn next_event(&mut self) -> Result<Option<PumpEvent>> {
        match self.config.read_timeout {
            Some(timeout) => match self.events.recv_timeout(timeout) {
                Ok(event) => Ok(Some(event)),
                Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => Ok(None),
            },
            None => Ok(self.events.recv().ok()),
        }
    }
}

impl LineTransport for StreamTransport {
    fn write_line(&mut self, text: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;

        self.buf.clear();
        encode_line(text, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match writer.write(&self.buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match writer.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        trace!(line = text, "sent line");
        Ok(())
    }

    fn read_line(&mut self) -> Result<ReadLine> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        loop {
            if self.open_sources == 0 {
                return Ok(ReadLine::EndOfStream);
            }

            let Some(event) = self.next_event()? else {
                return Ok(ReadLine::EndOfStream);
            };

            match event {
                PumpEvent::Line(line) => {
                    trace!(line = %line, "received line");
                    return Ok(ReadLine::Line(line));
                }
                PumpEvent::Closed(source) => {
                    self.open_sources -= 1;
                    debug!(source, remaining = self.open_sources, "read source closed");
                }
                PumpEvent::Failed(source, err) => {
                    self.open_sources -= 1;
                    debug!(source, error = %err, "read source failed");
                    return Err(err);
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        for hook in self.shutdown_hooks.drain(..) {
            hook();
        }
        debug!("stream transport closed");
        Ok(())
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("open_sources", &self.open_sources)
            .field("closed", &self.closed)
            .field("config", &self.config)
            .finish()
    }
}

fn pump<R: Read>(mut source: R, tx: Sender<PumpEvent>, max_line_len: usize, name: &'static str) {
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        loop {
            match decode_line(&mut buf, max_line_len) {
                Ok(Some(line)) => {
                    if tx.send(PumpEvent::Line(line_to_string(&line))).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = tx.send(PumpEvent::Failed(name, err));
                    return;
                }
            }
        }

        let read = match source.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.send(PumpEvent::Failed(name, TransportError::Io(err)));
                return;
            }
        };

        if read == 0 {
            if !buf.is_empty() {
                warn!(source = name, bytes = buf.len(), "discarding unterminated trailing line");
            }
            let _ = tx.send(PumpEvent::Closed(name));
            return;
        }

        buf.extend_from_slice(&chunk[..read]);
    }
}
