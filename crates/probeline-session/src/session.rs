use probeline_barrier::{BarrierConfig, BarrierReader, Segment};
use probeline_transport::LineTransport;
use tracing::{debug, warn};

use crate::command::validate_command;
use crate::error::{Result, SessionError};

/// Runtime configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Probe, sentinel and line filtering used by every drain.
    pub barrier: BarrierConfig,
    /// Drain and discard leftover output before each command. Default: true.
    pub pre_drain: bool,
    /// Drain once right after the transport is attached, discarding any
    /// startup output. Default: false.
    ///
    /// Honored by [`Session::open`] and the launcher functions. The
    /// infallible constructors do no I/O and ignore it.
    pub open_drain: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            barrier: BarrierConfig::default(),
            pre_drain: true,
            open_drain: false,
        }
    }
}

/// Request/response access to a peer speaking the ping-barrier protocol.
///
/// A session serves one caller at a time: there are no request ids on the
/// wire, so overlapping submissions would interleave their responses. Wrap
/// it in a [`SharedSession`](crate::SharedSession) to share it.
///
/// Any transport or protocol fault marks the session faulted; after that
/// every operation fails with [`SessionError::Faulted`] until the caller
/// builds a new session on a fresh transport.
pub struct Session<T> {
    reader: BarrierReader<T>,
    pre_drain: bool,
    faulted: bool,
}

impl<T: LineTransport> Session<T> {
    /// Create a session with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    ///
    /// Performs no I/O, so `config.open_drain` is not applied; use
    /// [`Session::open`] for that.
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            reader: BarrierReader::with_config(transport, config.barrier),
            pre_drain: config.pre_drain,
            faulted: false,
        }
    }

    /// Create a session and, if `open_drain` is set, discard the peer's
    /// startup output before returning it.
    pub fn open(transport: T, config: SessionConfig) -> Result<Self> {
        let open_drain = config.open_drain;
        let mut session = Self::with_config(transport, config);
        if open_drain {
            let startup = session.drain()?;
            debug!(lines = startup.len(), "discarded startup output");
        }
        Ok(session)
    }

    /// Send `command` and return the peer's response text.
    ///
    /// Retained lines are joined with `\n`; blank lines are dropped.
    pub fn submit(&mut self, command: &str) -> Result<String> {
        self.request(command).map(|segment| segment.text())
    }

    /// Send `command` and return the peer's response as a segment.
    pub fn request(&mut self, command: &str) -> Result<Segment> {
        validate_command(command, &self.reader.config().probe)?;
        self.ensure_usable()?;

        if self.pre_drain {
            let stale = self.guarded(|reader| Ok(reader.drain()?))?;
            if !stale.is_empty() {
                warn!(lines = stale.len(), "discarding unread peer output");
            }
        }

        self.guarded(|reader| Ok(reader.get_mut().write_line(command)?))?;
        let segment = self.guarded(|reader| Ok(reader.drain()?))?;

        debug!(command, lines = segment.len(), "command complete");
        Ok(segment)
    }

    /// Collect whatever output is pending without sending a command.
    pub fn drain(&mut self) -> Result<Segment> {
        self.ensure_usable()?;
        self.guarded(|reader| Ok(reader.drain()?))
    }

    /// Returns true once a fault has made this session unusable.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Close the underlying transport.
    pub fn close(&mut self) -> Result<()> {
        self.reader.get_mut().close()?;
        Ok(())
    }

    /// Current barrier configuration.
    pub fn barrier_config(&self) -> &BarrierConfig {
        self.reader.config()
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        self.reader.get_ref()
    }

    /// Mutably borrow the underlying transport.
    ///
    /// Writing to it directly bypasses the barrier; the next pre-drain
    /// discards whatever that provokes.
    pub fn transport_mut(&mut self) -> &mut T {
        self.reader.get_mut()
    }

    /// Consume the session and return the transport.
    pub fn into_inner(self) -> T {
        self.reader.into_inner()
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.faulted {
            return Err(SessionError::Faulted);
        }
        Ok(())
    }

    fn guarded<R>(
        &mut self,
        op: impl FnOnce(&mut BarrierReader<T>) -> Result<R>,
    ) -> Result<R> {
        let result = op(&mut self.reader);
        if let Err(err) = &result {
            if err.is_fatal() {
                warn!(error = %err, "session faulted");
                self.faulted = true;
            }
        }
        result
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pre_drain", &self.pre_drain)
            .field("faulted", &self.faulted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{BufRead, BufReader, Write};
    use std::time::Duration;

    use probeline_barrier::BarrierError;
    use probeline_transport::{ReadLine, StreamTransport, TransportError};

    use super::*;
    use crate::error::UsageError;

    /// In-memory peer: `ping` -> `ok`, known commands -> scripted lines,
    /// `bye` -> closes output without answering.
    #[derive(Default)]
    struct ScriptedPeer {
        pending: VecDeque<String>,
        written: Vec<String>,
        output_closed: bool,
    }

    impl LineTransport for ScriptedPeer {
        fn write_line(&mut self, text: &str) -> probeline_transport::Result<()> {
            self.written.push(text.to_string());
            if self.output_closed {
                return Ok(());
            }
            let lines: &[&str] = match text {
                "ping" => &["ok"],
                "dump" => &["A", "", "B"],
                "x" => &["x-out"],
                "y" => &["y-out-1", "y-out-2"],
                "bye" => {
                    self.pending.push_back("A".to_string());
                    self.output_closed = true;
                    &[]
                }
                _ => &[],
            };
            self.pending.extend(lines.iter().map(|l| l.to_string()));
            Ok(())
        }

        fn read_line(&mut self) -> probeline_transport::Result<ReadLine> {
            Ok(self
                .pending
                .pop_front()
                .map_or(ReadLine::EndOfStream, ReadLine::Line))
        }

        fn close(&mut self) -> probeline_transport::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn multi_line_response_drops_blank_lines() {
        let mut session = Session::new(ScriptedPeer::default());
        assert_eq!(session.submit("dump").unwrap(), "A\nB");
        assert_eq!(
            session.transport().written,
            vec!["ping", "dump", "ping"],
            "pre-drain, command, drain"
        );
    }

    #[test]
    fn silent_command_returns_empty_response() {
        let mut session = Session::new(ScriptedPeer::default());
        assert_eq!(session.submit("l").unwrap(), "");
    }

    #[test]
    fn explicit_drain_on_idle_peer_is_empty() {
        let mut session = Session::new(ScriptedPeer::default());
        assert!(session.drain().unwrap().is_empty());
        assert!(session.transport().pending.is_empty());
    }

    #[test]
    fn open_drain_applies_only_through_open() {
        let config = SessionConfig {
            open_drain: true,
            ..SessionConfig::default()
        };

        let mut peer = ScriptedPeer::default();
        peer.pending.push_back("gtc 0.1.0".to_string());
        let session = Session::with_config(peer, config.clone());
        assert!(session.transport().written.is_empty());
        assert_eq!(session.transport().pending.len(), 1);

        let mut peer = ScriptedPeer::default();
        peer.pending.push_back("gtc 0.1.0".to_string());
        let session = Session::open(peer, config).unwrap();
        assert_eq!(session.transport().written, vec!["ping"]);
        assert!(session.transport().pending.is_empty());
    }

    #[test]
    fn sequential_commands_do_not_bleed() {
        let mut session = Session::new(ScriptedPeer::default());
        assert_eq!(session.submit("x").unwrap(), "x-out");
        assert_eq!(session.request("y").unwrap().lines(), ["y-out-1", "y-out-2"]);
    }

    #[test]
    fn pre_drain_discards_leftover_output() {
        let mut peer = ScriptedPeer::default();
        peer.pending.extend(["gtc 0.1.0".to_string(), String::new()]);
        let mut session = Session::new(peer);

        assert_eq!(session.submit("x").unwrap(), "x-out");
    }

    #[test]
    fn without_pre_drain_leftover_lands_in_response() {
        let mut peer = ScriptedPeer::default();
        peer.pending.push_back("stale".to_string());
        let config = SessionConfig {
            pre_drain: false,
            ..SessionConfig::default()
        };
        let mut session = Session::with_config(peer, config);

        assert_eq!(session.submit("x").unwrap(), "stale\nx-out");
        assert_eq!(session.transport().written, vec!["x", "ping"]);
    }

    #[test]
    fn usage_errors_send_nothing_and_do_not_fault() {
        let mut session = Session::new(ScriptedPeer::default());

        let err = session.submit("ping").unwrap_err();
        assert!(matches!(err, SessionError::Usage(UsageError::ReservedProbe(_))));
        let err = session.submit("a\nb").unwrap_err();
        assert!(matches!(err, SessionError::Usage(UsageError::EmbeddedNewline)));

        assert!(session.transport().written.is_empty());
        assert!(!session.is_faulted());
        assert_eq!(session.submit("x").unwrap(), "x-out");
    }

    #[test]
    fn peer_closing_mid_drain_is_protocol_error_and_faults() {
        let mut session = Session::new(ScriptedPeer::default());

        let err = session.submit("bye").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(BarrierError::StreamEnded { pending_lines: 1 })
        ));
        assert!(session.is_faulted());

        let written = session.transport().written.len();
        assert!(matches!(session.submit("x"), Err(SessionError::Faulted)));
        assert!(matches!(session.drain(), Err(SessionError::Faulted)));
        assert_eq!(session.transport().written.len(), written);
    }

    #[test]
    fn transport_failure_is_transport_error() {
        let mut transport =
            StreamTransport::new(std::io::Cursor::new(Vec::new()), std::io::sink());
        transport.close().unwrap();
        let mut session = Session::new(transport);

        let err = session.submit("x").unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
        assert!(session.is_faulted());
    }

    /// Socket peer that answers each command after `delay` with two lines
    /// naming the command, and `ping` with `ok`.
    #[cfg(unix)]
    fn spawn_delayed_peer(
        server: std::os::unix::net::UnixStream,
        delay: Duration,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let mut out = server.try_clone().unwrap();
            for line in BufReader::new(server).lines() {
                let line = line.unwrap();
                match line.as_str() {
                    "ping" => writeln!(out, "ok").unwrap(),
                    "quit" => return,
                    cmd => {
                        std::thread::sleep(delay);
                        writeln!(out, "{cmd}:1").unwrap();
                        writeln!(out).unwrap();
                        std::thread::sleep(delay);
                        writeln!(out, "{cmd}:2").unwrap();
                    }
                }
            }
        })
    }

    #[test]
    #[cfg(unix)]
    fn ordering_holds_with_slow_peer() {
        let (client, server) = std::os::unix::net::UnixStream::pair().unwrap();
        let writer = client.try_clone().unwrap();
        let peer = spawn_delayed_peer(server, Duration::from_millis(10));
        let mut session = Session::new(StreamTransport::new(client, writer));

        for cmd in ["x", "y", "z"] {
            assert_eq!(session.submit(cmd).unwrap(), format!("{cmd}:1\n{cmd}:2"));
        }

        session.transport_mut().write_line("quit").unwrap();
        peer.join().unwrap();
        assert!(session.drain().unwrap_err().is_fatal());
        assert!(session.is_faulted());
    }
}
