use std::sync::{Arc, Mutex, MutexGuard};

use probeline_barrier::Segment;
use probeline_transport::LineTransport;

use crate::error::{Result, SessionError};
use crate::session::Session;

/// A session shared between threads.
///
/// Every call holds the lock for the whole drain-write-drain cycle, so
/// commands from different callers never overlap on the wire.
pub struct SharedSession<T> {
    inner: Arc<Mutex<Session<T>>>,
}

impl<T> Clone for SharedSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: LineTransport> SharedSession<T> {
    /// Wrap a session for shared use.
    pub fn new(session: Session<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Send `command` and return the peer's response text.
    pub fn submit(&self, command: &str) -> Result<String> {
        self.lock()?.submit(command)
    }

    /// Send `command` and return the peer's response as a segment.
    pub fn request(&self, command: &str) -> Result<Segment> {
        self.lock()?.request(command)
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session<T>) -> R) -> Result<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }

    /// Recover the session if this is the last handle.
    pub fn try_unwrap(self) -> std::result::Result<Session<T>, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().map_err(|poisoned| Self::new(poisoned.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session<T>>> {
        // A panic mid-command leaves the wire in an unknown state.
        self.inner.lock().map_err(|_| SessionError::Faulted)
    }
}

impl<T> std::fmt::Debug for SharedSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl<T> From<Session<T>> for SharedSession<T> {
    fn from(session: Session<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::time::Duration;

    use probeline_transport::StreamTransport;

    use super::*;

    #[test]
    fn concurrent_callers_get_their_own_responses() {
        let (client, server) = std::os::unix::net::UnixStream::pair().unwrap();
        let writer = client.try_clone().unwrap();
        let peer = std::thread::spawn(move || {
            let mut out = server.try_clone().unwrap();
            for line in BufReader::new(server).lines() {
                let line = line.unwrap();
                match line.as_str() {
                    "ping" => writeln!(out, "ok").unwrap(),
                    "quit" => return,
                    cmd => {
                        std::thread::sleep(Duration::from_millis(1));
                        writeln!(out, "echo {cmd}").unwrap();
                    }
                }
            }
        });

        let shared = SharedSession::new(Session::new(StreamTransport::new(client, writer)));
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let cmd = format!("w{worker}-{i}");
                        assert_eq!(shared.submit(&cmd).unwrap(), format!("echo {cmd}"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        shared
            .with_session(|session| session.transport_mut().write_line("quit"))
            .unwrap()
            .unwrap();
        peer.join().unwrap();

        let session = shared.try_unwrap().unwrap();
        assert!(!session.is_faulted());
    }

    #[test]
    fn try_unwrap_fails_while_cloned() {
        let transport = StreamTransport::new(std::io::Cursor::new(Vec::new()), std::io::sink());
        let shared = SharedSession::from(Session::new(transport));
        let other = shared.clone();

        let shared = shared.try_unwrap().unwrap_err();
        drop(other);
        assert!(shared.try_unwrap().is_ok());
    }
}
