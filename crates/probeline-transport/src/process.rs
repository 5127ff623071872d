use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::codec::LineConfig;
use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;
use crate::traits::{LineTransport, ReadLine};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How to start a peer process and how to stop it again.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<OsString>,
    /// Extra environment variables for the child.
    pub env: Vec<(OsString, OsString)>,
    /// Working directory for the child. Defaults to the current one.
    pub current_dir: Option<PathBuf>,
    /// Merge the child's error output into the line stream. Default: true.
    pub merge_stderr: bool,
    /// Line sent to the peer before its input is closed on shutdown.
    pub quit_command: Option<String>,
    /// How long `close` waits for a voluntary exit before killing. Default: 2s.
    pub shutdown_grace: Duration,
    /// Line codec configuration.
    pub line: LineConfig,
}

impl ProcessConfig {
    /// Start a configuration for `program` with default settings.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            merge_stderr: true,
            quit_command: None,
            shutdown_grace: Duration::from_secs(2),
            line: LineConfig::default(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the quit command sent on shutdown.
    pub fn with_quit_command(mut self, command: impl Into<String>) -> Self {
        self.quit_command = Some(command.into());
        self
    }

    /// Set the per-line read timeout.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.line.read_timeout = timeout;
        self
    }

    /// Choose whether error output joins the line stream.
    pub fn with_merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }
}

/// Line transport over the stdio pipes of a child process it spawned.
///
/// The child is terminated when the transport is closed or dropped.
pub struct ChildTransport {
    child: Child,
    stream: StreamTransport,
    quit_command: Option<String>,
    shutdown_grace: Duration,
    reaped: Arc<Mutex<bool>>,
    closed: bool,
}

impl ChildTransport {
    /// Spawn the configured program with piped stdio.
    pub fn spawn(config: ProcessConfig) -> Result<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if config.merge_stderr {
                Stdio::piped()
            } else {
                Stdio::inherit()
            });
        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            program: config.program.clone(),
            source,
        })?;

        let stream = match attach_pipes(&mut child, &config) {
            Ok(stream) => stream,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        info!(program = ?config.program, pid = child.id(), "spawned peer process");

        Ok(Self {
            child,
            stream,
            quit_command: config.quit_command,
            shutdown_grace: config.shutdown_grace,
            reaped: Arc::new(Mutex::new(false)),
            closed: false,
        })
    }

    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// A handle that can terminate the child from another thread.
    pub fn terminator(&self) -> Terminator {
        Terminator {
            pid: self.child.id(),
            reaped: Arc::clone(&self.reaped),
        }
    }

    /// Check whether the child has exited without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        // Reaping under the lock keeps a concurrent `Terminator` from
        // signalling a pid the OS may already have recycled.
        let mut reaped = lock_reaped(&self.reaped);
        let status = self.child.try_wait()?;
        if status.is_some() {
            *reaped = true;
        }
        Ok(status)
    }

    /// Update the read timeout for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.stream.set_read_timeout(timeout);
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(quit) = self.quit_command.take() {
            if let Err(err) = self.stream.write_line(&quit) {
                debug!(error = %err, "quit command not delivered");
            }
        }
        let closed = self.stream.close();

        let pid = self.child.id();
        let grace = self.shutdown_grace;
        if let GraceOutcome::Exited(status) = wait_within(grace, || self.try_wait()) {
            debug!(pid, %status, "peer process exited");
            return closed;
        }

        warn!(pid, ?grace, "peer process still running; killing");
        let mut reaped = lock_reaped(&self.reaped);
        if let Err(err) = self.child.kill() {
            if err.kind() != std::io::ErrorKind::InvalidInput {
                return Err(err.into());
            }
        }
        self.child.wait()?;
        *reaped = true;
        closed
    }
}

impl LineTransport for ChildTransport {
    fn write_line(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.stream.write_line(text)
    }

    fn read_line(&mut self) -> Result<ReadLine> {
        self.stream.read_line()
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }
}

impl Drop for ChildTransport {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "failed to shut down peer process");
        }
    }
}

impl std::fmt::Debug for ChildTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildTransport")
            .field("pid", &self.child.id())
            .field("closed", &self.closed)
            .finish()
    }
}

#[derive(Debug)]
enum GraceOutcome {
    Exited(ExitStatus),
    StillRunning,
}

/// Poll `try_wait` until the child exits or `grace` runs out. A failed poll
/// counts as still running, so the caller goes on to kill and reap.
fn wait_within(
    grace: Duration,
    mut try_wait: impl FnMut() -> Result<Option<ExitStatus>>,
) -> GraceOutcome {
    let deadline = Instant::now() + grace;
    loop {
        match try_wait() {
            Ok(Some(status)) => return GraceOutcome::Exited(status),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "polling peer exit failed");
                return GraceOutcome::StillRunning;
            }
        }
        if Instant::now() >= deadline {
            return GraceOutcome::StillRunning;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn lock_reaped(reaped: &Mutex<bool>) -> MutexGuard<'_, bool> {
    reaped.lock().unwrap_or_else(PoisonError::into_inner)
}

fn attach_pipes(child: &mut Child, config: &ProcessConfig) -> Result<StreamTransport> {
    let stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(TransportError::MissingPipe("stdout"))?;

    let stream = StreamTransport::with_config(stdout, stdin, config.line.clone());
    if !config.merge_stderr {
        return Ok(stream);
    }

    let stderr = child
        .stderr
        .take()
        .ok_or(TransportError::MissingPipe("stderr"))?;
    Ok(stream.merge_named(stderr, "stderr"))
}

/// Cloneable handle that asks a spawned peer to terminate.
///
/// Terminating the peer closes its output, which aborts any blocking read
/// on the owning transport with end of stream.
#[derive(Debug, Clone)]
pub struct Terminator {
    pid: u32,
    reaped: Arc<Mutex<bool>>,
}

impl Terminator {
    /// OS process id this handle targets.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send SIGTERM. A no-op once the child has been reaped.
    #[cfg(unix)]
    pub fn terminate(&self) -> Result<()> {
        let reaped = lock_reaped(&self.reaped);
        if *reaped {
            return Ok(());
        }
        let pid = libc::pid_t::try_from(self.pid).map_err(|_| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "pid out of range",
            ))
        })?;

        // SAFETY: kill(2) takes no pointers. The owning transport only reaps
        // the child while holding `reaped`, which is held here, so the pid
        // still names our unreaped child and cannot have been reused.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            debug!(pid = self.pid, "sent SIGTERM to peer process");
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err.into())
    }

    /// Terminate the process with `TerminateProcess`. A no-op once the
    /// child has been reaped.
    #[cfg(windows)]
    pub fn terminate(&self) -> Result<()> {
        use windows_sys::Win32::Foundation::{CloseHandle, ERROR_INVALID_PARAMETER};
        use windows_sys::Win32::System::Threading::{
            OpenProcess, TerminateProcess, PROCESS_TERMINATE,
        };

        let reaped = lock_reaped(&self.reaped);
        if *reaped {
            return Ok(());
        }

        // SAFETY: OpenProcess takes no pointers; a null handle signals failure.
        let handle = unsafe { OpenProcess(PROCESS_TERMINATE, 0, self.pid) };
        if handle.is_null() {
            let err = std::io::Error::last_os_error();
            // The process already exited and its id is gone.
            if err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as i32) {
                return Ok(());
            }
            return Err(err.into());
        }

        // SAFETY: `handle` is a live process handle opened above with
        // PROCESS_TERMINATE access and is closed exactly once below.
        let terminated = unsafe { TerminateProcess(handle, 1) };
        let err = (terminated == 0).then(std::io::Error::last_os_error);
        // SAFETY: see above.
        unsafe { CloseHandle(handle) };

        match err {
            Some(err) => Err(err.into()),
            None => {
                debug!(pid = self.pid, "terminated peer process");
                Ok(())
            }
        }
    }

    /// Terminating a peer is not supported on this platform.
    #[cfg(not(any(unix, windows)))]
    pub fn terminate(&self) -> Result<()> {
        if *lock_reaped(&self.reaped) {
            return Ok(());
        }
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "terminating a peer is not supported on this platform",
        )))
    }
}

#[cfg(test)]
mod grace_tests {
    use super::*;

    #[test]
    fn failed_exit_poll_falls_through_to_kill() {
        let mut polls = 0;
        let outcome = wait_within(Duration::from_secs(5), || {
            polls += 1;
            Err(TransportError::Io(std::io::Error::other("waitpid failed")))
        });

        assert!(matches!(outcome, GraceOutcome::StillRunning));
        assert_eq!(polls, 1, "no retry loop on a failing poll");
    }

    #[test]
    #[cfg(windows)]
    fn terminator_ends_windows_child() {
        let config = ProcessConfig::new("cmd")
            .with_read_timeout(Some(Duration::from_secs(10)));
        let mut transport = ChildTransport::spawn(config).unwrap();
        transport.terminator().terminate().unwrap();

        loop {
            if transport.read_line().unwrap() == ReadLine::EndOfStream {
                break;
            }
        }
        transport.close().unwrap();
    }

    #[test]
    fn grace_expires_for_running_child() {
        let started = Instant::now();
        let outcome = wait_within(Duration::from_millis(30), || Ok(None));

        assert!(matches!(outcome, GraceOutcome::StillRunning));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
