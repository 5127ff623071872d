use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use probeline_barrier::{BarrierConfig, DEFAULT_PROBE, DEFAULT_SENTINEL};
use probeline_session::SessionConfig;
use probeline_transport::ProcessConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod exec;
pub mod repl;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn a peer, run the given commands, print each response.
    Exec(ExecArgs),
    /// Spawn a peer and forward commands read from stdin.
    Repl(ReplArgs),
    /// Act as a reference peer on this process's stdin/stdout.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Exec(args) => exec::run(args, format),
        Command::Repl(args) => repl::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// How to start the peer and delimit its responses.
#[derive(Args, Debug)]
pub struct PeerArgs {
    /// Peer program to spawn.
    pub program: PathBuf,
    /// Arguments passed to the peer program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
    /// Per-line read timeout (e.g. 30s, 500ms, or "off").
    #[arg(long, env = "PROBELINE_TIMEOUT", default_value = "30s")]
    pub timeout: String,
    /// Probe command that makes the peer emit the sentinel.
    #[arg(long, default_value = DEFAULT_PROBE)]
    pub probe: String,
    /// Sentinel line that ends every response.
    #[arg(long, default_value = DEFAULT_SENTINEL)]
    pub sentinel: String,
    /// Drop lines equal to TEXT from every response (repeatable).
    #[arg(long = "ignore-line", value_name = "TEXT")]
    pub ignore_lines: Vec<String>,
    /// Keep the peer's stderr out of responses.
    #[arg(long)]
    pub no_merge_stderr: bool,
    /// Line sent to the peer before shutting it down.
    #[arg(long, value_name = "CMD")]
    pub quit_command: Option<String>,
    /// Discard everything the peer prints on startup.
    #[arg(long)]
    pub open_drain: bool,
}

impl PeerArgs {
    pub fn process_config(&self) -> CliResult<ProcessConfig> {
        let mut config = ProcessConfig::new(&self.program)
            .args(&self.args)
            .with_merge_stderr(!self.no_merge_stderr)
            .with_read_timeout(parse_timeout(&self.timeout)?);
        config.quit_command = self.quit_command.clone();
        Ok(config)
    }

    pub fn session_config(&self) -> CliResult<SessionConfig> {
        if self.probe.trim().is_empty() || self.sentinel.trim().is_empty() {
            return Err(CliError::new(USAGE, "probe and sentinel must not be empty"));
        }
        Ok(SessionConfig {
            barrier: BarrierConfig {
                probe: self.probe.clone(),
                sentinel: self.sentinel.trim().to_string(),
                ignored_lines: self
                    .ignore_lines
                    .iter()
                    .map(|line| line.trim().to_string())
                    .collect(),
            },
            open_drain: self.open_drain,
            ..SessionConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Command to submit (repeatable, sent in order).
    #[arg(long = "command", short = 'c', value_name = "CMD", required = true)]
    pub commands: Vec<String>,
    #[command(flatten)]
    pub peer: PeerArgs,
}

#[derive(Args, Debug)]
pub struct ReplArgs {
    #[command(flatten)]
    pub peer: PeerArgs,
}

#[derive(Args, Debug, Default)]
pub struct EchoArgs {
    /// Line printed once at startup.
    #[arg(long, value_name = "TEXT")]
    pub banner: Option<String>,
    /// Delay before every reply, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub delay_ms: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a timeout such as `5s` or `250ms`; `off` disables it.
pub fn parse_timeout(input: &str) -> CliResult<Option<Duration>> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("off") || input.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_duration(input).map(Some)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer_args() -> PeerArgs {
        PeerArgs {
            program: PathBuf::from("gtc"),
            args: vec!["--mode".to_string(), "protocol".to_string()],
            timeout: "2s".to_string(),
            probe: "ping".to_string(),
            sentinel: " ok ".to_string(),
            ignore_lines: vec![" gtc 0.1.0".to_string()],
            no_merge_stderr: false,
            quit_command: Some("quit".to_string()),
            open_drain: true,
        }
    }

    #[test]
    fn parse_timeout_units_and_off() {
        assert_eq!(parse_timeout("2s").unwrap(), Some(Duration::from_secs(2)));
        assert_eq!(
            parse_timeout("150ms").unwrap(),
            Some(Duration::from_millis(150))
        );
        assert_eq!(parse_timeout("3").unwrap(), Some(Duration::from_secs(3)));
        assert_eq!(parse_timeout("off").unwrap(), None);
    }

    #[test]
    fn parse_timeout_rejects_invalid_values() {
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("bad").is_err());
        assert!(parse_timeout("").is_err());
    }

    #[test]
    fn peer_args_map_onto_configs() {
        let args = peer_args();

        let process = args.process_config().unwrap();
        assert_eq!(process.args, vec!["--mode", "protocol"]);
        assert_eq!(process.quit_command.as_deref(), Some("quit"));
        assert_eq!(process.line.read_timeout, Some(Duration::from_secs(2)));
        assert!(process.merge_stderr);

        let session = args.session_config().unwrap();
        assert_eq!(session.barrier.sentinel, "ok");
        assert_eq!(session.barrier.ignored_lines, vec!["gtc 0.1.0"]);
        assert!(session.open_drain);
        assert!(session.pre_drain);
    }

    #[test]
    fn empty_sentinel_is_usage_error() {
        let args = PeerArgs {
            sentinel: "  ".to_string(),
            ..peer_args()
        };
        let err = args.session_config().unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
