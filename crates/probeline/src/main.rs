mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel, Role};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "probeline",
    version,
    about = "Drive line-oriented child processes over stdio"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "PROBELINE_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let role = match cli.command {
        Command::Echo(_) => Role::Peer,
        _ => Role::Driver,
    };
    init_logging(cli.log_format, cli.log_level, role);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exec_subcommand() {
        let cli = Cli::try_parse_from([
            "probeline",
            "exec",
            "-c",
            "b",
            "-c",
            "m g 1b",
            "--timeout",
            "500ms",
            "./gtc",
            "--mode",
            "protocol",
        ])
        .expect("exec args should parse");

        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.commands, vec!["b", "m g 1b"]);
        assert_eq!(args.peer.program.to_str(), Some("./gtc"));
        assert_eq!(args.peer.args, vec!["--mode", "protocol"]);
    }

    #[test]
    fn exec_requires_a_command() {
        let err = Cli::try_parse_from(["probeline", "exec", "./gtc"])
            .expect_err("missing -c should fail");

        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_repl_with_ignored_lines() {
        let cli = Cli::try_parse_from([
            "probeline",
            "repl",
            "--ignore-line",
            "gtc 0.1.0",
            "--quit-command",
            "quit",
            "gtc",
        ])
        .expect("repl args should parse");

        let Command::Repl(args) = cli.command else {
            panic!("expected repl");
        };
        assert_eq!(args.peer.ignore_lines, vec!["gtc 0.1.0"]);
        assert_eq!(args.peer.quit_command.as_deref(), Some("quit"));
    }

    #[test]
    fn parses_echo_subcommand() {
        let cli = Cli::try_parse_from(["probeline", "echo", "--banner", "peer 1.0"])
            .expect("echo args should parse");
        assert!(matches!(cli.command, Command::Echo(_)));
    }
}
