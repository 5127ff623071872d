use std::io::{BufRead, Write};
use std::time::Duration;

use probeline_barrier::{DEFAULT_PROBE, DEFAULT_SENTINEL};
use tracing::debug;

use crate::cmd::EchoArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

/// What the reference peer does with one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Print these lines on stdout.
    Lines(Vec<String>),
    /// Print this line on stderr.
    Stderr(String),
    /// Close stdout and stderr, then idle until stdin ends.
    CloseOutput,
    /// Exit immediately.
    Quit,
}

/// Pure command table of the reference peer.
///
/// `ping` answers with the sentinel, so this peer can sit behind a session
/// with default settings. Unknown lines are echoed back with an `echo `
/// prefix.
pub fn respond(line: &str) -> Reply {
    let line = line.trim();
    if line == DEFAULT_PROBE {
        return Reply::Lines(vec![DEFAULT_SENTINEL.to_string()]);
    }

    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    match verb {
        "" => Reply::Lines(Vec::new()),
        "quit" => Reply::Quit,
        "close" => Reply::CloseOutput,
        "say" => Reply::Lines(vec![rest.to_string()]),
        "warn" => Reply::Stderr(rest.to_string()),
        "lines" => match rest.trim().parse::<usize>() {
            // Blank separators exercise the reader's blank-line filtering.
            Ok(count) => Reply::Lines(
                (1..=count)
                    .flat_map(|i| [format!("line {i}"), String::new()])
                    .collect(),
            ),
            Err(_) => Reply::Lines(vec![format!("echo {line}")]),
        },
        _ => Reply::Lines(vec![format!("echo {line}")]),
    }
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let stdin = std::io::stdin();
    let mut out = std::io::stdout().lock();

    if let Some(banner) = &args.banner {
        writeln!(out, "{banner}").map_err(|err| io_error("write failed", err))?;
        out.flush().map_err(|err| io_error("write failed", err))?;
    }

    let delay = Duration::from_millis(args.delay_ms);
    let mut output_open = true;

    for line in stdin.lock().lines() {
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        if !output_open {
            continue;
        }

        let reply = respond(&line);
        debug!(line = %line, ?reply, "echo peer reply");
        if !delay.is_zero() && reply != Reply::Lines(Vec::new()) {
            std::thread::sleep(delay);
        }

        match reply {
            Reply::Lines(lines) => {
                for text in lines {
                    writeln!(out, "{text}").map_err(|err| io_error("write failed", err))?;
                }
                out.flush().map_err(|err| io_error("write failed", err))?;
            }
            Reply::Stderr(text) => eprintln!("{text}"),
            Reply::Quit => return Ok(SUCCESS),
            Reply::CloseOutput => {
                out.flush().map_err(|err| io_error("write failed", err))?;
                close_output();
                output_open = false;
            }
        }
    }

    Ok(SUCCESS)
}

#[cfg(unix)]
fn close_output() {
    // SAFETY: fds 1 and 2 are owned by this process and nothing writes to
    // them after this point; `run` stops printing once output is closed.
    unsafe {
        libc::close(1);
        libc::close(2);
    }
}

#[cfg(not(unix))]
fn close_output() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_answers_sentinel() {
        assert_eq!(respond("ping"), Reply::Lines(vec!["ok".to_string()]));
        assert_eq!(respond("  ping "), Reply::Lines(vec!["ok".to_string()]));
    }

    #[test]
    fn control_verbs() {
        assert_eq!(respond("quit"), Reply::Quit);
        assert_eq!(respond("close"), Reply::CloseOutput);
        assert_eq!(respond(""), Reply::Lines(Vec::new()));
        assert_eq!(respond("warn careful"), Reply::Stderr("careful".to_string()));
    }

    #[test]
    fn say_repeats_text_verbatim() {
        assert_eq!(
            respond("say hello there"),
            Reply::Lines(vec!["hello there".to_string()])
        );
    }

    #[test]
    fn lines_interleaves_blank_separators() {
        assert_eq!(
            respond("lines 2"),
            Reply::Lines(vec![
                "line 1".to_string(),
                String::new(),
                "line 2".to_string(),
                String::new(),
            ])
        );
        assert_eq!(respond("lines 0"), Reply::Lines(Vec::new()));
    }

    #[test]
    fn unknown_input_is_echoed() {
        assert_eq!(
            respond("m g 1b"),
            Reply::Lines(vec!["echo m g 1b".to_string()])
        );
        assert_eq!(
            respond("lines many"),
            Reply::Lines(vec!["echo lines many".to_string()])
        );
    }
}
