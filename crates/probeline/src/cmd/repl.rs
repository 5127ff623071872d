use std::io::BufRead;

use probeline_session::{spawn_with_config, SessionError};
use probeline_transport::Terminator;
use tracing::{info, warn};

use crate::cmd::ReplArgs;
use crate::exit::{io_error, session_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: ReplArgs, format: OutputFormat) -> CliResult<i32> {
    let process = args.peer.process_config()?;
    let config = args.peer.session_config()?;

    let mut session = spawn_with_config(process, config)
        .map_err(|err| session_error("failed to start peer", err))?;
    install_ctrlc_handler(session.transport().terminator())?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        let command = line.trim_end_matches('\r');
        if command.trim().is_empty() {
            continue;
        }

        match session.request(command) {
            Ok(response) => print_response(command, &response, format),
            Err(SessionError::Usage(err)) => {
                warn!(command, error = %err, "command rejected");
                eprintln!("error: {err}");
            }
            Err(err) => return Err(session_error(&format!("command '{command}' failed"), err)),
        }
    }

    info!("stdin closed; shutting down peer");
    session
        .close()
        .map_err(|err| session_error("peer shutdown failed", err))?;
    Ok(SUCCESS)
}

/// Ctrl-C terminates the peer and exits, whether or not a command is in flight.
fn install_ctrlc_handler(terminator: Terminator) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if let Err(err) = terminator.terminate() {
            warn!(pid = terminator.pid(), error = %err, "failed to terminate peer");
        }
        std::process::exit(INTERRUPTED);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
