use probeline_session::spawn_with_config;
use tracing::info;

use crate::cmd::ExecArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: ExecArgs, format: OutputFormat) -> CliResult<i32> {
    let process = args.peer.process_config()?;
    let config = args.peer.session_config()?;

    let mut session = spawn_with_config(process, config)
        .map_err(|err| session_error("failed to start peer", err))?;

    for command in &args.commands {
        let response = session
            .request(command)
            .map_err(|err| session_error(&format!("command '{command}' failed"), err))?;
        info!(command = %command, lines = response.len(), "command answered");
        print_response(command, &response, format);
    }

    session
        .close()
        .map_err(|err| session_error("peer shutdown failed", err))?;
    Ok(SUCCESS)
}
