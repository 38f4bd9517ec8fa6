use magtile_line::{verbs, Command};
use magtile_session::Reply;
use tracing::debug;

use crate::cmd::{ConnectionArgs, SendArgs};
use crate::exit::{framing_error, reply_code, session_error, CliError, CliResult, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, connection: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let command = resolve_command(&args)?;
    let mut session = connection.connect()?;

    let result = session.send(&command);
    let disconnect = session.disconnect();
    if !disconnect.is_success() {
        debug!(error = %disconnect.data, "disconnect after command failed");
    }

    let reply = Reply::from(result.map_err(|err| session_error("command failed", err))?);
    print_reply(command.verb(), &reply, format);
    Ok(reply_code(&reply))
}

/// Build and validate the command before the port is touched.
fn resolve_command(args: &SendArgs) -> CliResult<Command> {
    if !args.allow_unknown && !verbs::is_known(&args.verb) {
        return Err(CliError::new(
            USAGE,
            format!(
                "unknown verb {:?} (use --allow-unknown to send it anyway)",
                args.verb
            ),
        ));
    }

    let command = Command::with_args(args.verb.as_str(), &args.args);
    command
        .validate()
        .map_err(|err| framing_error("invalid command", err))?;
    Ok(command)
}
