use magtile_line::DeviceCommand;
use magtile_session::Reply;
use tracing::debug;

use crate::cmd::{ConnectionArgs, DeviceArgs};
use crate::exit::{reply_code, session_error, CliResult};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: DeviceArgs, connection: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let command = DeviceCommand::from(args.action);
    let mut session = connection.connect()?;

    let result = session.send(&command.to_command());
    let disconnect = session.disconnect();
    if !disconnect.is_success() {
        debug!(error = %disconnect.data, "disconnect after command failed");
    }

    let reply = Reply::from(result.map_err(|err| session_error("command failed", err))?);
    print_reply(command.verb(), &reply, format);
    Ok(reply_code(&reply))
}
