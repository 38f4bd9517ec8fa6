use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use magtile_line::Command;
use magtile_session::Reply;
use tracing::{debug, info};

use crate::cmd::{ConnectionArgs, ShellArgs};
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_reply, OutputFormat};

/// How often the loop checks for Ctrl-C while waiting on stdin.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// What to do with one line typed by the user.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Skip,
    Quit,
    Send(Command),
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Input::Skip;
    }
    if matches!(line, "quit" | "exit") {
        return Input::Quit;
    }
    match Command::parse(line) {
        Ok(command) => Input::Send(command),
        Err(err) => Input::Invalid(err.to_string()),
    }
}

pub fn run(_args: ShellArgs, connection: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut session = connection.connect()?;
    info!("shell ready, type quit to exit");

    let lines = spawn_stdin_reader();
    while running.load(Ordering::SeqCst) {
        let line = match lines.recv_timeout(INTERRUPT_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let command = match parse_input(&line) {
            Input::Skip => continue,
            Input::Quit => break,
            Input::Invalid(message) => {
                print_reply(line.trim(), &Reply::error(message), format);
                continue;
            }
            Input::Send(command) => command,
        };

        let reply = Reply::from(session.send(&command));
        print_reply(command.verb(), &reply, format);

        if !session.is_connected() {
            return Err(CliError::new(TRANSPORT_ERROR, "device link lost"));
        }
    }

    debug!("leaving shell");
    let reply = session.disconnect();
    print_reply("disconnect", &reply, format);
    Ok(SUCCESS)
}

/// Stdin lines arrive on a channel so the loop can notice Ctrl-C while idle.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
