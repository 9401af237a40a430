use crate::protocol::{Command, Verb, HELP_TEXT};
use crate::sandbox::FileOperations;
use crate::server::Session;
use tracing::debug;

/// What the multiplexer should do with a processed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write the text, then a prompt.
    Text(String),
    /// Close the connection without a prompt.
    Disconnect,
    /// Unknown or malformed line: only a prompt.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    ops: FileOperations,
}

impl Dispatcher {
    pub fn new(ops: FileOperations) -> Self {
        Self { ops }
    }

    /// Parse and run one line for `session`.
    pub fn handle_line(&self, session: &mut Session, line: &str) -> Reply {
        match Command::parse(line) {
            Some(command) => self.dispatch(session, &command),
            None => {
                debug!("Ignoring unknown input in session {}: {:?}", session.id(), line);
                Reply::Ignored
            }
        }
    }

    pub fn dispatch(&self, session: &mut Session, command: &Command) -> Reply {
        debug!("Dispatching {} {:?} in session {}", command.verb, command.args, session.id());

        match command.verb {
            Verb::Help | Verb::Exit | Verb::Ls if !command.args.is_empty() => Reply::Ignored,
            Verb::Help => Reply::Text(HELP_TEXT.concat()),
            Verb::Exit => Reply::Disconnect,
            Verb::Ls => line(self.ops.list(session.current_dir())),
            Verb::Copy => line(self.ops.copy(session.current_dir(), command.arg(0), command.arg(1))),
            Verb::Mkdir => with_argument(command, |arg| line(self.ops.mkdir(session.current_dir(), arg))),
            Verb::Touch => with_argument(command, |arg| line(self.ops.touch(session.current_dir(), arg))),
            Verb::Cd => with_argument(command, |arg| line(self.ops.cd(session.current_dir_mut(), arg))),
            Verb::Rm => with_argument(command, |arg| line(self.ops.rm(session.current_dir(), arg))),
            Verb::Cat => with_argument(command, |arg| {
                Reply::Text(file_body(self.ops.cat(session.current_dir(), arg)))
            }),
        }
    }
}

/// Single-argument verbs carry exactly one (possibly empty) argument.
fn with_argument<F>(command: &Command, handler: F) -> Reply
where
    F: FnOnce(&str) -> Reply,
{
    match command.args.as_slice() {
        [argument] => handler(argument),
        _ => Reply::Ignored,
    }
}

fn line(mut text: String) -> Reply {
    text.push('\n');
    Reply::Text(text)
}

/// File content is sent as-is; only a non-empty body missing its final
/// newline gets one, so the prompt starts on a fresh line.
fn file_body(mut content: String) -> String {
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content
}
