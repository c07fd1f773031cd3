//! Input line parsing.
//!
//! Lines starting with `/` are commands; anything else is a message for the
//! current room.

use thiserror::Error;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send text to the current room
    Say(String),
    /// `/join <room>`: join and switch to a room
    Join(String),
    /// `/leave [room]`: leave a room, the current one by default
    Leave(Option<String>),
    /// `/room <room>`: switch the current room without joining
    Switch(String),
    /// `/chat <user>`: open the private room shared with a user
    Chat(String),
    /// `/read <message-id>`: mark a message read
    Read(String),
    /// `/users`: fetch the user directory
    Users,
    /// `/online`: list online users
    Online,
    /// `/typing`: signal a keystroke burst
    Typing,
    /// `/clear`: empty the local conversation
    Clear,
    /// `/reconnect`: start a fresh connection
    Reconnect,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
}

/// Input the parser rejects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Blank line
    #[error("empty input")]
    Empty,

    /// Command that needs an argument got none
    #[error("/{command} needs {argument}")]
    MissingArgument {
        /// Command name
        command: &'static str,
        /// What was expected
        argument: &'static str,
    },

    /// Unrecognized `/word`
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
}

/// Help text listing every command.
pub const HELP: &str = "\
/join <room>    join a room and make it current
/leave [room]   leave a room (default: current)
/room <room>    switch the current room
/chat <user>    open a private chat with a user
/read <id>      mark a message read
/users          fetch the user directory
/online         list online users
/typing         show a typing indicator to others
/clear          clear the local conversation
/reconnect      reconnect now
/quit           exit";

impl Command {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// - `CommandError::Empty` for blank input
    /// - `CommandError::MissingArgument` when a required argument is absent
    /// - `CommandError::Unknown` for an unrecognized command
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say(line.to_owned()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        let required = |command: &'static str, argument: &'static str| {
            arg.map(str::to_owned).ok_or(CommandError::MissingArgument { command, argument })
        };

        Ok(match name {
            "join" => Self::Join(required("join", "a room id")?),
            "leave" => Self::Leave(arg.map(str::to_owned)),
            "room" => Self::Switch(required("room", "a room id")?),
            "chat" => Self::Chat(required("chat", "a user id")?),
            "read" => Self::Read(required("read", "a message id")?),
            "users" => Self::Users,
            "online" => Self::Online,
            "typing" => Self::Typing,
            "clear" => Self::Clear,
            "reconnect" => Self::Reconnect,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_owned())),
        })
    }
}
