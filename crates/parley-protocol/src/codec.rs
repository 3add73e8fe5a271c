//! Line codec: turning one line of text into a [`Frame`] and back.
//!
//! Every line on the wire is either a command (it starts with
//! [`COMMAND_PREFIX`]) or an ordinary chat message. Parsing never fails:
//! deciding whether a command is *acceptable* is a separate step
//! ([`Frame::dispatch`]), because the accepted set depends on who is
//! listening.

use std::fmt;

use crate::{CommandSet, ProtocolError};

/// The character that marks a line as a command.
pub const COMMAND_PREFIX: char = '#';

/// A single line of protocol traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A `#name [arg]` line.
    Command {
        /// The command token, without the prefix. May be empty.
        name: String,
        /// The first argument token, if any.
        arg: Option<String>,
    },
    /// Any line that does not start with the prefix.
    Chat {
        /// The full line, unmodified.
        body: String,
    },
}

/// A frame checked against a command set.
///
/// Borrows from the [`Frame`] it was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<'a, C> {
    /// A command from the accepted set, with its argument.
    Command {
        /// The recognized command.
        command: C,
        /// The first argument token, if any.
        arg: Option<&'a str>,
    },
    /// A chat message body.
    Chat(&'a str),
}

impl Frame {
    /// Parses one line.
    ///
    /// After the prefix, the command name runs up to the first whitespace;
    /// the argument is the next whitespace-separated token. Any further
    /// tokens are dropped, so `#sethost my host` sets the host to `my`.
    ///
    /// ```rust
    /// use parley_protocol::Frame;
    ///
    /// assert_eq!(
    ///     Frame::parse("#login alice extra"),
    ///     Frame::Command { name: "login".into(), arg: Some("alice".into()) },
    /// );
    /// assert_eq!(Frame::parse("hi all"), Frame::Chat { body: "hi all".into() });
    /// ```
    pub fn parse(line: &str) -> Frame {
        let Some(rest) = line.strip_prefix(COMMAND_PREFIX) else {
            return Frame::Chat {
                body: line.to_owned(),
            };
        };

        let (name, tail) = match rest.find(char::is_whitespace) {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };

        Frame::Command {
            name: name.to_owned(),
            arg: tail.split_whitespace().next().map(str::to_owned),
        }
    }

    /// Builds a command frame.
    pub fn command(name: impl Into<String>, arg: Option<String>) -> Frame {
        Frame::Command {
            name: name.into(),
            arg,
        }
    }

    /// Builds a chat frame.
    pub fn chat(body: impl Into<String>) -> Frame {
        Frame::Chat { body: body.into() }
    }

    /// Returns `true` for command frames.
    pub fn is_command(&self) -> bool {
        matches!(self, Frame::Command { .. })
    }

    /// Checks this frame against the command set `C`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidCommand`] if this is a command whose
    /// name is not in `C`'s table (matching is case-sensitive). An unknown
    /// command never falls back to being a chat message.
    pub fn dispatch<C: CommandSet>(
        &self,
    ) -> Result<Dispatch<'_, C>, ProtocolError> {
        match self {
            Frame::Chat { body } => Ok(Dispatch::Chat(body)),
            Frame::Command { name, arg } => C::lookup(name)
                .map(|command| Dispatch::Command {
                    command,
                    arg: arg.as_deref(),
                })
                .ok_or_else(|| ProtocolError::InvalidCommand(name.clone())),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Command { name, arg: None } => {
                write!(f, "{COMMAND_PREFIX}{name}")
            }
            Frame::Command {
                name,
                arg: Some(arg),
            } => write!(f, "{COMMAND_PREFIX}{name} {arg}"),
            Frame::Chat { body } => f.write_str(body),
        }
    }
}
