//! Command sets and protocol constants.
//!
//! A [`CommandSet`] is a closed set of command tokens with a constant lookup
//! table. The wire-level sets live here; each protocol engine defines the
//! console-level set it accepts next to the code that handles it.

use crate::{COMMAND_PREFIX, Frame, ProtocolError};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 5555;

/// Host a client connects to when none is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Prefix for operator messages relayed to clients.
pub const SERVER_MSG_PREFIX: &str = "SERVER MSG> ";

/// A closed set of command tokens.
///
/// Implementors are plain enums; `TABLE` maps every accepted token to its
/// variant.
pub trait CommandSet: Sized + Copy + PartialEq + 'static {
    /// Every accepted token and the command it names.
    const TABLE: &'static [(&'static str, Self)];

    /// Finds the command named `name`, matching case-sensitively.
    fn lookup(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(token, _)| *token == name)
            .map(|(_, command)| *command)
    }

    /// Returns the token for this command.
    fn token(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, command)| *command == self)
            .map(|(token, _)| *token)
            .unwrap_or_default()
    }
}

/// Commands a client sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// `#login <id>` — must be the first frame on every connection.
    Login,
    /// `#logoff` — asks the server to close the connection.
    Logoff,
}

impl CommandSet for ClientRequest {
    const TABLE: &'static [(&'static str, Self)] =
        &[("login", Self::Login), ("logoff", Self::Logoff)];
}

/// Directives the server sends to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Forced logoff: the client should close its connection.
    Logoff,
}

impl CommandSet for Directive {
    const TABLE: &'static [(&'static str, Self)] = &[("logoff", Self::Logoff)];
}

impl Directive {
    /// Serializes the directive as a wire line.
    pub fn to_line(self) -> String {
        format!("{COMMAND_PREFIX}{}", self.token())
    }
}

impl Frame {
    /// The `#login <id>` handshake frame.
    pub fn login(login_id: &str) -> Frame {
        Frame::command(ClientRequest::Login.token(), Some(login_id.to_owned()))
    }

    /// The `#logoff` frame.
    pub fn logoff() -> Frame {
        Frame::command(ClientRequest::Logoff.token(), None)
    }
}

/// Returns the argument of `command`, or [`ProtocolError::MissingArgument`].
///
/// An empty argument counts as missing.
pub fn require_arg<C: CommandSet>(
    command: C,
    arg: Option<&str>,
) -> Result<&str, ProtocolError> {
    match arg {
        Some(arg) if !arg.is_empty() => Ok(arg),
        _ => Err(ProtocolError::MissingArgument(command.token())),
    }
}

/// Parses the port argument of `command`.
///
/// # Errors
/// [`ProtocolError::MissingArgument`] when absent,
/// [`ProtocolError::InvalidArgument`] when not a number in `0..=65535`.
pub fn parse_port<C: CommandSet>(
    command: C,
    arg: Option<&str>,
) -> Result<u16, ProtocolError> {
    let arg = require_arg(command, arg)?;
    arg.parse().map_err(|_| ProtocolError::InvalidArgument {
        command: command.token(),
        value: arg.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_token_agree() {
        for (token, command) in ClientRequest::TABLE {
            assert_eq!(ClientRequest::lookup(token), Some(*command));
            assert_eq!(command.token(), *token);
        }
        assert_eq!(ClientRequest::lookup("quit"), None);
        assert_eq!(ClientRequest::lookup(""), None);
    }

    #[test]
    fn test_login_frame_serializes_with_id() {
        assert_eq!(Frame::login("alice").to_string(), "#login alice");
        assert_eq!(Frame::logoff().to_string(), "#logoff");
    }

    #[test]
    fn test_directive_line() {
        assert_eq!(Directive::Logoff.to_line(), "#logoff");
        assert_eq!(Directive::lookup("logoff"), Some(Directive::Logoff));
    }

    #[test]
    fn test_require_arg_rejects_missing_and_empty() {
        assert_eq!(require_arg(ClientRequest::Login, Some("bob")), Ok("bob"));
        assert_eq!(
            require_arg(ClientRequest::Login, None),
            Err(ProtocolError::MissingArgument("login")),
        );
        assert!(require_arg(ClientRequest::Login, Some("")).is_err());
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(ClientRequest::Login, Some("6000")), Ok(6000));
        assert_eq!(
            parse_port(ClientRequest::Login, Some("six")),
            Err(ProtocolError::InvalidArgument {
                command: "login",
                value: "six".into(),
            }),
        );
        assert!(parse_port(ClientRequest::Login, Some("70000")).is_err());
        assert!(parse_port(ClientRequest::Login, Some("-1")).is_err());
        assert!(parse_port(ClientRequest::Login, None).is_err());
    }
}
