//! Error types for the protocol layer.
//!
//! Each crate in Parley defines its own error enum. A `ProtocolError` always
//! means a line was well-formed text but not an acceptable command: an
//! unknown name, or a missing or malformed argument.

/// Errors that can occur while interpreting a frame.
///
/// The `#[error("...")]` messages are shown to users as-is, so they are
/// phrased for a console, not for a log file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The command name is not in the accepted set for this context.
    /// An empty name (a bare `#`) is never accepted.
    #[error("not a valid command: #{0}")]
    InvalidCommand(String),

    /// The command requires an argument and none was given.
    #[error("missing argument for #{0}")]
    MissingArgument(&'static str),

    /// The command's argument could not be interpreted.
    #[error("invalid argument for #{command}: {value}")]
    InvalidArgument {
        /// The command that received the argument.
        command: &'static str,
        /// The offending argument, verbatim.
        value: String,
    },
}
