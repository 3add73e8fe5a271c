//! Error types for the Parley engines, plus the unified error.
//!
//! Every error message here is written to be shown on a console as-is:
//! engines report failures through [`Console::display`](crate::Console)
//! using the `Display` text, and also return them so callers can match.

use parley_protocol::ProtocolError;
use parley_transport::TransportError;

/// Errors raised by the server engine's operator commands.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `#start` while already accepting connections.
    #[error("Invalid command! Server is already listening on port {0}")]
    AlreadyListening(u16),

    /// `#stop` or `#close` while not accepting connections.
    #[error(
        "Invalid command! Server is already not listening for connections!"
    )]
    NotListening,

    /// `#setport` while accepting connections. The port is unchanged.
    #[error(
        "Can not change port while server is listening for connections. \
         Please close the server first (#close), then try again."
    )]
    PortLocked,

    /// Binding the listening socket failed.
    #[error("ERROR - Could not listen for clients! {0}")]
    Listen(#[source] TransportError),

    /// A malformed or unknown command.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors raised by the client engine.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An argument failed validation (e.g. an empty login id).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A connection was attempted before a login id was set.
    #[error("Connection aborted: no login id set")]
    ConnectionAborted,

    /// `#login` while a connection is open.
    #[error(
        "Invalid command! Client is already connected to host {host} on port {port}"
    )]
    AlreadyConnected {
        /// The host of the open connection.
        host: String,
        /// The port of the open connection.
        port: u16,
    },

    /// `#logoff` without an open connection.
    #[error("Invalid command! No active connection.")]
    NotConnected,

    /// `#sethost` / `#setport` while connected. Nothing is changed.
    #[error(
        "Can not change {0} while connection is active. \
         Please disconnect first (#logoff), then try again."
    )]
    Locked(&'static str),

    /// The client has terminated and accepts no further work.
    #[error("Client has terminated")]
    Terminated,

    /// A malformed or unknown command.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Opening, writing to, or reading from the connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for this config.
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (connect, send, recv, accept).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (unknown command, bad argument).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A server engine error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A client engine error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
