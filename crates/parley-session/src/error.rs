//! Error types for the session layer.

use parley_transport::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A login was attempted with an empty identifier.
    #[error("No value provided for login id")]
    EmptyLoginId,

    /// The session already has a login id; it is set exactly once.
    #[error("already logged in as {0}")]
    AlreadyLoggedIn(String),

    /// The session's connection has gone away and its outbound queue
    /// is closed.
    #[error("session {0} is closed")]
    Closed(ConnectionId),
}
