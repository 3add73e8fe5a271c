//! Session types: the server's record of one connected client.
//!
//! A session tracks:
//! - WHO the client is (its login id, once registered)
//! - WHERE it is connected from (connection id, remote address)
//! - HOW to reach it (an outbound queue drained by the connection's writer)

use std::net::SocketAddr;
use std::sync::OnceLock;

use parley_protocol::Directive;
use parley_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::SessionError;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// An item on a session's outbound queue.
///
/// The writer task delivers items in order, so a `Close` queued after a
/// `Line` is only acted on once that line has been handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One frame to send.
    Line(String),
    /// Close the connection.
    Close,
}

/// The receiving end of a session's outbound queue.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single client's session on the server.
///
/// Created when a connection is accepted, dropped when it closes. The only
/// mutable state is the login id, which is written at most once; after
/// that every read is lock-free.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    remote_addr: SocketAddr,
    login_id: OnceLock<String>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    /// Creates a session and the receiving end of its outbound queue.
    pub fn new(
        id: ConnectionId,
        remote_addr: SocketAddr,
    ) -> (Self, OutboundReceiver) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Self {
            id,
            remote_addr,
            login_id: OnceLock::new(),
            outbound,
        };
        (session, rx)
    }

    /// The connection this session belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The client's address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The registered login id, if the client has logged in.
    pub fn login_id(&self) -> Option<&str> {
        self.login_id.get().map(String::as_str)
    }

    /// `true` once a login id has been registered.
    pub fn is_authenticated(&self) -> bool {
        self.login_id.get().is_some()
    }

    /// Registers the client's login id.
    ///
    /// # Errors
    /// - [`SessionError::EmptyLoginId`] — `login_id` is empty
    /// - [`SessionError::AlreadyLoggedIn`] — an id is already set; the
    ///   existing id is kept
    pub fn set_login_id(&self, login_id: &str) -> Result<(), SessionError> {
        if login_id.is_empty() {
            return Err(SessionError::EmptyLoginId);
        }
        self.login_id.set(login_id.to_owned()).map_err(|_| {
            SessionError::AlreadyLoggedIn(
                self.login_id().unwrap_or_default().to_owned(),
            )
        })?;
        tracing::info!(conn_id = %self.id, login_id, "client logged in");
        Ok(())
    }

    /// Queues a frame for delivery.
    ///
    /// # Errors
    /// [`SessionError::Closed`] if the connection's writer has gone away.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SessionError> {
        self.outbound
            .send(Outbound::Line(line.into()))
            .map_err(|_| SessionError::Closed(self.id))
    }

    /// Queues a close after any frames already queued.
    pub fn close(&self) {
        // A failed send means the writer already finished, so the
        // connection is closed either way.
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Sends `directive` (if any), then closes.
    pub fn close_with(&self, directive: Option<Directive>) {
        if let Some(directive) = directive {
            let _ = self.send(directive.to_line());
        }
        self.close();
    }

    /// `true` once the writer task has stopped draining the queue.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}
