//! Transport abstraction layer for Parley.
//!
//! A transport moves whole text frames (one chat line each) between peers.
//! The [`Transport`] trait accepts connections on the server side, the
//! [`Dialer`] trait opens them on the client side, and both hand out
//! [`Connection`]s that send and receive frames.
//!
//! # Implementations
//!
//! - [`TcpTransport`] / [`TcpDialer`] — newline-delimited UTF-8 over TCP
//! - `WebSocketTransport` / `WebSocketDialer` — one text message per frame
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpDialer, TcpTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketDialer, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Longest frame, in bytes, a connection will accept from its peer.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique `ConnectionId`.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A bound listener that accepts new incoming connections.
///
/// Dropping the transport releases the listening socket.
pub trait Transport: Send + Sync + Sized + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Binds a listener to `addr` (`host:port`).
    fn bind(
        addr: &str,
    ) -> impl Future<Output = Result<Self, TransportError>> + Send;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Returns the address the listener is actually bound to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// Opens outbound connections to a server.
pub trait Dialer: Send + Sync + 'static {
    /// The connection type produced by this dialer.
    type Connection: Connection;

    /// Connects to `host:port`.
    fn dial(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive text frames.
///
/// Frames never contain the line terminator; the implementation adds and
/// strips whatever delimiting its wire format needs.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &self,
        frame: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed, by either
    /// side. A pending `recv` returns as soon as [`close`](Self::close)
    /// is called.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Closes the connection. Calling it again is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns `true` once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the address of the remote peer.
    fn remote_addr(&self) -> SocketAddr;
}
