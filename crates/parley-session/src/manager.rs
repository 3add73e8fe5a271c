//! The session registry: every live session on the server.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. The server engine keeps
//! it behind one mutex, so a broadcast (enumerate, then queue a line on
//! each session) never interleaves with a connect or disconnect. Queuing is
//! non-blocking, so the lock is never held across network I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use parley_protocol::Directive;
use parley_transport::ConnectionId;

use crate::Session;

/// Tracks all connected sessions, keyed by connection.
///
/// Iteration follows connection order, so broadcasts reach sessions in the
/// order they connected.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<ConnectionId, Arc<Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. Returns the number of sessions afterwards.
    pub fn insert(&mut self, session: Arc<Session>) -> usize {
        self.sessions.insert(session.id(), session);
        self.sessions.len()
    }

    /// Removes a session, returning it if it was present.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.remove(&id)
    }

    /// Looks up a session by connection.
    pub fn get(&self, id: ConnectionId) -> Option<&Arc<Session>> {
        self.sessions.get(&id)
    }

    /// Iterates over all sessions in connection order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Session>> {
        self.sessions.values()
    }

    /// Returns the number of connected sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Queues `line` on every session, authenticated or not.
    ///
    /// Returns how many sessions accepted it. A session whose connection
    /// closed mid-broadcast is skipped, never an error.
    pub fn broadcast(&self, line: &str) -> usize {
        let mut delivered = 0;
        for session in self.sessions.values() {
            match session.send(line) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        conn_id = %session.id(),
                        error = %e,
                        "skipping departed session in broadcast"
                    );
                }
            }
        }
        delivered
    }

    /// Closes every session, sending `directive` first if given.
    ///
    /// Sessions stay registered until their connection handlers observe
    /// the close and remove them. Returns the number of sessions closed.
    pub fn close_all(&self, directive: Option<Directive>) -> usize {
        for session in self.sessions.values() {
            session.close_with(directive);
        }
        self.sessions.len()
    }
}
