//! Per-connection handler: session lifecycle and inbound frame dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the session's outbound queue. The flow is:
//!   1. Register the session (unauthenticated)
//!   2. Loop: receive frames → [`handle_message_from_client`]
//!   3. On close or error: deregister, flush, close the connection

use std::sync::Arc;

use parley_protocol::{ClientRequest, Dispatch, Frame};
use parley_session::{Outbound, OutboundReceiver, Session, SessionError};
use parley_transport::{Connection, ConnectionId};

use crate::ParleyError;
use crate::server::ServerState;

/// Drop guard that deregisters a session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SessionGuard {
    id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let id = self.id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.disconnect(id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    state: Arc<ServerState>,
) -> Result<(), ParleyError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, remote = %conn.remote_addr(), "handling new connection");

    let (session, outbound) = Session::new(conn_id, conn.remote_addr());
    let session = Arc::new(session);
    state.connect(Arc::clone(&session)).await;
    let _guard = SessionGuard {
        id: conn_id,
        state: Arc::clone(&state),
    };

    let writer = tokio::spawn(write_outbound(Arc::clone(&conn), outbound));

    let result = loop {
        match conn.recv().await {
            Ok(Some(line)) => {
                handle_message_from_client(&state, &session, &line).await;
            }
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed");
                break Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break Err(ParleyError::Transport(e));
            }
        }
    };

    // Frames already queued are flushed before the close.
    session.close();
    if let Err(e) = writer.await {
        tracing::error!(%conn_id, error = %e, "writer task failed");
    }

    // _guard drops here → session is deregistered.
    result
}

/// Delivers a session's outbound queue to its connection, in order, until a
/// close is queued or a send fails. Always closes the connection on exit,
/// which also ends the reader's pending `recv`.
async fn write_outbound<C: Connection>(conn: Arc<C>, mut rx: OutboundReceiver) {
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Line(line) => {
                if let Err(e) = conn.send(&line).await {
                    tracing::debug!(
                        conn_id = %conn.id(),
                        error = %e,
                        "failed to send to client, dropping session"
                    );
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    rx.close();
    if let Err(e) = conn.close().await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

/// Dispatches one inbound frame from `session`.
///
/// Login and logoff are always honored. Anything else from a session that
/// has not logged in terminates it. Once logged in, unknown commands get an
/// error reply and chat is broadcast as `"<login id>: <body>"` to everyone,
/// the sender included.
pub(crate) async fn handle_message_from_client(
    state: &ServerState,
    session: &Session,
    raw: &str,
) {
    if raw.is_empty() {
        tracing::warn!(
            conn_id = %session.id(),
            "Invalid message received from client: empty frame"
        );
        return;
    }

    let frame = Frame::parse(raw);
    match frame.dispatch::<ClientRequest>() {
        Ok(Dispatch::Command {
            command: ClientRequest::Login,
            arg,
        }) => login(session, arg),

        Ok(Dispatch::Command {
            command: ClientRequest::Logoff,
            ..
        }) => {
            tracing::info!(conn_id = %session.id(), "client logged off");
            session.close();
        }

        _ if !session.is_authenticated() => terminate_unauthenticated(session),

        Err(_) => reply(session, format!("invalid command: {raw}")),

        Ok(Dispatch::Chat(body)) => {
            let login_id = session.login_id().unwrap_or_default();
            let line = format!("{login_id}: {body}");
            tracing::info!(
                conn_id = %session.id(),
                login_id,
                "Message received: {body}"
            );
            state.sessions.lock().await.broadcast(&line);
        }
    }
}

fn login(session: &Session, arg: Option<&str>) {
    let result = match arg {
        Some(login_id) => session.set_login_id(login_id),
        None => Err(SessionError::EmptyLoginId),
    };
    match result {
        Ok(()) => {
            let login_id = session.login_id().unwrap_or_default();
            reply(session, format!("Client's login id set to {login_id}"));
        }
        Err(e) => {
            tracing::debug!(conn_id = %session.id(), error = %e, "login rejected");
            reply(session, format!("Failed to set login id. Error: {e}"));
        }
    }
}

fn terminate_unauthenticated(session: &Session) {
    tracing::warn!(
        conn_id = %session.id(),
        remote = %session.remote_addr(),
        "traffic before login, terminating connection"
    );
    reply(
        session,
        "Invalid request received. login must be first action after \
         connecting. Terminating connection.",
    );
    session.close();
}

fn reply(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.send(message) {
        tracing::debug!(
            conn_id = %session.id(),
            error = %e,
            "Failed to send message to the client"
        );
    }
}
