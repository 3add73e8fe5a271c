//! `ChatServer` builder, listening control, and operator commands.
//!
//! This is the entry point for running a chat server. It ties together all
//! the layers: transport → protocol → session, and owns the server-wide
//! state an operator can change from the console (listening or not, port).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{
    CommandSet, Directive, Dispatch, Frame, SERVER_MSG_PREFIX, parse_port,
};
use parley_session::{Session, SessionRegistry};
use parley_transport::{ConnectionId, TcpTransport, Transport};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{Console, Flow, ServerConfig, ServerError};

/// How long `#quit` waits for sessions to flush and close.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Commands the server operator can type on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Disconnect everyone, stop listening, and exit.
    Quit,
    /// Stop accepting new connections; keep existing ones.
    Stop,
    /// Stop accepting and disconnect every client.
    Close,
    /// Change the port (only while not listening).
    SetPort,
    /// Start accepting connections.
    Start,
    /// Show the configured port.
    GetPort,
}

impl CommandSet for OperatorCommand {
    const TABLE: &'static [(&'static str, Self)] = &[
        ("quit", Self::Quit),
        ("stop", Self::Stop),
        ("close", Self::Close),
        ("setport", Self::SetPort),
        ("start", Self::Start),
        ("getport", Self::GetPort),
    ];
}

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) console: Arc<dyn Console>,
    clients: watch::Sender<usize>,
}

impl ServerState {
    pub(crate) fn new(console: Arc<dyn Console>) -> Self {
        Self {
            sessions: Mutex::new(SessionRegistry::new()),
            console,
            clients: watch::Sender::new(0),
        }
    }

    /// Registers a newly accepted session.
    pub(crate) async fn connect(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.insert(session);
        self.clients.send_replace(count);
        tracing::info!(
            clients = count,
            "Connection established with a new client"
        );
    }

    /// Forgets a session whose connection has ended.
    pub(crate) async fn disconnect(&self, id: ConnectionId) {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(id).is_some() {
            let count = sessions.len();
            self.clients.send_replace(count);
            tracing::info!(
                conn_id = %id,
                clients = count,
                "Connection disconnected with a client"
            );
        }
    }
}

/// Builder for configuring a chat server.
///
/// # Example
///
/// ```rust,ignore
/// use parley::prelude::*;
///
/// let server = ChatServer::builder()
///     .port(5555)
///     .build::<TcpTransport>(console);
/// server.start().await?;
/// ```
pub struct ChatServerBuilder {
    config: ServerConfig,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the interface to bind.
    pub fn host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    /// Sets the port to listen on.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Builds the server. It does not listen until [`ChatServer::start`].
    pub fn build<T: Transport>(
        self,
        console: Arc<dyn Console>,
    ) -> ChatServer<T> {
        ChatServer {
            host: self.config.host,
            state: Arc::new(ServerState::new(console)),
            listen: Mutex::new(ListenState {
                port: self.config.port,
                listener: None,
            }),
        }
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running accept loop. The task hands its transport back on shutdown.
struct Listener<T> {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<T>,
}

struct ListenState<T> {
    port: u16,
    listener: Option<Listener<T>>,
}

/// A chat server.
///
/// Listening is controlled at runtime: [`start`](Self::start),
/// [`stop`](Self::stop), [`close`](Self::close), or the equivalent
/// operator commands through
/// [`handle_message_from_server_ui`](Self::handle_message_from_server_ui).
pub struct ChatServer<T: Transport = TcpTransport> {
    host: String,
    state: Arc<ServerState>,
    listen: Mutex<ListenState<T>>,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }
}

impl<T: Transport> ChatServer<T> {
    /// Returns the configured port.
    pub async fn port(&self) -> u16 {
        self.listen.lock().await.port
    }

    /// Returns `true` while accepting connections.
    pub async fn is_listening(&self) -> bool {
        self.listen.lock().await.listener.is_some()
    }

    /// Returns the address actually bound, while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listen
            .lock()
            .await
            .listener
            .as_ref()
            .map(|l| l.local_addr)
    }

    /// Returns the number of connected clients.
    pub async fn client_count(&self) -> usize {
        self.state.sessions.lock().await.len()
    }

    /// Changes the port.
    ///
    /// # Errors
    /// [`ServerError::PortLocked`] while listening; the port is unchanged.
    pub async fn set_port(&self, port: u16) -> Result<(), ServerError> {
        let mut listen = self.listen.lock().await;
        if listen.listener.is_some() {
            return Err(ServerError::PortLocked);
        }
        listen.port = port;
        Ok(())
    }

    /// Binds the configured port and starts accepting connections.
    ///
    /// # Errors
    /// - [`ServerError::AlreadyListening`] — already accepting
    /// - [`ServerError::Listen`] — the port could not be bound
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut listen = self.listen.lock().await;
        if listen.listener.is_some() {
            return Err(ServerError::AlreadyListening(listen.port));
        }

        let addr = format!("{}:{}", self.host, listen.port);
        let transport = T::bind(&addr).await.map_err(ServerError::Listen)?;
        let local_addr = transport.local_addr().map_err(ServerError::Listen)?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(
            transport,
            Arc::clone(&self.state),
            shutdown_rx,
        ));
        listen.listener = Some(Listener {
            local_addr,
            shutdown,
            task,
        });

        tracing::info!(%local_addr, "server started");
        self.state.console.display(&format!(
            "Server listening for connections on port {}",
            local_addr.port()
        ));
        Ok(local_addr)
    }

    /// Stops accepting new connections. Connected clients stay connected.
    ///
    /// The listening socket is released before this returns.
    ///
    /// # Errors
    /// [`ServerError::NotListening`] if not accepting.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let transport = self.halt_accepting().await?;
        drop(transport);
        self.report_stopped();
        Ok(())
    }

    /// Stops accepting, sends every client the logoff directive and closes
    /// its connection, then releases the listening socket.
    ///
    /// # Errors
    /// [`ServerError::NotListening`] if not accepting; nobody is
    /// disconnected in that case.
    pub async fn close(&self) -> Result<(), ServerError> {
        let transport = self.halt_accepting().await?;
        let closed = self
            .state
            .sessions
            .lock()
            .await
            .close_all(Some(Directive::Logoff));
        tracing::info!(clients = closed, "disconnected all clients");
        drop(transport);
        self.report_stopped();
        Ok(())
    }

    /// Ends the accept loop and hands back its transport, still bound.
    async fn halt_accepting(&self) -> Result<Option<T>, ServerError> {
        let listener = self
            .listen
            .lock()
            .await
            .listener
            .take()
            .ok_or(ServerError::NotListening)?;

        let _ = listener.shutdown.send(());
        match listener.task.await {
            Ok(transport) => Ok(Some(transport)),
            Err(e) => {
                tracing::error!(error = %e, "accept loop ended abnormally");
                Ok(None)
            }
        }
    }

    fn report_stopped(&self) {
        tracing::info!("server stopped");
        self.state
            .console
            .display("Server has stopped listening for connections.");
    }

    /// Disconnects everyone and stops listening, waiting briefly for
    /// pending frames to flush.
    pub async fn shutdown(&self) {
        if self.is_listening().await {
            let _ = self.stop().await;
        }
        self.state
            .sessions
            .lock()
            .await
            .close_all(Some(Directive::Logoff));

        let mut clients = self.state.clients.subscribe();
        if tokio::time::timeout(QUIT_GRACE, clients.wait_for(|n| *n == 0))
            .await
            .is_err()
        {
            tracing::warn!("some clients did not disconnect in time");
        }
    }

    /// Sends `text` to every client as an operator message.
    ///
    /// Returns the number of deliveries.
    pub async fn broadcast_operator_message(&self, text: &str) -> usize {
        self.state
            .sessions
            .lock()
            .await
            .broadcast(&format!("{SERVER_MSG_PREFIX}{text}"))
    }

    /// Handles one line typed on the operator console.
    ///
    /// Commands are run; anything else is relayed to all clients. Every
    /// outcome, including errors, is reported through the console.
    pub async fn handle_message_from_server_ui(&self, text: &str) -> Flow {
        let frame = Frame::parse(text);
        let result = match frame.dispatch::<OperatorCommand>() {
            Ok(Dispatch::Chat(body)) => {
                self.relay_operator_message(body).await;
                Ok(Flow::Continue)
            }
            Ok(Dispatch::Command { command, arg }) => {
                self.run_operator_command(command, arg).await
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(flow) => flow,
            Err(e) => {
                self.state.console.display(&e.to_string());
                Flow::Continue
            }
        }
    }

    async fn relay_operator_message(&self, body: &str) {
        let delivered = self.broadcast_operator_message(body).await;
        if delivered == 0 {
            self.state.console.display("No clients connected");
        } else {
            tracing::info!(clients = delivered, "operator message sent");
        }
        self.state.console.display(body);
    }

    async fn run_operator_command(
        &self,
        command: OperatorCommand,
        arg: Option<&str>,
    ) -> Result<Flow, ServerError> {
        match command {
            OperatorCommand::Quit => {
                self.shutdown().await;
                return Ok(Flow::Quit);
            }
            OperatorCommand::Stop => self.stop().await?,
            OperatorCommand::Close => self.close().await?,
            OperatorCommand::SetPort => {
                // Checked before the argument so a locked port reports
                // the conflict, not a parse error.
                if self.is_listening().await {
                    return Err(ServerError::PortLocked);
                }
                let port = parse_port(command, arg)?;
                self.set_port(port).await?;
                self.state
                    .console
                    .display(&format!("Server port set to {port}"));
            }
            OperatorCommand::Start => {
                self.start().await?;
            }
            OperatorCommand::GetPort => {
                let port = self.port().await;
                self.state
                    .console
                    .display(&format!("Current server port: {port}"));
            }
        }
        Ok(Flow::Continue)
    }
}

/// Accepts connections until `shutdown` fires, spawning a handler task for
/// each. Returns the transport so the caller decides when the socket is
/// released.
async fn accept_loop<T: Transport>(
    mut transport: T,
    state: Arc<ServerState>,
    mut shutdown: oneshot::Receiver<()>,
) -> T {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = transport.accept() => match accepted {
                Ok(conn) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            },
        }
    }
    transport
}
