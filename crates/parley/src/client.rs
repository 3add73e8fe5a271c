//! The chat client engine.
//!
//! A [`ChatClient`] owns at most one connection to a server. It runs the
//! login handshake, turns console input into either local commands or chat
//! frames, and reacts to frames from the server on a background task.
//!
//! ```text
//!  Disconnected ──connect()──→ Connecting ──dialed──→ Authenticating
//!        ↑                                                  │
//!        └──── #logoff (user or server) ──── Active ←──first frame
//!
//!  any state ──#quit / I/O failure / server hang-up──→ Terminated
//! ```
//!
//! I/O failures are fatal to the whole client: a client with no server has
//! nothing left to do, so instead of retrying it reports the failure and
//! signals termination through [`ChatClient::terminated`].

use std::sync::Arc;

use parley_protocol::{
    CommandSet, Directive, Dispatch, Frame, parse_port, require_arg,
};
use parley_transport::{
    Connection, ConnectionId, Dialer, TcpDialer, TransportError,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{ClientConfig, ClientError, Console, Flow};

/// Commands the user can type on the client console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Close the connection (if any) and exit.
    Quit,
    /// Close the connection but keep running.
    Logoff,
    /// Change the server host (only while disconnected).
    SetHost,
    /// Change the server port (only while disconnected).
    SetPort,
    /// Connect and log in.
    Login,
    /// Show the server host.
    GetHost,
    /// Show the server port.
    GetPort,
}

impl CommandSet for UserCommand {
    const TABLE: &'static [(&'static str, Self)] = &[
        ("quit", Self::Quit),
        ("logoff", Self::Logoff),
        ("sethost", Self::SetHost),
        ("setport", Self::SetPort),
        ("login", Self::Login),
        ("gethost", Self::GetHost),
        ("getport", Self::GetPort),
    ];
}

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// No connection.
    Disconnected,
    /// Dialing the server.
    Connecting,
    /// Connected; the login frame has been sent, no reply seen yet.
    Authenticating,
    /// Connected and the server has replied.
    Active,
    /// Shut down; no further input is accepted.
    Terminated,
}

struct ClientState<C> {
    host: String,
    port: u16,
    login_id: Option<String>,
    phase: ClientPhase,
    conn: Option<Arc<C>>,
}

impl<C: Connection> ClientState<C> {
    /// Host and port are fixed while connected or dialing.
    fn is_locked(&self) -> bool {
        self.conn.is_some() || self.phase == ClientPhase::Connecting
    }

    /// Leaves the `Connecting` phase after a dial that did not attach.
    fn finish_connecting(&mut self) {
        if self.phase == ClientPhase::Connecting {
            self.phase = if self.conn.is_some() {
                ClientPhase::Active
            } else {
                ClientPhase::Disconnected
            };
        }
    }

    /// Detaches the connection if it is the one identified by `id`.
    fn take_conn(&mut self, id: ConnectionId) -> Option<Arc<C>> {
        if self.conn.as_ref().is_some_and(|c| c.id() == id) {
            if self.phase != ClientPhase::Terminated {
                self.phase = ClientPhase::Disconnected;
            }
            self.conn.take()
        } else {
            None
        }
    }
}

struct Inner<D: Dialer> {
    dialer: D,
    console: Arc<dyn Console>,
    state: Mutex<ClientState<D::Connection>>,
    terminated: CancellationToken,
}

/// A chat client.
///
/// Cheap to clone; clones share the same connection and state.
pub struct ChatClient<D: Dialer = TcpDialer> {
    inner: Arc<Inner<D>>,
}

impl<D: Dialer> Clone for ChatClient<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Dialer> ChatClient<D> {
    /// Creates a disconnected client. Call
    /// [`set_login_id`](Self::set_login_id) before connecting.
    pub fn new(config: ClientConfig, dialer: D, console: Arc<dyn Console>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dialer,
                console,
                state: Mutex::new(ClientState {
                    host: config.host,
                    port: config.port,
                    login_id: None,
                    phase: ClientPhase::Disconnected,
                    conn: None,
                }),
                terminated: CancellationToken::new(),
            }),
        }
    }

    /// Sets the login id sent in the handshake.
    ///
    /// # Errors
    /// [`ClientError::InvalidArgument`] if `login_id` is empty.
    pub async fn set_login_id(&self, login_id: &str) -> Result<(), ClientError> {
        if login_id.is_empty() {
            return Err(ClientError::InvalidArgument(
                "login id must not be empty".into(),
            ));
        }
        self.inner.state.lock().await.login_id = Some(login_id.to_owned());
        Ok(())
    }

    /// Returns the login id, if set.
    pub async fn login_id(&self) -> Option<String> {
        self.inner.state.lock().await.login_id.clone()
    }

    /// Returns the server host.
    pub async fn host(&self) -> String {
        self.inner.state.lock().await.host.clone()
    }

    /// Returns the server port.
    pub async fn port(&self) -> u16 {
        self.inner.state.lock().await.port
    }

    /// Returns the current lifecycle phase.
    pub async fn phase(&self) -> ClientPhase {
        self.inner.state.lock().await.phase
    }

    /// Returns `true` while a connection is open.
    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.conn.is_some()
    }

    /// Changes the server host.
    ///
    /// # Errors
    /// [`ClientError::Locked`] while connected or dialing; the host is
    /// unchanged.
    pub async fn set_host(&self, host: &str) -> Result<(), ClientError> {
        self.inner.set_host(host).await
    }

    /// Changes the server port.
    ///
    /// # Errors
    /// [`ClientError::Locked`] while connected or dialing; the port is
    /// unchanged.
    pub async fn set_port(&self, port: u16) -> Result<(), ClientError> {
        self.inner.set_port(port).await
    }

    /// Opens the connection and sends the login handshake.
    ///
    /// The `#login <id>` frame is the first thing sent, before any user
    /// input can reach the server and before any server frame is shown.
    ///
    /// # Errors
    /// - [`ClientError::ConnectionAborted`] — no login id set
    /// - [`ClientError::AlreadyConnected`] — a connection is open or being
    ///   dialed
    /// - [`ClientError::Transport`] — dialing or the handshake failed
    /// - [`ClientError::Terminated`] — the client has shut down
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.inner.connect().await
    }

    /// Closes the connection. The closure is reported on the console once
    /// the receive task observes it.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] if there is no connection.
    pub async fn logoff(&self) -> Result<(), ClientError> {
        self.inner.logoff().await
    }

    /// Closes the connection if open and signals termination.
    pub async fn quit(&self) {
        self.inner.quit().await;
    }

    /// Handles one line typed by the user.
    ///
    /// Returns [`Flow::Quit`] when the client has terminated, either by
    /// `#quit` or because the connection failed.
    pub async fn on_user_input(&self, text: &str) -> Flow {
        self.inner.on_user_input(text).await
    }

    /// Handles one frame received from the server.
    pub async fn on_server_frame(&self, line: &str) {
        self.inner.on_server_frame(line).await;
    }

    /// Resolves once the client has terminated.
    pub async fn terminated(&self) {
        self.inner.terminated.cancelled().await;
    }

    /// Returns `true` once the client has terminated.
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.is_cancelled()
    }
}

impl<D: Dialer> Inner<D> {
    fn display(&self, message: &str) {
        self.console.display(message);
    }

    async fn set_host(&self, host: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if state.is_locked() {
            return Err(ClientError::Locked("hostname"));
        }
        state.host = host.to_owned();
        Ok(())
    }

    async fn set_port(&self, port: u16) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if state.is_locked() {
            return Err(ClientError::Locked("port"));
        }
        state.port = port;
        Ok(())
    }

    async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        if self.terminated.is_cancelled() {
            return Err(ClientError::Terminated);
        }

        let (host, port, login_id) = {
            let mut state = self.state.lock().await;
            if state.is_locked() {
                return Err(ClientError::AlreadyConnected {
                    host: state.host.clone(),
                    port: state.port,
                });
            }
            let login_id = state
                .login_id
                .clone()
                .ok_or(ClientError::ConnectionAborted)?;
            state.phase = ClientPhase::Connecting;
            (state.host.clone(), state.port, login_id)
        };

        // Not under the lock: state stays readable while dialing.
        let dialed = self.dialer.dial(&host, port).await;

        // Held until the handshake is sent, so no user input can overtake it.
        let mut state = self.state.lock().await;
        let conn = match dialed {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                state.finish_connecting();
                return Err(e.into());
            }
        };
        if self.terminated.is_cancelled() || state.conn.is_some() {
            state.finish_connecting();
            let err = match &state.conn {
                Some(_) => ClientError::AlreadyConnected {
                    host: state.host.clone(),
                    port: state.port,
                },
                None => ClientError::Terminated,
            };
            drop(state);
            let _ = conn.close().await;
            return Err(err);
        }

        state.phase = ClientPhase::Authenticating;
        if let Err(e) = conn.send(&Frame::login(&login_id).to_string()).await {
            state.phase = ClientPhase::Disconnected;
            let _ = conn.close().await;
            return Err(e.into());
        }

        tracing::info!(%host, port, %login_id, "connected, login sent");
        state.conn = Some(Arc::clone(&conn));
        drop(state);

        tokio::spawn(receive_loop(Arc::clone(self), conn));
        Ok(())
    }

    async fn logoff(&self) -> Result<(), ClientError> {
        let conn = {
            let mut state = self.state.lock().await;
            let conn = state.conn.take().ok_or(ClientError::NotConnected)?;
            if state.phase != ClientPhase::Terminated {
                state.phase = ClientPhase::Disconnected;
            }
            conn
        };
        conn.close().await?;
        Ok(())
    }

    async fn quit(&self) {
        let conn = {
            let mut state = self.state.lock().await;
            state.phase = ClientPhase::Terminated;
            state.conn.take()
        };
        if let Some(conn) = conn {
            if let Err(e) = conn.close().await {
                self.display(&format!("Unable to close connection: {e}"));
            }
        }
        tracing::info!("client terminated");
        self.terminated.cancel();
    }

    async fn on_user_input(self: &Arc<Self>, text: &str) -> Flow {
        if self.terminated.is_cancelled() {
            return Flow::Quit;
        }

        let frame = Frame::parse(text);
        let result = match frame.dispatch::<UserCommand>() {
            Ok(Dispatch::Chat(body)) => self.send_chat(body).await,
            Ok(Dispatch::Command { command, arg }) => {
                self.run_user_command(command, arg).await
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(flow) => flow,
            Err(e) => {
                self.display(&e.to_string());
                Flow::Continue
            }
        }
    }

    async fn send_chat(&self, body: &str) -> Result<Flow, ClientError> {
        let conn = self.state.lock().await.conn.clone();
        let Some(conn) = conn else {
            self.display(
                "Client is not connected to server. \
                 Please open connection and try again!",
            );
            return Ok(Flow::Continue);
        };

        match conn.send(body).await {
            Ok(()) => Ok(Flow::Continue),
            Err(e) => Ok(self.send_failed(conn.id(), e).await),
        }
    }

    /// A send failure on a live connection terminates the client.
    async fn send_failed(&self, id: ConnectionId, e: TransportError) -> Flow {
        let still_connected = self.state.lock().await.take_conn(id);
        let mut message = format!("Could not send message to server. {e}");
        match still_connected {
            Some(conn) => {
                let _ = conn.close().await;
                message.push_str(" Terminating client.");
                self.display(&message);
                self.quit().await;
                Flow::Quit
            }
            None => {
                self.display(&message);
                Flow::Continue
            }
        }
    }

    async fn run_user_command(
        self: &Arc<Self>,
        command: UserCommand,
        arg: Option<&str>,
    ) -> Result<Flow, ClientError> {
        match command {
            UserCommand::Quit => {
                self.quit().await;
                return Ok(Flow::Quit);
            }
            UserCommand::Logoff => self.logoff().await?,
            UserCommand::SetHost => {
                // The connection check comes first: a connected client
                // reports the conflict even when the argument is bad.
                if self.state.lock().await.is_locked() {
                    return Err(ClientError::Locked("hostname"));
                }
                let host = require_arg(command, arg)?;
                self.set_host(host).await?;
                self.display(&format!("Host set to {host}"));
            }
            UserCommand::SetPort => {
                if self.state.lock().await.is_locked() {
                    return Err(ClientError::Locked("port"));
                }
                let port = parse_port(command, arg)?;
                self.set_port(port).await?;
                self.display(&format!("Port set to {port}"));
            }
            UserCommand::Login => self.connect().await?,
            UserCommand::GetHost => {
                let host = self.state.lock().await.host.clone();
                self.display(&format!("Current client's host set to: {host}"));
            }
            UserCommand::GetPort => {
                let port = self.state.lock().await.port;
                self.display(&format!("Current client's port set to: {port}"));
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_server_frame(&self, line: &str) {
        {
            let mut state = self.state.lock().await;
            if state.phase == ClientPhase::Authenticating {
                state.phase = ClientPhase::Active;
            }
        }

        let frame = Frame::parse(line);
        if !frame.is_command() {
            self.display(line);
            return;
        }

        match frame.dispatch::<Directive>() {
            Ok(Dispatch::Command {
                command: Directive::Logoff,
                ..
            }) => {
                self.display("Server sent command to disconnect");
                if let Err(e) = self.logoff().await {
                    tracing::debug!(error = %e, "forced logoff found no connection");
                }
            }
            _ => {
                tracing::warn!(frame = line, "unrecognized directive from server");
                self.display(&format!("Unrecognized directive from server: {line}"));
            }
        }
    }

    /// The receive side saw a clean close.
    ///
    /// If the connection is still attached, nobody here asked for the close:
    /// the server went away, which is fatal like any other I/O failure.
    async fn connection_closed(&self, id: ConnectionId) {
        let hung_up = self.state.lock().await.take_conn(id);
        tracing::info!(conn_id = %id, by_server = hung_up.is_some(), "connection closed");
        if let Some(conn) = hung_up {
            let _ = conn.close().await;
            self.server_gone().await;
        }
        self.display("Server connection closed.");
    }

    async fn connection_failed(&self, id: ConnectionId, e: TransportError) {
        tracing::error!(conn_id = %id, error = %e, "connection failed");
        self.server_gone().await;
    }

    async fn server_gone(&self) {
        self.display("The server has shut down");
        self.quit().await;
    }
}

/// Receives frames from the server until the connection ends.
async fn receive_loop<D: Dialer>(inner: Arc<Inner<D>>, conn: Arc<D::Connection>) {
    let id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(line)) => inner.on_server_frame(&line).await,
            Ok(None) => {
                inner.connection_closed(id).await;
                break;
            }
            Err(e) => {
                inner.connection_failed(id, e).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConsole;
    use parley_transport::TcpDialer;

    fn client() -> (ChatClient<TcpDialer>, Arc<RecordingConsole>) {
        let console = Arc::new(RecordingConsole::default());
        let client = ChatClient::new(
            ClientConfig {
                host: "127.0.0.1".into(),
                port: 1,
                ..ClientConfig::default()
            },
            TcpDialer,
            console.clone(),
        );
        (client, console)
    }

    #[test]
    fn test_user_command_table() {
        assert_eq!(UserCommand::lookup("sethost"), Some(UserCommand::SetHost));
        assert_eq!(UserCommand::lookup("start"), None);
        assert_eq!(UserCommand::TABLE.len(), 7);
    }

    #[tokio::test]
    async fn test_set_login_id_rejects_empty() {
        let (client, _) = client();
        assert!(matches!(
            client.set_login_id("").await,
            Err(ClientError::InvalidArgument(_))
        ));
        assert_eq!(client.login_id().await, None);
        client.set_login_id("alice").await.unwrap();
        assert_eq!(client.login_id().await.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_connect_without_login_id_is_aborted() {
        let (client, _) = client();
        assert!(matches!(
            client.connect().await,
            Err(ClientError::ConnectionAborted)
        ));
        assert_eq!(client.phase().await, ClientPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_chat_while_disconnected_is_reported() {
        let (client, console) = client();
        let flow = client.on_user_input("hello").await;
        assert_eq!(flow, Flow::Continue);
        assert!(console.last().unwrap().starts_with("Client is not connected"));
    }

    #[tokio::test]
    async fn test_local_host_and_port_commands() {
        let (client, console) = client();

        client.on_user_input("#sethost chat.example.org").await;
        client.on_user_input("#gethost").await;
        assert_eq!(
            console.last().unwrap(),
            "Current client's host set to: chat.example.org"
        );

        client.on_user_input("#setport 6000").await;
        client.on_user_input("#getport").await;
        assert_eq!(console.last().unwrap(), "Current client's port set to: 6000");

        client.on_user_input("#setport nope").await;
        assert_eq!(console.last().unwrap(), "invalid argument for #setport: nope");
        client.on_user_input("#sethost").await;
        assert_eq!(console.last().unwrap(), "missing argument for #sethost");
        assert_eq!(client.port().await, 6000);
        assert_eq!(client.host().await, "chat.example.org");
    }

    #[tokio::test]
    async fn test_logoff_without_connection_is_an_error() {
        let (client, console) = client();
        client.on_user_input("#logoff").await;
        assert_eq!(console.last().unwrap(), "Invalid command! No active connection.");
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported() {
        let (client, console) = client();
        client.on_user_input("#start").await;
        assert_eq!(console.last().unwrap(), "not a valid command: #start");
    }

    #[tokio::test]
    async fn test_server_chat_is_displayed_unmodified() {
        let (client, console) = client();
        client.on_server_frame("SERVER MSG> maintenance at noon").await;
        client.on_server_frame("alice: hi all").await;
        assert_eq!(
            console.lines(),
            vec!["SERVER MSG> maintenance at noon", "alice: hi all"]
        );
    }

    #[tokio::test]
    async fn test_unknown_directive_is_reported() {
        let (client, console) = client();
        client.on_server_frame("#reboot").await;
        assert_eq!(
            console.last().unwrap(),
            "Unrecognized directive from server: #reboot"
        );
    }

    #[tokio::test]
    async fn test_quit_terminates() {
        let (client, _) = client();
        assert!(!client.is_terminated());
        assert_eq!(client.on_user_input("#quit").await, Flow::Quit);
        assert!(client.is_terminated());
        assert_eq!(client.phase().await, ClientPhase::Terminated);
        // Further input is refused.
        assert_eq!(client.on_user_input("hello").await, Flow::Quit);
        client.terminated().await;
    }
}
