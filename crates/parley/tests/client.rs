//! Integration tests for the chat client engine, against a live server
//! and against scripted connections for the failure paths.

mod common;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{RecordingConsole, client, recv, start_server, wait_for_clients};
use parley::prelude::*;
use parley_transport::{ConnectionId, MAX_FRAME_LENGTH};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Scripted transport
// =========================================================================

/// A connection that accepts the login frame and fails every later send.
struct BrokenPipeConnection {
    id: ConnectionId,
    closed: CancellationToken,
}

impl Connection for BrokenPipeConnection {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if frame.starts_with("#login") {
            Ok(())
        } else {
            Err(TransportError::SendFailed(io::ErrorKind::BrokenPipe.into()))
        }
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        self.closed.cancelled().await;
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.cancel();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5555))
    }
}

/// Dials [`BrokenPipeConnection`]s, optionally waiting for `release` first.
#[derive(Default)]
struct ScriptedDialer {
    release: Option<Arc<Notify>>,
}

impl Dialer for ScriptedDialer {
    type Connection = BrokenPipeConnection;

    async fn dial(
        &self,
        _host: &str,
        _port: u16,
    ) -> Result<Self::Connection, TransportError> {
        if let Some(release) = &self.release {
            release.notified().await;
            return Err(TransportError::ConnectFailed(
                io::ErrorKind::TimedOut.into(),
            ));
        }
        Ok(BrokenPipeConnection {
            id: ConnectionId::next(),
            closed: CancellationToken::new(),
        })
    }
}

fn scripted_client(
    dialer: ScriptedDialer,
) -> (ChatClient<ScriptedDialer>, Arc<RecordingConsole>) {
    let console = Arc::new(RecordingConsole::default());
    let client = ChatClient::new(ClientConfig::default(), dialer, console.clone());
    (client, console)
}

// =========================================================================
// Against a live server
// =========================================================================

#[tokio::test]
async fn test_login_frame_is_sent_first() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let port = transport.local_addr().unwrap().port();
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });

    let (client, console) = client(port);
    client.set_login_id("alice").await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(client.phase().await, ClientPhase::Authenticating);

    let server_side = accept.await.unwrap();
    assert_eq!(recv(&server_side).await.as_deref(), Some("#login alice"));
    assert!(console.lines().is_empty());

    server_side.send("welcome").await.unwrap();
    console.wait_for("welcome").await;
    assert_eq!(client.phase().await, ClientPhase::Active);
    client.quit().await;
}

#[tokio::test]
async fn test_two_clients_chat_through_the_server() {
    let (server, _server_console, port) = start_server().await;

    let (alice, alice_console) = client(port);
    alice.set_login_id("alice").await.unwrap();
    alice.connect().await.unwrap();
    alice_console.wait_for("Client's login id set to alice").await;

    let (bob, bob_console) = client(port);
    bob.set_login_id("bob").await.unwrap();
    bob.connect().await.unwrap();
    bob_console.wait_for("Client's login id set to bob").await;

    assert_eq!(alice.on_user_input("hello bob").await, Flow::Continue);
    bob_console.wait_for("alice: hello bob").await;
    alice_console.wait_for("alice: hello bob").await;

    server.handle_message_from_server_ui("be nice").await;
    bob_console.wait_for("SERVER MSG> be nice").await;

    alice.quit().await;
    bob.quit().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_login_while_connected_is_refused() {
    let (server, _server_console, port) = start_server().await;
    let (alice, console) = client(port);
    alice.set_login_id("alice").await.unwrap();
    alice.connect().await.unwrap();

    alice.on_user_input("#login").await;
    console
        .wait_for(&format!(
            "Invalid command! Client is already connected to host 127.0.0.1 on port {port}"
        ))
        .await;

    alice.on_user_input("#setport 6000").await;
    assert!(console.contains(
        "Can not change port while connection is active. \
         Please disconnect first (#logoff), then try again."
    ));
    assert_eq!(alice.port().await, port);

    alice.quit().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_user_logoff_then_login_again() {
    let (server, _server_console, port) = start_server().await;
    let (alice, console) = client(port);
    alice.set_login_id("alice").await.unwrap();
    alice.connect().await.unwrap();
    console.wait_for("Client's login id set to alice").await;

    alice.on_user_input("#logoff").await;
    console.wait_for("Server connection closed.").await;
    assert!(!alice.is_connected().await);
    assert!(!alice.is_terminated());
    wait_for_clients(&server, 0).await;

    alice.on_user_input("hello?").await;
    assert!(console.contains(
        "Client is not connected to server. Please open connection and try again!"
    ));

    alice.on_user_input("#login").await;
    wait_for_clients(&server, 1).await;
    assert!(alice.is_connected().await);

    alice.quit().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_server_close_forces_logoff() {
    let (server, _server_console, port) = start_server().await;
    let (alice, console) = client(port);
    alice.set_login_id("alice").await.unwrap();
    alice.connect().await.unwrap();
    console.wait_for("Client's login id set to alice").await;

    server.handle_message_from_server_ui("#close").await;

    console.wait_for("Server sent command to disconnect").await;
    console.wait_for("Server connection closed.").await;
    assert!(!alice.is_connected().await);
    assert!(!alice.is_terminated());
    assert!(
        console.lines().iter().all(|l| l != "#logoff"),
        "directives are not shown as chat"
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_refused_reports_transport_error() {
    let (server, _server_console, port) = start_server().await;
    server.stop().await.unwrap();

    let (alice, _console) = client(port);
    alice.set_login_id("alice").await.unwrap();
    let err = alice.connect().await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(alice.phase().await, ClientPhase::Disconnected);
    assert!(!alice.is_terminated());
}

#[tokio::test]
async fn test_quit_closes_connection_and_terminates() {
    let (server, _server_console, port) = start_server().await;
    let (alice, console) = client(port);
    alice.set_login_id("alice").await.unwrap();
    alice.connect().await.unwrap();
    console.wait_for("Client's login id set to alice").await;

    assert_eq!(alice.on_user_input("#quit").await, Flow::Quit);
    alice.terminated().await;
    assert!(!alice.is_connected().await);
    wait_for_clients(&server, 0).await;
    server.shutdown().await;
}

// =========================================================================
// Connection failures
// =========================================================================

#[tokio::test]
async fn test_server_hang_up_terminates_client() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let port = transport.local_addr().unwrap().port();
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });

    let (client, console) = client(port);
    client.set_login_id("alice").await.unwrap();
    client.connect().await.unwrap();
    let server_side = accept.await.unwrap();
    assert_eq!(recv(&server_side).await.as_deref(), Some("#login alice"));

    server_side.close().await.unwrap();

    console.wait_for("The server has shut down").await;
    client.terminated().await;
    assert!(client.is_terminated());
    assert_eq!(client.phase().await, ClientPhase::Terminated);
    assert_eq!(client.on_user_input("hello?").await, Flow::Quit);
}

#[tokio::test]
async fn test_receive_failure_terminates_client() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let port = transport.local_addr().unwrap().port();
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });

    let (client, console) = client(port);
    client.set_login_id("alice").await.unwrap();
    client.connect().await.unwrap();
    let server_side = accept.await.unwrap();
    assert_eq!(recv(&server_side).await.as_deref(), Some("#login alice"));

    // One line longer than the client will accept. The client may hang up
    // before the whole line is written, so the send result is not checked.
    let _ = server_side.send(&"x".repeat(MAX_FRAME_LENGTH + 10)).await;

    console.wait_for("The server has shut down").await;
    client.terminated().await;
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_send_failure_terminates_client() {
    let (client, console) = scripted_client(ScriptedDialer::default());
    client.set_login_id("alice").await.unwrap();
    client.connect().await.unwrap();

    let flow = client.on_user_input("hi").await;

    assert_eq!(flow, Flow::Quit);
    assert!(client.is_terminated());
    assert!(!client.is_connected().await);
    let lines = console.lines();
    assert!(
        lines.iter().any(|l| l.starts_with("Could not send message to server.")
            && l.contains("Terminating client")),
        "unexpected console output: {lines:?}"
    );
}

#[tokio::test]
async fn test_slow_dial_does_not_block_queries() {
    let release = Arc::new(Notify::new());
    let (client, _console) = scripted_client(ScriptedDialer {
        release: Some(Arc::clone(&release)),
    });
    client.set_login_id("alice").await.unwrap();

    let dialing = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let phase = tokio::time::timeout(Duration::from_secs(1), client.phase())
        .await
        .expect("state stays readable while dialing");
    assert_eq!(phase, ClientPhase::Connecting);
    assert_eq!(
        tokio::time::timeout(Duration::from_secs(1), client.host()).await.unwrap(),
        "localhost"
    );
    assert!(matches!(
        client.set_port(6000).await,
        Err(ClientError::Locked("port"))
    ));
    assert!(matches!(
        client.connect().await,
        Err(ClientError::AlreadyConnected { .. })
    ));

    release.notify_one();
    let result = dialing.await.unwrap();
    assert!(matches!(result, Err(ClientError::Transport(_))));
    assert_eq!(client.phase().await, ClientPhase::Disconnected);
}
