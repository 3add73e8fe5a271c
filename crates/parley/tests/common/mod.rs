//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley::prelude::*;

/// A console that records every message it is asked to show.
#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l == message)
    }

    /// Waits until `message` has been displayed.
    pub async fn wait_for(&self, message: &str) {
        eventually(message, || self.contains(message)).await;
    }
}

impl Console for RecordingConsole {
    fn display(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_owned());
    }
}

/// Polls `check` until it holds, panicking after a few seconds.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Starts a TCP server on a random local port.
pub async fn start_server() -> (ChatServer<TcpTransport>, Arc<RecordingConsole>, u16) {
    start_server_on(0).await
}

/// Starts a TCP server configured with `port`.
pub async fn start_server_on(
    port: u16,
) -> (ChatServer<TcpTransport>, Arc<RecordingConsole>, u16) {
    let console = Arc::new(RecordingConsole::default());
    let server = ChatServer::builder()
        .host("127.0.0.1")
        .port(port)
        .build::<TcpTransport>(console.clone());
    let addr = server.start().await.expect("server should start");
    (server, console, addr.port())
}

/// Finds a local port that is free right now.
pub async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    listener.local_addr().expect("local addr").port()
}

/// Dials the server with a bare connection.
pub async fn dial(port: u16) -> <TcpDialer as Dialer>::Connection {
    TcpDialer.dial("127.0.0.1", port).await.expect("should connect")
}

/// Dials the server and logs in as `login_id`, consuming the ack.
pub async fn login(port: u16, login_id: &str) -> <TcpDialer as Dialer>::Connection {
    let conn = dial(port).await;
    conn.send(&format!("#login {login_id}")).await.unwrap();
    assert_eq!(
        recv(&conn).await.as_deref(),
        Some(format!("Client's login id set to {login_id}").as_str())
    );
    conn
}

/// Receives one frame, failing the test if none arrives in time.
pub async fn recv<C: Connection>(conn: &C) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("recv should not fail")
}

/// Creates a TCP client for the local server on `port`.
pub fn client(port: u16) -> (ChatClient<TcpDialer>, Arc<RecordingConsole>) {
    let console = Arc::new(RecordingConsole::default());
    let config = ClientConfig {
        host: "127.0.0.1".into(),
        port,
        ..ClientConfig::default()
    };
    (ChatClient::new(config, TcpDialer, console.clone()), console)
}

/// Waits until the server has exactly `n` registered clients.
pub async fn wait_for_clients<T: Transport>(server: &ChatServer<T>, n: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.client_count().await != n {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {n} clients"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
