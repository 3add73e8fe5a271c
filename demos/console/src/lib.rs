//! Terminal shells for the Parley chat server and client.
//!
//! Shared pieces of the `parley-server` and `parley-client` binaries: the
//! stdout consoles, logging setup, and stdin reading.

use parley::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

/// Message shown when stdin fails.
pub const CONSOLE_READ_ERROR: &str = "Unexpected error while reading from console!";

/// Installs a `tracing` subscriber on stderr, filtered by `RUST_LOG`
/// (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns a line reader over stdin.
pub fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Operator console: every message is tagged as coming from the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConsole;

impl Console for ServerConsole {
    fn display(&self, message: &str) {
        println!("{}", server_line(message));
    }
}

/// User console: messages get a `> ` prompt marker unless the server
/// already tagged them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientConsole;

impl Console for ClientConsole {
    fn display(&self, message: &str) {
        println!("{}", client_line(message));
    }
}

fn server_line(message: &str) -> String {
    format!("{SERVER_MSG_PREFIX}{message}")
}

fn client_line(message: &str) -> String {
    if message.starts_with(SERVER_MSG_PREFIX.trim_end()) {
        message.to_owned()
    } else {
        format!("> {message}")
    }
}
