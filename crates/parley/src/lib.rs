//! # Parley
//!
//! Multi-client, line-based text chat over TCP (or WebSocket).
//!
//! Parley provides two protocol engines that share one wire protocol:
//! [`ChatServer`] accepts clients, authenticates them by login id and
//! relays chat between them; [`ChatClient`] connects, logs in and turns
//! console input into frames. Both report to a human through a
//! [`Console`], and both are driven by the caller's input loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! struct Stdout;
//!
//! impl Console for Stdout {
//!     fn display(&self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! # async fn run() -> Result<(), ParleyError> {
//! let server = ChatServer::builder()
//!     .port(5555)
//!     .build::<TcpTransport>(Arc::new(Stdout));
//! server.start().await?;
//!
//! let client = ChatClient::new(ClientConfig::default(), TcpDialer, Arc::new(Stdout));
//! client.set_login_id("alice").await?;
//! client.connect().await?;
//! client.on_user_input("hi all").await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod console;
mod error;
mod handler;
mod server;

pub use client::{ChatClient, ClientPhase, UserCommand};
pub use config::{ClientConfig, ServerConfig, TransportKind};
pub use console::{Console, Flow};
pub use error::{ClientError, ConfigError, ParleyError, ServerError};
pub use server::{ChatServer, ChatServerBuilder, OperatorCommand};

/// Convenience re-exports for building a chat server or client.
pub mod prelude {
    pub use crate::{
        ChatClient, ChatServer, ChatServerBuilder, ClientConfig, ClientError,
        ClientPhase, ConfigError, Console, Flow, ParleyError, ServerConfig,
        ServerError, TransportKind,
    };
    pub use parley_protocol::{
        DEFAULT_HOST, DEFAULT_PORT, Frame, ProtocolError, SERVER_MSG_PREFIX,
    };
    pub use parley_transport::{
        Connection, Dialer, TcpDialer, TcpTransport, Transport,
        TransportError,
    };
    #[cfg(feature = "websocket")]
    pub use parley_transport::{WebSocketDialer, WebSocketTransport};
}
