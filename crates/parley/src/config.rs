//! Server and client configuration.
//!
//! Both configs have sensible defaults and can be loaded from a JSON file;
//! missing fields fall back to the default.

use std::path::Path;

use parley_protocol::{DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which transport carries the frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited text over TCP.
    #[default]
    Tcp,
    /// One WebSocket text message per frame.
    WebSocket,
}

/// Configuration for a chat server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind. Default: all interfaces.
    pub host: String,
    /// Port to listen on. Default: 5555.
    pub port: u16,
    /// Transport to accept connections with.
    pub transport: TransportKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            transport: TransportKind::Tcp,
        }
    }
}

impl ServerConfig {
    /// Loads a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Configuration for a chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host. Default: `localhost`.
    pub host: String,
    /// Server port. Default: 5555.
    pub port: u16,
    /// Transport to connect with.
    pub transport: TransportKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            transport: TransportKind::Tcp,
        }
    }
}

impl ClientConfig {
    /// Loads a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
