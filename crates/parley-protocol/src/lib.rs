//! Wire protocol for Parley.
//!
//! This crate defines the "language" that chat clients and servers speak:
//!
//! - **Frames** ([`Frame`]) — one line of traffic, either a `#command` or a
//!   chat message, and how to parse and serialize it.
//! - **Command sets** ([`CommandSet`], [`ClientRequest`], [`Directive`]) —
//!   which command tokens each side accepts.
//! - **Errors** ([`ProtocolError`]) — unknown commands and bad arguments.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (text lines) and the engines
//! (sessions, consoles). It doesn't know about connections; it only knows
//! what a line means.
//!
//! ```text
//! Transport (lines) → Protocol (Frame) → Engine (session / console)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{COMMAND_PREFIX, Dispatch, Frame};
pub use error::ProtocolError;
pub use types::{
    ClientRequest, CommandSet, DEFAULT_HOST, DEFAULT_PORT, Directive,
    SERVER_MSG_PREFIX, parse_port, require_arg,
};
