//! Chat session management for Parley.
//!
//! This crate holds the server's view of each connection:
//!
//! 1. **Identity** — the login id a client registers with `#login`
//!    ([`Session`])
//! 2. **Outbound delivery** — a per-session queue drained by the
//!    connection's writer task ([`Outbound`])
//! 3. **Fan-out** — the set of live sessions and broadcast over it
//!    ([`SessionRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server engine (above)  ← dispatches frames, owns the registry
//!     ↕
//! Session Layer (this crate)  ← identity, outbound queues, broadcast
//!     ↕
//! Transport (below)  ← provides ConnectionId
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionRegistry;
pub use session::{Outbound, OutboundReceiver, Session};
