//! Broadcast relay
//!
//! A session-scoped publish/subscribe fan-out: peers join a named session
//! over a persistent WebSocket and every `caption` message is forwarded to
//! all other members of that session. Delivery is best-effort, at-most-once
//! per connected subscriber; nothing persists across relay restarts.

pub mod client;
pub mod messages;
pub mod server;

pub use client::RelayPublisher;
pub use messages::{PeerRole, RelayMessage};
pub use server::{create_router, RelayState};
