use serde::{Deserialize, Serialize};

/// Role a peer declares when joining a relay session.
///
/// Roles are remembered for observability only; the protocol does not
/// authenticate them or enforce a single broadcaster per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Broadcaster,
    Audience,
}

/// Wire messages exchanged with the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Enter the named session's peer set.
    Join { session_id: String, role: PeerRole },

    /// Caption event, forwarded verbatim to every other session member.
    Caption {
        is_final: bool,
        payload: serde_json::Value,
    },
}
