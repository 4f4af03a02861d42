//! Connection state and transport errors

use serde::Serialize;
use std::fmt;

/// Lifecycle state of the single live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Connection attempt in flight
    Connecting,
    /// Handshake complete, frames may arrive
    Open,
    /// No connection, either never opened, closed by the owner or by the peer
    #[default]
    Closed,
    /// Last attempt or link failed; see [`crate::Transport::last_error`]
    Errored,
}

impl ConnectionState {
    /// A connection attempt or open link exists
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the link itself
///
/// Recoverable only by an explicit reconnect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed by peer")]
    ClosedByPeer,

    #[error("link task failed: {0}")]
    Runtime(String),
}
