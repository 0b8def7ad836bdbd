//! Connection state of the socket manager.

use std::fmt;

/// Where the manager's connection currently stands.
///
/// ```text
/// Disconnected ─connect─▶ Connecting ─▶ Connected ─drop─▶ Reconnecting ─▶ Connected
///       ▲                     │                                │
///       └──── disconnect() or attempts exhausted ◀─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no automatic attempts pending.
    #[default]
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Socket open and join event sent.
    Connected,
    /// Waiting for or performing automatic reconnection attempt `attempt`
    /// (1-based).
    Reconnecting {
        /// Which retry this is.
        attempt: u32,
    },
}

impl ConnectionState {
    /// Returns `true` while a connection is open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting ({attempt})"),
        }
    }
}
