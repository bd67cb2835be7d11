use serde::{Deserialize, Serialize};

/// Aggregate state of one peer connection, as reported by the connection primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States the reconnect supervisor treats as a lost link.
    pub fn is_lost(self) -> bool {
        matches!(self, Self::Failed | Self::Disconnected)
    }
}
