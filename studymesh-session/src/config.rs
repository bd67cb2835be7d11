use serde::{Deserialize, Serialize};
use std::time::Duration;
use studymesh_core::IceServerConfig;
use studymesh_core::utils::default_ice_servers;

/// Settings of one room session, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// STUN/TURN endpoints handed to every peer connection, in order.
    pub ice_servers: Vec<IceServerConfig>,

    /// Delay between losing a peer link and re-offering to that peer.
    pub reconnect_backoff_ms: u64,

    /// Consecutive reconnect attempts per peer before an error is surfaced.
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,

    /// Capacity of the command channel between handles and the session task.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            reconnect_backoff_ms: 2_000,
            max_reconnect_attempts: Some(5),
            command_buffer: 64,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}
