//! Game/protocol configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::{
    default_game_id, default_heartbeat_frequency_ms, default_heartbeat_lifetime_ms,
    default_party_size, default_request_lifetime_ms,
};

/// Tunables of the coordination protocol. The defaults are the agreed
/// constants every peer in a game must share.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Name of the topic exchange all peers of one game meet on.
    #[serde(default = "default_game_id")]
    pub game_id: String,
    /// Number of robots in a full party.
    #[serde(default = "default_party_size")]
    pub party_size: usize,
    /// How long a request keeps collecting replies.
    #[serde(default = "default_request_lifetime_ms")]
    pub request_lifetime_ms: u64,
    /// Interval between liveness beacons.
    #[serde(default = "default_heartbeat_frequency_ms")]
    pub heartbeat_frequency_ms: u64,
    /// Silence after which a peer is declared missing.
    #[serde(default = "default_heartbeat_lifetime_ms")]
    pub heartbeat_lifetime_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_id: default_game_id(),
            party_size: default_party_size(),
            request_lifetime_ms: default_request_lifetime_ms(),
            heartbeat_frequency_ms: default_heartbeat_frequency_ms(),
            heartbeat_lifetime_ms: default_heartbeat_lifetime_ms(),
        }
    }
}

impl GameConfig {
    #[must_use]
    pub fn request_lifetime(&self) -> Duration {
        Duration::from_millis(self.request_lifetime_ms)
    }

    #[must_use]
    pub fn heartbeat_frequency(&self) -> Duration {
        Duration::from_millis(self.heartbeat_frequency_ms)
    }

    /// Join quorum: every already-connected peer in a full party.
    #[must_use]
    pub fn quorum(&self) -> usize {
        self.party_size.saturating_sub(1)
    }

    /// Number of two-player teams.
    #[must_use]
    pub fn team_count(&self) -> i32 {
        (self.party_size / 2) as i32
    }
}
