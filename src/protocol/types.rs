use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sentinel team number meaning "not on a team".
pub const NO_TEAM: i32 = -1;

/// Stable, user-chosen identifier for one logical robot. Survives process
/// restarts, which is what makes rejoin-with-identity possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-process identifier, freshly generated on every run. Two processes
/// claiming the same [`PlayerId`] are told apart by this; one of them is a
/// reconnect or an imposter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The shared game lifecycle every peer walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[default]
    Disconnected,
    Joining,
    Waiting,
    Starting,
    Playing,
    Paused,
}

impl GameState {
    /// Whether the peer counts as a party member in this state.
    #[must_use]
    pub fn is_joined(self) -> bool {
        matches!(
            self,
            Self::Waiting | Self::Starting | Self::Playing | Self::Paused
        )
    }

    /// Distance from `Disconnected`. An admitted joiner adopts the state
    /// advertised in a join reply when it ranks higher than its own.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Joining => 1,
            Self::Waiting => 2,
            Self::Starting => 3,
            Self::Playing => 4,
            Self::Paused => 5,
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Joining => "JOINING",
            Self::Waiting => "WAITING",
            Self::Starting => "STARTING",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
        };
        f.write_str(s)
    }
}

/// Why a peer dropped out of the party. Kinds introduced by newer peers
/// travel through older ones opaquely instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DisconnectReason {
    /// Voluntary leave.
    Leave,
    /// The peer's join vote failed.
    Reject,
    /// Heartbeat expiry observed by the remaining peers.
    Timeout,
    /// A reason this build does not know about.
    Other(String),
}

impl DisconnectReason {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Leave => "LEAVE",
            Self::Reject => "REJECT",
            Self::Timeout => "TIMEOUT",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DisconnectReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "LEAVE" => Self::Leave,
            "REJECT" => Self::Reject,
            "TIMEOUT" => Self::Timeout,
            _ => Self::Other(s),
        }
    }
}

impl From<DisconnectReason> for String {
    fn from(r: DisconnectReason) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shared maze tile: `[x, y, token]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile(pub i32, pub i32, pub i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_state_rank_orders_lifecycle() {
        assert!(GameState::Disconnected.rank() < GameState::Joining.rank());
        assert!(GameState::Joining.rank() < GameState::Waiting.rank());
        assert!(GameState::Waiting.rank() < GameState::Starting.rank());
        assert!(GameState::Starting.rank() < GameState::Playing.rank());
        assert!(GameState::Playing.rank() < GameState::Paused.rank());
    }

    #[test]
    fn disconnect_reason_round_trips_unknown_kinds() {
        let json = "\"EVICTED\"";
        let reason: DisconnectReason = serde_json::from_str(json).unwrap();
        assert_eq!(reason, DisconnectReason::Other("EVICTED".to_string()));
        assert_eq!(serde_json::to_string(&reason).unwrap(), json);
    }

    #[test]
    fn known_reasons_use_screaming_case() {
        assert_eq!(
            serde_json::to_string(&DisconnectReason::Timeout).unwrap(),
            "\"TIMEOUT\""
        );
        let back: DisconnectReason = serde_json::from_str("\"LEAVE\"").unwrap();
        assert_eq!(back, DisconnectReason::Leave);
    }
}
