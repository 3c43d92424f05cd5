//! Routing-key vocabulary of the game exchange.

/// Join vote request (carries `clientID`, expects replies).
pub const JOIN: &str = "join";
/// Broadcast confirmation of an admitted peer.
pub const JOINED: &str = "joined";
/// Broadcast leave/timeout/reject notice.
pub const DISCONNECT: &str = "disconnect";
/// Ready-state toggle.
pub const READY: &str = "ready";
/// Player-number roll contribution.
pub const ROLL: &str = "roll";
/// Lobby to playing.
pub const START: &str = "start";
/// Back to waiting.
pub const STOP: &str = "stop";
/// Playing to paused.
pub const PAUSE: &str = "pause";
/// Object-found persist.
pub const FOUND: &str = "found";
/// Liveness beacon.
pub const HEARTBEAT: &str = "heartbeat";
/// Position update, bundled with the found flag.
pub const UPDATE: &str = "update";
/// Seesaw lock notify.
pub const SEESAW_LOCK: &str = "seesawLock";
/// Seesaw unlock notify.
pub const SEESAW_UNLOCK: &str = "seesawUnlock";
/// Team victory.
pub const WIN: &str = "win";

/// Topics the membership consumer listens on for the whole session.
pub const MEMBERSHIP_TOPICS: [&str; 3] = [JOIN, JOINED, DISCONNECT];

/// Topics the public consumer binds once the peer is admitted.
pub const PUBLIC_TOPICS: [&str; 11] = [
    READY,
    ROLL,
    START,
    STOP,
    PAUSE,
    FOUND,
    HEARTBEAT,
    UPDATE,
    SEESAW_LOCK,
    SEESAW_UNLOCK,
    WIN,
];

/// Binding pattern covering one team's scoped topics.
#[must_use]
pub fn team_pattern(team: i32) -> String {
    format!("team.{team}.*")
}

/// Partner discovery request topic for a team.
#[must_use]
pub fn team_ping(team: i32) -> String {
    format!("team.{team}.ping")
}

/// Tile exchange topic for a team.
#[must_use]
pub fn team_tile(team: i32) -> String {
    format!("team.{team}.tile")
}

/// What a team-scoped routing key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamTopic {
    Ping,
    Tile,
}

/// Splits `team.<n>.<kind>` routing keys; anything else yields `None`.
#[must_use]
pub fn parse_team(routing_key: &str) -> Option<(i32, TeamTopic)> {
    let mut parts = routing_key.split('.');
    if parts.next() != Some("team") {
        return None;
    }
    let team = parts.next()?.parse().ok()?;
    let kind = match parts.next()? {
        "ping" => TeamTopic::Ping,
        "tile" => TeamTopic::Tile,
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((team, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_topics_round_trip() {
        assert_eq!(parse_team(&team_ping(3)), Some((3, TeamTopic::Ping)));
        assert_eq!(parse_team(&team_tile(0)), Some((0, TeamTopic::Tile)));
    }

    #[test]
    fn non_team_keys_are_rejected() {
        assert_eq!(parse_team("join"), None);
        assert_eq!(parse_team("team.x.ping"), None);
        assert_eq!(parse_team("team.1.pong"), None);
        assert_eq!(parse_team("team.1.ping.extra"), None);
    }
}
