use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::topics;
use super::types::{ClientId, DisconnectReason, GameState, PlayerId, Tile, NO_TEAM};

/// Join vote request, published on `join` with a reply queue attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Broadcast once a joiner considers itself admitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedNotice {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Broadcast when a peer leaves, is rejected, or times out. The identity
/// fields name the departing peer, which is not necessarily the sender:
/// survivors publish this on behalf of a silent peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectNotice {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
    pub reason: DisconnectReason,
}

/// Ready-state toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyChange {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "isReady")]
    pub is_ready: bool,
}

/// One peer's contribution to the player-number agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollValue {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    pub roll: i32,
}

/// Payload for topics that carry nothing beyond the sender tag
/// (`start`, `stop`, `pause`, `heartbeat`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
}

/// Object-found announcement; the flag persists across pauses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundNotice {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "playerNumber")]
    pub player_number: u8,
}

/// Position broadcast, bundled with the found flag so late observers
/// converge without waiting for a `found` replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "playerNumber")]
    pub player_number: u8,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    #[serde(rename = "foundObject")]
    pub found_object: bool,
}

/// Seesaw lock/unlock notification; exclusion is physical, this is the
/// broadcast spectators drive their physics from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeesawNotice {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "playerNumber")]
    pub player_number: u8,
    pub barcode: u32,
}

/// Team victory claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinNotice {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "teamNumber")]
    pub team_number: i32,
}

/// Partner discovery request on `team.<n>.ping`; the pong reply reuses
/// this shape on the requester's reply queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamPing {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
}

/// Best-effort map sharing on `team.<n>.tile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamTiles {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    pub tiles: Vec<Tile>,
}

/// Retained state echoed for players currently missing, so a rejoiner
/// and its voters agree on what gets restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPlayerEntry {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "hasFoundObject")]
    pub has_found_object: bool,
    #[serde(rename = "teamNumber")]
    pub team_number: i32,
}

/// Reply to a [`JoinRequest`], sent on the requester's ephemeral reply
/// queue. On accept the responder echoes its own player state plus its
/// view of the party so the joiner can catch up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinReply {
    pub result: bool,
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
    #[serde(rename = "isReady", default)]
    pub is_ready: bool,
    #[serde(rename = "isJoined", default)]
    pub is_joined: bool,
    #[serde(rename = "hasFoundObject", default)]
    pub has_found_object: bool,
    #[serde(rename = "teamNumber", default = "no_team")]
    pub team_number: i32,
    #[serde(rename = "gameState", default)]
    pub game_state: GameState,
    #[serde(rename = "playerNumbers", default)]
    pub player_numbers: HashMap<PlayerId, u8>,
    #[serde(rename = "missingPlayers", default)]
    pub missing_players: Vec<MissingPlayerEntry>,
}

fn no_team() -> i32 {
    NO_TEAM
}

impl JoinReply {
    /// Minimal refusal; the responder's identity is still attached so the
    /// joiner can report who voted no.
    #[must_use]
    pub fn reject(player_id: PlayerId, client_id: ClientId) -> Self {
        Self {
            result: false,
            player_id,
            client_id,
            is_ready: false,
            is_joined: false,
            has_found_object: false,
            team_number: NO_TEAM,
            game_state: GameState::Disconnected,
            player_numbers: HashMap::new(),
            missing_players: Vec::new(),
        }
    }
}

/// Every message the game exchange carries, one variant per topic.
#[derive(Debug, Clone)]
pub enum PeerMessage {
    Join(JoinRequest),
    Joined(JoinedNotice),
    Disconnect(DisconnectNotice),
    Ready(ReadyChange),
    Roll(RollValue),
    Start(Signal),
    Stop(Signal),
    Pause(Signal),
    Found(FoundNotice),
    Heartbeat(Signal),
    Update(PositionUpdate),
    SeesawLock(SeesawNotice),
    SeesawUnlock(SeesawNotice),
    Win(WinNotice),
    TeamPing { team: i32, ping: TeamPing },
    TeamTiles { team: i32, tiles: TeamTiles },
}

impl PeerMessage {
    /// Routing key this message is published under.
    #[must_use]
    pub fn topic(&self) -> String {
        match self {
            Self::Join(_) => topics::JOIN.to_string(),
            Self::Joined(_) => topics::JOINED.to_string(),
            Self::Disconnect(_) => topics::DISCONNECT.to_string(),
            Self::Ready(_) => topics::READY.to_string(),
            Self::Roll(_) => topics::ROLL.to_string(),
            Self::Start(_) => topics::START.to_string(),
            Self::Stop(_) => topics::STOP.to_string(),
            Self::Pause(_) => topics::PAUSE.to_string(),
            Self::Found(_) => topics::FOUND.to_string(),
            Self::Heartbeat(_) => topics::HEARTBEAT.to_string(),
            Self::Update(_) => topics::UPDATE.to_string(),
            Self::SeesawLock(_) => topics::SEESAW_LOCK.to_string(),
            Self::SeesawUnlock(_) => topics::SEESAW_UNLOCK.to_string(),
            Self::Win(_) => topics::WIN.to_string(),
            Self::TeamPing { team, .. } => topics::team_ping(*team),
            Self::TeamTiles { team, .. } => topics::team_tile(*team),
        }
    }

    /// The peer this message is about: the sender for everything except
    /// `disconnect`, where it names the departing peer.
    #[must_use]
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Self::Join(m) => &m.player_id,
            Self::Joined(m) => &m.player_id,
            Self::Disconnect(m) => &m.player_id,
            Self::Ready(m) => &m.player_id,
            Self::Roll(m) => &m.player_id,
            Self::Start(m) | Self::Stop(m) | Self::Pause(m) | Self::Heartbeat(m) => &m.player_id,
            Self::Found(m) => &m.player_id,
            Self::Update(m) => &m.player_id,
            Self::SeesawLock(m) | Self::SeesawUnlock(m) => &m.player_id,
            Self::Win(m) => &m.player_id,
            Self::TeamPing { ping, .. } => &ping.player_id,
            Self::TeamTiles { tiles, .. } => &tiles.player_id,
        }
    }
}
