//! Wire protocol for the HTTTP coordination exchange.
//!
//! One topic exchange per game id; routing keys are literal topic strings.
//! Every payload is a JSON object tagged with the sending peer's
//! `playerID`; join-phase payloads additionally carry the process-scoped
//! `clientID`.

pub mod codec;
pub mod messages;
pub mod topics;
pub mod types;

pub use messages::{
    DisconnectNotice, FoundNotice, JoinReply, JoinRequest, JoinedNotice, MissingPlayerEntry,
    PeerMessage, PositionUpdate, ReadyChange, RollValue, SeesawNotice, Signal, TeamPing, TeamTiles,
    WinNotice,
};

pub use types::{ClientId, DisconnectReason, GameState, PlayerId, Tile, NO_TEAM};
