//! Message ↔ JSON map serializer.
//!
//! The wire format is isolated here so the encoding can be swapped
//! without touching the peer core. Decoding failures carry the topic
//! they happened on and terminate that delivery only.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

use super::messages::{JoinReply, PeerMessage};
use super::topics::{self, TeamTopic};

/// Encodes a message into its JSON payload body.
pub fn encode(message: &PeerMessage) -> Result<Bytes, CodecError> {
    match message {
        PeerMessage::Join(m) => to_body(m),
        PeerMessage::Joined(m) => to_body(m),
        PeerMessage::Disconnect(m) => to_body(m),
        PeerMessage::Ready(m) => to_body(m),
        PeerMessage::Roll(m) => to_body(m),
        PeerMessage::Start(m)
        | PeerMessage::Stop(m)
        | PeerMessage::Pause(m)
        | PeerMessage::Heartbeat(m) => to_body(m),
        PeerMessage::Found(m) => to_body(m),
        PeerMessage::Update(m) => to_body(m),
        PeerMessage::SeesawLock(m) | PeerMessage::SeesawUnlock(m) => to_body(m),
        PeerMessage::Win(m) => to_body(m),
        PeerMessage::TeamPing { ping, .. } => to_body(ping),
        PeerMessage::TeamTiles { tiles, .. } => to_body(tiles),
    }
}

/// Decodes a delivery body according to its routing key.
pub fn decode(routing_key: &str, body: &[u8]) -> Result<PeerMessage, CodecError> {
    if let Some((team, kind)) = topics::parse_team(routing_key) {
        return match kind {
            TeamTopic::Ping => Ok(PeerMessage::TeamPing {
                team,
                ping: from_body(routing_key, body)?,
            }),
            TeamTopic::Tile => Ok(PeerMessage::TeamTiles {
                team,
                tiles: from_body(routing_key, body)?,
            }),
        };
    }

    match routing_key {
        topics::JOIN => Ok(PeerMessage::Join(from_body(routing_key, body)?)),
        topics::JOINED => Ok(PeerMessage::Joined(from_body(routing_key, body)?)),
        topics::DISCONNECT => Ok(PeerMessage::Disconnect(from_body(routing_key, body)?)),
        topics::READY => Ok(PeerMessage::Ready(from_body(routing_key, body)?)),
        topics::ROLL => Ok(PeerMessage::Roll(from_body(routing_key, body)?)),
        topics::START => Ok(PeerMessage::Start(from_body(routing_key, body)?)),
        topics::STOP => Ok(PeerMessage::Stop(from_body(routing_key, body)?)),
        topics::PAUSE => Ok(PeerMessage::Pause(from_body(routing_key, body)?)),
        topics::FOUND => Ok(PeerMessage::Found(from_body(routing_key, body)?)),
        topics::HEARTBEAT => Ok(PeerMessage::Heartbeat(from_body(routing_key, body)?)),
        topics::UPDATE => Ok(PeerMessage::Update(from_body(routing_key, body)?)),
        topics::SEESAW_LOCK => Ok(PeerMessage::SeesawLock(from_body(routing_key, body)?)),
        topics::SEESAW_UNLOCK => Ok(PeerMessage::SeesawUnlock(from_body(routing_key, body)?)),
        topics::WIN => Ok(PeerMessage::Win(from_body(routing_key, body)?)),
        other => Err(CodecError::UnknownTopic(other.to_string())),
    }
}

/// Encodes a pong for a team ping's reply queue.
pub fn encode_pong(pong: &super::messages::TeamPing) -> Result<Bytes, CodecError> {
    to_body(pong)
}

/// Decodes a pong received on a team ping's reply queue.
pub fn decode_pong(body: &[u8]) -> Result<super::messages::TeamPing, CodecError> {
    from_body("pong", body)
}

/// Encodes a join reply for the requester's reply queue.
pub fn encode_reply(reply: &JoinReply) -> Result<Bytes, CodecError> {
    to_body(reply)
}

/// Decodes a join reply received on the reply queue.
pub fn decode_reply(body: &[u8]) -> Result<JoinReply, CodecError> {
    from_body("reply", body)
}

fn to_body<T: Serialize>(value: &T) -> Result<Bytes, CodecError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

fn from_body<T: DeserializeOwned>(topic: &str, body: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(body).map_err(|source| CodecError::Malformed {
        topic: topic.to_string(),
        source,
    })
}
