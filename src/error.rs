use thiserror::Error;

use crate::protocol::PlayerId;

/// Failures raised by the transport seam.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection has been shut down; no further publishes are possible.
    #[error("transport is shut down")]
    Closed,
    /// A publish could not be delivered to the exchange.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
    /// A direct send targeted a queue that no longer exists.
    #[error("queue '{queue}' is gone")]
    QueueGone { queue: String },
}

/// Failures raised while encoding or decoding wire payloads.
///
/// Decoding errors terminate the offending delivery only; the peer keeps
/// consuming.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no message type bound to topic '{0}'")]
    UnknownTopic(String),
    #[error("malformed payload on '{topic}': {source}")]
    Malformed {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors surfaced by the public peer API.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The current game state forbids the requested operation. Never
    /// retried internally.
    #[error("{operation} not permitted: {reason}")]
    Precondition {
        operation: &'static str,
        reason: String,
    },
    /// The join vote failed because a connected peer voted no.
    #[error("join rejected by '{by}'")]
    Rejected { by: PlayerId },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl PeerError {
    pub fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Precondition {
            operation,
            reason: reason.into(),
        }
    }
}
