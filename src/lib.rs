#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # HTTTP Peer
//!
//! Peer-to-peer coordination core for a four-robot maze game played by
//! physically-distributed participants. There is no central server: peers
//! discover each other over a topic pub/sub exchange, vote on membership,
//! agree on player numbers, share a synchronized game lifecycle, detect
//! crashed peers via heartbeats, and let a disconnected peer rejoin with
//! its previously-agreed identity.
//!
//! The transport (an AMQP-like topic exchange) is an injected trait; an
//! in-memory broker is included for tests and local play.
//!
//! ## Example
//!
//! ```no_run
//! use htttp_peer::config::GameConfig;
//! use htttp_peer::events::PlayerEvents;
//! use htttp_peer::peer::GamePeer;
//! use htttp_peer::protocol::PlayerId;
//! use htttp_peer::transport::MemoryBroker;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), htttp_peer::error::PeerError> {
//! let broker = MemoryBroker::new();
//! let handlers = PlayerEvents::new()
//!     .on_game_rolled(|number, object| println!("robot {number} hunts object {object}"))
//!     .on_game_started(|| println!("go!"));
//! let peer = GamePeer::new(
//!     GameConfig::default(),
//!     Arc::new(broker.endpoint()),
//!     PlayerId::new("robot-a"),
//!     handlers,
//! );
//! peer.join().await?;
//! peer.set_ready(true).await?;
//! # Ok(())
//! # }
//! ```

/// Peer configuration and config-file loading
pub mod config;

/// Error taxonomy shared across the crate
pub mod error;

/// Handler callbacks and their dispatch policy
pub mod events;

/// Structured logging configuration
pub mod logging;

/// Game state machine and the player-facing API
pub mod peer;

/// Wire protocol: identifiers, topics, messages, codec
pub mod protocol;

/// Membership store: confirmed, voted and missing players
pub mod register;

/// Request/response and quorum-vote primitives
pub mod request;

/// Read-only spectator role
pub mod spectator;

/// Transport seam and the in-memory topic broker
pub mod transport;
