//! The game state machine and the player-facing API.
//!
//! One [`GamePeer`] is the single writer of the game state, the
//! membership register, the player-number map, the rolls and the seesaw
//! lock. Incoming deliveries and timer ticks fan in to transitions taken
//! under one monitor; outgoing publishes and user callbacks run after
//! the monitor is released.

pub mod disconnect;
pub mod heartbeat;
pub mod join;
pub mod roll;
pub mod router;
pub mod seesaw;
pub mod team;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::GameConfig;
use crate::error::PeerError;
use crate::events::{self, DispatchMode, GameEvent, PlayerEvents};
use crate::protocol::codec;
use crate::protocol::{
    ClientId, FoundNotice, GameState, PeerMessage, PlayerId, PositionUpdate, ReadyChange, Signal,
    NO_TEAM,
};
use crate::register::PlayerRegister;
use crate::request::RequestProvider;
use crate::transport::{Properties, Transport};

/// Everything guarded by the peer's monitor.
pub(crate) struct CoreState {
    pub game_state: GameState,
    pub register: PlayerRegister,
    /// Bijection {confirmed ∪ missing} ↔ {1..N} while the game is on.
    pub player_numbers: HashMap<PlayerId, u8>,
    pub rolls: HashMap<PlayerId, i32>,
    /// Barcode of the held seesaw; 0 = none.
    pub seesaw_lock: u32,
    pub partner: Option<PlayerId>,
    pub heartbeat_token: Option<CancellationToken>,
    pub membership_token: Option<CancellationToken>,
    pub public_token: Option<CancellationToken>,
    pub team_token: Option<CancellationToken>,
}

impl CoreState {
    fn new() -> Self {
        Self {
            game_state: GameState::Disconnected,
            register: PlayerRegister::new(),
            player_numbers: HashMap::new(),
            rolls: HashMap::new(),
            seesaw_lock: 0,
            partner: None,
            heartbeat_token: None,
            membership_token: None,
            public_token: None,
            team_token: None,
        }
    }

    /// True when the game can (re)enter PLAYING: a full, all-ready party
    /// with nobody missing, from STARTING or PAUSED.
    pub(crate) fn can_start(&self, party_size: usize) -> bool {
        matches!(self.game_state, GameState::Starting | GameState::Paused)
            && self.register.confirmed_len() == party_size
            && self.register.missing_len() == 0
            && self.register.all_ready()
    }

    pub(crate) fn player_number_of(&self, player_id: &PlayerId) -> u8 {
        self.player_numbers.get(player_id).copied().unwrap_or(0)
    }

    fn cancel_consumers(&mut self) {
        for token in [
            self.heartbeat_token.take(),
            self.membership_token.take(),
            self.public_token.take(),
            self.team_token.take(),
        ]
        .into_iter()
        .flatten()
        {
            token.cancel();
        }
    }
}

/// Read-only view of one party member.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub player_id: PlayerId,
    pub is_ready: bool,
    pub has_found_object: bool,
    pub team_number: i32,
    /// 0 until the roll is complete.
    pub player_number: u8,
    pub missing: bool,
}

/// One peer of the coordination protocol.
pub struct GamePeer {
    player_id: PlayerId,
    client_id: ClientId,
    config: GameConfig,
    transport: Arc<dyn Transport>,
    requests: RequestProvider,
    handlers: Arc<PlayerEvents>,
    dispatch_mode: DispatchMode,
    state: Mutex<CoreState>,
    /// Handle the background tasks clone; set once at construction.
    weak_self: Weak<GamePeer>,
}

impl GamePeer {
    /// Creates a disconnected peer. `transport` must be an endpoint of
    /// the game's topic exchange; the peer owns it exclusively.
    #[must_use]
    pub fn new(
        config: GameConfig,
        transport: Arc<dyn Transport>,
        player_id: PlayerId,
        handlers: PlayerEvents,
    ) -> Arc<Self> {
        Self::with_dispatcher(config, transport, player_id, handlers, DispatchMode::Inline)
    }

    /// Like [`GamePeer::new`] with an explicit handler dispatch policy.
    /// The player default invokes handlers synchronously, outside the
    /// monitor; embeddings with heavy handlers can switch to spawned
    /// dispatch.
    #[must_use]
    pub fn with_dispatcher(
        config: GameConfig,
        transport: Arc<dyn Transport>,
        player_id: PlayerId,
        handlers: PlayerEvents,
        dispatch_mode: DispatchMode,
    ) -> Arc<Self> {
        let client_id = ClientId::generate();
        Arc::new_cyclic(|weak_self| Self {
            player_id,
            client_id,
            config,
            transport,
            requests: RequestProvider::new(client_id.to_string()),
            handlers: Arc::new(handlers),
            dispatch_mode,
            state: Mutex::new(CoreState::new()),
            weak_self: weak_self.clone(),
        })
    }

    // --- identity & read access ------------------------------------------

    #[must_use]
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub async fn game_state(&self) -> GameState {
        self.state.lock().await.game_state
    }

    pub async fn is_joined(&self) -> bool {
        self.state.lock().await.game_state.is_joined()
    }

    /// Confirmed party members, this peer included.
    pub async fn players(&self) -> Vec<PlayerId> {
        self.state.lock().await.register.confirmed_ids()
    }

    /// Players currently missing (retained for rejoin).
    pub async fn missing_players(&self) -> Vec<PlayerId> {
        let core = self.state.lock().await;
        core.register.missing_iter().map(|(id, _)| id.clone()).collect()
    }

    /// This peer's view of the whole party, missing players included.
    pub async fn party(&self) -> Vec<PlayerSnapshot> {
        let core = self.state.lock().await;
        let mut snapshots = Vec::with_capacity(core.register.confirmed_len());
        for (missing, entries) in [
            (false, core.register.confirmed_iter().collect::<Vec<_>>()),
            (true, core.register.missing_iter().collect::<Vec<_>>()),
        ] {
            for (id, state) in entries {
                snapshots.push(PlayerSnapshot {
                    player_id: id.clone(),
                    is_ready: state.is_ready,
                    has_found_object: state.has_found_object,
                    team_number: state.team_number,
                    player_number: core.player_number_of(id),
                    missing,
                });
            }
        }
        snapshots
    }

    /// This peer's agreed number, once the roll is complete (0 before).
    pub async fn player_number(&self) -> u8 {
        let core = self.state.lock().await;
        core.player_number_of(&self.player_id)
    }

    pub async fn has_found_object(&self) -> bool {
        let core = self.state.lock().await;
        core.register
            .get(&self.player_id)
            .is_some_and(|s| s.has_found_object)
    }

    pub async fn team_number(&self) -> i32 {
        let core = self.state.lock().await;
        core.register
            .get(&self.player_id)
            .map_or(NO_TEAM, |s| s.team_number)
    }

    pub async fn partner(&self) -> Option<PlayerId> {
        self.state.lock().await.partner.clone()
    }

    pub async fn held_seesaw(&self) -> Option<u32> {
        let lock = self.state.lock().await.seesaw_lock;
        (lock != 0).then_some(lock)
    }

    // --- public operations -----------------------------------------------

    /// Toggles the ready flag. Legal while joined; publishes only on an
    /// actual change.
    pub async fn set_ready(&self, ready: bool) -> Result<(), PeerError> {
        let events = {
            let mut core = self.state.lock().await;
            if !core.game_state.is_joined() {
                return Err(PeerError::precondition(
                    "set_ready",
                    format!("not joined (state {})", core.game_state),
                ));
            }
            let local = core
                .register
                .get_mut(&self.player_id)
                .ok_or_else(|| PeerError::precondition("set_ready", "local player not confirmed"))?;
            if local.is_ready == ready {
                return Ok(());
            }
            local.is_ready = ready;
            vec![GameEvent::PlayerReadyChanged(self.player_id.clone(), ready)]
        };

        self.publish(&PeerMessage::Ready(ReadyChange {
            player_id: self.player_id.clone(),
            is_ready: ready,
        }))
        .await?;
        self.dispatch(events);
        Ok(())
    }

    /// Broadcasts `start`. Legal only with a full, all-ready party and a
    /// complete roll; the transition itself happens on receipt.
    pub async fn start(&self) -> Result<(), PeerError> {
        {
            let core = self.state.lock().await;
            if !core.can_start(self.config.party_size) {
                return Err(PeerError::precondition(
                    "start",
                    format!(
                        "party not ready to start (state {}, {} confirmed, {} missing)",
                        core.game_state,
                        core.register.confirmed_len(),
                        core.register.missing_len()
                    ),
                ));
            }
            if core.player_numbers.len() != self.config.party_size {
                return Err(PeerError::precondition("start", "player numbers not agreed"));
            }
        }
        self.publish(&PeerMessage::Start(self.signal())).await
    }

    /// Broadcasts `stop`. Legal while joined and past the lobby.
    pub async fn stop(&self) -> Result<(), PeerError> {
        {
            let core = self.state.lock().await;
            let state = core.game_state;
            if !state.is_joined() || state == GameState::Waiting {
                return Err(PeerError::precondition(
                    "stop",
                    format!("no game to stop (state {state})"),
                ));
            }
        }
        self.publish(&PeerMessage::Stop(self.signal())).await
    }

    /// Broadcasts `pause` and drops the own ready flag. Legal only while
    /// PLAYING.
    pub async fn pause(&self) -> Result<(), PeerError> {
        {
            let core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "pause",
                    format!("not playing (state {})", core.game_state),
                ));
            }
        }
        self.publish(&PeerMessage::Pause(self.signal())).await?;
        self.set_ready(false).await
    }

    /// Publishes a position update bundled with the found flag. Legal
    /// only while PLAYING.
    pub async fn update_position(&self, x: f64, y: f64, angle: f64) -> Result<(), PeerError> {
        let update = {
            let core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "update_position",
                    format!("not playing (state {})", core.game_state),
                ));
            }
            PositionUpdate {
                player_id: self.player_id.clone(),
                player_number: core.player_number_of(&self.player_id),
                x,
                y,
                angle,
                found_object: core
                    .register
                    .get(&self.player_id)
                    .is_some_and(|s| s.has_found_object),
            }
        };
        self.publish(&PeerMessage::Update(update)).await
    }

    /// Persists and broadcasts that this robot found its object. Legal
    /// only while PLAYING and not already found; the flag survives
    /// pauses and rejoins.
    pub async fn found_object(&self) -> Result<(), PeerError> {
        let notice = {
            let mut core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "found_object",
                    format!("not playing (state {})", core.game_state),
                ));
            }
            let number = core.player_number_of(&self.player_id);
            let local = core.register.get_mut(&self.player_id).ok_or_else(|| {
                PeerError::precondition("found_object", "local player not confirmed")
            })?;
            if local.has_found_object {
                return Err(PeerError::precondition("found_object", "already found"));
            }
            local.has_found_object = true;
            FoundNotice {
                player_id: self.player_id.clone(),
                player_number: number,
            }
        };

        self.publish(&PeerMessage::Found(notice)).await?;
        self.dispatch(vec![GameEvent::PlayerFoundObject(self.player_id.clone())]);
        Ok(())
    }

    /// Leaves the game: best-effort disconnect broadcast, then teardown.
    /// Legal in any connected state.
    pub async fn leave(&self) -> Result<(), PeerError> {
        {
            let core = self.state.lock().await;
            if core.game_state == GameState::Disconnected {
                return Err(PeerError::precondition("leave", "not connected"));
            }
        }

        // Teardown errors are swallowed; peers converge via heartbeats.
        if let Err(e) = self
            .publish(&PeerMessage::Disconnect(crate::protocol::DisconnectNotice {
                player_id: self.player_id.clone(),
                client_id: self.client_id,
                reason: crate::protocol::DisconnectReason::Leave,
            }))
            .await
        {
            tracing::debug!(player_id = %self.player_id, "leave broadcast failed: {e}");
        }

        {
            let mut core = self.state.lock().await;
            core.cancel_consumers();
            core.register.clear();
            core.player_numbers.clear();
            core.rolls.clear();
            core.seesaw_lock = 0;
            core.partner = None;
            core.game_state = GameState::Disconnected;
        }
        self.transport.shutdown().await;
        tracing::info!(player_id = %self.player_id, "left the game");
        Ok(())
    }

    // --- internals shared by the protocol modules ------------------------

    pub(crate) fn signal(&self) -> Signal {
        Signal {
            player_id: self.player_id.clone(),
        }
    }

    pub(crate) async fn publish(&self, message: &PeerMessage) -> Result<(), PeerError> {
        let body = codec::encode(message)?;
        self.transport
            .publish(&message.topic(), body, Properties::default())
            .await?;
        Ok(())
    }

    /// Best-effort publish for paths where failures must not unwind.
    pub(crate) async fn publish_lossy(&self, message: &PeerMessage) {
        if let Err(e) = self.publish(message).await {
            tracing::warn!(topic = %message.topic(), "publish failed: {e}");
        }
    }

    pub(crate) fn dispatch(&self, events: Vec<GameEvent>) {
        if !events.is_empty() {
            events::dispatch(self.dispatch_mode, &self.handlers, events);
        }
    }

    pub(crate) fn is_local(&self, player_id: &PlayerId, client_id: ClientId) -> bool {
        *player_id == self.player_id && client_id == self.client_id
    }

    pub(crate) fn config(&self) -> &GameConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn requests(&self) -> &RequestProvider {
        &self.requests
    }

    /// Strong handle for spawned tasks; `None` only during teardown.
    pub(crate) fn strong(&self) -> Option<Arc<Self>> {
        self.weak_self.upgrade()
    }
}

/// Milliseconds since the epoch, the clock heartbeats run on.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
