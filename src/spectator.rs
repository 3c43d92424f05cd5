//! Read-only spectator role.
//!
//! A spectator binds every topic of the game exchange, decodes the
//! broadcasts, and fans them out to its handlers. It never publishes.
//! Handlers may run arbitrary rendering code, so each event is
//! dispatched on its own task rather than the consumer thread.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::PeerError;
use crate::events::{self, DispatchMode, EventSink};
use crate::protocol::codec;
use crate::protocol::{DisconnectReason, PeerMessage, PlayerId, Tile};
use crate::transport::Transport;

type Cb<A> = Box<dyn Fn(A) + Send + Sync>;

/// Everything a spectator can observe on the exchange.
#[derive(Debug, Clone)]
pub enum SpectatorEvent {
    PlayerJoined(PlayerId),
    PlayerDisconnected(PlayerId, DisconnectReason),
    PlayerReadyChanged(PlayerId, bool),
    PlayerRolled(PlayerId, i32),
    GameStarted,
    GamePaused,
    GameStopped,
    PlayerFoundObject(PlayerId, u8),
    PlayerPosition {
        player_id: PlayerId,
        player_number: u8,
        x: f64,
        y: f64,
        angle: f64,
        found_object: bool,
    },
    /// Drives the seesaw physics simulation.
    SeesawLocked { player_number: u8, barcode: u32 },
    SeesawUnlocked { player_number: u8, barcode: u32 },
    TilesShared(PlayerId, Vec<Tile>),
    GameWon { team_number: i32 },
    Heartbeat(PlayerId),
}

/// Callback table for the spectator role; unset fields are no-ops.
pub struct SpectatorEvents {
    player_joined: Cb<PlayerId>,
    player_disconnected: Cb<(PlayerId, DisconnectReason)>,
    player_ready_changed: Cb<(PlayerId, bool)>,
    player_rolled: Cb<(PlayerId, i32)>,
    game_started: Cb<()>,
    game_paused: Cb<()>,
    game_stopped: Cb<()>,
    player_found_object: Cb<(PlayerId, u8)>,
    player_position: Cb<(PlayerId, u8, f64, f64, f64, bool)>,
    seesaw_locked: Cb<(u8, u32)>,
    seesaw_unlocked: Cb<(u8, u32)>,
    tiles_shared: Cb<(PlayerId, Vec<Tile>)>,
    game_won: Cb<i32>,
    heartbeat: Cb<PlayerId>,
}

impl Default for SpectatorEvents {
    fn default() -> Self {
        Self {
            player_joined: Box::new(|_| {}),
            player_disconnected: Box::new(|_| {}),
            player_ready_changed: Box::new(|_| {}),
            player_rolled: Box::new(|_| {}),
            game_started: Box::new(|()| {}),
            game_paused: Box::new(|()| {}),
            game_stopped: Box::new(|()| {}),
            player_found_object: Box::new(|_| {}),
            player_position: Box::new(|_| {}),
            seesaw_locked: Box::new(|_| {}),
            seesaw_unlocked: Box::new(|_| {}),
            tiles_shared: Box::new(|_| {}),
            game_won: Box::new(|_| {}),
            heartbeat: Box::new(|_| {}),
        }
    }
}

impl SpectatorEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_player_joined(mut self, f: impl Fn(PlayerId) + Send + Sync + 'static) -> Self {
        self.player_joined = Box::new(f);
        self
    }

    #[must_use]
    pub fn on_player_disconnected(
        mut self,
        f: impl Fn(PlayerId, DisconnectReason) + Send + Sync + 'static,
    ) -> Self {
        self.player_disconnected = Box::new(move |(id, reason)| f(id, reason));
        self
    }

    #[must_use]
    pub fn on_player_ready_changed(
        mut self,
        f: impl Fn(PlayerId, bool) + Send + Sync + 'static,
    ) -> Self {
        self.player_ready_changed = Box::new(move |(id, ready)| f(id, ready));
        self
    }

    #[must_use]
    pub fn on_player_rolled(mut self, f: impl Fn(PlayerId, i32) + Send + Sync + 'static) -> Self {
        self.player_rolled = Box::new(move |(id, roll)| f(id, roll));
        self
    }

    #[must_use]
    pub fn on_game_started(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.game_started = Box::new(move |()| f());
        self
    }

    #[must_use]
    pub fn on_game_paused(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.game_paused = Box::new(move |()| f());
        self
    }

    #[must_use]
    pub fn on_game_stopped(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.game_stopped = Box::new(move |()| f());
        self
    }

    #[must_use]
    pub fn on_player_found_object(
        mut self,
        f: impl Fn(PlayerId, u8) + Send + Sync + 'static,
    ) -> Self {
        self.player_found_object = Box::new(move |(id, number)| f(id, number));
        self
    }

    #[must_use]
    pub fn on_player_position(
        mut self,
        f: impl Fn(PlayerId, u8, f64, f64, f64, bool) + Send + Sync + 'static,
    ) -> Self {
        self.player_position =
            Box::new(move |(id, number, x, y, angle, found)| f(id, number, x, y, angle, found));
        self
    }

    #[must_use]
    pub fn on_seesaw_locked(mut self, f: impl Fn(u8, u32) + Send + Sync + 'static) -> Self {
        self.seesaw_locked = Box::new(move |(number, barcode)| f(number, barcode));
        self
    }

    #[must_use]
    pub fn on_seesaw_unlocked(mut self, f: impl Fn(u8, u32) + Send + Sync + 'static) -> Self {
        self.seesaw_unlocked = Box::new(move |(number, barcode)| f(number, barcode));
        self
    }

    #[must_use]
    pub fn on_tiles_shared(
        mut self,
        f: impl Fn(PlayerId, Vec<Tile>) + Send + Sync + 'static,
    ) -> Self {
        self.tiles_shared = Box::new(move |(id, tiles)| f(id, tiles));
        self
    }

    #[must_use]
    pub fn on_game_won(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.game_won = Box::new(f);
        self
    }

    #[must_use]
    pub fn on_heartbeat(mut self, f: impl Fn(PlayerId) + Send + Sync + 'static) -> Self {
        self.heartbeat = Box::new(f);
        self
    }
}

impl EventSink<SpectatorEvent> for SpectatorEvents {
    fn deliver(&self, event: SpectatorEvent) {
        match event {
            SpectatorEvent::PlayerJoined(id) => (self.player_joined)(id),
            SpectatorEvent::PlayerDisconnected(id, reason) => {
                (self.player_disconnected)((id, reason));
            }
            SpectatorEvent::PlayerReadyChanged(id, ready) => {
                (self.player_ready_changed)((id, ready));
            }
            SpectatorEvent::PlayerRolled(id, roll) => (self.player_rolled)((id, roll)),
            SpectatorEvent::GameStarted => (self.game_started)(()),
            SpectatorEvent::GamePaused => (self.game_paused)(()),
            SpectatorEvent::GameStopped => (self.game_stopped)(()),
            SpectatorEvent::PlayerFoundObject(id, number) => {
                (self.player_found_object)((id, number));
            }
            SpectatorEvent::PlayerPosition {
                player_id,
                player_number,
                x,
                y,
                angle,
                found_object,
            } => (self.player_position)((player_id, player_number, x, y, angle, found_object)),
            SpectatorEvent::SeesawLocked {
                player_number,
                barcode,
            } => (self.seesaw_locked)((player_number, barcode)),
            SpectatorEvent::SeesawUnlocked {
                player_number,
                barcode,
            } => (self.seesaw_unlocked)((player_number, barcode)),
            SpectatorEvent::TilesShared(id, tiles) => (self.tiles_shared)((id, tiles)),
            SpectatorEvent::GameWon { team_number } => (self.game_won)(team_number),
            SpectatorEvent::Heartbeat(id) => (self.heartbeat)(id),
        }
    }
}

/// A read-only observer of one game exchange.
pub struct Spectator {
    transport: Arc<dyn Transport>,
    handlers: Arc<SpectatorEvents>,
    token: Mutex<Option<CancellationToken>>,
}

impl Spectator {
    /// Binds every topic of the exchange and starts observing.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        handlers: SpectatorEvents,
    ) -> Result<Arc<Self>, PeerError> {
        let spectator = Arc::new(Self {
            transport,
            handlers: Arc::new(handlers),
            token: Mutex::new(None),
        });

        let mut subscription = spectator.transport.bind(&["#".to_string()]).await?;
        let token = CancellationToken::new();
        *spectator.token.lock().await = Some(token.clone());

        let observer = Arc::clone(&spectator);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    delivery = subscription.recv() => {
                        let Some(delivery) = delivery else { break };
                        observer.observe(&delivery.routing_key, &delivery.body);
                    }
                }
            }
        });

        tracing::info!("spectator connected");
        Ok(spectator)
    }

    /// Stops observing and tears the connection down.
    pub async fn leave(&self) {
        if let Some(token) = self.token.lock().await.take() {
            token.cancel();
        }
        self.transport.shutdown().await;
    }

    fn observe(&self, routing_key: &str, body: &[u8]) {
        let message = match codec::decode(routing_key, body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(topic = %routing_key, "spectator dropping malformed delivery: {e}");
                return;
            }
        };

        let event = match message {
            // Vote requests are peer business; the broadcast confirmation
            // is what makes membership official.
            PeerMessage::Join(_) => None,
            PeerMessage::Joined(notice) => Some(SpectatorEvent::PlayerJoined(notice.player_id)),
            PeerMessage::Disconnect(notice) => Some(SpectatorEvent::PlayerDisconnected(
                notice.player_id,
                notice.reason,
            )),
            PeerMessage::Ready(change) => Some(SpectatorEvent::PlayerReadyChanged(
                change.player_id,
                change.is_ready,
            )),
            PeerMessage::Roll(value) => {
                Some(SpectatorEvent::PlayerRolled(value.player_id, value.roll))
            }
            PeerMessage::Start(_) => Some(SpectatorEvent::GameStarted),
            PeerMessage::Stop(_) => Some(SpectatorEvent::GameStopped),
            PeerMessage::Pause(_) => Some(SpectatorEvent::GamePaused),
            PeerMessage::Found(notice) => Some(SpectatorEvent::PlayerFoundObject(
                notice.player_id,
                notice.player_number,
            )),
            PeerMessage::Heartbeat(signal) => Some(SpectatorEvent::Heartbeat(signal.player_id)),
            PeerMessage::Update(update) => Some(SpectatorEvent::PlayerPosition {
                player_id: update.player_id,
                player_number: update.player_number,
                x: update.x,
                y: update.y,
                angle: update.angle,
                found_object: update.found_object,
            }),
            PeerMessage::SeesawLock(notice) => Some(SpectatorEvent::SeesawLocked {
                player_number: notice.player_number,
                barcode: notice.barcode,
            }),
            PeerMessage::SeesawUnlock(notice) => Some(SpectatorEvent::SeesawUnlocked {
                player_number: notice.player_number,
                barcode: notice.barcode,
            }),
            PeerMessage::Win(notice) => Some(SpectatorEvent::GameWon {
                team_number: notice.team_number,
            }),
            PeerMessage::TeamPing { .. } => None,
            PeerMessage::TeamTiles { tiles, .. } => {
                Some(SpectatorEvent::TilesShared(tiles.player_id, tiles.tiles))
            }
        };

        if let Some(event) = event {
            events::dispatch(DispatchMode::Spawned, &self.handlers, vec![event]);
        }
    }
}
