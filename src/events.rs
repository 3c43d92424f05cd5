//! User-supplied lifecycle callbacks and their dispatch policy.
//!
//! Handlers are a struct of function-valued fields, all defaulting to
//! no-ops. The state machine queues events while it holds its monitor
//! and hands them to a dispatcher only after the transition has been
//! committed, so handlers never observe half-applied state and must not
//! re-enter the public API.

use std::sync::Arc;

use crate::protocol::{DisconnectReason, PlayerId, Tile};

type Cb<A> = Box<dyn Fn(A) + Send + Sync>;

/// Everything the core can tell the embedding application.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// A peer was admitted to the party.
    PlayerJoined(PlayerId),
    /// A peer left, was rejected, or timed out.
    PlayerDisconnected(PlayerId, DisconnectReason),
    /// A peer toggled its ready flag.
    PlayerReadyChanged(PlayerId, bool),
    /// The roll finished; this peer's number and target object.
    GameRolled { player_number: u8, object_number: u8 },
    GameStarted,
    GamePaused,
    GameStopped,
    /// A peer reported finding its object.
    PlayerFoundObject(PlayerId),
    /// Position broadcast from the known team partner.
    PartnerPosition { x: f64, y: f64, angle: f64 },
    /// Partner discovery completed.
    TeamConnected(PlayerId),
    /// Tiles shared by the partner.
    TilesReceived(PlayerId, Vec<Tile>),
    /// Some team claimed victory.
    GameWon { team_number: i32 },
}

/// Callback table for the player role. Build with the `on_*` methods;
/// unset fields are no-ops.
pub struct PlayerEvents {
    player_joined: Cb<PlayerId>,
    player_disconnected: Cb<(PlayerId, DisconnectReason)>,
    player_ready_changed: Cb<(PlayerId, bool)>,
    game_rolled: Cb<(u8, u8)>,
    game_started: Cb<()>,
    game_paused: Cb<()>,
    game_stopped: Cb<()>,
    player_found_object: Cb<PlayerId>,
    partner_position: Cb<(f64, f64, f64)>,
    team_connected: Cb<PlayerId>,
    tiles_received: Cb<(PlayerId, Vec<Tile>)>,
    game_won: Cb<i32>,
}

impl Default for PlayerEvents {
    fn default() -> Self {
        Self {
            player_joined: Box::new(|_| {}),
            player_disconnected: Box::new(|_| {}),
            player_ready_changed: Box::new(|_| {}),
            game_rolled: Box::new(|_| {}),
            game_started: Box::new(|()| {}),
            game_paused: Box::new(|()| {}),
            game_stopped: Box::new(|()| {}),
            player_found_object: Box::new(|_| {}),
            partner_position: Box::new(|_| {}),
            team_connected: Box::new(|_| {}),
            tiles_received: Box::new(|_| {}),
            game_won: Box::new(|_| {}),
        }
    }
}

impl PlayerEvents {
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
    pub fn on_game_rolled(mut self, f: impl Fn(u8, u8) + Send + Sync + 'static) -> Self {
        self.game_rolled = Box::new(move |(player, object)| f(player, object));
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
    pub fn on_player_found_object(mut self, f: impl Fn(PlayerId) + Send + Sync + 'static) -> Self {
        self.player_found_object = Box::new(f);
        self
    }

    #[must_use]
    pub fn on_partner_position(
        mut self,
        f: impl Fn(f64, f64, f64) + Send + Sync + 'static,
    ) -> Self {
        self.partner_position = Box::new(move |(x, y, angle)| f(x, y, angle));
        self
    }

    #[must_use]
    pub fn on_team_connected(mut self, f: impl Fn(PlayerId) + Send + Sync + 'static) -> Self {
        self.team_connected = Box::new(f);
        self
    }

    #[must_use]
    pub fn on_tiles_received(
        mut self,
        f: impl Fn(PlayerId, Vec<Tile>) + Send + Sync + 'static,
    ) -> Self {
        self.tiles_received = Box::new(move |(id, tiles)| f(id, tiles));
        self
    }

    #[must_use]
    pub fn on_game_won(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.game_won = Box::new(f);
        self
    }

    /// Invokes the callback matching one event.
    pub fn deliver(&self, event: GameEvent) {
        match event {
            GameEvent::PlayerJoined(id) => (self.player_joined)(id),
            GameEvent::PlayerDisconnected(id, reason) => (self.player_disconnected)((id, reason)),
            GameEvent::PlayerReadyChanged(id, ready) => (self.player_ready_changed)((id, ready)),
            GameEvent::GameRolled {
                player_number,
                object_number,
            } => (self.game_rolled)((player_number, object_number)),
            GameEvent::GameStarted => (self.game_started)(()),
            GameEvent::GamePaused => (self.game_paused)(()),
            GameEvent::GameStopped => (self.game_stopped)(()),
            GameEvent::PlayerFoundObject(id) => (self.player_found_object)(id),
            GameEvent::PartnerPosition { x, y, angle } => (self.partner_position)((x, y, angle)),
            GameEvent::TeamConnected(id) => (self.team_connected)(id),
            GameEvent::TilesReceived(id, tiles) => (self.tiles_received)((id, tiles)),
            GameEvent::GameWon { team_number } => (self.game_won)(team_number),
        }
    }
}

/// How committed events reach user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Invoke on the dispatching thread, outside the monitor. The player
    /// role defaults to this.
    #[default]
    Inline,
    /// Spawn one task per event. The spectator role defaults to this:
    /// its handlers run arbitrary rendering code.
    Spawned,
}

/// Anything that can consume a batch of events.
pub trait EventSink<E>: Send + Sync {
    fn deliver(&self, event: E);
}

impl EventSink<GameEvent> for PlayerEvents {
    fn deliver(&self, event: GameEvent) {
        PlayerEvents::deliver(self, event);
    }
}

/// Fans a committed batch out according to the dispatch mode.
pub fn dispatch<E, S>(mode: DispatchMode, sink: &Arc<S>, events: Vec<E>)
where
    E: Send + 'static,
    S: EventSink<E> + 'static,
{
    match mode {
        DispatchMode::Inline => {
            for event in events {
                sink.deliver(event);
            }
        }
        DispatchMode::Spawned => {
            for event in events {
                let sink = Arc::clone(sink);
                tokio::spawn(async move {
                    sink.deliver(event);
                });
            }
        }
    }
}
