//! Delivery fan-in: consumer bindings, topic dispatch, and the small
//! lifecycle transitions driven purely by receipt.

use tokio_util::sync::CancellationToken;

use crate::error::PeerError;
use crate::events::GameEvent;
use crate::protocol::codec;
use crate::protocol::{
    topics, FoundNotice, GameState, PeerMessage, PositionUpdate, ReadyChange, Signal, WinNotice,
    NO_TEAM,
};
use crate::transport::{Delivery, Subscription};

use super::seesaw::release_seesaw;
use super::GamePeer;

impl GamePeer {
    /// Join/joined/disconnect consumer; up for the whole session.
    pub(crate) async fn bind_membership(&self) -> Result<(), PeerError> {
        let patterns: Vec<String> = topics::MEMBERSHIP_TOPICS
            .iter()
            .map(ToString::to_string)
            .collect();
        let subscription = self.transport().bind(&patterns).await?;
        let token = CancellationToken::new();
        {
            let mut core = self.state.lock().await;
            if let Some(previous) = core.membership_token.replace(token.clone()) {
                previous.cancel();
            }
        }
        self.spawn_consumer(subscription, token);
        Ok(())
    }

    /// Everything else; bound once the peer is admitted.
    pub(crate) async fn bind_public(&self) -> Result<(), PeerError> {
        let patterns: Vec<String> = topics::PUBLIC_TOPICS
            .iter()
            .map(ToString::to_string)
            .collect();
        let subscription = self.transport().bind(&patterns).await?;
        let token = CancellationToken::new();
        {
            let mut core = self.state.lock().await;
            if let Some(previous) = core.public_token.replace(token.clone()) {
                previous.cancel();
            }
        }
        self.spawn_consumer(subscription, token);
        Ok(())
    }

    /// Drains one subscription until cancellation or queue teardown.
    pub(crate) fn spawn_consumer(&self, mut subscription: Subscription, token: CancellationToken) {
        let Some(peer) = self.strong() else { return };
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    delivery = subscription.recv() => {
                        let Some(delivery) = delivery else { break };
                        peer.handle_delivery(delivery).await;
                    }
                }
            }
        });
    }

    /// Single decode-and-dispatch point for every consumer binding.
    /// Malformed payloads terminate that delivery only.
    pub(crate) async fn handle_delivery(&self, delivery: Delivery) {
        let message = match codec::decode(&delivery.routing_key, &delivery.body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(topic = %delivery.routing_key, "dropping malformed delivery: {e}");
                return;
            }
        };

        match message {
            PeerMessage::Join(request) => self.handle_join_request(&delivery, request).await,
            PeerMessage::Joined(notice) => self.handle_joined(notice).await,
            PeerMessage::Disconnect(notice) => self.handle_disconnect(notice).await,
            PeerMessage::Ready(change) => self.handle_ready(change).await,
            PeerMessage::Roll(value) => self.handle_roll(value).await,
            PeerMessage::Start(signal) => self.handle_start(signal).await,
            PeerMessage::Stop(signal) => self.handle_stop(signal).await,
            PeerMessage::Pause(signal) => self.handle_pause(signal).await,
            PeerMessage::Found(notice) => self.handle_found(notice).await,
            PeerMessage::Heartbeat(signal) => self.handle_heartbeat(signal).await,
            PeerMessage::Update(update) => self.handle_update(update).await,
            // Players do not track other robots' locks; the broadcasts
            // exist for spectator physics.
            PeerMessage::SeesawLock(_) | PeerMessage::SeesawUnlock(_) => {}
            PeerMessage::Win(notice) => self.handle_win(notice).await,
            PeerMessage::TeamPing { ping, .. } => self.handle_team_ping(&delivery, ping).await,
            PeerMessage::TeamTiles { tiles, .. } => self.handle_team_tiles(tiles).await,
        }
    }

    async fn handle_ready(&self, change: ReadyChange) {
        if change.player_id == self.player_id {
            return;
        }
        let events = {
            let mut core = self.state.lock().await;
            match core.register.get_mut(&change.player_id) {
                Some(state) if state.is_ready != change.is_ready => {
                    state.is_ready = change.is_ready;
                    vec![GameEvent::PlayerReadyChanged(
                        change.player_id.clone(),
                        change.is_ready,
                    )]
                }
                Some(_) => Vec::new(),
                None => {
                    tracing::trace!(player_id = %change.player_id, "ready from unknown player");
                    Vec::new()
                }
            }
        };
        self.dispatch(events);
    }

    /// `start` is receipt-driven for everyone, the sender included: the
    /// lobby moves to PLAYING, or a fully-recovered pause resumes.
    async fn handle_start(&self, _signal: Signal) {
        let events = {
            let mut core = self.state.lock().await;
            match core.game_state {
                GameState::Starting => {
                    core.game_state = GameState::Playing;
                    vec![GameEvent::GameStarted]
                }
                GameState::Paused if core.can_start(self.config().party_size) => {
                    core.game_state = GameState::Playing;
                    vec![GameEvent::GameStarted]
                }
                other => {
                    tracing::trace!(state = %other, "dropping start");
                    Vec::new()
                }
            }
        };
        self.dispatch(events);
    }

    /// `stop` dissolves the game back into an open lobby. Every peer
    /// applies the same reset on the same broadcast, so no further
    /// publishes are needed to stay consistent.
    async fn handle_stop(&self, _signal: Signal) {
        let (events, seesaw_release) = {
            let mut core = self.state.lock().await;
            if !matches!(
                core.game_state,
                GameState::Starting | GameState::Playing | GameState::Paused
            ) {
                return;
            }
            let seesaw_release = release_seesaw(&mut core, &self.player_id);
            core.register.drop_missing();
            for (_, state) in core.register.confirmed_iter_mut() {
                state.is_ready = false;
                state.has_found_object = false;
                state.team_number = NO_TEAM;
            }
            core.rolls.clear();
            core.player_numbers.clear();
            core.partner = None;
            if let Some(token) = core.team_token.take() {
                token.cancel();
            }
            core.game_state = GameState::Waiting;
            (vec![GameEvent::GameStopped], seesaw_release)
        };

        if let Some(message) = seesaw_release {
            self.publish_lossy(&message).await;
        }
        self.dispatch(events);
        // The lobby may still be full; the next agreement starts at once.
        self.try_roll().await;
    }

    async fn handle_pause(&self, _signal: Signal) {
        let (events, seesaw_release) = {
            let mut core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                // Pausing while already paused is a no-op.
                return;
            }
            core.game_state = GameState::Paused;
            let seesaw_release = release_seesaw(&mut core, &self.player_id);
            (vec![GameEvent::GamePaused], seesaw_release)
        };

        if let Some(message) = seesaw_release {
            self.publish_lossy(&message).await;
        }
        self.dispatch(events);
    }

    async fn handle_found(&self, notice: FoundNotice) {
        if notice.player_id == self.player_id {
            return;
        }
        let events = {
            let mut core = self.state.lock().await;
            match core.register.get_mut(&notice.player_id) {
                Some(state) if !state.has_found_object => {
                    state.has_found_object = true;
                    vec![GameEvent::PlayerFoundObject(notice.player_id.clone())]
                }
                _ => Vec::new(),
            }
        };
        self.dispatch(events);
    }

    /// Public position updates are surfaced only for the known partner;
    /// the bundled found flag keeps the register converged either way.
    async fn handle_update(&self, update: PositionUpdate) {
        if update.player_id == self.player_id {
            return;
        }
        let events = {
            let mut core = self.state.lock().await;
            if update.found_object {
                if let Some(state) = core.register.get_mut(&update.player_id) {
                    state.has_found_object = true;
                }
            }
            if core.partner.as_ref() == Some(&update.player_id) {
                vec![GameEvent::PartnerPosition {
                    x: update.x,
                    y: update.y,
                    angle: update.angle,
                }]
            } else {
                Vec::new()
            }
        };
        self.dispatch(events);
    }

    /// Victory is announced to everyone, the winner included; the
    /// winner's local `stop` brings the lifecycle down separately.
    async fn handle_win(&self, notice: WinNotice) {
        self.dispatch(vec![GameEvent::GameWon {
            team_number: notice.team_number,
        }]);
    }
}
