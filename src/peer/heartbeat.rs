//! Liveness beacon and failure detector.
//!
//! Every peer publishes an empty heartbeat on a fixed cadence and scans
//! its confirmed party for silence. A stale peer is handled exactly like
//! an incoming timeout disconnect, and the notice is also broadcast on
//! the silent peer's behalf so partitioned observers converge.

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::protocol::{ClientId, DisconnectNotice, DisconnectReason, GameState, PeerMessage, PlayerId, Signal};

use super::{now_ms, GamePeer};

impl GamePeer {
    /// Spawns the beacon/reaper task. Cancelled on leave; bails out
    /// permanently on any transport failure and lets the other peers
    /// close the game via their own detectors.
    pub(crate) async fn start_heartbeat(&self) {
        let token = CancellationToken::new();
        {
            let mut core = self.state.lock().await;
            if let Some(previous) = core.heartbeat_token.replace(token.clone()) {
                previous.cancel();
            }
        }

        let Some(peer) = self.strong() else { return };
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(peer.config().heartbeat_frequency());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !peer.heartbeat_tick().await {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(player_id = %peer.player_id, "heartbeat task ended");
        });
    }

    /// One beat: publish, refresh own timestamp, reap the silent.
    /// Returns false when the beacon must stop for good.
    async fn heartbeat_tick(&self) -> bool {
        if let Err(e) = self
            .publish(&PeerMessage::Heartbeat(self.signal()))
            .await
        {
            tracing::warn!(player_id = %self.player_id, "heartbeat publish failed, stopping beacon: {e}");
            return false;
        }

        let stale: Vec<(PlayerId, ClientId)> = {
            let mut core = self.state.lock().await;
            let now = now_ms();
            if let Some(local) = core.register.get_mut(&self.player_id) {
                local.last_heartbeat = now;
            }
            // While joining, the local membership view is not yet
            // authoritative; send beacons but do not reap.
            if core.game_state == GameState::Joining || !core.game_state.is_joined() {
                Vec::new()
            } else {
                core.register
                    .stale_players(now, self.config().heartbeat_lifetime_ms as i64)
            }
        };

        for (player_id, client_id) in stale {
            tracing::warn!(%player_id, "heartbeat expired, declaring missing");
            self.report_timeout(player_id, client_id).await;
        }
        true
    }

    /// Applies the timeout locally, then broadcasts the disconnect on
    /// behalf of the silent peer. Every survivor does both; the
    /// connectedness check inside the disconnect path deduplicates.
    pub(crate) async fn report_timeout(&self, player_id: PlayerId, client_id: ClientId) {
        let notice = DisconnectNotice {
            player_id,
            client_id,
            reason: DisconnectReason::Timeout,
        };
        self.apply_disconnect(&notice).await;
        self.publish_lossy(&PeerMessage::Disconnect(notice)).await;
    }

    /// A peer's beacon arrived; refresh its liveness timestamp.
    pub(crate) async fn handle_heartbeat(&self, signal: Signal) {
        if signal.player_id == self.player_id {
            return;
        }
        let mut core = self.state.lock().await;
        if let Some(state) = core.register.get_mut(&signal.player_id) {
            state.last_heartbeat = now_ms();
        }
    }
}
