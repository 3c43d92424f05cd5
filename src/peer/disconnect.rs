//! Disconnect semantics: one path for leave, reject and timeout notices,
//! whether received or raised locally by the failure detector.


use crate::events::GameEvent;
use crate::protocol::{DisconnectNotice, GameState};

use super::seesaw::release_seesaw;
use super::GamePeer;

impl GamePeer {
    /// A disconnect broadcast from the exchange.
    pub(crate) async fn handle_disconnect(&self, notice: DisconnectNotice) {
        if self.is_local(&notice.player_id, notice.client_id) {
            if notice.reason == crate::protocol::DisconnectReason::Leave {
                // Echo of our own goodbye.
                return;
            }
            // Some peer reached the timeout verdict about us while we
            // are demonstrably alive; our own beacon will correct it.
            tracing::warn!(reason = %notice.reason, "ignoring disconnect notice about ourselves");
            return;
        }
        self.apply_disconnect(&notice).await;
    }

    /// The single writer path for a departure. Duplicate notices are
    /// filtered by checking connectedness for the exact
    /// (playerID, clientID) pair before acting.
    pub(crate) async fn apply_disconnect(&self, notice: &DisconnectNotice) {
        let (events, seesaw_release) = {
            let mut core = self.state.lock().await;

            let confirmed_pair = core
                .register
                .is_pair_confirmed(&notice.player_id, notice.client_id);
            let voted_pair = core
                .register
                .is_pair_voted(&notice.player_id, notice.client_id);
            if !confirmed_pair && !voted_pair {
                tracing::trace!(
                    player_id = %notice.player_id,
                    "dropping duplicate or stale disconnect"
                );
                return;
            }

            if !confirmed_pair {
                // A candidate we only ever voted on (e.g. its own vote
                // failed elsewhere); forget the tentative entry quietly.
                core.register.remove(&notice.player_id, notice.client_id);
                return;
            }

            let mut events = Vec::new();
            let mut seesaw_release = None;

            match core.game_state {
                GameState::Disconnected => return,
                GameState::Joining | GameState::Waiting => {
                    core.register.remove(&notice.player_id, notice.client_id);
                    core.rolls.clear();
                    core.player_numbers.clear();
                }
                GameState::Starting => {
                    // Not yet playing: the party shrinks back into an
                    // open lobby and the agreement is discarded.
                    core.register.remove(&notice.player_id, notice.client_id);
                    core.rolls.clear();
                    core.player_numbers.clear();
                    core.game_state = GameState::Waiting;
                }
                GameState::Playing => {
                    core.register.mark_missing(&notice.player_id);
                    core.game_state = GameState::Paused;
                    seesaw_release = release_seesaw(&mut core, &self.player_id);
                    events.push(GameEvent::GamePaused);
                }
                GameState::Paused => {
                    core.register.mark_missing(&notice.player_id);
                }
            }

            events.insert(
                0,
                GameEvent::PlayerDisconnected(notice.player_id.clone(), notice.reason.clone()),
            );
            (events, seesaw_release)
        };

        tracing::info!(
            player_id = %notice.player_id,
            reason = %notice.reason,
            "player disconnected"
        );
        if let Some(message) = seesaw_release {
            self.publish_lossy(&message).await;
        }
        self.dispatch(events);
    }
}
