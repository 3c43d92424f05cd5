//! Seesaw mutual exclusion.
//!
//! The peer holds at most one lock. The broadcasts are notifications for
//! spectator physics, not a distributed acquisition: the robots
//! themselves guarantee that only one approaches a seesaw at a time.


use crate::error::PeerError;
use crate::protocol::{GameState, PeerMessage, PlayerId, SeesawNotice};

use super::{CoreState, GamePeer};

/// Clears a held lock when the peer exits PLAYING, so a lock can never
/// outlive the state it is only meaningful in. Returns the unlock
/// broadcast to send, if any.
pub(crate) fn release_seesaw(core: &mut CoreState, player_id: &PlayerId) -> Option<PeerMessage> {
    if core.seesaw_lock == 0 {
        return None;
    }
    let notice = SeesawNotice {
        player_id: player_id.clone(),
        player_number: core.player_number_of(player_id),
        barcode: core.seesaw_lock,
    };
    core.seesaw_lock = 0;
    Some(PeerMessage::SeesawUnlock(notice))
}

impl GamePeer {
    /// Takes the local lock on the seesaw identified by `barcode` and
    /// broadcasts it. Idempotent for the barcode already held; fails if
    /// a different one is. Legal only while PLAYING.
    pub async fn lock_seesaw(&self, barcode: u32) -> Result<(), PeerError> {
        let notice = {
            let mut core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "lock_seesaw",
                    format!("not playing (state {})", core.game_state),
                ));
            }
            if barcode == 0 {
                return Err(PeerError::precondition("lock_seesaw", "barcode 0 is reserved"));
            }
            if core.seesaw_lock == barcode {
                return Ok(());
            }
            if core.seesaw_lock != 0 {
                return Err(PeerError::precondition(
                    "lock_seesaw",
                    format!("seesaw {} is still locked", core.seesaw_lock),
                ));
            }
            core.seesaw_lock = barcode;
            SeesawNotice {
                player_id: self.player_id.clone(),
                player_number: core.player_number_of(&self.player_id),
                barcode,
            }
        };

        tracing::debug!(barcode, "seesaw locked");
        self.publish(&PeerMessage::SeesawLock(notice)).await
    }

    /// Clears the local lock and broadcasts the unlock. A no-op without
    /// a held lock.
    pub async fn unlock_seesaw(&self) -> Result<(), PeerError> {
        let notice = {
            let mut core = self.state.lock().await;
            match release_seesaw(&mut core, &self.player_id) {
                Some(message) => message,
                None => return Ok(()),
            }
        };
        tracing::debug!("seesaw unlocked");
        self.publish(&notice).await
    }
}
