//! Distributed fair assignment of player numbers.
//!
//! Once the lobby is full every peer draws a random 32-bit value,
//! publishes it, and collects the others. With all contributions in,
//! everyone sorts the same inputs the same way and reads off the same
//! number map, no coordinator involved.

use std::collections::HashMap;

use crate::events::GameEvent;
use crate::protocol::{GameState, PeerMessage, PlayerId, RollValue};

use super::{CoreState, GamePeer};

/// Ascending by `(roll, playerID)`. The lexicographic playerID tiebreak
/// is what keeps equal rolls deterministic across peers.
pub(crate) fn assign_numbers(rolls: &HashMap<PlayerId, i32>) -> HashMap<PlayerId, u8> {
    let mut order: Vec<(&PlayerId, i32)> = rolls.iter().map(|(id, r)| (id, *r)).collect();
    order.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    order
        .into_iter()
        .enumerate()
        .map(|(index, (id, _))| (id.clone(), (index + 1) as u8))
        .collect()
}

impl GamePeer {
    /// Draws and publishes this peer's roll when the lobby just filled,
    /// and completes the agreement when every contribution is in.
    /// Callable from any point membership may have changed; no-op
    /// otherwise.
    pub(crate) async fn try_roll(&self) {
        let (outbound, events) = {
            let mut core = self.state.lock().await;
            let mut outbound = None;

            if core.game_state == GameState::Waiting
                && core.register.confirmed_len() == self.config().party_size
                && core.register.missing_len() == 0
                && !core.rolls.contains_key(&self.player_id)
            {
                let roll: i32 = rand::random();
                core.rolls.insert(self.player_id.clone(), roll);
                tracing::debug!(player_id = %self.player_id, roll, "rolling for player numbers");
                outbound = Some(PeerMessage::Roll(RollValue {
                    player_id: self.player_id.clone(),
                    roll,
                }));
            }

            (outbound, self.maybe_complete_roll(&mut core))
        };

        if let Some(message) = outbound {
            self.publish_lossy(&message).await;
        }
        self.dispatch(events);
    }

    /// A peer's roll contribution. Stored while the lobby is waiting;
    /// stray rolls outside that window are dropped.
    pub(crate) async fn handle_roll(&self, value: RollValue) {
        if value.player_id == self.player_id {
            return;
        }
        {
            let mut core = self.state.lock().await;
            if core.game_state != GameState::Waiting {
                tracing::trace!(
                    player_id = %value.player_id,
                    state = %core.game_state,
                    "dropping roll outside the lobby"
                );
                return;
            }
            core.rolls.insert(value.player_id, value.roll);
        }
        // Our own draw may still be outstanding, and this contribution
        // may have been the last one either way.
        self.try_roll().await;
    }

    /// With a full lobby and a roll from every confirmed player, fixes
    /// the number map and moves to STARTING.
    pub(crate) fn maybe_complete_roll(&self, core: &mut CoreState) -> Vec<GameEvent> {
        if core.game_state != GameState::Waiting
            || core.register.confirmed_len() != self.config().party_size
            || core.register.missing_len() != 0
        {
            return Vec::new();
        }
        let confirmed = core.register.confirmed_ids();
        if !confirmed.iter().all(|id| core.rolls.contains_key(id)) {
            return Vec::new();
        }

        let agreed: HashMap<PlayerId, i32> = confirmed
            .iter()
            .map(|id| (id.clone(), core.rolls[id]))
            .collect();
        core.player_numbers = assign_numbers(&agreed);
        core.game_state = GameState::Starting;

        let number = core.player_number_of(&self.player_id);
        tracing::info!(player_id = %self.player_id, number, "player numbers agreed");
        vec![GameEvent::GameRolled {
            player_number: number,
            object_number: number - 1,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    #[test]
    fn numbers_follow_ascending_rolls() {
        let rolls = HashMap::from([
            (pid("a"), 50),
            (pid("b"), -3),
            (pid("c"), 1000),
            (pid("d"), 0),
        ]);
        let numbers = assign_numbers(&rolls);
        assert_eq!(numbers[&pid("b")], 1);
        assert_eq!(numbers[&pid("d")], 2);
        assert_eq!(numbers[&pid("a")], 3);
        assert_eq!(numbers[&pid("c")], 4);
    }

    #[test]
    fn equal_rolls_break_ties_by_player_id() {
        let rolls = HashMap::from([(pid("zeta"), 7), (pid("alpha"), 7), (pid("mid"), 7)]);
        let numbers = assign_numbers(&rolls);
        assert_eq!(numbers[&pid("alpha")], 1);
        assert_eq!(numbers[&pid("mid")], 2);
        assert_eq!(numbers[&pid("zeta")], 3);
    }

    proptest::proptest! {
        // Hash-map iteration order varies per process; the agreement
        // must not.
        #[test]
        fn same_inputs_always_yield_the_same_bijection(
            raw in proptest::collection::hash_map("[a-z]{1,8}", proptest::prelude::any::<i32>(), 1..8usize)
        ) {
            let rolls: HashMap<PlayerId, i32> = raw
                .into_iter()
                .map(|(name, roll)| (PlayerId::new(name), roll))
                .collect();

            let first = assign_numbers(&rolls);
            let second = assign_numbers(&rolls);
            proptest::prop_assert_eq!(&first, &second);

            let mut numbers: Vec<u8> = first.values().copied().collect();
            numbers.sort_unstable();
            let expected: Vec<u8> = (1..=rolls.len() as u8).collect();
            proptest::prop_assert_eq!(numbers, expected);
        }
    }

    #[test]
    fn assignment_is_a_bijection_onto_one_through_n() {
        let rolls = HashMap::from([
            (pid("a"), i32::MIN),
            (pid("b"), i32::MAX),
            (pid("c"), 0),
            (pid("d"), 0),
        ]);
        let numbers = assign_numbers(&rolls);
        let mut seen: Vec<u8> = numbers.values().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }
}
