//! Membership store.
//!
//! Three disjoint buckets keyed by playerID: *confirmed* (ratified
//! members, one clientID per playerID), *voted* (tentative entries
//! collected while other peers' join votes are in flight; clientID races
//! are allowed here and resolve at confirmation), and *missing*
//! (previously-confirmed players whose state is retained so they can
//! rejoin with the same role).

use std::collections::HashMap;

use crate::protocol::{ClientId, PlayerId, NO_TEAM};

/// Everything a peer remembers about one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub client_id: ClientId,
    pub is_ready: bool,
    pub has_found_object: bool,
    /// −1 while not on a team.
    pub team_number: i32,
    /// Milliseconds since the epoch; 0 = never heard.
    pub last_heartbeat: i64,
}

impl PlayerState {
    #[must_use]
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            is_ready: false,
            has_found_object: false,
            team_number: NO_TEAM,
            last_heartbeat: 0,
        }
    }
}

/// What [`PlayerRegister::confirm`] did.
#[derive(Debug, PartialEq)]
pub enum Confirmation {
    /// Fresh member; nothing was retained for it.
    Added,
    /// A missing player came back; its retained state was restored.
    Restored { has_found_object: bool, team_number: i32 },
    /// The pair was already confirmed; nothing changed.
    Unchanged,
    /// A different clientID already owns this playerID. First confirmed
    /// wins; the loser is expected to notice and leave.
    Conflict { holder: ClientId },
}

/// The membership data structure. Process-local; mutated only by the
/// game state machine.
#[derive(Debug, Default)]
pub struct PlayerRegister {
    confirmed: HashMap<PlayerId, PlayerState>,
    voted: HashMap<PlayerId, Vec<ClientId>>,
    missing: HashMap<PlayerId, PlayerState>,
}

impl PlayerRegister {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- votes -----------------------------------------------------------

    /// Records a tentative entry for an ongoing join vote. Multiple
    /// clientIDs per playerID are allowed; races resolve at confirmation.
    /// A pair that is already confirmed stays where it is.
    pub fn record_vote(&mut self, player_id: PlayerId, client_id: ClientId) {
        if self
            .confirmed
            .get(&player_id)
            .is_some_and(|s| s.client_id == client_id)
        {
            return;
        }
        let entries = self.voted.entry(player_id).or_default();
        if !entries.contains(&client_id) {
            entries.push(client_id);
        }
    }

    /// True when the pair sits in the *voted* bucket.
    #[must_use]
    pub fn is_pair_voted(&self, player_id: &PlayerId, client_id: ClientId) -> bool {
        self.voted
            .get(player_id)
            .is_some_and(|entries| entries.contains(&client_id))
    }

    /// Distinct playerIDs that would occupy the party if `candidate`
    /// were admitted on top of everything confirmed and voted.
    #[must_use]
    pub fn occupancy_with(&self, candidate: &PlayerId) -> usize {
        let mut ids: Vec<&PlayerId> = self.confirmed.keys().collect();
        for id in self.voted.keys() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if !ids.contains(&candidate) {
            ids.push(candidate);
        }
        ids.len()
    }

    // --- confirmation ----------------------------------------------------

    /// Ratifies a membership: moves the pair out of *voted* and into
    /// *confirmed*, restoring retained state when the player was missing.
    pub fn confirm(&mut self, player_id: &PlayerId, client_id: ClientId) -> Confirmation {
        if let Some(entries) = self.voted.get_mut(player_id) {
            entries.retain(|c| *c != client_id);
            if entries.is_empty() {
                self.voted.remove(player_id);
            }
        }

        if let Some(existing) = self.confirmed.get(player_id) {
            return if existing.client_id == client_id {
                Confirmation::Unchanged
            } else {
                Confirmation::Conflict {
                    holder: existing.client_id,
                }
            };
        }

        if let Some(retained) = self.missing.remove(player_id) {
            let state = PlayerState {
                client_id,
                is_ready: false,
                has_found_object: retained.has_found_object,
                team_number: retained.team_number,
                last_heartbeat: 0,
            };
            let outcome = Confirmation::Restored {
                has_found_object: state.has_found_object,
                team_number: state.team_number,
            };
            self.confirmed.insert(player_id.clone(), state);
            return outcome;
        }

        self.confirmed
            .insert(player_id.clone(), PlayerState::new(client_id));
        Confirmation::Added
    }

    // --- departure -------------------------------------------------------

    /// Seeds a *missing* entry learned from another peer's party view
    /// (join replies echo retained state for everyone missing). The
    /// departed process's clientID is unknown and irrelevant: a rejoin
    /// arrives with a fresh one.
    pub fn insert_missing(&mut self, player_id: PlayerId, has_found_object: bool, team_number: i32) {
        if self.confirmed.contains_key(&player_id) {
            return;
        }
        let mut state = PlayerState::new(ClientId::generate());
        state.has_found_object = has_found_object;
        state.team_number = team_number;
        self.missing.insert(player_id, state);
    }

    /// Moves a confirmed player to *missing*, retaining its state.
    pub fn mark_missing(&mut self, player_id: &PlayerId) -> Option<&PlayerState> {
        let state = self.confirmed.remove(player_id)?;
        self.missing.insert(player_id.clone(), state);
        self.missing.get(player_id)
    }

    /// Drops every trace of the pair (confirmed when the clientID
    /// matches, plus any matching vote entry).
    pub fn remove(&mut self, player_id: &PlayerId, client_id: ClientId) {
        if self
            .confirmed
            .get(player_id)
            .is_some_and(|s| s.client_id == client_id)
        {
            self.confirmed.remove(player_id);
        }
        if let Some(entries) = self.voted.get_mut(player_id) {
            entries.retain(|c| *c != client_id);
            if entries.is_empty() {
                self.voted.remove(player_id);
            }
        }
    }

    /// Forgets retained state for everyone missing (a `stop` dissolves
    /// the intended party back into an open lobby).
    pub fn drop_missing(&mut self) {
        self.missing.clear();
    }

    /// Empties every bucket.
    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.voted.clear();
        self.missing.clear();
    }

    // --- queries ---------------------------------------------------------

    #[must_use]
    pub fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    #[must_use]
    pub fn is_confirmed(&self, player_id: &PlayerId) -> bool {
        self.confirmed.contains_key(player_id)
    }

    /// True when exactly this (playerID, clientID) pair is confirmed.
    /// This is the dedup check for disconnect notices.
    #[must_use]
    pub fn is_pair_confirmed(&self, player_id: &PlayerId, client_id: ClientId) -> bool {
        self.confirmed
            .get(player_id)
            .is_some_and(|s| s.client_id == client_id)
    }

    #[must_use]
    pub fn confirmed_holder(&self, player_id: &PlayerId) -> Option<ClientId> {
        self.confirmed.get(player_id).map(|s| s.client_id)
    }

    #[must_use]
    pub fn get(&self, player_id: &PlayerId) -> Option<&PlayerState> {
        self.confirmed.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &PlayerId) -> Option<&mut PlayerState> {
        self.confirmed.get_mut(player_id)
    }

    pub fn confirmed_iter(&self) -> impl Iterator<Item = (&PlayerId, &PlayerState)> {
        self.confirmed.iter()
    }

    pub fn confirmed_iter_mut(&mut self) -> impl Iterator<Item = (&PlayerId, &mut PlayerState)> {
        self.confirmed.iter_mut()
    }

    #[must_use]
    pub fn confirmed_ids(&self) -> Vec<PlayerId> {
        self.confirmed.keys().cloned().collect()
    }

    #[must_use]
    pub fn all_ready(&self) -> bool {
        !self.confirmed.is_empty() && self.confirmed.values().all(|s| s.is_ready)
    }

    #[must_use]
    pub fn is_missing(&self, player_id: &PlayerId) -> bool {
        self.missing.contains_key(player_id)
    }

    #[must_use]
    pub fn missing_len(&self) -> usize {
        self.missing.len()
    }

    pub fn missing_iter(&self) -> impl Iterator<Item = (&PlayerId, &PlayerState)> {
        self.missing.iter()
    }

    /// Confirmed players whose heartbeat has expired: heard at least once
    /// and silent for longer than `lifetime_ms`.
    #[must_use]
    pub fn stale_players(&self, now_ms: i64, lifetime_ms: i64) -> Vec<(PlayerId, ClientId)> {
        self.confirmed
            .iter()
            .filter(|(_, s)| s.last_heartbeat > 0 && s.last_heartbeat < now_ms - lifetime_ms)
            .map(|(id, s)| (id.clone(), s.client_id))
            .collect()
    }
}
