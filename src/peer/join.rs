//! Join and rejoin: quorum vote, admission, and vote replies.


use crate::error::PeerError;
use crate::events::GameEvent;
use crate::protocol::codec;
use crate::protocol::{
    topics, GameState, JoinReply, JoinRequest, JoinedNotice, MissingPlayerEntry, PeerMessage,
    NO_TEAM,
};
use crate::register::Confirmation;
use crate::request::Vote;
use crate::transport::{Delivery, Properties};

use super::{CoreState, GamePeer};

impl GamePeer {
    /// Joins the game. Legal only while DISCONNECTED.
    ///
    /// Issues the membership vote over topic `join` and drives it to a
    /// verdict: quorum of accepts, deadline without a reject (this is how
    /// the first player on an empty exchange gets in), or a reject, which
    /// resolves to [`PeerError::Rejected`] and leaves the peer
    /// DISCONNECTED.
    pub async fn join(&self) -> Result<(), PeerError> {
        {
            let mut core = self.state.lock().await;
            if core.game_state != GameState::Disconnected {
                return Err(PeerError::precondition(
                    "join",
                    format!("already connected (state {})", core.game_state),
                ));
            }
            core.game_state = GameState::Joining;
            core.register.confirm(&self.player_id, self.client_id);
        }
        tracing::info!(player_id = %self.player_id, client_id = %self.client_id, "joining");

        if let Err(e) = self.start_join_phase().await {
            self.rollback_join().await;
            return Err(e);
        }

        let body = codec::encode(&PeerMessage::Join(JoinRequest {
            player_id: self.player_id.clone(),
            client_id: self.client_id,
        }))?;
        let requester = match self
            .requests()
            .request(
                &**self.transport(),
                topics::JOIN,
                body,
                self.config().request_lifetime(),
            )
            .await
        {
            Ok(requester) => requester,
            Err(e) => {
                self.rollback_join().await;
                return Err(e.into());
            }
        };

        let verdict = Vote::new(requester, self.config().quorum())
            .run(|delivery| {
                codec::decode_reply(&delivery.body)
                    .ok()
                    .map(|reply| (reply.result, reply))
            })
            .await;

        match verdict {
            crate::request::VoteVerdict::Accepted { accepts } => self.finish_admission(accepts).await,
            crate::request::VoteVerdict::Rejected { by, .. } => {
                tracing::warn!(player_id = %self.player_id, rejected_by = %by.player_id, "join rejected");
                self.publish_lossy(&PeerMessage::Disconnect(crate::protocol::DisconnectNotice {
                    player_id: self.player_id.clone(),
                    client_id: self.client_id,
                    reason: crate::protocol::DisconnectReason::Reject,
                }))
                .await;
                self.rollback_join().await;
                Err(PeerError::Rejected { by: by.player_id })
            }
        }
    }

    /// Heartbeat beacon plus the membership binding, both up before the
    /// vote request goes out so no reply or concurrent join is missed.
    async fn start_join_phase(&self) -> Result<(), PeerError> {
        self.start_heartbeat().await;
        self.bind_membership().await
    }

    /// Undoes a failed join attempt; the transport stays usable for a
    /// retry.
    async fn rollback_join(&self) {
        let mut core = self.state.lock().await;
        core.cancel_consumers();
        core.register.clear();
        core.player_numbers.clear();
        core.rolls.clear();
        core.game_state = GameState::Disconnected;
    }

    /// The vote came back accepted (or silent): adopt the party view the
    /// accepts advertise, announce ourselves, and catch up.
    async fn finish_admission(&self, accepts: Vec<JoinReply>) -> Result<(), PeerError> {
        let (replay, rejoin_team, admitted_state) = {
            let mut core = self.state.lock().await;
            let mut adopted = GameState::Waiting;

            for reply in &accepts {
                if reply.is_joined {
                    match core.register.confirm(&reply.player_id, reply.client_id) {
                        Confirmation::Added | Confirmation::Restored { .. } => {
                            if let Some(state) = core.register.get_mut(&reply.player_id) {
                                state.is_ready = reply.is_ready;
                                state.has_found_object = reply.has_found_object;
                                state.team_number = reply.team_number;
                                // The reply is a liveness observation: a
                                // responder that vanished before we could
                                // bind its beacons must still expire.
                                state.last_heartbeat = super::now_ms();
                            }
                        }
                        Confirmation::Unchanged => {}
                        Confirmation::Conflict { holder } => {
                            tracing::warn!(
                                player_id = %reply.player_id,
                                %holder,
                                "conflicting clientIDs among join replies"
                            );
                        }
                    }
                } else {
                    // The responder is itself still joining; its own
                    // `joined` broadcast will confirm it.
                    core.register
                        .record_vote(reply.player_id.clone(), reply.client_id);
                }

                if reply.game_state.rank() > adopted.rank() {
                    adopted = reply.game_state;
                }
                core.player_numbers.extend(
                    reply
                        .player_numbers
                        .iter()
                        .map(|(id, n)| (id.clone(), *n)),
                );

                for entry in &reply.missing_players {
                    if entry.player_id == self.player_id {
                        // This is a rejoin: the party retained our state.
                        if let Some(local) = core.register.get_mut(&self.player_id) {
                            local.has_found_object = entry.has_found_object;
                            local.team_number = entry.team_number;
                        }
                    } else if !core.register.is_confirmed(&entry.player_id) {
                        core.register.insert_missing(
                            entry.player_id.clone(),
                            entry.has_found_object,
                            entry.team_number,
                        );
                    }
                }
            }

            core.game_state = adopted;

            let replay: Vec<GameEvent> = core
                .register
                .confirmed_iter()
                .chain(core.register.missing_iter())
                .filter(|(_, s)| s.has_found_object)
                .map(|(id, _)| GameEvent::PlayerFoundObject(id.clone()))
                .collect();

            let rejoin_team = core
                .register
                .get(&self.player_id)
                .map(|s| s.team_number)
                .filter(|t| *t != NO_TEAM);

            (replay, rejoin_team, adopted)
        };

        // The public binding must exist before peers can react to our
        // `joined` with rolls we would otherwise miss.
        self.bind_public().await?;
        self.publish(&PeerMessage::Joined(JoinedNotice {
            player_id: self.player_id.clone(),
            client_id: self.client_id,
        }))
        .await?;

        tracing::info!(
            player_id = %self.player_id,
            accepts = accepts.len(),
            state = %admitted_state,
            "admitted"
        );

        self.dispatch(replay);
        self.try_roll().await;

        if let Some(team) = rejoin_team {
            // Team identity is recovered locally; re-ping the partner.
            if let Err(e) = self.connect_team(team).await {
                tracing::warn!(team, "failed to rejoin team channel: {e}");
            }
        }
        Ok(())
    }

    /// A peer's join vote request. Never replies to our own echo.
    pub(crate) async fn handle_join_request(&self, delivery: &Delivery, request: JoinRequest) {
        if self.is_local(&request.player_id, request.client_id) {
            return;
        }

        let reply = {
            let mut core = self.state.lock().await;
            self.evaluate_join(&mut core, &request)
        };
        tracing::debug!(
            candidate = %request.player_id,
            accept = reply.result,
            "voting on join"
        );

        let Some(reply_to) = delivery.reply_to.as_deref() else {
            tracing::warn!(candidate = %request.player_id, "join request without reply queue");
            return;
        };
        let correlation_id = delivery.correlation_id.clone().unwrap_or_default();

        let body = match codec::encode_reply(&reply) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("failed to encode join reply: {e}");
                return;
            }
        };
        if let Err(e) = self
            .transport()
            .send_direct(reply_to, body, Properties::reply(correlation_id))
            .await
        {
            // The joiner may already have resolved its vote and released
            // the queue.
            tracing::debug!(candidate = %request.player_id, "join reply not delivered: {e}");
        }
    }

    /// `canJoin` plus the accept reply carrying our state and party view.
    fn evaluate_join(&self, core: &mut CoreState, request: &JoinRequest) -> JoinReply {
        let accept = match core.game_state {
            GameState::Playing | GameState::Disconnected => false,
            GameState::Paused => core.register.is_missing(&request.player_id),
            GameState::Joining | GameState::Waiting | GameState::Starting => {
                let no_owner_conflict = core
                    .register
                    .confirmed_holder(&request.player_id)
                    .is_none_or(|holder| holder == request.client_id);
                no_owner_conflict
                    && core.register.occupancy_with(&request.player_id) <= self.config().party_size
            }
        };

        if !accept {
            return JoinReply::reject(self.player_id.clone(), self.client_id);
        }

        core.register
            .record_vote(request.player_id.clone(), request.client_id);

        let local = core.register.get(&self.player_id);
        JoinReply {
            result: true,
            player_id: self.player_id.clone(),
            client_id: self.client_id,
            is_ready: local.is_some_and(|s| s.is_ready),
            is_joined: core.game_state.is_joined(),
            has_found_object: local.is_some_and(|s| s.has_found_object),
            team_number: local.map_or(NO_TEAM, |s| s.team_number),
            game_state: core.game_state,
            player_numbers: core.player_numbers.clone(),
            missing_players: core
                .register
                .missing_iter()
                .map(|(id, s)| MissingPlayerEntry {
                    player_id: id.clone(),
                    has_found_object: s.has_found_object,
                    team_number: s.team_number,
                })
                .collect(),
        }
    }

    /// Broadcast confirmation: the peer moves from *voted* to
    /// *confirmed*, restoring retained state when it was missing.
    pub(crate) async fn handle_joined(&self, notice: JoinedNotice) {
        if self.is_local(&notice.player_id, notice.client_id) {
            return;
        }

        let events = {
            let mut core = self.state.lock().await;
            if core.game_state == GameState::Disconnected {
                return;
            }
            match core.register.confirm(&notice.player_id, notice.client_id) {
                Confirmation::Added => {
                    vec![GameEvent::PlayerJoined(notice.player_id.clone())]
                }
                Confirmation::Restored { .. } => {
                    tracing::info!(player_id = %notice.player_id, "missing player rejoined");
                    vec![GameEvent::PlayerJoined(notice.player_id.clone())]
                }
                Confirmation::Unchanged => Vec::new(),
                Confirmation::Conflict { holder } => {
                    // First confirmed wins; the late claimer notices on
                    // its next interaction and leaves.
                    tracing::warn!(
                        player_id = %notice.player_id,
                        %holder,
                        late = %notice.client_id,
                        "ignoring joined notice for an already-owned playerID"
                    );
                    Vec::new()
                }
            }
        };

        self.dispatch(events);
        self.try_roll().await;
    }
}
