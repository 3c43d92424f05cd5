//! Team channel: partner discovery, tile exchange, victory.
//!
//! Joining a team binds `team.<n>.*` and pings `team.<n>.ping`. The
//! partner, already listening, pongs back on the reply queue. If nobody
//! answers before the timeout the peer simply stays on the channel; a
//! partner arriving later pings from its side and drives the same
//! handler.

use tokio_util::sync::CancellationToken;

use crate::error::PeerError;
use crate::events::GameEvent;
use crate::protocol::codec;
use crate::protocol::{topics, GameState, PeerMessage, PlayerId, TeamPing, TeamTiles, Tile, WinNotice, NO_TEAM};
use crate::transport::{Delivery, Properties};

use super::GamePeer;

impl GamePeer {
    /// Joins team `team` (0-based). Legal only while PLAYING; rejoining
    /// the same team re-pings, switching teams is not supported.
    pub async fn join_team(&self, team: i32) -> Result<(), PeerError> {
        {
            let core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "join_team",
                    format!("not playing (state {})", core.game_state),
                ));
            }
            if team < 0 || team >= self.config().team_count() {
                return Err(PeerError::precondition(
                    "join_team",
                    format!("team {team} out of range"),
                ));
            }
            let current = core
                .register
                .get(&self.player_id)
                .map_or(NO_TEAM, |s| s.team_number);
            if current != NO_TEAM && current != team {
                return Err(PeerError::precondition(
                    "join_team",
                    format!("already on team {current}"),
                ));
            }
        }
        self.connect_team(team).await
    }

    /// Binds the team channel, remembers the membership, and issues the
    /// discovery ping. Also used on rejoin, where team identity is
    /// recovered from retained state rather than re-broadcast.
    pub(crate) async fn connect_team(&self, team: i32) -> Result<(), PeerError> {
        let subscription = self
            .transport()
            .bind(&[topics::team_pattern(team)])
            .await?;
        let token = CancellationToken::new();
        {
            let mut core = self.state.lock().await;
            if let Some(previous) = core.team_token.replace(token.clone()) {
                previous.cancel();
            }
            if let Some(local) = core.register.get_mut(&self.player_id) {
                local.team_number = team;
            }
        }
        self.spawn_consumer(subscription, token);
        tracing::info!(team, "listening on team channel");

        let body = codec::encode(&PeerMessage::TeamPing {
            team,
            ping: TeamPing {
                player_id: self.player_id.clone(),
            },
        })?;
        let mut requester = self
            .requests()
            .request(
                &**self.transport(),
                &topics::team_ping(team),
                body,
                self.config().request_lifetime(),
            )
            .await?;

        let Some(peer) = self.strong() else { return Ok(()) };
        tokio::spawn(async move {
            match requester.next_reply().await {
                Some(reply) => match codec::decode_pong(&reply.body) {
                    Ok(pong) => peer.partner_discovered(pong.player_id).await,
                    Err(e) => tracing::warn!(team, "dropping malformed pong: {e}"),
                },
                None => {
                    tracing::debug!(team, "nobody answered the team ping; partner may arrive later");
                }
            }
            requester.cancel();
        });
        Ok(())
    }

    /// Remembers the partner and fires `team_connected` once.
    pub(crate) async fn partner_discovered(&self, partner: PlayerId) {
        if partner == self.player_id {
            return;
        }
        let events = {
            let mut core = self.state.lock().await;
            if core.partner.as_ref() == Some(&partner) {
                Vec::new()
            } else {
                core.partner = Some(partner.clone());
                vec![GameEvent::TeamConnected(partner)]
            }
        };
        self.dispatch(events);
    }

    /// The partner's discovery ping: pong back, learn its identity.
    pub(crate) async fn handle_team_ping(&self, delivery: &Delivery, ping: TeamPing) {
        if ping.player_id == self.player_id {
            return;
        }

        if let Some(reply_to) = delivery.reply_to.as_deref() {
            let correlation_id = delivery.correlation_id.clone().unwrap_or_default();
            match codec::encode_pong(&TeamPing {
                player_id: self.player_id.clone(),
            }) {
                Ok(body) => {
                    if let Err(e) = self
                        .transport()
                        .send_direct(reply_to, body, Properties::reply(correlation_id))
                        .await
                    {
                        tracing::debug!(partner = %ping.player_id, "pong not delivered: {e}");
                    }
                }
                Err(e) => tracing::error!("failed to encode pong: {e}"),
            }
        }

        self.partner_discovered(ping.player_id).await;
    }

    /// Tiles from the team channel; only the known partner is accepted.
    pub(crate) async fn handle_team_tiles(&self, tiles: TeamTiles) {
        if tiles.player_id == self.player_id {
            return;
        }
        let events = {
            let core = self.state.lock().await;
            if core.partner.as_ref() == Some(&tiles.player_id) {
                vec![GameEvent::TilesReceived(tiles.player_id.clone(), tiles.tiles)]
            } else {
                tracing::trace!(sender = %tiles.player_id, "dropping tiles from unknown partner");
                Vec::new()
            }
        };
        self.dispatch(events);
    }

    /// Shares tiles with the partner, best effort. Legal only while
    /// PLAYING on a team.
    pub async fn send_tiles(&self, tiles: Vec<Tile>) -> Result<(), PeerError> {
        let team = {
            let core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "send_tiles",
                    format!("not playing (state {})", core.game_state),
                ));
            }
            let team = core
                .register
                .get(&self.player_id)
                .map_or(NO_TEAM, |s| s.team_number);
            if team == NO_TEAM {
                return Err(PeerError::precondition("send_tiles", "not on a team"));
            }
            team
        };

        self.publish(&PeerMessage::TeamTiles {
            team,
            tiles: TeamTiles {
                player_id: self.player_id.clone(),
                tiles,
            },
        })
        .await
    }

    /// Claims victory for the team, then stops the game locally. Legal
    /// only while PLAYING with a known partner.
    pub async fn win(&self) -> Result<(), PeerError> {
        let team = {
            let core = self.state.lock().await;
            if core.game_state != GameState::Playing {
                return Err(PeerError::precondition(
                    "win",
                    format!("not playing (state {})", core.game_state),
                ));
            }
            if core.partner.is_none() {
                return Err(PeerError::precondition("win", "no partner connected"));
            }
            core.register
                .get(&self.player_id)
                .map_or(NO_TEAM, |s| s.team_number)
        };

        self.publish(&PeerMessage::Win(WinNotice {
            player_id: self.player_id.clone(),
            team_number: team,
        }))
        .await?;
        self.stop().await
    }
}
