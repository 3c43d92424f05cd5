//! One full game, end to end, twice: lobby, roll, play, teams, seesaw,
//! victory, and straight into the next round over the same exchange.


use htttp_peer::protocol::{GameState, Tile};
use htttp_peer::transport::MemoryBroker;
use std::sync::Arc;
use test_helpers::{wait_until, Recorder, TestPeer};

async fn play_one_round(peers: &[TestPeer], recorders: &[Recorder], round: usize) {
    test_helpers::start_game(peers).await;

    // Pair up: anna+bert on team 0, cleo+dana on team 1.
    for (index, test_peer) in peers.iter().enumerate() {
        test_peer
            .peer
            .join_team((index / 2) as i32)
            .await
            .expect("join_team failed");
    }
    wait_until("all partners connected", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                if peer.partner().await.is_none() {
                    return false;
                }
            }
            true
        }
    })
    .await;

    // Robots roam, share maps, work a seesaw, find things.
    for (index, test_peer) in peers.iter().enumerate() {
        test_peer
            .peer
            .update_position(index as f64, index as f64, 0.0)
            .await
            .expect("update failed");
    }
    peers[1].peer.lock_seesaw(40 + round as u32).await.unwrap();
    peers[1].peer.unlock_seesaw().await.unwrap();
    peers[0].peer.found_object().await.unwrap();
    peers[0]
        .peer
        .send_tiles(vec![Tile(0, 1, 2), Tile(3, 1, 7)])
        .await
        .unwrap();

    wait_until("tiles and find propagated", || {
        let bert = recorders[1].clone();
        async move { bert.count_of("tiles:anna:2") >= 1 && bert.count_of("found:anna") >= 1 }
    })
    .await;

    // Team 0 wins; everyone lands back in an open lobby.
    peers[0].peer.win().await.expect("win failed");
    wait_until("round over, party reset", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                if !matches!(
                    peer.game_state().await,
                    GameState::Waiting | GameState::Starting
                ) {
                    return false;
                }
                let party = peer.party().await;
                if party.iter().any(|p| p.is_ready || p.has_found_object) {
                    return false;
                }
            }
            true
        }
    })
    .await;

    for recorder in recorders {
        assert_eq!(recorder.count_of("won:0"), round + 1);
    }
}

#[tokio::test]
async fn two_full_games_back_to_back() {
    let broker = MemoryBroker::new();
    let recorders = vec![
        Recorder::new(),
        Recorder::new(),
        Recorder::new(),
        Recorder::new(),
    ];
    let peers = test_helpers::fill_lobby(&broker, &recorders).await;

    play_one_round(&peers, &recorders, 0).await;
    play_one_round(&peers, &recorders, 1).await;

    // Two games means two starts and two stops on every peer.
    for recorder in &recorders {
        assert_eq!(recorder.count_of("started"), 2);
        assert_eq!(recorder.count_of("stopped"), 2);
    }

    for test_peer in &peers {
        test_peer.peer.leave().await.expect("leave failed");
        assert_eq!(test_peer.peer.game_state().await, GameState::Disconnected);
        assert!(test_peer.peer.players().await.is_empty());
    }
}

#[tokio::test]
async fn peers_share_one_consistent_view_mid_game() {
    let broker = MemoryBroker::new();
    let peers = test_helpers::fill_lobby(&broker, &[]).await;
    test_helpers::start_game(&peers).await;

    peers[2].peer.found_object().await.unwrap();

    wait_until("views converged", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            let mut reference: Option<Vec<(String, bool, u8)>> = None;
            for peer in &peers {
                let mut view: Vec<(String, bool, u8)> = peer
                    .party()
                    .await
                    .into_iter()
                    .map(|p| {
                        (
                            p.player_id.as_str().to_string(),
                            p.has_found_object,
                            p.player_number,
                        )
                    })
                    .collect();
                view.sort();
                match &reference {
                    None => reference = Some(view),
                    Some(expected) if *expected != view => return false,
                    Some(_) => {}
                }
            }
            true
        }
    })
    .await;
}

#[tokio::test]
async fn spectator_and_players_agree_on_the_story() {
    let broker = MemoryBroker::new();
    let spectator_log = Recorder::new();
    let spectator = htttp_peer::spectator::Spectator::connect(
        Arc::new(broker.endpoint()),
        htttp_peer::spectator::SpectatorEvents::new()
            .on_game_started({
                let r = spectator_log.clone();
                move || r.push("started")
            })
            .on_game_stopped({
                let r = spectator_log.clone();
                move || r.push("stopped")
            })
            .on_game_won({
                let r = spectator_log.clone();
                move |team| r.push(format!("won:{team}"))
            }),
    )
    .await
    .unwrap();

    let recorders = vec![
        Recorder::new(),
        Recorder::new(),
        Recorder::new(),
        Recorder::new(),
    ];
    let peers = test_helpers::fill_lobby(&broker, &recorders).await;
    play_one_round(&peers, &recorders, 0).await;

    wait_until("spectator caught the highlights", || {
        let r = spectator_log.clone();
        async move {
            r.count_of("started") == 1 && r.count_of("won:0") == 1 && r.count_of("stopped") == 1
        }
    })
    .await;
    spectator.leave().await;
}
