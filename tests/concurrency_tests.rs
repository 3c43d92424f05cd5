//! Races the protocol must absorb: simultaneous joins, bursts of
//! toggles and updates, a pause landing mid-traffic.


use htttp_peer::protocol::GameState;
use htttp_peer::transport::MemoryBroker;
use test_helpers::{wait_until, Recorder, TestPeer};

#[tokio::test]
async fn four_simultaneous_joins_converge() {
    let broker = MemoryBroker::new();
    let peers: Vec<TestPeer> = ["anna", "bert", "cleo", "dana"]
        .iter()
        .map(|name| TestPeer::spawn(&broker, name))
        .collect();

    // All four vote on each other concurrently; nobody is first.
    let results = futures::future::join_all(peers.iter().map(|p| p.peer.join())).await;
    for result in results {
        result.expect("concurrent join must succeed");
    }

    wait_until("all views converge on a full lobby", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                if peer.players().await.len() != 4 {
                    return false;
                }
            }
            true
        }
    })
    .await;

    // The lobby being full, the agreement runs and every peer holds the
    // same bijection.
    wait_until("numbers agreed everywhere", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            let mut reference = None;
            for peer in &peers {
                if peer.game_state().await != GameState::Starting {
                    return false;
                }
                let mut view: Vec<(String, u8)> = peer
                    .party()
                    .await
                    .into_iter()
                    .map(|p| (p.player_id.as_str().to_string(), p.player_number))
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
async fn ready_toggle_burst_settles_on_the_last_value() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[Recorder::new(), recorder.clone()]).await;

    for _ in 0..5 {
        peers[0].peer.set_ready(true).await.unwrap();
        peers[0].peer.set_ready(false).await.unwrap();
    }
    peers[0].peer.set_ready(true).await.unwrap();

    wait_until("bert settled on anna being ready", || {
        let bert = peers[1].peer.clone();
        async move {
            bert.party()
                .await
                .iter()
                .any(|p| p.player_id.as_str() == "anna" && p.is_ready)
        }
    })
    .await;
    // Eleven real changes, no duplicates from the idempotent final call.
    assert_eq!(recorder.count_of("ready:anna:"), 11);
}

#[tokio::test]
async fn update_storm_survives_a_concurrent_pause() {
    let broker = MemoryBroker::new();
    let peers = test_helpers::fill_lobby(&broker, &[]).await;
    test_helpers::start_game(&peers).await;

    // Anna floods positions while bert pauses; updates racing past the
    // transition may fail the precondition, never poison state.
    let anna = peers[0].peer.clone();
    let storm = tokio::spawn(async move {
        for step in 0..50 {
            let _ = anna.update_position(step as f64, 0.0, 0.0).await;
            tokio::task::yield_now().await;
        }
    });
    peers[1].peer.pause().await.expect("pause failed");
    storm.await.unwrap();

    wait_until("everyone paused", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                if peer.game_state().await != GameState::Paused {
                    return false;
                }
            }
            true
        }
    })
    .await;

    // And the game is still operable afterwards.
    for test_peer in &peers {
        test_peer.peer.set_ready(true).await.unwrap();
    }
    wait_until("resumable", || {
        let anna = peers[0].peer.clone();
        async move { anna.party().await.iter().all(|p| p.is_ready) }
    })
    .await;
    peers[0].peer.start().await.expect("resume");
}

#[tokio::test]
async fn leave_during_vote_of_another_peer_is_harmless() {
    let broker = MemoryBroker::new();
    let anna = TestPeer::spawn(&broker, "anna");
    let bert = TestPeer::spawn(&broker, "bert");
    anna.peer.join().await.unwrap();
    bert.peer.join().await.unwrap();

    // Cleo's vote is in flight while bert walks away.
    let cleo = TestPeer::spawn(&broker, "cleo");
    let join = {
        let cleo = cleo.peer.clone();
        tokio::spawn(async move { cleo.join().await })
    };
    bert.peer.leave().await.unwrap();
    join.await.unwrap().expect("cleo still gets in");

    wait_until("anna and cleo agree on a lobby of two", || {
        let anna = anna.peer.clone();
        let cleo = cleo.peer.clone();
        async move { anna.players().await.len() == 2 && cleo.players().await.len() == 2 }
    })
    .await;
}
