//! Lobby-to-game lifecycle: rolls, start, pause, stop, preconditions.


use htttp_peer::error::PeerError;
use htttp_peer::protocol::GameState;
use htttp_peer::transport::MemoryBroker;
use std::collections::HashMap;
use std::time::Duration;
use test_helpers::{wait_until, Recorder, TestPeer};

#[tokio::test]
async fn full_lobby_agrees_on_numbers_and_starts() {
    let broker = MemoryBroker::new();
    let recorders = vec![
        Recorder::new(),
        Recorder::new(),
        Recorder::new(),
        Recorder::new(),
    ];
    let peers = test_helpers::fill_lobby(&broker, &recorders).await;
    test_helpers::start_game(&peers).await;

    // Every peer computed the same bijection onto 1..4.
    let mut reference: Option<HashMap<String, u8>> = None;
    for test_peer in &peers {
        let view: HashMap<String, u8> = test_peer
            .peer
            .party()
            .await
            .into_iter()
            .map(|p| (p.player_id.as_str().to_string(), p.player_number))
            .collect();
        let mut numbers: Vec<u8> = view.values().copied().collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        match &reference {
            None => reference = Some(view),
            Some(expected) => assert_eq!(&view, expected),
        }
    }

    for (index, recorder) in recorders.iter().enumerate() {
        assert_eq!(
            recorder.count_of("started"),
            1,
            "peer {index} should see exactly one game start"
        );
        assert_eq!(recorder.count_of("rolled:"), 1);
    }

    // The object number is the player number minus one.
    let own_number = peers[0].peer.player_number().await;
    assert_eq!(
        recorders[0].count_of(&format!("rolled:{own_number}:{}", own_number - 1)),
        1
    );
}

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[Recorder::new(), recorder.clone()]).await;
    test_helpers::start_game(&peers).await;

    peers[0].peer.pause().await.expect("pause failed");
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
    assert_eq!(recorder.count_of("paused"), 1);

    // Pausing drops the pausing peer's ready flag; resume needs it back.
    for test_peer in &peers {
        test_peer.peer.set_ready(true).await.unwrap();
    }
    wait_until("readiness converged for resume", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                if !peer.party().await.iter().all(|p| p.is_ready) {
                    return false;
                }
            }
            true
        }
    })
    .await;

    peers[1].peer.start().await.expect("resume failed");
    wait_until("everyone playing again", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                if peer.game_state().await != GameState::Playing {
                    return false;
                }
            }
            true
        }
    })
    .await;
}

#[tokio::test]
async fn stop_returns_everyone_to_the_lobby() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[recorder.clone()]).await;
    test_helpers::start_game(&peers).await;

    peers[2].peer.stop().await.expect("stop failed");
    wait_until("everyone back in the lobby", || {
        let peers: Vec<_> = peers.iter().map(|p| p.peer.clone()).collect();
        async move {
            for peer in &peers {
                // The full lobby re-rolls immediately, so WAITING is
                // transient; STARTING with nobody ready is the rest state.
                let state = peer.game_state().await;
                if !matches!(state, GameState::Waiting | GameState::Starting) {
                    return false;
                }
                if peer.party().await.iter().any(|p| p.is_ready) {
                    return false;
                }
            }
            true
        }
    })
    .await;
    assert_eq!(recorder.count_of("stopped"), 1);
}

#[tokio::test]
async fn found_object_persists_and_is_single_shot() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[Recorder::new(), recorder.clone()]).await;
    test_helpers::start_game(&peers).await;

    peers[0].peer.found_object().await.expect("found failed");
    let err = peers[0].peer.found_object().await.expect_err("already found");
    assert!(matches!(err, PeerError::Precondition { .. }));

    wait_until("find reached the party", || {
        let bert = peers[1].peer.clone();
        async move {
            bert.party()
                .await
                .iter()
                .any(|p| p.player_id.as_str() == "anna" && p.has_found_object)
        }
    })
    .await;
    assert_eq!(recorder.count_of("found:anna"), 1);

    // The flag survives a pause.
    peers[0].peer.pause().await.unwrap();
    wait_until("paused", || {
        let anna = peers[0].peer.clone();
        async move { anna.game_state().await == GameState::Paused }
    })
    .await;
    assert!(peers[0].peer.has_found_object().await);
}

#[tokio::test]
async fn ready_toggles_publish_only_changes() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[Recorder::new(), recorder.clone()]).await;

    peers[0].peer.set_ready(true).await.unwrap();
    peers[0].peer.set_ready(true).await.unwrap();

    wait_until("bert saw anna become ready", || {
        let recorder = recorder.clone();
        async move { recorder.count_of("ready:anna:true") >= 1 }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        recorder.count_of("ready:anna:true"),
        1,
        "idempotent set_ready must publish once"
    );
}

#[tokio::test]
async fn operations_outside_their_states_are_refused() {
    let broker = MemoryBroker::new();
    let anna = TestPeer::spawn(&broker, "anna");

    // Disconnected: everything but join is off the table.
    assert!(matches!(
        anna.peer.set_ready(true).await,
        Err(PeerError::Precondition { .. })
    ));
    assert!(matches!(
        anna.peer.leave().await,
        Err(PeerError::Precondition { .. })
    ));

    anna.peer.join().await.unwrap();

    // Waiting: the game has not begun.
    assert!(matches!(
        anna.peer.stop().await,
        Err(PeerError::Precondition { .. })
    ));
    assert!(matches!(
        anna.peer.pause().await,
        Err(PeerError::Precondition { .. })
    ));
    assert!(matches!(
        anna.peer.update_position(0.0, 0.0, 0.0).await,
        Err(PeerError::Precondition { .. })
    ));
    assert!(matches!(
        anna.peer.found_object().await,
        Err(PeerError::Precondition { .. })
    ));
    assert!(matches!(
        anna.peer.lock_seesaw(17).await,
        Err(PeerError::Precondition { .. })
    ));
    assert!(matches!(
        anna.peer.start().await,
        Err(PeerError::Precondition { .. })
    ));
}
