//! Hostile-exchange behavior: garbage payloads, unknown topics, stale
//! and foreign notices. The peer drops the offending delivery and keeps
//! going.


use bytes::Bytes;
use htttp_peer::protocol::GameState;
use htttp_peer::transport::{MemoryBroker, Properties, Transport};
use std::time::Duration;
use test_helpers::{wait_until, Recorder, TestPeer};

#[tokio::test]
async fn malformed_payloads_do_not_kill_consumers() {
    let broker = MemoryBroker::new();
    let peers = test_helpers::fill_lobby(&broker, &[]).await;

    let rogue = broker.endpoint();
    for topic in ["roll", "ready", "join", "disconnect", "update"] {
        rogue
            .publish(topic, Bytes::from_static(b"not json"), Properties::default())
            .await
            .unwrap();
    }
    rogue
        .publish(
            "telemetry.unknown",
            Bytes::from_static(b"{}"),
            Properties::default(),
        )
        .await
        .unwrap();

    // The party is unimpressed and still plays a full game.
    test_helpers::start_game(&peers).await;
    for test_peer in &peers {
        assert_eq!(test_peer.peer.game_state().await, GameState::Playing);
    }
}

#[tokio::test]
async fn disconnect_for_a_stranger_is_ignored() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[recorder.clone()]).await;

    let body = serde_json::json!({
        "playerID": "nobody",
        "clientID": uuid::Uuid::new_v4(),
        "reason": "LEAVE",
    });
    broker
        .endpoint()
        .publish(
            "disconnect",
            Bytes::from(serde_json::to_vec(&body).unwrap()),
            Properties::default(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(recorder.count_of("disconnected:"), 0);
    for test_peer in &peers {
        assert_eq!(test_peer.peer.players().await.len(), 4);
    }
}

#[tokio::test]
async fn unknown_disconnect_reasons_travel_opaquely() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[recorder.clone()]).await;

    // A future build evicts cleo with a reason this one does not know.
    let cleo_client = peers[2].peer.client_id();
    let body = serde_json::json!({
        "playerID": "cleo",
        "clientID": cleo_client.to_string(),
        "reason": "EVICTED",
    });
    broker
        .endpoint()
        .publish(
            "disconnect",
            Bytes::from(serde_json::to_vec(&body).unwrap()),
            Properties::default(),
        )
        .await
        .unwrap();

    wait_until("anna processed the eviction verbatim", || {
        let recorder = recorder.clone();
        async move { recorder.count_of("disconnected:cleo:EVICTED") == 1 }
    })
    .await;
    wait_until("cleo is gone from anna's lobby", || {
        let anna = peers[0].peer.clone();
        async move { anna.players().await.len() == 3 }
    })
    .await;
}

#[tokio::test]
async fn stale_vote_replies_cannot_resurrect_a_vote() {
    // A reply with a foreign correlation id lands on a live reply queue:
    // the requester must drop it rather than count it.
    let broker = MemoryBroker::new();
    let responder = broker.endpoint();
    let mut inbox = responder.bind(&["join".to_string()]).await.unwrap();

    let anna = TestPeer::spawn(&broker, "anna");
    let join = {
        let anna = anna.peer.clone();
        tokio::spawn(async move { anna.join().await })
    };

    let inbound = inbox.recv().await.expect("anna's vote request");
    let reply_to = inbound.reply_to.clone().unwrap();
    // Reject with the wrong correlation id: must be ignored, so anna
    // still wins by silence.
    let reject = serde_json::json!({
        "result": false,
        "playerID": "ghost",
        "clientID": uuid::Uuid::new_v4(),
    });
    responder
        .send_direct(
            &reply_to,
            Bytes::from(serde_json::to_vec(&reject).unwrap()),
            Properties::reply("ancient-history-7"),
        )
        .await
        .unwrap();

    join.await.unwrap().expect("stale reject must not count");
    assert_eq!(anna.peer.game_state().await, GameState::Waiting);
}

#[tokio::test]
async fn duplicate_disconnects_fire_the_handler_once() {
    let broker = MemoryBroker::new();
    let recorder = Recorder::new();
    let peers = test_helpers::fill_lobby(&broker, &[recorder.clone()]).await;

    let dana_client = peers[3].peer.client_id();
    peers[3].peer.leave().await.unwrap();

    // A confused peer re-broadcasts dana's departure twice more.
    let body = serde_json::json!({
        "playerID": "dana",
        "clientID": dana_client.to_string(),
        "reason": "LEAVE",
    });
    for _ in 0..2 {
        broker
            .endpoint()
            .publish(
                "disconnect",
                Bytes::from(serde_json::to_vec(&body).unwrap()),
                Properties::default(),
            )
            .await
            .unwrap();
    }

    wait_until("departure processed", || {
        let anna = peers[0].peer.clone();
        async move { anna.players().await.len() == 3 }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(recorder.count_of("disconnected:dana:"), 1);
}
