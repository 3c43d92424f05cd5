//! Hot-path micro-benchmarks: wire codec and membership bookkeeping.
//! Position updates dominate steady-state traffic, so the codec paths
//! are measured on that shape.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::collections::HashMap;

use htttp_peer::protocol::codec;
use htttp_peer::protocol::{
    ClientId, GameState, JoinReply, PeerMessage, PlayerId, PositionUpdate,
};
use htttp_peer::register::PlayerRegister;

fn update_message() -> PeerMessage {
    PeerMessage::Update(PositionUpdate {
        player_id: PlayerId::from("anna"),
        player_number: 2,
        x: 1.25,
        y: -3.5,
        angle: 271.0,
        found_object: true,
    })
}

fn join_reply() -> JoinReply {
    JoinReply {
        result: true,
        player_id: PlayerId::from("anna"),
        client_id: ClientId::generate(),
        is_ready: true,
        is_joined: true,
        has_found_object: false,
        team_number: 1,
        game_state: GameState::Paused,
        player_numbers: HashMap::from([
            (PlayerId::from("anna"), 1),
            (PlayerId::from("bert"), 2),
            (PlayerId::from("cleo"), 3),
            (PlayerId::from("dana"), 4),
        ]),
        missing_players: Vec::new(),
    }
}

fn bench_codec(c: &mut Criterion) {
    let message = update_message();
    let body = codec::encode(&message).unwrap();

    c.bench_function("encode_position_update", |b| {
        b.iter(|| codec::encode(&message).unwrap());
    });
    c.bench_function("decode_position_update", |b| {
        b.iter(|| codec::decode("update", &body).unwrap());
    });

    let reply = join_reply();
    let reply_body = codec::encode_reply(&reply).unwrap();
    c.bench_function("encode_join_reply", |b| {
        b.iter(|| codec::encode_reply(&reply).unwrap());
    });
    c.bench_function("decode_join_reply", |b| {
        b.iter(|| codec::decode_reply(&reply_body).unwrap());
    });
}

fn bench_register(c: &mut Criterion) {
    let ids: Vec<PlayerId> = ["anna", "bert", "cleo", "dana"]
        .iter()
        .map(|name| PlayerId::from(*name))
        .collect();

    c.bench_function("register_fill_and_scan", |b| {
        b.iter_batched(
            PlayerRegister::new,
            |mut register| {
                for id in &ids {
                    let client = ClientId::generate();
                    register.record_vote(id.clone(), client);
                    register.confirm(id, client);
                }
                register.stale_players(10_000, 5_000)
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("register_missing_round_trip", |b| {
        b.iter_batched(
            || {
                let mut register = PlayerRegister::new();
                for id in &ids {
                    register.confirm(id, ClientId::generate());
                }
                register
            },
            |mut register| {
                register.mark_missing(&ids[2]);
                register.confirm(&ids[2], ClientId::generate())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_codec, bench_register);
criterion_main!(benches);
