//! Property tests over the membership store: arbitrary interleavings of
//! votes, confirmations, departures and restorations must keep the
//! buckets disjoint and the capacity arithmetic honest.

use htttp_peer::protocol::{ClientId, PlayerId};
use htttp_peer::register::PlayerRegister;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Vote(u8),
    Confirm(u8),
    MarkMissing(u8),
    Remove(u8),
    Rejoin(u8),
    DropMissing,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Vote),
        (0u8..6).prop_map(Op::Confirm),
        (0u8..6).prop_map(Op::MarkMissing),
        (0u8..6).prop_map(Op::Remove),
        (0u8..6).prop_map(Op::Rejoin),
        Just(Op::DropMissing),
    ]
}

fn player(index: u8) -> PlayerId {
    PlayerId::new(format!("robot-{index}"))
}

proptest! {
    #[test]
    fn buckets_stay_disjoint_under_any_interleaving(ops in proptest::collection::vec(op_strategy(), 1..64)) {
        let mut register = PlayerRegister::new();
        // One stable client per player, plus fresh ones for rejoins.
        let clients: Vec<ClientId> = (0..6).map(|_| ClientId::generate()).collect();

        for op in ops {
            match op {
                Op::Vote(i) => register.record_vote(player(i), clients[i as usize]),
                Op::Confirm(i) => {
                    register.confirm(&player(i), clients[i as usize]);
                }
                Op::MarkMissing(i) => {
                    register.mark_missing(&player(i));
                }
                Op::Remove(i) => register.remove(&player(i), clients[i as usize]),
                Op::Rejoin(i) => {
                    // A new process claims the identity.
                    register.confirm(&player(i), ClientId::generate());
                }
                Op::DropMissing => register.drop_missing(),
            }

            // No player is ever both confirmed and missing.
            for index in 0..6 {
                let id = player(index);
                prop_assert!(
                    !(register.is_confirmed(&id) && register.is_missing(&id)),
                    "player {id} is in two buckets"
                );
            }

            // Occupancy never undercounts the confirmed set.
            let probe = PlayerId::new("probe");
            prop_assert!(register.occupancy_with(&probe) > register.confirmed_len().saturating_sub(1));
        }
    }

    #[test]
    fn retained_state_survives_any_number_of_crashes(crashes in 1usize..8) {
        let mut register = PlayerRegister::new();
        let id = player(0);
        register.confirm(&id, ClientId::generate());
        register.get_mut(&id).unwrap().has_found_object = true;
        register.get_mut(&id).unwrap().team_number = 1;

        for _ in 0..crashes {
            register.mark_missing(&id);
            register.confirm(&id, ClientId::generate());
        }

        let state = register.get(&id).unwrap();
        prop_assert!(state.has_found_object);
        prop_assert_eq!(state.team_number, 1);
    }
}
