// Transfer Merge Contract Tests
//
// These tests pin the per-kind merge rules. The simulation on the receiving
// side treats fluid amounts as tank levels and balances as deltas, so a
// swapped rule silently duplicates or deletes resources.

use serde_json::json;
use universal_edges::transfer::{
    BeltTransfer, EntityTransfer, FluidTransfer, PendingTransfers, PowerTransfer, TrainTransfer, Transfer,
    TransferBatch,
};

fn fluid(offset: i64, amount: Option<f64>, balanced: Option<f64>) -> Transfer {
    Transfer::Fluid(FluidTransfer {
        offset,
        name: "crude-oil".to_string(),
        temperature: None,
        amount,
        amount_balanced: balanced,
    })
}

fn power(offset: i64, energy: Option<f64>, balanced: Option<f64>) -> Transfer {
    Transfer::Power(PowerTransfer { offset, energy, amount_balanced: balanced })
}

fn train(offset: i64, id: i64, set_flow: Option<bool>) -> Transfer {
    Transfer::Train(TrainTransfer {
        offset,
        train: Some(json!({"id": id})),
        train_id: Some(id),
        set_flow,
    })
}

/// RULE: fluid `amount` is a level, the last report wins
/// RULE: fluid `amount_balanced` is a delta, reports sum
/// BREAKS: tank contents on the partner diverge from the source
#[test]
fn fluid_amount_overwrites_and_balance_sums() {
    let mut pending = PendingTransfers::new("E1");
    pending.merge(vec![
        fluid(2, Some(100.0), Some(5.0)),
        fluid(2, Some(80.0), Some(-2.0)),
        fluid(2, None, Some(1.5)),
    ]);

    let batch = pending.drain();
    assert_eq!(batch.fluid_transfers.len(), 1);
    assert_eq!(batch.fluid_transfers[0].amount, Some(80.0));
    assert_eq!(batch.fluid_transfers[0].amount_balanced, Some(4.5));
}

/// RULE: power `energy` overwrites, `amount_balanced` sums
#[test]
fn power_energy_overwrites_and_balance_sums() {
    let mut pending = PendingTransfers::new("E1");
    pending.merge(vec![power(0, Some(10.0), Some(1.0)), power(0, Some(7.0), Some(2.0))]);

    let batch = pending.drain();
    assert_eq!(batch.power_transfers[0].energy, Some(7.0));
    assert_eq!(batch.power_transfers[0].amount_balanced, Some(3.0));
}

/// RULE: different offsets never interact, whatever the arrival order
#[test]
fn offsets_merge_independently() {
    let forward = {
        let mut pending = PendingTransfers::new("E1");
        pending.merge(vec![fluid(1, Some(10.0), None), fluid(2, Some(20.0), None)]);
        pending.drain()
    };
    let reverse = {
        let mut pending = PendingTransfers::new("E1");
        pending.merge(vec![fluid(2, Some(20.0), None), fluid(1, Some(10.0), None)]);
        pending.drain()
    };

    assert_eq!(forward, reverse);
    assert_eq!(forward.fluid_transfers.len(), 2);
}

/// RULE: overwrite fields are order sensitive within one offset
#[test]
fn same_offset_overwrites_follow_arrival_order() {
    let mut a = PendingTransfers::new("E1");
    a.merge(vec![fluid(1, Some(10.0), None), fluid(1, Some(20.0), None)]);
    let mut b = PendingTransfers::new("E1");
    b.merge(vec![fluid(1, Some(20.0), None), fluid(1, Some(10.0), None)]);

    assert_eq!(a.drain().fluid_transfers[0].amount, Some(20.0));
    assert_eq!(b.drain().fluid_transfers[0].amount, Some(10.0));
}

/// RULE: one pending train per offset; a conflict keeps the newest train and flow flag
/// BREAKS: train duplicated on the partner, or a stale flow signal
#[test]
fn train_conflict_keeps_newest_request() {
    let mut pending = PendingTransfers::new("E1");
    pending.merge(vec![train(4, 1, Some(true)), train(4, 2, Some(false))]);

    let batch = pending.drain();
    assert_eq!(batch.train_transfers.len(), 1);
    assert_eq!(batch.train_transfers[0].train_id, Some(2));
    assert_eq!(batch.train_transfers[0].set_flow, Some(false));
}

/// RULE: drain hands over everything exactly once
#[test]
fn drain_empties_every_kind() {
    let mut pending = PendingTransfers::new("E1");
    pending.merge_batch(TransferBatch {
        belt_transfers: vec![BeltTransfer { offset: 1, item_stacks: Some(vec![json!("a")]), set_flow: None }],
        entity_transfers: vec![EntityTransfer {
            kind: "teleport_player".to_string(),
            player_name: "alice".to_string(),
            edge_pos: [1.0, 0.5],
        }],
        fluid_transfers: vec![FluidTransfer { offset: 1, name: "water".to_string(), ..Default::default() }],
        power_transfers: vec![PowerTransfer { offset: 1, energy: Some(1.0), amount_balanced: None }],
        train_transfers: vec![TrainTransfer { offset: 1, set_flow: Some(true), ..Default::default() }],
    });

    let first = pending.drain();
    assert_eq!(first.len(), 5);
    assert!(pending.is_empty());
    assert!(pending.drain().is_empty());
}

/// RULE: entity transfers are never merged, only appended
#[test]
fn entities_append_in_arrival_order() {
    let mut pending = PendingTransfers::new("E1");
    for name in ["alice", "bob", "alice"] {
        pending.merge(vec![Transfer::Entity(EntityTransfer {
            kind: "teleport_player".to_string(),
            player_name: name.to_string(),
            edge_pos: [0.0, 0.0],
        })]);
    }

    let names: Vec<String> = pending.drain().entity_transfers.into_iter().map(|e| e.player_name).collect();
    assert_eq!(names, vec!["alice", "bob", "alice"]);
}
