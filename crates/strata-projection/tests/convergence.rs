//! Property test: after reconciling, the client's state is the server's
//! state with the unconfirmed local actions re-applied on top.
//!
//! Other clients' operations can spend the items, take the spots or kill
//! the entity that unconfirmed local actions depend on, so replay has to
//! drop actions (and the placements they would have emitted) exactly when
//! running them again from scratch would.

use std::sync::Arc;

use proptest::prelude::*;
use strata_core::{
    Action, CommitNumber, Entity, EntityId, ItemId, Location, Region, RegionId, TickId,
};
use strata_projection::{Operation, SpeculativeProjection};
use strata_test_utils::fixtures::*;
use strata_test_utils::{at, STONE};

const HERO: EntityId = EntityId(1);
const SIDEKICK: EntityId = EntityId(2);
const ORIGIN: RegionId = RegionId { x: 0, y: 0, z: 0 };
const BRICK: ItemId = ItemId(7);

#[derive(Clone, Copy, Debug)]
enum Op {
    Move(EntityId, i8, i8),
    Hit(EntityId, u8),
    Take(EntityId),
    Place(EntityId, i32),
    Kill(EntityId),
}

impl Op {
    fn boxed(self) -> Box<dyn Action> {
        match self {
            Op::Move(e, dx, dz) => Box::new(MoveBy::new(e, f32::from(dx), 0.0, f32::from(dz))),
            Op::Hit(e, amount) => Box::new(Damage { entity: e, amount }),
            Op::Take(e) => Box::new(TakeFromEntity {
                entity: e,
                item: BRICK,
                count: 1,
            }),
            Op::Place(e, x) => Box::new(PlaceFromInventory {
                entity: e,
                item: BRICK,
                block: STONE,
                location: at(x, 0, 0),
            }),
            Op::Kill(e) => Box::new(RestoreHealth {
                entity: e,
                health: 0,
                redo: None,
            }),
        }
    }
}

fn arb_entity() -> impl Strategy<Value = EntityId> {
    prop_oneof![Just(HERO), Just(SIDEKICK)]
}

fn arb_local() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_entity(), -3i8..=3, -3i8..=3).prop_map(|(e, dx, dz)| Op::Move(e, dx, dz)),
        (arb_entity(), 1u8..=60).prop_map(|(e, amount)| Op::Hit(e, amount)),
        Just(Op::Take(HERO)),
        (0..6i32).prop_map(|x| Op::Place(HERO, x)),
    ]
}

/// Operations other clients get in first.
fn arb_foreign() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6i32).prop_map(|x| Op::Place(SIDEKICK, x)),
        Just(Op::Take(HERO)),
        Just(Op::Kill(HERO)),
        (-3i8..=3, -3i8..=3).prop_map(|(dx, dz)| Op::Move(SIDEKICK, dx, dz)),
    ]
}

fn baseline(hero_bricks: u32) -> SpeculativeProjection {
    let mut p = SpeculativeProjection::new();
    p.loaded_region(Arc::new(Region::empty(ORIGIN))).unwrap();
    for (id, bricks) in [(HERO, hero_bricks), (SIDEKICK, 3)] {
        let mut e = Entity::new(id, Location::default());
        e.inventory = inventory_with(BRICK, bricks);
        p.loaded_entity(Arc::new(e)).unwrap();
    }
    p
}

/// Run `script` the way the server would and return the resulting
/// authoritative batch: every operation that took effect, each followed
/// by the placement it emitted if that placement took effect too.
fn authority(hero_bricks: u32, script: &[Op]) -> Vec<Operation> {
    let mut server = baseline(hero_bricks);
    let mut updates = Vec::new();
    for &op in script {
        let before = Arc::clone(server.region(ORIGIN).unwrap());
        if server.apply_local_action(op.boxed()).unwrap().is_none() {
            continue;
        }
        server.seal_last_local_change();
        updates.push(Operation::Action(op.boxed()));
        if let Op::Place(_, x) = op {
            if !Arc::ptr_eq(&before, server.region(ORIGIN).unwrap()) {
                updates.push(Operation::mutation(place(at(x, 0, 0), STONE)));
            }
        }
    }
    updates
}

fn state(p: &SpeculativeProjection) -> (Vec<Entity>, Region) {
    let entities = [HERO, SIDEKICK]
        .iter()
        .map(|&id| Entity::clone(p.entity(id).unwrap()))
        .collect();
    (entities, Region::clone(p.region(ORIGIN).unwrap()))
}

proptest! {
    #[test]
    fn reconcile_converges(
        hero_bricks in 0u32..3,
        locals in prop::collection::vec(arb_local(), 1..10),
        confirm_frac in 0.0f64..=1.0,
        foreign in prop::collection::vec(arb_foreign(), 0..3),
    ) {
        let mut client = baseline(hero_bricks);
        let mut applied = Vec::new();
        for &op in &locals {
            if let Some(commit) = client.apply_local_action(op.boxed()).unwrap() {
                applied.push(op);
                prop_assert_eq!(commit, CommitNumber(applied.len() as u64));
            }
            client.seal_last_local_change();
        }
        let k = applied.len();
        let j = ((k as f64) * confirm_frac).floor() as usize;

        // The server ran our first j actions, then whatever other clients
        // sent.
        let mut script = applied[..j].to_vec();
        script.extend_from_slice(&foreign);
        let pending = client
            .apply_committed_mutations(
                TickId(1),
                &[],
                &[],
                authority(hero_bricks, &script),
                CommitNumber(j as u64),
            )
            .unwrap();

        let mut expected = baseline(hero_bricks);
        expected
            .apply_committed_mutations(
                TickId(1),
                &[],
                &[],
                authority(hero_bricks, &script),
                CommitNumber(0),
            )
            .unwrap();
        for &op in &applied[j..] {
            expected.apply_local_action(op.boxed()).unwrap();
            expected.seal_last_local_change();
        }

        prop_assert!(!client.is_poisoned());
        prop_assert_eq!(state(&client), state(&expected));
        prop_assert_eq!(pending, expected.pending_reverse_count());
        prop_assert_eq!(client.pending_commit_count(), expected.pending_commit_count());
        prop_assert!(client.pending_commit_count() <= k - j);
    }
}
