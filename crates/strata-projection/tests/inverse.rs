//! Property test: applying the inverse returned by `apply_reversible`
//! restores the exact prior state, and a rejected operation leaves its
//! working copy untouched.

use std::sync::Arc;

use proptest::prelude::*;
use strata_core::{
    Action, BlockId, BlockOffset, Entity, EntityId, ItemId, Location, Mutation, MutableEntity,
    MutableRegion, Region, RegionId, TickContext, TickId,
};
use strata_test_utils::fixtures::*;
use strata_test_utils::{at, MockWorldReader, DIRT, STONE};

const CHEST: (i32, i32, i32) = (0, 1, 0);
const COIN: ItemId = ItemId(9);

fn arb_block() -> impl Strategy<Value = BlockId> {
    prop_oneof![Just(BlockId::AIR), Just(STONE), Just(DIRT)]
}

fn arb_mutation() -> impl Strategy<Value = Box<dyn Mutation>> {
    let chest = at(CHEST.0, CHEST.1, CHEST.2);
    prop_oneof![
        (0..4i32, arb_block(), arb_block()).prop_map(|(x, from, to)| {
            Box::new(ReplaceBlock::new(at(x, 0, 0), from, to)) as Box<dyn Mutation>
        }),
        (0..4u32).prop_map(move |count| {
            Box::new(StoreItems {
                location: chest,
                item: COIN,
                count,
            }) as Box<dyn Mutation>
        }),
        (0..4u32).prop_map(move |count| {
            Box::new(TakeItems {
                location: chest,
                item: COIN,
                count,
            }) as Box<dyn Mutation>
        }),
        (0..4i32, arb_block()).prop_map(|(x, block)| {
            Box::new(SpreadBlock::new(at(x, 0, 0), block, (1, 0, 0), 2)) as Box<dyn Mutation>
        }),
    ]
}

fn arb_action() -> impl Strategy<Value = Box<dyn Action>> {
    let e = EntityId(1);
    prop_oneof![
        (-4i8..=4, -4i8..=4).prop_map(move |(dx, dy)| {
            Box::new(MoveBy::new(e, f32::from(dx) * 0.25, f32::from(dy), 0.0)) as Box<dyn Action>
        }),
        any::<u8>().prop_map(move |amount| {
            Box::new(Damage { entity: e, amount }) as Box<dyn Action>
        }),
        (0..4u32).prop_map(move |count| {
            Box::new(GiveItems {
                entity: e,
                item: COIN,
                count,
            }) as Box<dyn Action>
        }),
        (0..4u32).prop_map(move |count| {
            Box::new(TakeFromEntity {
                entity: e,
                item: COIN,
                count,
            }) as Box<dyn Action>
        }),
        Just(()).prop_map(move |()| {
            Box::new(PlaceFromInventory {
                entity: e,
                item: COIN,
                block: STONE,
                location: at(0, 0, 0),
            }) as Box<dyn Action>
        }),
    ]
}

fn region(blocks: &[BlockId], stored: u32) -> Arc<Region> {
    let mut region = Region::empty(RegionId::new(0, 0, 0));
    for (x, block) in blocks.iter().enumerate() {
        region.set_block(BlockOffset::new(x as u8, 0, 0), *block);
    }
    let chest = at(CHEST.0, CHEST.1, CHEST.2).offset();
    region.set_inventory(chest, Some(inventory_with(COIN, stored)));
    Arc::new(region)
}

proptest! {
    #[test]
    fn mutation_inverse_restores_region(
        blocks in prop::collection::vec(arb_block(), 4),
        stored in 0u32..4,
        mutation in arb_mutation(),
    ) {
        let before = region(&blocks, stored);
        let reader = MockWorldReader::new();
        let mut ctx = TickContext::new(TickId(1), &reader);

        let mut working = MutableRegion::new(Arc::clone(&before));
        match mutation.apply_reversible(&mut ctx, &mut working) {
            Some(inverse) => {
                let mut undo = MutableRegion::new(working.freeze());
                prop_assert!(inverse.apply(&mut ctx, &mut undo));
                prop_assert_eq!(&*undo.freeze(), &*before);
            }
            None => prop_assert!(Arc::ptr_eq(&working.freeze(), &before)),
        }
    }

    #[test]
    fn action_inverse_restores_entity(
        health in 0u8..=100,
        held in 0u32..4,
        action in arb_action(),
    ) {
        let mut entity = Entity::new(EntityId(1), Location::new(0.5, 1.0, 0.5));
        entity.health = health;
        entity.inventory = inventory_with(COIN, held);
        let before = Arc::new(entity);
        let reader = MockWorldReader::new();
        let mut ctx = TickContext::new(TickId(1), &reader);

        let mut working = MutableEntity::new(Arc::clone(&before));
        match action.apply_reversible(&mut ctx, &mut working) {
            Some(inverse) => {
                let mut undo = MutableEntity::new(working.freeze());
                prop_assert!(inverse.apply(&mut ctx, &mut undo));
                prop_assert_eq!(&*undo.freeze(), &*before);
            }
            None => prop_assert!(Arc::ptr_eq(&working.freeze(), &before)),
        }
    }
}
