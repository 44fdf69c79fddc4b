//! Reconciliation scenarios: speculation, confirmation, divergence and
//! desynchronization.

use std::sync::Arc;

use strata_core::{
    Action, BlockId, CommitNumber, Entity, EntityId, ItemId, Location, MutableEntity,
    ProjectionError, Region, RegionId, TickContext, TickId,
};
use strata_projection::{Operation, ProjectionListener, SpeculativeProjection};
use strata_test_utils::fixtures::*;
use strata_test_utils::{at, DIRT, STONE};

const E: EntityId = EntityId(1);
const ORIGIN: RegionId = RegionId { x: 0, y: 0, z: 0 };
const BRICK: ItemId = ItemId(7);

#[derive(Debug, Default)]
struct Recorder {
    regions_changed: Vec<RegionId>,
    regions_unloaded: Vec<RegionId>,
    entities_changed: Vec<EntityId>,
    entities_unloaded: Vec<EntityId>,
    dropped: Vec<CommitNumber>,
}

impl ProjectionListener for Recorder {
    fn region_changed(&mut self, id: RegionId, _region: &Arc<Region>) {
        self.regions_changed.push(id);
    }

    fn region_unloaded(&mut self, id: RegionId) {
        self.regions_unloaded.push(id);
    }

    fn entity_changed(&mut self, entity: &Arc<Entity>) {
        self.entities_changed.push(entity.id);
    }

    fn entity_unloaded(&mut self, id: EntityId) {
        self.entities_unloaded.push(id);
    }

    fn local_action_dropped(&mut self, commit: CommitNumber) {
        self.dropped.push(commit);
    }
}

/// Applies, but records an undo that can never succeed.
#[derive(Debug)]
struct Irreversible {
    entity: EntityId,
}

impl Action for Irreversible {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, _entity: &mut MutableEntity) -> bool {
        true
    }

    fn apply_reversible(
        &self,
        _ctx: &mut TickContext<'_>,
        _entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        Some(Box::new(RejectAction {
            entity: self.entity,
        }))
    }
}

fn client(bricks: u32) -> SpeculativeProjection<Recorder> {
    let mut p = SpeculativeProjection::with_listener(Recorder::default());
    p.loaded_region(Arc::new(Region::empty(ORIGIN))).unwrap();
    let mut e = Entity::new(E, Location::default());
    e.inventory = inventory_with(BRICK, bricks);
    p.loaded_entity(Arc::new(e)).unwrap();
    *p.listener_mut() = Recorder::default();
    p
}

fn block(p: &SpeculativeProjection<Recorder>, x: i32) -> BlockId {
    p.region(ORIGIN).unwrap().block(at(x, 0, 0).offset())
}

fn place_brick(x: i32) -> Box<PlaceFromInventory> {
    Box::new(PlaceFromInventory {
        entity: E,
        item: BRICK,
        block: STONE,
        location: at(x, 0, 0),
    })
}

#[test]
fn partial_confirmation_replays_the_rest() {
    let mut p = client(0);
    let a1 = MoveBy::new(E, 1.0, 0.0, 0.0);
    assert_eq!(p.apply_local_action(Box::new(a1)).unwrap(), Some(CommitNumber(1)));
    p.seal_last_local_change();
    let a2 = Damage { entity: E, amount: 10 };
    assert_eq!(p.apply_local_action(Box::new(a2)).unwrap(), Some(CommitNumber(2)));
    assert_eq!(p.pending_reverse_count(), 2);

    // The server resolved the move further than predicted.
    let authoritative = Operation::action(RestoreLocation {
        entity: E,
        location: Location::new(2.0, 0.0, 0.0),
        redo: None,
    });
    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[], vec![authoritative], CommitNumber(1))
        .unwrap();

    assert_eq!(pending, 1);
    assert_eq!(p.pending_commit_count(), 1);
    let e = p.entity(E).unwrap();
    assert_eq!(e.location, Location::new(2.0, 0.0, 0.0));
    assert_eq!(e.health, 90);
    assert!(p.listener().dropped.is_empty());
    assert_eq!(p.current_tick(), TickId(1));
}

#[test]
fn full_confirmation_empties_the_stack() {
    let mut p = client(0);
    let mv = MoveBy::new(E, 0.0, 1.0, 0.0);
    p.apply_local_action(Box::new(mv)).unwrap();
    let pending = p
        .apply_committed_mutations(
            TickId(1),
            &[],
            &[],
            vec![Operation::action(mv)],
            CommitNumber(1),
        )
        .unwrap();
    assert_eq!(pending, 0);
    assert_eq!(p.entity(E).unwrap().location, Location::new(0.0, 1.0, 0.0));
}

#[test]
fn merged_moves_confirm_as_one_commit() {
    let mut p = client(0);
    for _ in 0..3 {
        assert_eq!(
            p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))).unwrap(),
            Some(CommitNumber(1))
        );
    }
    assert_eq!(p.pending_reverse_count(), 3);

    let update = Operation::action(MoveBy::new(E, 3.0, 0.0, 0.0));
    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[], vec![update], CommitNumber(1))
        .unwrap();
    assert_eq!(pending, 0);
    assert_eq!(p.entity(E).unwrap().location, Location::new(3.0, 0.0, 0.0));

    // The confirmed commit is closed; the next move opens a new one.
    assert_eq!(
        p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))).unwrap(),
        Some(CommitNumber(2))
    );
}

#[test]
fn unconfirmed_merge_stays_open_across_reconcile() {
    let mut p = client(0);
    p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))).unwrap();
    p.apply_committed_mutations(TickId(1), &[], &[], Vec::new(), CommitNumber(0))
        .unwrap();
    assert_eq!(
        p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))).unwrap(),
        Some(CommitNumber(1))
    );
    assert_eq!(p.entity(E).unwrap().location, Location::new(2.0, 0.0, 0.0));
}

#[test]
fn lost_race_drops_the_local_change() {
    let mut p = client(1);
    let take = TakeFromEntity {
        entity: E,
        item: BRICK,
        count: 1,
    };
    assert_eq!(p.apply_local_action(Box::new(take)).unwrap(), Some(CommitNumber(1)));
    assert_eq!(p.entity(E).unwrap().inventory.count(BRICK), 0);

    // Someone else took the brick first; our commit is not confirmed.
    let theirs = vec![Operation::action(take)];
    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[], theirs, CommitNumber(0))
        .unwrap();
    assert_eq!(pending, 0);
    assert_eq!(p.entity(E).unwrap().inventory.count(BRICK), 0);
    assert_eq!(p.listener().dropped, vec![CommitNumber(1)]);
    assert!(!p.is_poisoned());
}

#[test]
fn secondary_placement_snaps_back_when_the_spot_is_taken() {
    let mut p = client(2);
    p.apply_local_action(place_brick(4)).unwrap();
    assert_eq!(block(&p, 4), STONE);
    assert_eq!(p.pending_reverse_count(), 2);
    p.listener_mut().regions_changed.clear();

    let theirs = Operation::mutation(place(at(4, 0, 0), DIRT));
    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[], vec![theirs], CommitNumber(0))
        .unwrap();

    // The action itself still applies; only its placement is refused, as
    // it would be if the action ran now for the first time.
    assert_eq!(pending, 1);
    assert_eq!(p.pending_commit_count(), 1);
    assert_eq!(block(&p, 4), DIRT);
    assert_eq!(p.entity(E).unwrap().inventory.count(BRICK), 1);
    assert!(p.listener().dropped.is_empty());
    assert_eq!(p.listener().regions_changed, vec![ORIGIN]);
}

#[test]
fn placement_is_not_replayed_when_the_item_is_gone() {
    let mut p = client(1);
    assert_eq!(p.apply_local_action(place_brick(4)).unwrap(), Some(CommitNumber(1)));
    assert_eq!(block(&p, 4), STONE);

    // The server gave our only brick to someone else first.
    let theft = Operation::action(TakeFromEntity {
        entity: E,
        item: BRICK,
        count: 1,
    });
    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[], vec![theft], CommitNumber(0))
        .unwrap();

    assert_eq!(pending, 0);
    assert_eq!(p.pending_commit_count(), 0);
    assert_eq!(block(&p, 4), BlockId::AIR);
    assert_eq!(p.entity(E).unwrap().inventory.count(BRICK), 0);
    assert_eq!(p.listener().dropped, vec![CommitNumber(1)]);
    assert!(!p.is_poisoned());
}

#[test]
fn unloaded_region_drops_only_the_placement() {
    let mut p = client(1);
    p.apply_local_action(place_brick(4)).unwrap();

    let pending = p
        .apply_committed_mutations(TickId(1), &[ORIGIN], &[], Vec::new(), CommitNumber(0))
        .unwrap();

    assert_eq!(pending, 1);
    assert!(p.region(ORIGIN).is_none());
    assert_eq!(p.entity(E).unwrap().inventory.count(BRICK), 0);
    assert_eq!(p.listener().regions_unloaded, vec![ORIGIN]);
    assert!(p.listener().dropped.is_empty());
}

#[test]
fn unloaded_entity_drops_its_pending_changes() {
    let mut p = client(0);
    p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))).unwrap();

    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[E], Vec::new(), CommitNumber(0))
        .unwrap();

    assert_eq!(pending, 0);
    assert!(p.entity(E).is_none());
    assert!(!p.is_poisoned());
    assert_eq!(p.listener().entities_unloaded, vec![E]);
    assert_eq!(p.listener().dropped, vec![CommitNumber(1)]);

    // The next reconcile has nothing left to undo.
    assert_eq!(
        p.apply_committed_mutations(TickId(2), &[], &[], Vec::new(), CommitNumber(0)),
        Ok(0)
    );
}

#[test]
fn reloading_a_region_keeps_pending_placements() {
    let mut p = client(1);
    p.apply_local_action(place_brick(4)).unwrap();
    p.listener_mut().regions_changed.clear();

    let mut fresh = Region::empty(ORIGIN);
    fresh.set_block(at(9, 0, 0).offset(), DIRT);
    p.loaded_region(Arc::new(fresh)).unwrap();

    assert_eq!(block(&p, 4), STONE);
    assert_eq!(block(&p, 9), DIRT);
    assert_eq!(p.pending_reverse_count(), 2);
    assert_eq!(p.listener().regions_changed, vec![ORIGIN]);

    // The rebased undo log still reverses cleanly under confirmation.
    let confirmed = vec![
        Operation::action(TakeFromEntity {
            entity: E,
            item: BRICK,
            count: 1,
        }),
        Operation::mutation(place(at(4, 0, 0), STONE)),
    ];
    let pending = p
        .apply_committed_mutations(TickId(1), &[], &[], confirmed, CommitNumber(1))
        .unwrap();
    assert_eq!(pending, 0);
    assert_eq!(block(&p, 4), STONE);
    assert_eq!(p.entity(E).unwrap().inventory.count(BRICK), 0);
    assert!(!p.is_poisoned());
}

#[test]
fn reloading_an_entity_replays_on_its_new_state() {
    let mut p = client(0);
    p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))).unwrap();

    p.loaded_entity(Arc::new(Entity::new(E, Location::new(5.0, 0.0, 0.0))))
        .unwrap();

    assert_eq!(p.entity(E).unwrap().location, Location::new(6.0, 0.0, 0.0));
    assert_eq!(p.pending_commit_count(), 1);
    assert!(p.listener().dropped.is_empty());
}

#[test]
fn updates_for_unloaded_targets_are_skipped() {
    let mut p = client(0);
    let far = Operation::mutation(place(at(100, 0, 0), STONE));
    let ghost = Operation::action(Damage {
        entity: EntityId(42),
        amount: 1,
    });
    let pending = p
        .apply_committed_mutations(TickId(3), &[], &[], vec![far, ghost], CommitNumber(0))
        .unwrap();
    assert_eq!(pending, 0);
    assert!(!p.is_poisoned());
    assert!(p.listener().regions_changed.is_empty());
}

#[test]
fn notifications_are_batched_per_unit() {
    let mut p = client(0);
    let updates = vec![
        Operation::mutation(place(at(1, 0, 0), STONE)),
        Operation::mutation(place(at(2, 0, 0), STONE)),
        Operation::mutation(break_block(at(1, 0, 0), STONE)),
    ];
    p.apply_committed_mutations(TickId(1), &[], &[], updates, CommitNumber(0))
        .unwrap();
    assert_eq!(p.listener().regions_changed, vec![ORIGIN]);
    assert!(p.listener().entities_changed.is_empty());
    assert_eq!(block(&p, 1), BlockId::AIR);
    assert_eq!(block(&p, 2), STONE);
}

#[test]
fn rejected_authoritative_update_poisons() {
    let mut p = client(0);
    let impossible = Operation::mutation(break_block(at(1, 0, 0), STONE));
    let err = p
        .apply_committed_mutations(TickId(1), &[], &[], vec![impossible], CommitNumber(0))
        .unwrap_err();
    assert_eq!(
        err,
        ProjectionError::AuthoritativeMutationRejected { region: ORIGIN }
    );
    assert!(p.is_poisoned());

    assert_eq!(
        p.apply_local_action(Box::new(MoveBy::new(E, 1.0, 0.0, 0.0))),
        Err(ProjectionError::Poisoned)
    );
    assert_eq!(
        p.apply_committed_mutations(TickId(2), &[], &[], Vec::new(), CommitNumber(0)),
        Err(ProjectionError::Poisoned)
    );
    assert_eq!(
        p.loaded_region(Arc::new(Region::empty(ORIGIN))),
        Err(ProjectionError::Poisoned)
    );
}

#[test]
fn rejected_authoritative_action_names_the_entity() {
    let mut p = client(0);
    let err = p
        .apply_committed_mutations(
            TickId(1),
            &[],
            &[],
            vec![Operation::action(RejectAction { entity: E })],
            CommitNumber(0),
        )
        .unwrap_err();
    assert_eq!(err, ProjectionError::AuthoritativeActionRejected { entity: E });
}

#[test]
fn failed_undo_poisons() {
    let mut p = client(0);
    p.apply_local_action(Box::new(Irreversible { entity: E })).unwrap();

    let err = p
        .apply_committed_mutations(TickId(1), &[], &[], Vec::new(), CommitNumber(0))
        .unwrap_err();
    assert_eq!(
        err,
        ProjectionError::ReverseFailed {
            commit: CommitNumber(1)
        }
    );
    assert!(p.is_poisoned());
    assert_eq!(
        p.loaded_entity(Arc::new(Entity::new(E, Location::default()))),
        Err(ProjectionError::Poisoned)
    );
}
