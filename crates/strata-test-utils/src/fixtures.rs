//! Reusable operation fixtures.
//!
//! A small, deliberately simple catalogue of mutations and actions that
//! exercise every path of the engine and projection:
//!
//! - [`ReplaceBlock`]: conditional block swap; the basis of place/break.
//! - [`SpreadBlock`]: places a block and emits a copy of itself one block
//!   further along, for secondary-operation scheduling.
//! - [`CopyBlockFrom`]: reads another region through the context.
//! - [`StoreItems`] / [`TakeItems`]: container inventory changes.
//! - [`CountingMutation`] / [`RejectMutation`]: call accounting.
//! - [`MoveBy`] / [`RestoreLocation`]: mergeable relative movement.
//! - [`Damage`] / [`RestoreHealth`]: health changes.
//! - [`GiveItems`] / [`TakeFromEntity`]: entity inventory changes.
//! - [`PlaceFromInventory`]: an action that emits a mutation.
//! - [`RejectAction`]: always refused.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strata_core::{
    Action, BlockAddress, BlockId, EntityId, Inventory, ItemId, Location, Mutation, MutableEntity,
    MutableRegion, TickContext,
};

// ── Region mutations ────────────────────────────────────────────

/// Swap the block at `location` from `from` to `to`.
///
/// Rejected unless the block currently is `from`. The inverse is the
/// opposite swap.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplaceBlock {
    pub location: BlockAddress,
    pub from: BlockId,
    pub to: BlockId,
}

impl ReplaceBlock {
    pub fn new(location: BlockAddress, from: BlockId, to: BlockId) -> Self {
        Self { location, from, to }
    }
}

/// Place `block` into an air block.
pub fn place(location: BlockAddress, block: BlockId) -> ReplaceBlock {
    ReplaceBlock::new(location, BlockId::AIR, block)
}

/// Break `block` back to air. Rejected if the block is not there.
pub fn break_block(location: BlockAddress, block: BlockId) -> ReplaceBlock {
    ReplaceBlock::new(location, block, BlockId::AIR)
}

impl Mutation for ReplaceBlock {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool {
        let offset = self.location.offset();
        if region.block(offset) != self.from {
            return false;
        }
        region.set_block(offset, self.to);
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        self.apply(ctx, region)
            .then(|| Box::new(ReplaceBlock::new(self.location, self.to, self.from)) as Box<dyn Mutation>)
    }
}

/// Place `block` into air at `location`, then emit another `SpreadBlock`
/// at `location + step` while `remaining > 0`.
///
/// Rejected (and nothing emitted) if the block is not air.
#[derive(Clone, Debug, PartialEq)]
pub struct SpreadBlock {
    pub location: BlockAddress,
    pub block: BlockId,
    pub step: (i32, i32, i32),
    pub remaining: u32,
}

impl SpreadBlock {
    pub fn new(location: BlockAddress, block: BlockId, step: (i32, i32, i32), remaining: u32) -> Self {
        Self {
            location,
            block,
            step,
            remaining,
        }
    }

    fn spread(&self, ctx: &mut TickContext<'_>) {
        if self.remaining > 0 {
            let (dx, dy, dz) = self.step;
            ctx.emit_mutation(Box::new(SpreadBlock {
                location: self.location.relative(dx, dy, dz),
                block: self.block,
                step: self.step,
                remaining: self.remaining - 1,
            }));
        }
    }
}

impl Mutation for SpreadBlock {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool {
        let offset = self.location.offset();
        if !region.block(offset).is_air() {
            return false;
        }
        region.set_block(offset, self.block);
        self.spread(ctx);
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        self.apply(ctx, region)
            .then(|| Box::new(break_block(self.location, self.block)) as Box<dyn Mutation>)
    }
}

/// Copy the block found at `source` (as of the start of the batch) into
/// `location`, which must be air.
///
/// `source` is resolved through the context, so it must lie in a
/// different region; a missing source region rejects the mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct CopyBlockFrom {
    pub location: BlockAddress,
    pub source: BlockAddress,
}

impl CopyBlockFrom {
    pub fn new(location: BlockAddress, source: BlockAddress) -> Self {
        Self { location, source }
    }

    fn copy(&self, ctx: &TickContext<'_>, region: &mut MutableRegion) -> Option<BlockId> {
        let source = ctx.resolve_region(self.source.region())?;
        let block = source.block(self.source.offset());
        let offset = self.location.offset();
        if block.is_air() || !region.block(offset).is_air() {
            return None;
        }
        region.set_block(offset, block);
        Some(block)
    }
}

impl Mutation for CopyBlockFrom {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool {
        self.copy(ctx, region).is_some()
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        self.copy(ctx, region)
            .map(|block| Box::new(break_block(self.location, block)) as Box<dyn Mutation>)
    }
}

/// Add items to the container inventory at `location`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreItems {
    pub location: BlockAddress,
    pub item: ItemId,
    pub count: u32,
}

impl Mutation for StoreItems {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool {
        if self.count == 0 {
            return false;
        }
        let offset = self.location.offset();
        let mut inventory = region.inventory(offset).cloned().unwrap_or_default();
        inventory.add(self.item, self.count);
        region.set_inventory(offset, Some(inventory));
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        self.apply(ctx, region).then(|| {
            Box::new(TakeItems {
                location: self.location,
                item: self.item,
                count: self.count,
            }) as Box<dyn Mutation>
        })
    }
}

/// Remove items from the container inventory at `location`. Rejected if
/// fewer than `count` are stored.
#[derive(Clone, Debug, PartialEq)]
pub struct TakeItems {
    pub location: BlockAddress,
    pub item: ItemId,
    pub count: u32,
}

impl Mutation for TakeItems {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool {
        let offset = self.location.offset();
        let mut inventory = match region.inventory(offset) {
            Some(inv) => inv.clone(),
            None => return false,
        };
        if self.count == 0 || !inventory.remove(self.item, self.count) {
            return false;
        }
        region.set_inventory(offset, Some(inventory));
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        self.apply(ctx, region).then(|| {
            Box::new(StoreItems {
                location: self.location,
                item: self.item,
                count: self.count,
            }) as Box<dyn Mutation>
        })
    }
}

/// Succeeds without changing anything and counts how often it ran.
///
/// The counter is shared so tests can observe it after the mutation has
/// been handed to the engine.
#[derive(Clone, Debug)]
pub struct CountingMutation {
    pub location: BlockAddress,
    pub calls: Arc<AtomicUsize>,
    pub accept: bool,
}

impl CountingMutation {
    pub fn new(location: BlockAddress, accept: bool) -> Self {
        Self {
            location,
            calls: Arc::new(AtomicUsize::new(0)),
            accept,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Mutation for CountingMutation {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, _region: &mut MutableRegion) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.accept
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        self.apply(ctx, region)
            .then(|| Box::new(self.clone()) as Box<dyn Mutation>)
    }
}

/// Always rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectMutation {
    pub location: BlockAddress,
}

impl Mutation for RejectMutation {
    fn location(&self) -> BlockAddress {
        self.location
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, _region: &mut MutableRegion) -> bool {
        false
    }

    fn apply_reversible(
        &self,
        _ctx: &mut TickContext<'_>,
        _region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>> {
        None
    }
}

// ── Entity actions ──────────────────────────────────────────────

/// Move an entity by a relative offset. Rejected for dead entities.
///
/// Consecutive moves of the same entity may share one local commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveBy {
    pub entity: EntityId,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl MoveBy {
    pub fn new(entity: EntityId, dx: f32, dy: f32, dz: f32) -> Self {
        Self { entity, dx, dy, dz }
    }
}

impl Action for MoveBy {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        if entity.health() == 0 {
            return false;
        }
        entity.set_location(entity.location().offset(self.dx, self.dy, self.dz));
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        let before = entity.location();
        self.apply(ctx, entity).then(|| {
            Box::new(RestoreLocation {
                entity: self.entity,
                location: before,
                redo: Some(*self),
            }) as Box<dyn Action>
        })
    }

    fn can_replace_previous(&self, previous: &dyn Action) -> bool {
        let previous: &dyn Any = previous;
        previous
            .downcast_ref::<MoveBy>()
            .is_some_and(|p| p.entity == self.entity)
    }
}

/// Put an entity back at an absolute location.
///
/// Used as the inverse of [`MoveBy`]; its own inverse is the original
/// relative move when one is recorded, so replaying it after a rollback
/// moves relative to the new baseline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestoreLocation {
    pub entity: EntityId,
    pub location: Location,
    pub redo: Option<MoveBy>,
}

impl Action for RestoreLocation {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        entity.set_location(self.location);
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        let before = entity.location();
        self.apply(ctx, entity);
        Some(match self.redo {
            Some(redo) => Box::new(redo) as Box<dyn Action>,
            None => Box::new(RestoreLocation {
                entity: self.entity,
                location: before,
                redo: None,
            }),
        })
    }
}

/// Reduce health by `amount`. Rejected for dead entities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Damage {
    pub entity: EntityId,
    pub amount: u8,
}

impl Action for Damage {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        if entity.health() == 0 {
            return false;
        }
        entity.set_health(entity.health().saturating_sub(self.amount));
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        let before = entity.health();
        self.apply(ctx, entity).then(|| {
            Box::new(RestoreHealth {
                entity: self.entity,
                health: before,
                redo: Some(*self),
            }) as Box<dyn Action>
        })
    }
}

/// Set health back to an absolute value; the inverse of [`Damage`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestoreHealth {
    pub entity: EntityId,
    pub health: u8,
    pub redo: Option<Damage>,
}

impl Action for RestoreHealth {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        entity.set_health(self.health);
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        let before = entity.health();
        self.apply(ctx, entity);
        Some(match self.redo {
            Some(redo) => Box::new(redo) as Box<dyn Action>,
            None => Box::new(RestoreHealth {
                entity: self.entity,
                health: before,
                redo: None,
            }),
        })
    }
}

/// Add items to an entity's inventory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GiveItems {
    pub entity: EntityId,
    pub item: ItemId,
    pub count: u32,
}

impl Action for GiveItems {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        if self.count == 0 {
            return false;
        }
        entity.inventory_mut().add(self.item, self.count);
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        self.apply(ctx, entity).then(|| {
            Box::new(TakeFromEntity {
                entity: self.entity,
                item: self.item,
                count: self.count,
            }) as Box<dyn Action>
        })
    }
}

/// Remove items from an entity's inventory. Rejected if too few are held.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TakeFromEntity {
    pub entity: EntityId,
    pub item: ItemId,
    pub count: u32,
}

impl Action for TakeFromEntity {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        self.count > 0 && entity.inventory_mut().remove(self.item, self.count)
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        self.apply(ctx, entity).then(|| {
            Box::new(GiveItems {
                entity: self.entity,
                item: self.item,
                count: self.count,
            }) as Box<dyn Action>
        })
    }
}

/// Spend one `item` from the entity's inventory and emit a mutation that
/// places `block` at `location`.
///
/// The placement is a secondary operation: deferred to the next tick by
/// the engine, applied immediately by the projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaceFromInventory {
    pub entity: EntityId,
    pub item: ItemId,
    pub block: BlockId,
    pub location: BlockAddress,
}

impl Action for PlaceFromInventory {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool {
        if !entity.inventory_mut().remove(self.item, 1) {
            return false;
        }
        ctx.emit_mutation(Box::new(place(self.location, self.block)));
        true
    }

    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        self.apply(ctx, entity).then(|| {
            Box::new(GiveItems {
                entity: self.entity,
                item: self.item,
                count: 1,
            }) as Box<dyn Action>
        })
    }
}

/// Always rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RejectAction {
    pub entity: EntityId,
}

impl Action for RejectAction {
    fn target(&self) -> EntityId {
        self.entity
    }

    fn apply(&self, _ctx: &mut TickContext<'_>, _entity: &mut MutableEntity) -> bool {
        false
    }

    fn apply_reversible(
        &self,
        _ctx: &mut TickContext<'_>,
        _entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>> {
        None
    }
}

/// An inventory holding `count` of `item`, for fixture setup.
pub fn inventory_with(item: ItemId, count: u32) -> Inventory {
    let mut inventory = Inventory::new();
    inventory.add(item, count);
    inventory
}
