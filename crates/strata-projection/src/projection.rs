//! Client-side speculative projection.
//!
//! The projection holds the client's copy of every loaded region and
//! entity. Local actions apply immediately and record how to undo
//! themselves; authoritative batches from the server are reconciled by
//! rolling everything speculative back, applying the server's updates and
//! replaying whatever the server has not confirmed yet.
//!
//! ```text
//! Local:     [A1][A2][A3]          reverse stack: A1' A2' A3'
//!              │
//! Server:    confirms 1, sends U
//!              │
//! Reconcile: undo A3' A2' A1'  →  apply U  →  replay A2 A3
//!                                             reverse stack: A2' A3'
//! ```
//!
//! Single-threaded: callers on several threads must serialize access.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use strata_core::{
    Action, CommitNumber, Entity, EntityId, Exports, Mutation, MutableEntity, MutableRegion,
    ProjectionError, Region, RegionId, TickContext, TickId, WorldReader,
};
use tracing::{debug, error, trace};

use crate::listener::ProjectionListener;
use crate::reverse::{Operation, ReverseStack};

// ── LocalWorld ─────────────────────────────────────────────────────

/// The client's loaded regions and entities.
#[derive(Debug, Default)]
struct LocalWorld {
    regions: IndexMap<RegionId, Arc<Region>>,
    entities: IndexMap<EntityId, Arc<Entity>>,
}

impl WorldReader for LocalWorld {
    fn region(&self, id: RegionId) -> Option<Arc<Region>> {
        self.regions.get(&id).cloned()
    }

    fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.entities.get(&id).cloned()
    }
}

/// Result of a plain (non-reversible) application.
enum Outcome {
    Applied,
    Rejected,
    Missing,
}

impl LocalWorld {
    fn mutate_reversible(
        &mut self,
        tick: TickId,
        mutation: &dyn Mutation,
        changes: &mut ChangeSet,
    ) -> Option<(Box<dyn Mutation>, Exports)> {
        let target = mutation.target();
        let mut handle = MutableRegion::new(Arc::clone(self.regions.get(&target)?));
        let mut ctx = TickContext::new(tick, &*self);
        let inverse = mutation.apply_reversible(&mut ctx, &mut handle)?;
        let exports = ctx.into_exports();
        changes.touch_region(&self.regions, target);
        self.regions.insert(target, handle.freeze());
        Some((inverse, exports))
    }

    fn act_reversible(
        &mut self,
        tick: TickId,
        action: &dyn Action,
        changes: &mut ChangeSet,
    ) -> Option<(Box<dyn Action>, Exports)> {
        let target = action.target();
        let mut handle = MutableEntity::new(Arc::clone(self.entities.get(&target)?));
        let mut ctx = TickContext::new(tick, &*self);
        let inverse = action.apply_reversible(&mut ctx, &mut handle)?;
        let exports = ctx.into_exports();
        changes.touch_entity(&self.entities, target);
        self.entities.insert(target, handle.freeze());
        Some((inverse, exports))
    }

    fn apply_reversible(
        &mut self,
        tick: TickId,
        op: &Operation,
        changes: &mut ChangeSet,
    ) -> Option<(Operation, Exports)> {
        match op {
            Operation::Mutation(m) => self
                .mutate_reversible(tick, &**m, changes)
                .map(|(inverse, exports)| (Operation::Mutation(inverse), exports)),
            Operation::Action(a) => self
                .act_reversible(tick, &**a, changes)
                .map(|(inverse, exports)| (Operation::Action(inverse), exports)),
        }
    }

    /// Apply without recording an inverse. Emitted operations are
    /// discarded.
    fn apply(&mut self, tick: TickId, op: &Operation, changes: &mut ChangeSet) -> Outcome {
        match op {
            Operation::Mutation(m) => {
                let target = m.target();
                let Some(current) = self.regions.get(&target) else {
                    return Outcome::Missing;
                };
                let mut handle = MutableRegion::new(Arc::clone(current));
                let mut ctx = TickContext::new(tick, &*self);
                if !m.apply(&mut ctx, &mut handle) {
                    return Outcome::Rejected;
                }
                drop(ctx);
                changes.touch_region(&self.regions, target);
                self.regions.insert(target, handle.freeze());
                Outcome::Applied
            }
            Operation::Action(a) => {
                let target = a.target();
                let Some(current) = self.entities.get(&target) else {
                    return Outcome::Missing;
                };
                let mut handle = MutableEntity::new(Arc::clone(current));
                let mut ctx = TickContext::new(tick, &*self);
                if !a.apply(&mut ctx, &mut handle) {
                    return Outcome::Rejected;
                }
                drop(ctx);
                changes.touch_entity(&self.entities, target);
                self.entities.insert(target, handle.freeze());
                Outcome::Applied
            }
        }
    }
}

// ── ChangeSet ──────────────────────────────────────────────────────

/// Value of every unit touched during one projection call, as it was
/// before the call.
#[derive(Default)]
struct ChangeSet {
    regions: IndexMap<RegionId, Option<Arc<Region>>>,
    entities: IndexMap<EntityId, Option<Arc<Entity>>>,
}

impl ChangeSet {
    fn touch_region(&mut self, current: &IndexMap<RegionId, Arc<Region>>, id: RegionId) {
        self.regions
            .entry(id)
            .or_insert_with(|| current.get(&id).cloned());
    }

    fn touch_entity(&mut self, current: &IndexMap<EntityId, Arc<Entity>>, id: EntityId) {
        self.entities
            .entry(id)
            .or_insert_with(|| current.get(&id).cloned());
    }

    /// Report every touched unit whose value is no longer the same
    /// instance.
    fn notify(self, world: &LocalWorld, listener: &mut impl ProjectionListener) {
        for (id, before) in self.regions {
            match (before, world.regions.get(&id)) {
                (Some(before), Some(now)) if Arc::ptr_eq(&before, now) => {}
                (_, Some(now)) => listener.region_changed(id, now),
                (Some(_), None) => listener.region_unloaded(id),
                (None, None) => {}
            }
        }
        for (id, before) in self.entities {
            match (before, world.entities.get(&id)) {
                (Some(before), Some(now)) if Arc::ptr_eq(&before, now) => {}
                (_, Some(now)) => listener.entity_changed(now),
                (Some(_), None) => listener.entity_unloaded(id),
                (None, None) => {}
            }
        }
    }
}

// ── SpeculativeProjection ──────────────────────────────────────────

/// An unconfirmed local commit: the actions recorded under it, in
/// application order.
struct LocalCommit {
    commit: CommitNumber,
    entity: EntityId,
    actions: Vec<Box<dyn Action>>,
}

/// What a rebase did, for the caller's summary.
struct Rebase {
    undone: usize,
    dropped: Vec<CommitNumber>,
}

/// A client's optimistic view of the world.
pub struct SpeculativeProjection<L = ()> {
    world: LocalWorld,
    reverse: ReverseStack,
    commits: VecDeque<LocalCommit>,
    last_commit: CommitNumber,
    merge_open: bool,
    tick: TickId,
    poisoned: bool,
    listener: L,
}

impl SpeculativeProjection<()> {
    /// An empty projection without a listener.
    pub fn new() -> Self {
        Self::with_listener(())
    }
}

impl Default for SpeculativeProjection<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ProjectionListener> SpeculativeProjection<L> {
    /// An empty projection reporting to `listener`.
    pub fn with_listener(listener: L) -> Self {
        Self {
            world: LocalWorld::default(),
            reverse: ReverseStack::new(),
            commits: VecDeque::new(),
            last_commit: CommitNumber(0),
            merge_open: false,
            tick: TickId(0),
            poisoned: false,
            listener,
        }
    }

    /// Load (or replace) a region with authoritative content.
    ///
    /// Pending local changes are rolled back before the region is swapped
    /// in and replayed on top of it afterwards, exactly as a reconcile
    /// that confirms nothing would.
    pub fn loaded_region(&mut self, region: Arc<Region>) -> Result<(), ProjectionError> {
        self.ensure_healthy()?;
        let mut changes = ChangeSet::default();
        let id = region.address();
        let tick = self.tick;
        let rebase = self.rebase(tick, CommitNumber(0), &mut changes, |world, changes| {
            changes.touch_region(&world.regions, id);
            world.regions.insert(id, region);
            Ok(())
        })?;
        self.finish(changes, &rebase.dropped);
        Ok(())
    }

    /// Load (or replace) an entity with authoritative state. Pending local
    /// changes are rebased as in [`loaded_region`](Self::loaded_region).
    pub fn loaded_entity(&mut self, entity: Arc<Entity>) -> Result<(), ProjectionError> {
        self.ensure_healthy()?;
        let mut changes = ChangeSet::default();
        let id = entity.id;
        let tick = self.tick;
        let rebase = self.rebase(tick, CommitNumber(0), &mut changes, |world, changes| {
            changes.touch_entity(&world.entities, id);
            world.entities.insert(id, entity);
            Ok(())
        })?;
        self.finish(changes, &rebase.dropped);
        Ok(())
    }

    /// Apply a local action now, ahead of the server.
    ///
    /// Secondary operations it emits are applied immediately, breadth
    /// first. Returns the commit the change was recorded under, or `None`
    /// if the action was rejected (or its entity is not loaded); a
    /// rejected action changes nothing and does not consume a commit
    /// number.
    ///
    /// If the previous local change was made to the same entity, has not
    /// been sealed, and `action` can replace it, the change is recorded
    /// under the previous commit instead of a new one.
    pub fn apply_local_action(
        &mut self,
        action: Box<dyn Action>,
    ) -> Result<Option<CommitNumber>, ProjectionError> {
        self.ensure_healthy()?;
        let entity = action.target();
        let merge = self.merge_open
            && self.commits.back().is_some_and(|last| {
                last.entity == entity
                    && last
                        .actions
                        .last()
                        .is_some_and(|previous| action.can_replace_previous(&**previous))
            });

        let mut changes = ChangeSet::default();
        let Some(inverses) = self.apply_chain(&*action, &mut changes) else {
            trace!(%entity, ?action, "local action rejected");
            return Ok(None);
        };

        let commit = match self.commits.back_mut() {
            Some(last) if merge => {
                last.actions.push(action);
                last.commit
            }
            _ => {
                self.last_commit = self.last_commit.next();
                self.commits.push_back(LocalCommit {
                    commit: self.last_commit,
                    entity,
                    actions: vec![action],
                });
                self.last_commit
            }
        };
        for inverse in inverses {
            self.reverse.push(commit, inverse);
        }
        self.merge_open = true;
        changes.notify(&self.world, &mut self.listener);
        Ok(Some(commit))
    }

    /// Apply `root` and everything it emits; returns the inverses in
    /// application order, or `None` if `root` itself did not apply.
    fn apply_chain(&mut self, root: &dyn Action, changes: &mut ChangeSet) -> Option<Vec<Operation>> {
        let tick = self.tick.next();
        let (inverse, exports) = self.world.act_reversible(tick, root, changes)?;
        let mut inverses = vec![Operation::Action(inverse)];
        let mut pending = VecDeque::new();
        enqueue_exports(&mut pending, exports);
        while let Some(op) = pending.pop_front() {
            match self.world.apply_reversible(tick, &op, changes) {
                Some((inverse, exports)) => {
                    inverses.push(inverse);
                    enqueue_exports(&mut pending, exports);
                }
                None => trace!(?op, "secondary operation dropped"),
            }
        }
        Some(inverses)
    }

    /// Stop the next local action from folding into the current commit.
    pub fn seal_last_local_change(&mut self) {
        self.merge_open = false;
    }

    /// Reconcile with an authoritative batch from the server.
    ///
    /// 1. Undo every speculative change, newest first. Commits up to
    ///    `last_confirmed` are forgotten.
    /// 2. Unload the regions in `unload_regions` and the entities in
    ///    `unload_entities`.
    /// 3. Apply `updates` in order; anything they emit is discarded.
    ///    Updates for units that are not loaded are skipped.
    /// 4. Replay the remaining commits in order by re-running their
    ///    actions, secondaries included. An action that is now rejected is
    ///    dropped together with everything it would have emitted, and its
    ///    commit is reported through
    ///    [`local_action_dropped`](ProjectionListener::local_action_dropped).
    /// 5. Notify the listener of every unit that ended up different.
    ///
    /// Returns the number of entries left on the reverse stack.
    ///
    /// A failing undo or a rejected update means the client no longer
    /// agrees with the server about the baseline; the projection is
    /// poisoned and refuses all further work.
    pub fn apply_committed_mutations(
        &mut self,
        tick: TickId,
        unload_regions: &[RegionId],
        unload_entities: &[EntityId],
        updates: Vec<Operation>,
        last_confirmed: CommitNumber,
    ) -> Result<usize, ProjectionError> {
        self.ensure_healthy()?;
        let mut changes = ChangeSet::default();
        let rebase = self.rebase(tick, last_confirmed, &mut changes, |world, changes| {
            for &id in unload_regions {
                changes.touch_region(&world.regions, id);
                world.regions.shift_remove(&id);
            }
            for &id in unload_entities {
                changes.touch_entity(&world.entities, id);
                world.entities.shift_remove(&id);
            }
            for update in &updates {
                match world.apply(tick, update, changes) {
                    Outcome::Applied => {}
                    Outcome::Missing => {
                        trace!(%tick, ?update, "authoritative update for unloaded target skipped");
                    }
                    Outcome::Rejected => {
                        return Err(match update {
                            Operation::Mutation(m) => {
                                ProjectionError::AuthoritativeMutationRejected {
                                    region: m.target(),
                                }
                            }
                            Operation::Action(a) => {
                                ProjectionError::AuthoritativeActionRejected { entity: a.target() }
                            }
                        });
                    }
                }
            }
            Ok(())
        })?;
        self.finish(changes, &rebase.dropped);

        debug!(
            %tick,
            reversed = rebase.undone,
            authoritative = updates.len(),
            dropped = rebase.dropped.len(),
            pending = self.reverse.len(),
            "reconciled with authority"
        );
        Ok(self.reverse.len())
    }

    /// Undo all speculation, change the baseline, then replay the commits
    /// after `last_confirmed` on top of it.
    fn rebase<F>(
        &mut self,
        tick: TickId,
        last_confirmed: CommitNumber,
        changes: &mut ChangeSet,
        baseline: F,
    ) -> Result<Rebase, ProjectionError>
    where
        F: FnOnce(&mut LocalWorld, &mut ChangeSet) -> Result<(), ProjectionError>,
    {
        let mut undone = 0usize;
        while let Some(entry) = self.reverse.pop() {
            if !matches!(
                self.world.apply(self.tick, &entry.inverse, changes),
                Outcome::Applied
            ) {
                return Err(self.poison(ProjectionError::ReverseFailed {
                    commit: entry.commit,
                }));
            }
            undone += 1;
        }

        let open = if self.merge_open {
            self.commits.back().map(|c| c.commit)
        } else {
            None
        };
        self.commits.retain(|c| c.commit > last_confirmed);

        if let Err(err) = baseline(&mut self.world, changes) {
            return Err(self.poison(err));
        }
        self.tick = tick;

        let mut dropped = Vec::new();
        for mut local in std::mem::take(&mut self.commits) {
            let commit = local.commit;
            let recorded = local.actions.len();
            local
                .actions
                .retain(|action| match self.apply_chain(&**action, changes) {
                    Some(inverses) => {
                        for inverse in inverses {
                            self.reverse.push(commit, inverse);
                        }
                        true
                    }
                    None => {
                        trace!(%commit, ?action, "local change dropped on replay");
                        false
                    }
                });
            if local.actions.len() < recorded {
                dropped.push(commit);
            }
            if !local.actions.is_empty() {
                self.commits.push_back(local);
            }
        }

        self.merge_open = open.is_some() && self.commits.back().map(|c| c.commit) == open;
        Ok(Rebase { undone, dropped })
    }

    fn finish(&mut self, changes: ChangeSet, dropped: &[CommitNumber]) {
        changes.notify(&self.world, &mut self.listener);
        for &commit in dropped {
            self.listener.local_action_dropped(commit);
        }
    }

    fn ensure_healthy(&self) -> Result<(), ProjectionError> {
        if self.poisoned {
            Err(ProjectionError::Poisoned)
        } else {
            Ok(())
        }
    }

    fn poison(&mut self, err: ProjectionError) -> ProjectionError {
        self.poisoned = true;
        error!(error = %err, "projection desynchronized from authority");
        err
    }

    /// A loaded region, including speculative changes.
    pub fn region(&self, id: RegionId) -> Option<&Arc<Region>> {
        self.world.regions.get(&id)
    }

    /// A loaded entity, including speculative changes.
    pub fn entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        self.world.entities.get(&id)
    }

    /// Number of undo entries not yet confirmed by the server.
    pub fn pending_reverse_count(&self) -> usize {
        self.reverse.len()
    }

    /// Number of distinct unconfirmed commits.
    pub fn pending_commit_count(&self) -> usize {
        self.reverse.commit_count()
    }

    /// The most recently assigned commit number; `CommitNumber(0)` before
    /// the first local change.
    pub fn last_commit(&self) -> CommitNumber {
        self.last_commit
    }

    /// Tick of the last authoritative batch applied.
    pub fn current_tick(&self) -> TickId {
        self.tick
    }

    /// Whether an invariant violation has disabled the projection.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The listener.
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// The listener, mutably.
    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }
}

fn enqueue_exports(pending: &mut VecDeque<Operation>, exports: Exports) {
    pending.extend(exports.mutations.into_iter().map(Operation::Mutation));
    pending.extend(exports.actions.into_iter().map(Operation::Action));
}
