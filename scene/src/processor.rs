//! Processor trait and entity tracking helpers.
//!
//! A processor watches entities whose key masks cover its required
//! component keys, keeps per-entity associated data for the matches,
//! and runs an update and an optional draw stage each frame.
//!
//! Update failures are bugs and surface as panics. Draw failures are
//! recoverable: they travel as [`DrawError`] values and are logged at
//! the scene boundary without tearing down the frame.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use fixedbitset::FixedBitSet;
use thiserror::Error;

use crate::component::{Component, ComponentRegistry};
use crate::entity::EntityId;
use crate::time::GameTime;
use crate::world::World;

/// Chain control returned from [`Processor::check_entity`].
///
/// `StopChain` prevents processors later in the order from seeing the
/// entity during this membership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorFlow {
    Continue,
    StopChain,
}

/// A recoverable draw-stage failure.
#[derive(Debug, Clone, Error)]
#[error("draw failed in {processor}: {message}")]
pub struct DrawError {
    pub processor: &'static str,
    pub message: String,
}

impl DrawError {
    pub fn new(processor: &'static str, message: impl Into<String>) -> Self {
        Self {
            processor,
            message: message.into(),
        }
    }
}

/// A per-component-combination processing stage.
///
/// Implementations are registered with the [`crate::EntityManager`]
/// either explicitly or through component registry factories. Hooks
/// receive `&mut World`; cascading membership changes must go through
/// the world's pending-operation queue rather than back into the
/// manager.
pub trait Processor: Any + Send + Sync {
    fn name(&self) -> &'static str;

    /// Sort key for update/draw/check order. Lower runs earlier.
    /// Processors with equal order keep registration order.
    fn order(&self) -> i32;

    /// Called once when the processor joins a manager, before it sees
    /// any entity. Component keys are resolved here.
    fn on_registered(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Called when the processor leaves a manager.
    fn on_unregistered(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Re-evaluates one entity against this processor's filter,
    /// adding or dropping it from the tracked set. `force_remove`
    /// drops the entity regardless of its current component mask.
    fn check_entity(&mut self, world: &mut World, entity: EntityId, force_remove: bool)
        -> ProcessorFlow;

    /// Notifies a change of an entity's effective enabled state.
    fn set_entity_enabled(&mut self, world: &mut World, entity: EntityId, enabled: bool) {
        let _ = (world, entity, enabled);
    }

    /// Notifies a parent/child link change in the transform graph.
    fn on_hierarchy_changed(&mut self, world: &mut World, event: crate::transform::HierarchyEvent) {
        let _ = (world, event);
    }

    /// Per-frame simulation stage. Panics propagate.
    fn update(&mut self, world: &mut World, time: &GameTime) {
        let _ = (world, time);
    }

    /// Per-frame render-preparation stage. Errors abort the manager's
    /// draw pass and are logged at the scene boundary.
    fn draw(&mut self, world: &mut World, time: &GameTime) -> Result<(), DrawError> {
        let _ = (world, time);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Outcome of re-evaluating one entity against a tracked set.
pub enum TrackEvent<D> {
    /// The entity started matching and was added.
    Added,
    /// The entity stopped matching (or was force-removed); its
    /// associated data is handed back for teardown.
    Removed(D),
    /// No transition.
    Unchanged,
}

/// Matching-entity bookkeeping shared by all processors.
///
/// Holds the required key mask, the matching entities with their
/// associated data, and the subset that is currently enabled.
pub struct TrackedEntities<D> {
    required: FixedBitSet,
    matching: HashMap<EntityId, D>,
    enabled: HashSet<EntityId>,
}

impl<D> Default for TrackedEntities<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> TrackedEntities<D> {
    pub fn new() -> Self {
        Self {
            required: FixedBitSet::new(),
            matching: HashMap::new(),
            enabled: HashSet::new(),
        }
    }

    /// Adds `C` to the required component set. Call from
    /// [`Processor::on_registered`].
    pub fn require<C: Component>(&mut self, registry: &ComponentRegistry) {
        let key = registry.expect_key::<C>();
        self.required.grow(key.index() + 1);
        self.required.insert(key.index());
    }

    pub fn required(&self) -> &FixedBitSet {
        &self.required
    }

    /// Whether the entity's key mask covers every required key.
    pub fn matches(&self, world: &World, entity: EntityId) -> bool {
        match world.key_mask(entity) {
            Some(mask) => self.required.is_subset(mask),
            None => false,
        }
    }

    /// Re-evaluates one entity, creating associated data via `make` on
    /// a match transition.
    pub fn check(
        &mut self,
        world: &World,
        entity: EntityId,
        force_remove: bool,
        make: impl FnOnce(&World) -> D,
    ) -> TrackEvent<D> {
        let matches = !force_remove && self.matches(world, entity);
        let tracked = self.matching.contains_key(&entity);
        if matches && !tracked {
            self.matching.insert(entity, make(world));
            if world.is_effectively_enabled(entity) {
                self.enabled.insert(entity);
            }
            TrackEvent::Added
        } else if !matches && tracked {
            self.enabled.remove(&entity);
            match self.matching.remove(&entity) {
                Some(data) => TrackEvent::Removed(data),
                None => TrackEvent::Unchanged,
            }
        } else {
            TrackEvent::Unchanged
        }
    }

    /// Updates the enabled subset for a tracked entity.
    pub fn set_enabled(&mut self, entity: EntityId, enabled: bool) {
        if !self.matching.contains_key(&entity) {
            return;
        }
        if enabled {
            self.enabled.insert(entity);
        } else {
            self.enabled.remove(&entity);
        }
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.matching.contains_key(&entity)
    }

    pub fn is_enabled(&self, entity: EntityId) -> bool {
        self.enabled.contains(&entity)
    }

    pub fn data(&self, entity: EntityId) -> Option<&D> {
        self.matching.get(&entity)
    }

    pub fn data_mut(&mut self, entity: EntityId) -> Option<&mut D> {
        self.matching.get_mut(&entity)
    }

    pub fn len(&self) -> usize {
        self.matching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matching.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &D)> {
        self.matching.iter().map(|(&e, d)| (e, d))
    }

    /// Iterates tracked entities whose effective enabled state is on.
    pub fn iter_enabled(&self) -> impl Iterator<Item = (EntityId, &D)> {
        self.matching
            .iter()
            .filter(|(e, _)| self.enabled.contains(e))
            .map(|(&e, d)| (e, d))
    }

    pub fn iter_enabled_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut D)> {
        let enabled = &self.enabled;
        self.matching
            .iter_mut()
            .filter(move |(e, _)| enabled.contains(e))
            .map(|(&e, d)| (e, d))
    }

    /// Tracked entity ids in unspecified order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.matching.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::EntityManager;
    use crate::components::LightComponent;

    #[test]
    fn check_tracks_match_transitions() {
        let mut manager = EntityManager::new();
        let entity = manager.spawn("lamp");
        manager.add(entity);
        manager.set_component(entity, LightComponent::default());

        let mut tracked: TrackedEntities<u32> = TrackedEntities::new();
        tracked.require::<LightComponent>(manager.world().registry());

        match tracked.check(manager.world(), entity, false, |_| 7) {
            TrackEvent::Added => {}
            _ => panic!("expected Added"),
        }
        assert!(tracked.contains(entity));
        assert!(tracked.is_enabled(entity));
        assert_eq!(tracked.data(entity), Some(&7));

        // unchanged while still matching
        match tracked.check(manager.world(), entity, false, |_| 8) {
            TrackEvent::Unchanged => {}
            _ => panic!("expected Unchanged"),
        }
        assert_eq!(tracked.data(entity), Some(&7));

        match tracked.check(manager.world(), entity, true, |_| 9) {
            TrackEvent::Removed(7) => {}
            _ => panic!("expected Removed(7)"),
        }
        assert!(!tracked.contains(entity));
    }

    #[test]
    fn set_enabled_ignores_untracked() {
        let mut tracked: TrackedEntities<()> = TrackedEntities::new();
        tracked.set_enabled(EntityId::new(0, 0), true);
        assert!(tracked.is_empty());
    }
}
