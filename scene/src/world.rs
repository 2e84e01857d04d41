//! The scene world: entity records, component bags, the transform
//! graph, and scene membership.
//!
//! Structural changes triggered from processor hooks are queued as
//! [`WorldOp`]s and drained by the [`crate::EntityManager`] once the
//! current hook returns. This replaces reentrant change listeners: a
//! hook never observes another hook running above it on the stack.

use std::any::Any;
use std::collections::{HashSet, VecDeque};

use fixedbitset::FixedBitSet;

use crate::component::{Component, ComponentKey, ComponentRegistry};
use crate::entity::{EntityId, EntityRecord, EntityStore};
use crate::transform::{HierarchyError, HierarchyEvent, NodeId, TransformGraph, TransformNode};

use aster_core::{CollectionEvent, TrackingCollection};

/// A deferred membership or state operation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WorldOp {
    /// Register an entity with the scene.
    Add(EntityId),
    /// Deregister an entity; `detach` also unlinks it from its parent.
    Remove { entity: EntityId, detach: bool },
    /// Re-evaluate an entity against all processor filters.
    Check(EntityId),
    /// Change an entity's enabled state. `inherited` marks propagation
    /// from an ancestor rather than a direct request.
    SetEnabled {
        entity: EntityId,
        enabled: bool,
        inherited: bool,
    },
    /// A transform graph link changed.
    Hierarchy(HierarchyEvent),
}

pub struct World {
    registry: ComponentRegistry,
    entities: EntityStore,
    transforms: TransformGraph,
    members: TrackingCollection<EntityId>,
    member_set: HashSet<EntityId>,
    pending: VecDeque<WorldOp>,
    transform_key: ComponentKey,
}

impl World {
    pub(crate) fn new(mut registry: ComponentRegistry) -> Self {
        let transform_key = registry.register::<TransformNode>();
        Self {
            registry,
            entities: EntityStore::new(),
            transforms: TransformGraph::new(),
            members: TrackingCollection::new(),
            member_set: HashSet::new(),
            pending: VecDeque::new(),
            transform_key,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Creates a live entity with an identity transform node. The
    /// entity is not part of the scene until registered.
    pub fn spawn(&mut self, name: &str) -> EntityId {
        let mut key_mask = FixedBitSet::with_capacity(self.registry.len());
        key_mask.insert(self.transform_key.index());
        let record = EntityRecord {
            name: name.to_string(),
            components: Vec::new(),
            key_mask,
            node: NodeId::dangling(),
            flags: 0,
        };
        let entity = self.entities.spawn(record);
        let node = self.transforms.spawn(entity);
        if let Some(record) = self.entities.get_mut(entity) {
            record.node = node;
        }
        entity
    }

    /// Frees an entity and its transform node. Children are detached,
    /// not freed; cascading teardown is the manager's job.
    pub(crate) fn despawn(&mut self, entity: EntityId) {
        if let Some(record) = self.entities.despawn(entity) {
            self.transforms.despawn(record.node);
        }
        self.member_set.remove(&entity);
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn name(&self, entity: EntityId) -> Option<&str> {
        self.entities.get(entity).map(|r| r.name.as_str())
    }

    /// Live entity count, registered or not.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Ids of all live entities, registered or not.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|(id, _)| id).collect()
    }

    // --- components ---

    /// Inserts or replaces a component, returning the previous value.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or the component type is not
    /// registered.
    pub fn set_component<C: Component>(&mut self, entity: EntityId, component: C) -> Option<C> {
        let key = self.registry.expect_key::<C>();
        let was_member = self.is_member(entity);
        let record = match self.entities.get_mut(entity) {
            Some(record) => record,
            None => panic!("cannot set component '{}' on dead entity {}", C::NAME, entity),
        };
        record.key_mask.grow(key.index() + 1);
        record.key_mask.insert(key.index());
        let boxed: Box<dyn Any + Send + Sync> = Box::new(component);
        let old = match record.components.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                let old = std::mem::replace(&mut slot.1, boxed);
                old.downcast::<C>().ok().map(|b| *b)
            }
            None => {
                record.components.push((key, boxed));
                None
            }
        };
        if was_member {
            self.pending.push_back(WorldOp::Check(entity));
        }
        old
    }

    /// Removes a component, returning it. `None` when the entity is
    /// dead or does not carry it.
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        let key = self.registry.key_of::<C>()?;
        let was_member = self.is_member(entity);
        let record = self.entities.get_mut(entity)?;
        let position = record.components.iter().position(|(k, _)| *k == key)?;
        let (_, boxed) = record.components.remove(position);
        record.key_mask.set(key.index(), false);
        if was_member {
            self.pending.push_back(WorldOp::Check(entity));
        }
        boxed.downcast::<C>().ok().map(|b| *b)
    }

    pub fn component<C: Component>(&self, entity: EntityId) -> Option<&C> {
        let key = self.registry.key_of::<C>()?;
        let record = self.entities.get(entity)?;
        record
            .components
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, boxed)| boxed.downcast_ref::<C>())
    }

    pub fn component_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        let key = self.registry.key_of::<C>()?;
        let record = self.entities.get_mut(entity)?;
        record
            .components
            .iter_mut()
            .find(|(k, _)| *k == key)
            .and_then(|(_, boxed)| boxed.downcast_mut::<C>())
    }

    pub fn has_component<C: Component>(&self, entity: EntityId) -> bool {
        self.component::<C>(entity).is_some()
    }

    pub fn key_mask(&self, entity: EntityId) -> Option<&FixedBitSet> {
        self.entities.get(entity).map(|r| &r.key_mask)
    }

    // --- transforms ---

    pub fn node_of(&self, entity: EntityId) -> Option<NodeId> {
        self.entities.get(entity).map(|r| r.node)
    }

    pub fn transform(&self, entity: EntityId) -> Option<&TransformNode> {
        self.transforms.node(self.node_of(entity)?)
    }

    pub fn transform_mut(&mut self, entity: EntityId) -> Option<&mut TransformNode> {
        let node = self.node_of(entity)?;
        self.transforms.node_mut(node)
    }

    pub fn transforms(&self) -> &TransformGraph {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformGraph {
        &mut self.transforms
    }

    /// Links `child`'s transform under `parent`'s. Fails without
    /// mutation on dead entities, double parenting, or cycles.
    pub fn attach(&mut self, parent: EntityId, child: EntityId) -> Result<(), HierarchyError> {
        let parent = self.node_of(parent).unwrap_or_else(NodeId::dangling);
        let child = self.node_of(child).unwrap_or_else(NodeId::dangling);
        let result = self.transforms.attach(parent, child);
        self.pump_hierarchy_events();
        result
    }

    /// Unlinks `child`'s transform from `parent`'s.
    pub fn detach(&mut self, parent: EntityId, child: EntityId) -> Result<(), HierarchyError> {
        let parent = self.node_of(parent).unwrap_or_else(NodeId::dangling);
        let child = self.node_of(child).unwrap_or_else(NodeId::dangling);
        let result = self.transforms.detach(parent, child);
        self.pump_hierarchy_events();
        result
    }

    /// Moves `child` under `parent`, or to the roots for `None`.
    pub fn set_parent(
        &mut self,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> Result<(), HierarchyError> {
        let child = self.node_of(child).unwrap_or_else(NodeId::dangling);
        let parent = match parent {
            Some(parent) => Some(self.node_of(parent).unwrap_or_else(NodeId::dangling)),
            None => None,
        };
        let result = self.transforms.set_parent(child, parent);
        self.pump_hierarchy_events();
        result
    }

    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        let parent = self.transform(entity)?.parent()?;
        self.transforms.entity_of(parent)
    }

    pub fn children_of(&self, entity: EntityId) -> Vec<EntityId> {
        match self.transform(entity) {
            Some(node) => node
                .children()
                .iter()
                .filter_map(|&child| self.transforms.entity_of(child))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The entity and all transform descendants, pre-order.
    pub fn subtree_of(&self, entity: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            if !self.is_alive(current) {
                continue;
            }
            out.push(current);
            let mut children = self.children_of(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    // --- membership ---

    pub fn is_member(&self, entity: EntityId) -> bool {
        self.member_set.contains(&entity)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    pub(crate) fn add_member(&mut self, entity: EntityId) -> bool {
        if !self.member_set.insert(entity) {
            return false;
        }
        self.members.push(entity);
        true
    }

    pub(crate) fn remove_member(&mut self, entity: EntityId) -> bool {
        if !self.member_set.remove(&entity) {
            return false;
        }
        self.members.remove(&entity);
        true
    }

    pub(crate) fn drain_member_events(&mut self) -> Vec<CollectionEvent<EntityId>> {
        self.members.drain_events().collect()
    }

    // --- enabled state ---

    /// Whether the entity is enabled for processing. Both the direct
    /// and the inherited disabled flag must be clear.
    pub fn is_effectively_enabled(&self, entity: EntityId) -> bool {
        self.entities
            .get(entity)
            .map(|r| r.is_effectively_enabled())
            .unwrap_or(false)
    }

    pub(crate) fn flags(&self, entity: EntityId) -> u32 {
        self.entities.get(entity).map(|r| r.flags).unwrap_or(0)
    }

    pub(crate) fn set_flag_bits(&mut self, entity: EntityId, bits: u32) {
        if let Some(record) = self.entities.get_mut(entity) {
            record.flags |= bits;
        }
    }

    pub(crate) fn clear_flag_bits(&mut self, entity: EntityId, bits: u32) {
        if let Some(record) = self.entities.get_mut(entity) {
            record.flags &= !bits;
        }
    }

    // --- pending operations ---

    /// Queues an entity for scene registration on the next drain.
    pub fn request_add(&mut self, entity: EntityId) {
        self.pending.push_back(WorldOp::Add(entity));
    }

    /// Queues an entity for scene deregistration on the next drain.
    pub fn request_remove(&mut self, entity: EntityId) {
        self.pending.push_back(WorldOp::Remove {
            entity,
            detach: true,
        });
    }

    pub(crate) fn queue(&mut self, op: WorldOp) {
        self.pending.push_back(op);
    }

    pub(crate) fn pop_op(&mut self) -> Option<WorldOp> {
        self.pending.pop_front()
    }

    /// Moves queued transform graph link events into the operation
    /// queue.
    pub(crate) fn pump_hierarchy_events(&mut self) {
        for event in self.transforms.take_events() {
            self.pending.push_back(WorldOp::Hierarchy(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{LightComponent, ModelComponent};
    use glam::Vec3;

    fn world() -> World {
        let mut registry = ComponentRegistry::new();
        registry.register::<LightComponent>();
        registry.register::<ModelComponent>();
        World::new(registry)
    }

    #[test]
    fn spawn_creates_transform_node() {
        let mut world = world();
        let entity = world.spawn("thing");
        assert!(world.is_alive(entity));
        assert_eq!(world.name(entity), Some("thing"));
        assert!(world.transform(entity).is_some());
        assert_eq!(world.transform(entity).unwrap().entity(), entity);
    }

    #[test]
    fn set_component_replaces_and_returns_old() {
        let mut world = world();
        let entity = world.spawn("lamp");
        assert!(world
            .set_component(entity, LightComponent::directional(Vec3::ONE, 1.0))
            .is_none());
        let old = world.set_component(entity, LightComponent::directional(Vec3::ONE, 2.0));
        assert_eq!(old.unwrap().intensity, 1.0);
        assert_eq!(world.component::<LightComponent>(entity).unwrap().intensity, 2.0);
    }

    #[test]
    fn remove_component_clears_mask_bit() {
        let mut world = world();
        let entity = world.spawn("lamp");
        let key = world.registry().expect_key::<LightComponent>();
        world.set_component(entity, LightComponent::default());
        assert!(world.key_mask(entity).unwrap().contains(key.index()));
        assert!(world.remove_component::<LightComponent>(entity).is_some());
        assert!(!world.key_mask(entity).unwrap().contains(key.index()));
        assert!(world.remove_component::<LightComponent>(entity).is_none());
    }

    #[test]
    #[should_panic(expected = "dead entity")]
    fn set_component_on_dead_entity_panics() {
        let mut world = world();
        let entity = world.spawn("gone");
        world.despawn(entity);
        world.set_component(entity, LightComponent::default());
    }

    #[test]
    fn attach_and_children_roundtrip() {
        let mut world = world();
        let parent = world.spawn("parent");
        let child = world.spawn("child");
        world.attach(parent, child).unwrap();
        assert_eq!(world.parent_of(child), Some(parent));
        assert_eq!(world.children_of(parent), vec![child]);
        assert_eq!(world.subtree_of(parent), vec![parent, child]);
    }

    #[test]
    fn subtree_is_preorder() {
        let mut world = world();
        let a = world.spawn("a");
        let b = world.spawn("b");
        let c = world.spawn("c");
        let d = world.spawn("d");
        world.attach(a, b).unwrap();
        world.attach(a, c).unwrap();
        world.attach(b, d).unwrap();
        assert_eq!(world.subtree_of(a), vec![a, b, d, c]);
    }
}
