//! Scene membership and processor dispatch.
//!
//! The [`EntityManager`] owns the [`World`] and an ordered list of
//! processors. All structural changes funnel through the world's
//! pending-operation queue and are drained here, one hook at a time, so
//! processor hooks never observe each other mid-flight.

use std::any::TypeId;
use std::collections::HashSet;

use log::{debug, trace};

use aster_core::CollectionAction;

use crate::component::{ComponentKey, ComponentRegistry, ProcessorFactory};
use crate::components::{
    CameraComponent, ChildSceneComponent, LightComponent, ModelComponent, NodeLinkComponent,
    ScriptComponent, SpriteComponent,
};
use crate::entity::EntityId;
use crate::processor::{DrawError, Processor, ProcessorFlow};
use crate::processors::{
    CameraProcessor, ChildSceneProcessor, HierarchicalProcessor, LightProcessor, ModelProcessor,
    NodeLinkProcessor, ScriptProcessor, SpriteProcessor, TransformProcessor,
};
use crate::time::GameTime;
use crate::transform::{HierarchyError, HierarchyEvent, TransformNode};
use crate::world::{World, WorldOp};

/// Owns a scene's world and processors and drives the frame loop.
///
/// Entities are spawned into the world first and become part of the
/// scene via [`add`](Self::add). Membership changes cascade through
/// transform children and are re-evaluated against every processor's
/// component filter in processor order.
pub struct EntityManager {
    world: World,
    /// Sorted by [`Processor::order`], stable for equal orders.
    processors: Vec<Box<dyn Processor>>,
    processor_types: HashSet<TypeId>,
    /// Processors whose update/draw stages are currently switched off.
    disabled_processors: HashSet<TypeId>,
    /// Component keys whose default processors were already
    /// instantiated.
    auto_registered_keys: HashSet<ComponentKey>,
}

impl EntityManager {
    /// Creates a manager with the built-in component types registered
    /// and the hierarchy and transform processors installed.
    pub fn new() -> Self {
        let mut registry = ComponentRegistry::new();
        registry.register::<TransformNode>();
        registry.register_with_processors::<ModelComponent>(&[ModelProcessor::create]);
        registry.register_with_processors::<CameraComponent>(&[CameraProcessor::create]);
        registry.register_with_processors::<LightComponent>(&[LightProcessor::create]);
        registry.register_with_processors::<SpriteComponent>(&[SpriteProcessor::create]);
        registry.register_with_processors::<ScriptComponent>(&[ScriptProcessor::create]);
        registry.register_with_processors::<NodeLinkComponent>(&[NodeLinkProcessor::create]);
        registry.register_with_processors::<ChildSceneComponent>(&[ChildSceneProcessor::create]);

        let mut manager = Self {
            world: World::new(registry),
            processors: Vec::new(),
            processor_types: HashSet::new(),
            disabled_processors: HashSet::new(),
            auto_registered_keys: HashSet::new(),
        };
        manager.register_processor(Box::new(HierarchicalProcessor::new()));
        manager.register_processor(Box::new(TransformProcessor::new()));
        manager
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // --- processors ---

    /// Installs a processor, keeping the list sorted by order. Existing
    /// scene members are immediately evaluated against its filter.
    /// Returns `false` if a processor of the same type is already
    /// installed.
    pub fn register_processor(&mut self, mut processor: Box<dyn Processor>) -> bool {
        let type_id = processor.as_any().type_id();
        if !self.processor_types.insert(type_id) {
            return false;
        }
        processor.on_registered(&mut self.world);
        let order = processor.order();
        let position = self
            .processors
            .iter()
            .position(|p| p.order() > order)
            .unwrap_or(self.processors.len());
        debug!("registered processor '{}' (order {})", processor.name(), order);
        self.processors.insert(position, processor);

        let members: Vec<EntityId> = self.world.members().collect();
        for entity in members {
            let processor = &mut self.processors[position];
            processor.check_entity(&mut self.world, entity, false);
        }
        self.flush();
        true
    }

    /// Removes a processor, force-dropping every entity it tracks.
    pub fn unregister_processor<P: Processor>(&mut self) -> bool {
        if !self.processor_types.remove(&TypeId::of::<P>()) {
            return false;
        }
        if let Some(position) = self.processors.iter().position(|p| p.as_any().is::<P>()) {
            let mut processor = self.processors.remove(position);
            let members: Vec<EntityId> = self.world.members().collect();
            for entity in members {
                processor.check_entity(&mut self.world, entity, true);
            }
            processor.on_unregistered(&mut self.world);
            self.flush();
        }
        true
    }

    pub fn has_processor<P: Processor>(&self) -> bool {
        self.processor_types.contains(&TypeId::of::<P>())
    }

    pub fn processor<P: Processor>(&self) -> Option<&P> {
        self.processors
            .iter()
            .find_map(|p| p.as_any().downcast_ref::<P>())
    }

    pub fn processor_mut<P: Processor>(&mut self) -> Option<&mut P> {
        self.processors
            .iter_mut()
            .find_map(|p| p.as_any_mut().downcast_mut::<P>())
    }

    /// Switches a processor's update and draw stages on or off. The
    /// processor keeps tracking entities either way.
    pub fn set_processor_enabled<P: Processor>(&mut self, enabled: bool) {
        if enabled {
            self.disabled_processors.remove(&TypeId::of::<P>());
        } else {
            self.disabled_processors.insert(TypeId::of::<P>());
        }
    }

    pub fn is_processor_enabled<P: Processor>(&self) -> bool {
        !self.disabled_processors.contains(&TypeId::of::<P>())
    }

    // --- membership ---

    /// Spawns a live entity outside the scene. See [`add`](Self::add).
    pub fn spawn(&mut self, name: &str) -> EntityId {
        self.world.spawn(name)
    }

    /// Registers an entity and its transform subtree with the scene.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or has a transform parent; add the
    /// root of its hierarchy instead.
    pub fn add(&mut self, entity: EntityId) {
        assert!(
            self.world.is_alive(entity),
            "cannot add dead entity {entity} to the scene"
        );
        if let Some(parent) = self.world.parent_of(entity) {
            panic!(
                "entity {entity} is attached under {parent}; add the root of its hierarchy instead"
            );
        }
        self.world.request_add(entity);
        self.flush();
    }

    /// Registers several hierarchy roots at once.
    pub fn add_all(&mut self, entities: impl IntoIterator<Item = EntityId>) {
        for entity in entities {
            self.add(entity);
        }
    }

    /// Deregisters an entity and its subtree from the scene. The
    /// entities stay alive and keep their hierarchy links, except the
    /// top one which is detached from its parent.
    pub fn remove(&mut self, entity: EntityId) {
        self.world.request_remove(entity);
        self.flush();
    }

    /// Removes an entity from the scene and frees it together with its
    /// whole transform subtree.
    pub fn destroy(&mut self, entity: EntityId) {
        let subtree = self.world.subtree_of(entity);
        self.world.request_remove(entity);
        self.flush();
        for entity in subtree {
            self.world.despawn(entity);
        }
        self.flush();
    }

    /// Deregisters every entity from the scene. Entities stay alive and
    /// keep their hierarchy links.
    pub fn clear(&mut self) {
        let members: Vec<EntityId> = self.world.members().collect();
        for entity in members {
            self.world.queue(WorldOp::Remove {
                entity,
                detach: false,
            });
        }
        self.flush();
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.world.is_member(entity)
    }

    // --- enabled state ---

    /// Enables or disables an entity. The state cascades to transform
    /// descendants as an inherited flag that clears when this ancestor
    /// is re-enabled.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not part of the scene.
    pub fn set_enabled(&mut self, entity: EntityId, enabled: bool) {
        assert!(
            self.world.is_member(entity),
            "entity {entity} is not part of this scene"
        );
        self.world.queue(WorldOp::SetEnabled {
            entity,
            enabled,
            inherited: false,
        });
        self.flush();
    }

    /// Whether the entity is directly enabled, ignoring inherited state.
    pub fn is_enabled(&self, entity: EntityId) -> bool {
        self.world.flags(entity) & EntityId::DISABLED == 0
    }

    // --- frame loop ---

    /// Runs every processor's update stage in order, draining pending
    /// operations between stages. Panics from user code propagate.
    ///
    /// The pass runs over a snapshot of the processor list: a processor
    /// registered mid-update (auto-registration included) starts on the
    /// next frame, and an op-driven insertion cannot shift the walk onto
    /// a stage it already ran.
    pub fn update(&mut self, time: &GameTime) {
        self.flush();
        let pass: Vec<TypeId> = self
            .processors
            .iter()
            .map(|p| p.as_any().type_id())
            .collect();
        for type_id in pass {
            if self.disabled_processors.contains(&type_id) {
                continue;
            }
            let position = match self
                .processors
                .iter()
                .position(|p| p.as_any().type_id() == type_id)
            {
                Some(position) => position,
                None => continue,
            };
            {
                let processor = &mut self.processors[position];
                trace!("update '{}'", processor.name());
                processor.update(&mut self.world, time);
            }
            self.flush();
        }
    }

    /// Runs every processor's draw stage in order. The first failure
    /// aborts the pass; [`crate::SceneInstance::draw`] is the boundary
    /// that logs it.
    pub fn draw(&mut self, time: &GameTime) -> Result<(), DrawError> {
        let mut i = 0;
        while i < self.processors.len() {
            let processor = &mut self.processors[i];
            if !self.disabled_processors.contains(&processor.as_any().type_id()) {
                processor.draw(&mut self.world, time)?;
            }
            i += 1;
        }
        Ok(())
    }

    // --- world forwarding ---

    pub fn set_component<C: crate::Component>(&mut self, entity: EntityId, component: C) -> Option<C> {
        let old = self.world.set_component(entity, component);
        self.flush();
        old
    }

    pub fn remove_component<C: crate::Component>(&mut self, entity: EntityId) -> Option<C> {
        let old = self.world.remove_component::<C>(entity);
        self.flush();
        old
    }

    pub fn attach(&mut self, parent: EntityId, child: EntityId) -> Result<(), HierarchyError> {
        let result = self.world.attach(parent, child);
        self.flush();
        result
    }

    pub fn detach(&mut self, parent: EntityId, child: EntityId) -> Result<(), HierarchyError> {
        let result = self.world.detach(parent, child);
        self.flush();
        result
    }

    pub fn set_parent(
        &mut self,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> Result<(), HierarchyError> {
        let result = self.world.set_parent(child, parent);
        self.flush();
        result
    }

    // --- operation draining ---

    /// Drains the pending-operation queue until it is empty, including
    /// operations queued by the handlers themselves.
    fn flush(&mut self) {
        loop {
            self.world.pump_hierarchy_events();
            let op = match self.world.pop_op() {
                Some(op) => op,
                None => break,
            };
            match op {
                WorldOp::Add(entity) => self.do_add(entity),
                WorldOp::Remove { entity, detach } => self.do_remove(entity, detach),
                WorldOp::Check(entity) => self.do_check(entity),
                WorldOp::SetEnabled {
                    entity,
                    enabled,
                    inherited,
                } => self.do_set_enabled(entity, enabled, inherited),
                WorldOp::Hierarchy(event) => self.route_hierarchy(event),
            }
        }
    }

    fn do_add(&mut self, entity: EntityId) {
        if !self.world.is_alive(entity) || self.world.is_member(entity) {
            return;
        }
        self.auto_register_processors(entity);
        self.world.add_member(entity);
        trace!("entity {entity} joined the scene");
        self.pump_member_events();
    }

    fn do_remove(&mut self, entity: EntityId, detach: bool) {
        if !self.world.remove_member(entity) {
            return;
        }
        if detach && self.world.is_alive(entity) {
            if let Some(parent) = self.world.parent_of(entity) {
                let _ = self.world.detach(parent, entity);
            }
        }
        trace!("entity {entity} left the scene");
        self.pump_member_events();
    }

    fn do_check(&mut self, entity: EntityId) {
        if !self.world.is_member(entity) {
            return;
        }
        self.auto_register_processors(entity);
        self.check_entity_with_processors(entity, false);
    }

    fn do_set_enabled(&mut self, entity: EntityId, enabled: bool, inherited: bool) {
        if !self.world.is_alive(entity) {
            return;
        }
        let before = self.world.is_effectively_enabled(entity);
        let bit = if inherited {
            EntityId::INHERITED_DISABLED
        } else {
            EntityId::DISABLED
        };
        if enabled {
            self.world.clear_flag_bits(entity, bit);
        } else {
            self.world.set_flag_bits(entity, bit);
        }
        let after = self.world.is_effectively_enabled(entity);
        if before == after {
            return;
        }
        for i in 0..self.processors.len() {
            let processor = &mut self.processors[i];
            processor.set_entity_enabled(&mut self.world, entity, after);
        }
    }

    /// Replays a membership change through every processor's filter in
    /// order, honoring [`ProcessorFlow::StopChain`].
    fn check_entity_with_processors(&mut self, entity: EntityId, force_remove: bool) {
        for i in 0..self.processors.len() {
            let flow = {
                let processor = &mut self.processors[i];
                processor.check_entity(&mut self.world, entity, force_remove)
            };
            if flow == ProcessorFlow::StopChain {
                trace!(
                    "processor '{}' stopped the check chain for {entity}",
                    self.processors[i].name()
                );
                break;
            }
        }
    }

    fn route_hierarchy(&mut self, event: HierarchyEvent) {
        for i in 0..self.processors.len() {
            let processor = &mut self.processors[i];
            processor.on_hierarchy_changed(&mut self.world, event);
        }
    }

    fn pump_member_events(&mut self) {
        for event in self.world.drain_member_events() {
            match event.action {
                CollectionAction::Add => self.check_entity_with_processors(event.item, false),
                CollectionAction::Remove => self.check_entity_with_processors(event.item, true),
            }
        }
    }

    /// Instantiates the default processors declared for any component
    /// key this entity carries that has not been seen before.
    fn auto_register_processors(&mut self, entity: EntityId) {
        let mask = match self.world.key_mask(entity) {
            Some(mask) => mask.clone(),
            None => return,
        };
        for index in mask.ones() {
            let key = ComponentKey::from_index(index);
            if !self.auto_registered_keys.insert(key) {
                continue;
            }
            let factories: Vec<ProcessorFactory> =
                self.world.registry().info(key).factories().to_vec();
            for factory in factories {
                self.register_processor(factory());
            }
        }
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}
