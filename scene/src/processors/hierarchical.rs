//! Scene hierarchy bookkeeping.
//!
//! Tracks every scene member, maintains the root entity set, and
//! cascades membership and enabled-state changes through transform
//! children. Cascades are queued as world operations; the manager
//! drains them after the current hook returns.

use std::any::Any;

use log::trace;

use aster_core::{CollectionAction, TrackingCollection};

use crate::entity::EntityId;
use crate::processor::{Processor, ProcessorFlow, TrackEvent, TrackedEntities};
use crate::time::GameTime;
use crate::transform::{HierarchyEvent, TransformNode};
use crate::world::{World, WorldOp};

pub struct HierarchicalProcessor {
    tracked: TrackedEntities<()>,
    /// Members whose transform has no parent, in registration order.
    roots: TrackingCollection<EntityId>,
}

impl HierarchicalProcessor {
    pub const ORDER: i32 = -1000;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
            roots: TrackingCollection::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }

    /// Current root entities of the scene.
    pub fn roots(&self) -> &[EntityId] {
        self.roots.as_slice()
    }
}

impl Default for HierarchicalProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for HierarchicalProcessor {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<TransformNode>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        match self.tracked.check(world, entity, force_remove, |_| ()) {
            TrackEvent::Added => {
                if world.parent_of(entity).is_none() && !self.roots.contains(&entity) {
                    self.roots.push(entity);
                }
                // a subtree joins the scene all at once
                for child in world.children_of(entity) {
                    if !world.is_member(child) {
                        world.queue(WorldOp::Add(child));
                    }
                }
            }
            TrackEvent::Removed(()) => {
                self.roots.remove(&entity);
                for child in world.children_of(entity) {
                    if world.is_member(child) {
                        world.queue(WorldOp::Remove {
                            entity: child,
                            detach: false,
                        });
                    }
                }
            }
            TrackEvent::Unchanged => {}
        }
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
        for child in world.children_of(entity) {
            world.queue(WorldOp::SetEnabled {
                entity: child,
                enabled,
                inherited: true,
            });
        }
    }

    fn on_hierarchy_changed(&mut self, world: &mut World, event: HierarchyEvent) {
        let parent = world.transforms().entity_of(event.parent);
        let child = match world.transforms().entity_of(event.child) {
            Some(child) => child,
            None => return,
        };
        match event.action {
            CollectionAction::Add => {
                self.roots.remove(&child);
                let parent_is_member = parent.map(|p| world.is_member(p)).unwrap_or(false);
                if parent_is_member && !world.is_member(child) {
                    world.queue(WorldOp::Add(child));
                }
            }
            CollectionAction::Remove => {
                // a detached member becomes a scene root
                if world.is_member(child) && !self.roots.contains(&child) {
                    self.roots.push(child);
                }
            }
        }
    }

    fn update(&mut self, _world: &mut World, _time: &GameTime) {
        for event in self.roots.drain_events() {
            trace!("scene root {:?}: {}", event.action, event.item);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
