//! Script execution.
//!
//! Runs before transform propagation so transform writes made by
//! scripts land in the same frame's world matrices. Scripts receive
//! `&mut World`; membership changes they request go through the
//! pending-operation queue and apply after the stage returns.

use std::any::Any;

use crate::components::{ScriptComponent, SharedScript};
use crate::entity::EntityId;
use crate::processor::{Processor, ProcessorFlow, TrackedEntities};
use crate::time::GameTime;
use crate::world::World;

pub struct ScriptProcessor {
    tracked: TrackedEntities<()>,
}

impl ScriptProcessor {
    pub const ORDER: i32 = -500;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }
}

impl Default for ScriptProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for ScriptProcessor {
    fn name(&self) -> &'static str {
        "script"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<ScriptComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        self.tracked.check(world, entity, force_remove, |_| ());
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn update(&mut self, world: &mut World, time: &GameTime) {
        // Snapshot the script lists first: scripts may mutate component
        // bags, and additions take effect next frame.
        let mut queue: Vec<(EntityId, SharedScript)> = Vec::new();
        let entities: Vec<EntityId> = self
            .tracked
            .iter_enabled()
            .map(|(entity, _)| entity)
            .collect();
        for &entity in &entities {
            if let Some(component) = world.component::<ScriptComponent>(entity) {
                for script in component.scripts.iter() {
                    queue.push((entity, script.clone()));
                }
            }
        }

        for (entity, script) in queue {
            script.lock().update(entity, world, time);
        }

        for entity in entities {
            if let Some(component) = world.component_mut::<ScriptComponent>(entity) {
                component.scripts.clear_events();
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
