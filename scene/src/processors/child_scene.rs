//! Nested scene stepping.
//!
//! An entity carrying a [`ChildSceneComponent`] hosts a complete scene
//! of its own. This processor steps that scene's update and draw along
//! with the outer frame and stops the check chain for the carrying
//! entity, keeping the nested world invisible to outer processors.
//!
//! The nested draw goes through [`crate::SceneInstance::draw`], so a
//! broken child scene logs its failure without aborting the outer
//! frame.

use std::any::Any;

use crate::components::ChildSceneComponent;
use crate::entity::EntityId;
use crate::processor::{DrawError, Processor, ProcessorFlow, TrackedEntities};
use crate::time::GameTime;
use crate::world::World;

pub struct ChildSceneProcessor {
    tracked: TrackedEntities<()>,
}

impl ChildSceneProcessor {
    pub const ORDER: i32 = -400;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }
}

impl Default for ChildSceneProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for ChildSceneProcessor {
    fn name(&self) -> &'static str {
        "child_scene"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<ChildSceneComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        self.tracked.check(world, entity, force_remove, |_| ());
        if self.tracked.contains(entity) {
            ProcessorFlow::StopChain
        } else {
            ProcessorFlow::Continue
        }
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn update(&mut self, world: &mut World, time: &GameTime) {
        let entities: Vec<EntityId> = self
            .tracked
            .iter_enabled()
            .map(|(entity, _)| entity)
            .collect();
        for entity in entities {
            if let Some(component) = world.component_mut::<ChildSceneComponent>(entity) {
                component.instance.update(time);
            }
        }
    }

    fn draw(&mut self, world: &mut World, time: &GameTime) -> Result<(), DrawError> {
        let entities: Vec<EntityId> = self
            .tracked
            .iter_enabled()
            .map(|(entity, _)| entity)
            .collect();
        for entity in entities {
            if let Some(component) = world.component_mut::<ChildSceneComponent>(entity) {
                component.instance.draw(time);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
