//! Sprite instance preparation.

use std::any::Any;

use glam::{Mat4, Vec2, Vec4};

use crate::components::{AssetHandle, SpriteComponent};
use crate::entity::EntityId;
use crate::processor::{DrawError, Processor, ProcessorFlow, TrackedEntities};
use crate::time::GameTime;
use crate::transform::TransformNode;
use crate::world::World;

/// Render-ready sprite data, refreshed every draw.
#[derive(Debug, Clone)]
pub struct SpriteInstance {
    pub world_matrix: Mat4,
    pub size: Vec2,
    pub texture: AssetHandle,
    pub color: Vec4,
}

impl Default for SpriteInstance {
    fn default() -> Self {
        Self {
            world_matrix: Mat4::IDENTITY,
            size: Vec2::ONE,
            texture: AssetHandle::default(),
            color: Vec4::ONE,
        }
    }
}

pub struct SpriteProcessor {
    tracked: TrackedEntities<SpriteInstance>,
}

impl SpriteProcessor {
    pub const ORDER: i32 = -50;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }

    pub fn instance(&self, entity: EntityId) -> Option<&SpriteInstance> {
        self.tracked.data(entity)
    }
}

impl Default for SpriteProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for SpriteProcessor {
    fn name(&self) -> &'static str {
        "sprite"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<TransformNode>(world.registry());
        self.tracked.require::<SpriteComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        self.tracked
            .check(world, entity, force_remove, |_| SpriteInstance::default());
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn draw(&mut self, world: &mut World, _time: &GameTime) -> Result<(), DrawError> {
        for (entity, instance) in self.tracked.iter_enabled_mut() {
            let world_matrix = match world.transform(entity) {
                Some(node) => node.world_matrix(),
                None => continue,
            };
            let sprite = match world.component::<SpriteComponent>(entity) {
                Some(sprite) => *sprite,
                None => continue,
            };
            instance.world_matrix = world_matrix;
            instance.size = sprite.size;
            instance.texture = sprite.texture;
            instance.color = sprite.color;
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
