//! Light data preparation.

use std::any::Any;

use glam::Vec3;

use crate::components::{LightComponent, LightKind};
use crate::entity::EntityId;
use crate::processor::{DrawError, Processor, ProcessorFlow, TrackedEntities};
use crate::time::GameTime;
use crate::transform::TransformNode;
use crate::world::World;

/// World-space light parameters, refreshed every draw.
#[derive(Debug, Clone)]
pub struct RenderLight {
    pub position: Vec3,
    /// Forward axis of the entity, world space. Meaningful for
    /// directional lights.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
}

impl Default for RenderLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            color: Vec3::ONE,
            intensity: 1.0,
            kind: LightKind::Directional,
        }
    }
}

pub struct LightProcessor {
    tracked: TrackedEntities<RenderLight>,
}

impl LightProcessor {
    pub const ORDER: i32 = -150;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }

    pub fn light(&self, entity: EntityId) -> Option<&RenderLight> {
        self.tracked.data(entity)
    }

    /// Lights of currently enabled entities.
    pub fn active_lights(&self) -> impl Iterator<Item = (EntityId, &RenderLight)> {
        self.tracked.iter_enabled()
    }
}

impl Default for LightProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for LightProcessor {
    fn name(&self) -> &'static str {
        "light"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<TransformNode>(world.registry());
        self.tracked.require::<LightComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        self.tracked
            .check(world, entity, force_remove, |_| RenderLight::default());
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn draw(&mut self, world: &mut World, _time: &GameTime) -> Result<(), DrawError> {
        for (entity, render_light) in self.tracked.iter_enabled_mut() {
            let node = match world.transform(entity) {
                Some(node) => node,
                None => continue,
            };
            let light = match world.component::<LightComponent>(entity) {
                Some(light) => light,
                None => continue,
            };
            let world_matrix = node.world_matrix();
            render_light.position = node.world_translation();
            render_light.direction = (-world_matrix.z_axis.truncate()).normalize_or_zero();
            render_light.color = light.color;
            render_light.intensity = light.intensity;
            render_light.kind = light.kind;
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
