//! View and projection matrix preparation.

use std::any::Any;

use glam::Mat4;

use crate::components::{CameraComponent, Projection};
use crate::entity::EntityId;
use crate::processor::{DrawError, Processor, ProcessorFlow, TrackedEntities};
use crate::time::GameTime;
use crate::transform::TransformNode;
use crate::world::World;

/// Render-ready matrices for one camera entity, refreshed every draw.
#[derive(Debug, Clone, Default)]
pub struct RenderCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

pub struct CameraProcessor {
    tracked: TrackedEntities<RenderCamera>,
}

impl CameraProcessor {
    pub const ORDER: i32 = -200;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }

    pub fn render_camera(&self, entity: EntityId) -> Option<&RenderCamera> {
        self.tracked.data(entity)
    }
}

impl Default for CameraProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn projection_matrix(camera: &CameraComponent) -> Mat4 {
    match camera.projection {
        Projection::Perspective { fov_y, near, far } => {
            Mat4::perspective_rh(fov_y, camera.aspect, near, far)
        }
        Projection::Orthographic { height, near, far } => {
            let half_height = height * 0.5;
            let half_width = half_height * camera.aspect;
            Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
        }
    }
}

impl Processor for CameraProcessor {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<TransformNode>(world.registry());
        self.tracked.require::<CameraComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        self.tracked
            .check(world, entity, force_remove, |_| RenderCamera::default());
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn draw(&mut self, world: &mut World, _time: &GameTime) -> Result<(), DrawError> {
        for (entity, render_camera) in self.tracked.iter_enabled_mut() {
            let world_matrix = match world.transform(entity) {
                Some(node) => node.world_matrix(),
                None => continue,
            };
            let camera = match world.component::<CameraComponent>(entity) {
                Some(camera) => camera,
                None => continue,
            };
            render_camera.view = world_matrix.inverse();
            render_camera.projection = projection_matrix(camera);
            render_camera.view_projection = render_camera.projection * render_camera.view;
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
