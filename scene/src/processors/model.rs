//! Render model preparation.

use std::any::Any;

use glam::Mat4;

use crate::components::ModelComponent;
use crate::entity::EntityId;
use crate::processor::{DrawError, Processor, ProcessorFlow, TrackedEntities};
use crate::time::GameTime;
use crate::transform::TransformNode;
use crate::world::World;

/// Render-ready view of one model entity, refreshed every draw before
/// it is read.
#[derive(Debug, Clone, Default)]
pub struct RenderModel {
    pub world_matrix: Mat4,
    /// World-space matrix per skeleton node, in [`ModelComponent::nodes`]
    /// order.
    pub node_matrices: Vec<Mat4>,
}

pub struct ModelProcessor {
    tracked: TrackedEntities<RenderModel>,
}

impl ModelProcessor {
    pub const ORDER: i32 = -100;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }

    pub fn render_model(&self, entity: EntityId) -> Option<&RenderModel> {
        self.tracked.data(entity)
    }
}

impl Default for ModelProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for ModelProcessor {
    fn name(&self) -> &'static str {
        "model"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<TransformNode>(world.registry());
        self.tracked.require::<ModelComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        self.tracked
            .check(world, entity, force_remove, |_| RenderModel::default());
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn draw(&mut self, world: &mut World, _time: &GameTime) -> Result<(), DrawError> {
        for (entity, render_model) in self.tracked.iter_enabled_mut() {
            let world_matrix = match world.transform(entity) {
                Some(node) => node.world_matrix(),
                None => continue,
            };
            render_model.world_matrix = world_matrix;
            render_model.node_matrices.clear();
            if let Some(model) = world.component::<ModelComponent>(entity) {
                render_model
                    .node_matrices
                    .extend(model.nodes.iter().map(|n| world_matrix * n.transform));
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
