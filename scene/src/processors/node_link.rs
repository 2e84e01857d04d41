//! Drives node-linked transforms from their target model nodes.
//!
//! Runs right after transform propagation: linked nodes were flagged as
//! special roots, so the propagation pass left them (and their
//! subtrees) alone. This stage resolves each link against the target
//! entity's freshly updated world matrix and skeleton, overwrites the
//! linked node's world matrix, and refreshes its subtree.

use std::any::Any;

use glam::Mat4;
use log::warn;

use crate::components::{ModelComponent, NodeLinkComponent};
use crate::entity::EntityId;
use crate::processor::{Processor, ProcessorFlow, TrackEvent, TrackedEntities};
use crate::time::GameTime;
use crate::transform::TransformNode;
use crate::world::World;

#[derive(Default)]
struct LinkState {
    /// Unresolvable links warn once, not every frame.
    warned: bool,
}

pub struct NodeLinkProcessor {
    tracked: TrackedEntities<LinkState>,
}

impl NodeLinkProcessor {
    pub const ORDER: i32 = -250;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }
}

impl Default for NodeLinkProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// World matrix of the target's skeleton node, when everything
/// resolves.
fn resolve_link(world: &World, link: &NodeLinkComponent) -> Option<Mat4> {
    let target = link.target?;
    let target_world = world.transform(target)?.world_matrix();
    match &link.node_name {
        None => Some(target_world),
        Some(name) => {
            let model = world.component::<ModelComponent>(target)?;
            let index = model.node_index(name)?;
            Some(target_world * model.nodes[index].transform)
        }
    }
}

impl Processor for NodeLinkProcessor {
    fn name(&self) -> &'static str {
        "node_link"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn on_registered(&mut self, world: &mut World) {
        self.tracked.require::<TransformNode>(world.registry());
        self.tracked.require::<NodeLinkComponent>(world.registry());
    }

    fn check_entity(
        &mut self,
        world: &mut World,
        entity: EntityId,
        force_remove: bool,
    ) -> ProcessorFlow {
        match self.tracked.check(world, entity, force_remove, |_| LinkState::default()) {
            TrackEvent::Added => {
                if let Some(node) = world.node_of(entity) {
                    world.transforms_mut().set_special_root(node, true);
                }
            }
            TrackEvent::Removed(_) => {
                // back to regular propagation
                if let Some(node) = world.node_of(entity) {
                    world.transforms_mut().set_special_root(node, false);
                }
            }
            TrackEvent::Unchanged => {}
        }
        ProcessorFlow::Continue
    }

    fn set_entity_enabled(&mut self, _world: &mut World, entity: EntityId, enabled: bool) {
        self.tracked.set_enabled(entity, enabled);
    }

    fn update(&mut self, world: &mut World, _time: &GameTime) {
        let entities: Vec<EntityId> = self
            .tracked
            .iter_enabled()
            .map(|(entity, _)| entity)
            .collect();

        for entity in entities {
            let node = match world.node_of(entity) {
                Some(node) => node,
                None => continue,
            };
            let link = match world.component::<NodeLinkComponent>(entity) {
                Some(link) => link.clone(),
                None => continue,
            };

            let resolved = resolve_link(world, &link);
            if resolved.is_none() {
                if let Some(state) = self.tracked.data_mut(entity) {
                    if !state.warned {
                        warn!(
                            "node link on entity {entity} does not resolve; \
                             falling back to its own transform"
                        );
                        state.warned = true;
                    }
                }
            }

            let graph = world.transforms_mut();
            graph.update_local_matrix(node);
            let world_matrix = match resolved {
                Some(anchor) => graph
                    .node(node)
                    .map(|n| anchor * n.local_matrix())
                    .unwrap_or(anchor),
                // compose with the parent as if the node were ordinary
                None => {
                    let parent_world = graph
                        .node(node)
                        .and_then(|n| n.parent())
                        .and_then(|p| graph.node(p))
                        .map(|p| p.world_matrix());
                    let local = graph
                        .node(node)
                        .map(|n| n.local_matrix())
                        .unwrap_or(Mat4::IDENTITY);
                    match parent_world {
                        Some(parent_world) => parent_world * local,
                        None => local,
                    }
                }
            };
            graph.set_world_matrix(node, world_matrix);
            graph.update_children_of(node);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
