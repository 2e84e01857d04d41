//! World matrix propagation.
//!
//! Walks the tracked root nodes each update, composing world matrices
//! parent before child. Large sibling batches are fanned out to the
//! thread pool; subtrees below different batch entries are disjoint, so
//! workers write without coordination. Special-root nodes are left to
//! their external drivers and collected into a locked skip list.

use std::any::Any;
use std::collections::HashSet;

use log::{trace, warn};
use parking_lot::Mutex;

use aster_core::{CollectionAction, ThreadPool};

use crate::entity::EntityId;
use crate::processor::{Processor, ProcessorFlow, TrackEvent, TrackedEntities};
use crate::time::GameTime;
use crate::transform::{HierarchyEvent, NodeId, TransformNode};
use crate::world::World;

pub struct TransformProcessor {
    tracked: TrackedEntities<NodeId>,
    /// Nodes with no parent among the tracked entities.
    roots: HashSet<NodeId>,
    pool: ThreadPool,
    /// Special roots encountered during the walk. Filled under the lock
    /// from worker threads, drained-and-cleared under the same lock
    /// after the pass.
    skipped: Mutex<Vec<NodeId>>,
}

impl TransformProcessor {
    pub const ORDER: i32 = -300;

    pub fn new() -> Self {
        Self {
            tracked: TrackedEntities::new(),
            roots: HashSet::new(),
            pool: ThreadPool::default_threads(),
            skipped: Mutex::new(Vec::new()),
        }
    }

    pub fn create() -> Box<dyn Processor> {
        Box::new(Self::new())
    }
}

impl Default for TransformProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for TransformProcessor {
    fn name(&self) -> &'static str {
        "transform"
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
        let make = |w: &World| w.node_of(entity).unwrap_or_else(NodeId::dangling);
        match self.tracked.check(world, entity, force_remove, make) {
            TrackEvent::Added => {
                let node = world.node_of(entity).unwrap_or_else(NodeId::dangling);
                let parent = world
                    .transforms()
                    .node(node)
                    .and_then(|n| n.parent())
                    .and_then(|p| world.transforms().entity_of(p));
                match parent {
                    None => {
                        self.roots.insert(node);
                    }
                    // the parent sits outside this pass (a child-scene
                    // carrier, say); walk the entity as a root so its
                    // matrices never go stale
                    Some(parent) if !self.tracked.contains(parent) => {
                        warn!(
                            "entity {entity} is attached under {parent}, which this pass \
                             does not walk; propagating it as a root"
                        );
                        self.roots.insert(node);
                    }
                    Some(_) => {}
                }
                // children walked as roots while this entity was
                // untracked rejoin its subtree
                let children: Vec<NodeId> = world
                    .transforms()
                    .node(node)
                    .map(|n| n.children().to_vec())
                    .unwrap_or_default();
                for child in children {
                    self.roots.remove(&child);
                }
            }
            TrackEvent::Removed(node) => {
                self.roots.remove(&node);
            }
            TrackEvent::Unchanged => {}
        }
        ProcessorFlow::Continue
    }

    fn on_hierarchy_changed(&mut self, world: &mut World, event: HierarchyEvent) {
        match event.action {
            CollectionAction::Add => {
                let parent_tracked = world
                    .transforms()
                    .entity_of(event.parent)
                    .map(|e| self.tracked.contains(e))
                    .unwrap_or(false);
                let child_tracked = world
                    .transforms()
                    .entity_of(event.child)
                    .map(|e| self.tracked.contains(e))
                    .unwrap_or(false);
                if parent_tracked || !child_tracked {
                    self.roots.remove(&event.child);
                } else {
                    warn!(
                        "node {} attached under a node this pass does not walk; \
                         keeping it as a propagation root",
                        event.child
                    );
                    self.roots.insert(event.child);
                }
            }
            CollectionAction::Remove => {
                let tracked = world
                    .transforms()
                    .entity_of(event.child)
                    .map(|e| self.tracked.contains(e))
                    .unwrap_or(false);
                if tracked {
                    self.roots.insert(event.child);
                }
            }
        }
    }

    fn update(&mut self, world: &mut World, _time: &GameTime) {
        let mut batch: Vec<NodeId> = Vec::with_capacity(self.roots.len());
        {
            let graph = world.transforms();
            for &node in &self.roots {
                match graph.node(node) {
                    Some(n) if n.is_special_root() => self.skipped.lock().push(node),
                    Some(_) => batch.push(node),
                    None => {}
                }
            }
        }

        world.transforms_mut().propagate(&self.pool, &batch, &self.skipped);

        let skipped = std::mem::take(&mut *self.skipped.lock());
        if !skipped.is_empty() {
            trace!("left {} externally driven transforms untouched", skipped.len());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
