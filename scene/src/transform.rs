//! Transform nodes, hierarchy links, and world matrix propagation.
//!
//! Nodes live in a generational arena ([`TransformGraph`]) and reference
//! each other by [`NodeId`], so parallel propagation can hand out
//! disjoint subtrees to worker threads without aliasing whole-graph
//! references. Structural changes (attach/detach) are validated up
//! front and recorded as [`HierarchyEvent`]s for the processing layer
//! to drain.

use std::cell::UnsafeCell;

use glam::{EulerRot, Mat4, Quat, Vec3};
use parking_lot::Mutex;
use thiserror::Error;

use aster_core::{CollectionAction, ThreadPool, TrackingCollection};

use crate::entity::EntityId;

/// Batch size at which sibling subtrees are fanned out to the thread
/// pool instead of walked sequentially.
pub(crate) const PARALLEL_THRESHOLD: usize = 1024;
/// Fan-out shape for a parallel batch: up to 8 chunks of up to 1024 nodes.
const DISPATCH_CHUNKS: usize = 8;
const DISPATCH_CHUNK_SIZE: usize = 1024;

/// A generational transform node identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// An id that never resolves to a live node.
    pub(crate) fn dangling() -> Self {
        Self {
            index: u32::MAX,
            generation: u32::MAX,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({}v{})", self.index, self.generation)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A structural change that could not be applied. The graph is left
/// untouched when any of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("node {0} already has a parent, detach it first")]
    AlreadyParented(NodeId),
    #[error("node {0} is not a child of node {1}")]
    NotAChild(NodeId, NodeId),
    #[error("attaching node {child} under node {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {0} is not alive")]
    DeadNode(NodeId),
}

/// A recorded parent/child link change.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyEvent {
    pub parent: NodeId,
    pub child: NodeId,
    pub action: CollectionAction,
}

/// One transform in the scene graph.
///
/// Local pose is either the TRS triple (when `use_trs` is set, the
/// default) or an explicitly assigned local matrix. The world matrix is
/// refreshed by the propagation pass, or on demand via
/// [`TransformGraph::update_world_matrix`].
pub struct TransformNode {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scaling: Vec3,
    use_trs: bool,
    /// Matrices sit in cells so the parallel walk can write them
    /// through the shared graph reference without ever forming an
    /// exclusive node reference.
    local_matrix: UnsafeCell<Mat4>,
    world_matrix: UnsafeCell<Mat4>,
    parent: Option<NodeId>,
    children: TrackingCollection<NodeId>,
    /// When set, this node ignores its parent during propagation; an
    /// external driver (such as a model node link) owns its world
    /// matrix.
    special_root: bool,
    entity: EntityId,
}

// SAFETY: the matrix cells are written either through `&mut self` or by
// the propagation walk, which hands each worker a disjoint subtree and
// reads only ancestor matrices finalized before dispatch.
unsafe impl Sync for TransformNode {}

impl TransformNode {
    fn new(entity: EntityId) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scaling: Vec3::ONE,
            use_trs: true,
            local_matrix: UnsafeCell::new(Mat4::IDENTITY),
            world_matrix: UnsafeCell::new(Mat4::IDENTITY),
            parent: None,
            children: TrackingCollection::new(),
            special_root: false,
            entity,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        self.children.as_slice()
    }

    pub fn local_matrix(&self) -> Mat4 {
        // SAFETY: outside the propagation walk nothing writes the cell
        // without `&mut self`; inside the walk only the owning worker
        // touches this node.
        unsafe { *self.local_matrix.get() }
    }

    pub fn world_matrix(&self) -> Mat4 {
        // SAFETY: as for `local_matrix`.
        unsafe { *self.world_matrix.get() }
    }

    pub fn use_trs(&self) -> bool {
        self.use_trs
    }

    /// Assigns the local matrix directly and stops deriving it from the
    /// TRS fields.
    pub fn set_local_matrix(&mut self, matrix: Mat4) {
        *self.local_matrix.get_mut() = matrix;
        self.use_trs = false;
    }

    /// Resumes deriving the local matrix from the TRS fields.
    pub fn set_use_trs(&mut self, use_trs: bool) {
        self.use_trs = use_trs;
    }

    pub fn is_special_root(&self) -> bool {
        self.special_root
    }

    /// Rotation as XYZ Euler angles, radians.
    pub fn rotation_euler_xyz(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    pub fn set_rotation_euler_xyz(&mut self, angles: Vec3) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, angles.x, angles.y, angles.z);
    }

    /// Translation component of the current world matrix.
    pub fn world_translation(&self) -> Vec3 {
        self.world_matrix().w_axis.truncate()
    }

    /// Decomposes the current world matrix into scale, rotation and
    /// translation.
    pub fn world_transformation(&self) -> (Vec3, Quat, Vec3) {
        self.world_matrix().to_scale_rotation_translation()
    }

    /// Transforms a point from this node's local space to world space,
    /// using the current world matrix.
    pub fn local_to_world(&self, point: Vec3) -> Vec3 {
        self.world_matrix().transform_point3(point)
    }

    /// Transforms a point from world space into this node's local space.
    pub fn world_to_local(&self, point: Vec3) -> Vec3 {
        self.world_matrix().inverse().transform_point3(point)
    }

    fn refresh_local(&mut self) {
        if self.use_trs {
            *self.local_matrix.get_mut() =
                Mat4::from_scale_rotation_translation(self.scaling, self.rotation, self.translation);
        }
    }

    /// Shared-reference variant of [`refresh_local`](Self::refresh_local)
    /// for the propagation walk.
    ///
    /// # Safety
    ///
    /// No other thread may access this node's local matrix during the
    /// call.
    unsafe fn refresh_local_unsynced(&self) {
        if self.use_trs {
            *self.local_matrix.get() =
                Mat4::from_scale_rotation_translation(self.scaling, self.rotation, self.translation);
        }
    }
}

// Transforms live in the graph arena, not in component bags, but they
// occupy a key so processor filters and key masks treat them uniformly.
impl crate::component::Component for TransformNode {
    const NAME: &'static str = "Transform";
}

/// Generational arena of transform nodes.
pub struct TransformGraph {
    slots: Vec<Option<TransformNode>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    events: Vec<HierarchyEvent>,
}

impl TransformGraph {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn spawn(&mut self, entity: EntityId) -> NodeId {
        let node = TransformNode::new(entity);
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.generations.push(0);
                (self.slots.len() - 1) as u32
            }
        };
        NodeId::new(index, self.generations[index as usize])
    }

    /// Frees a node, detaching it from its parent and detaching all of
    /// its children first. Children become parentless roots; cascading
    /// teardown is the caller's job.
    pub(crate) fn despawn(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.slots[id.index() as usize].as_ref().and_then(|n| n.parent) {
            let _ = self.detach(parent, id);
        }
        let children: Vec<NodeId> = self
            .slots[id.index() as usize]
            .as_ref()
            .map(|n| n.children().to_vec())
            .unwrap_or_default();
        for child in children {
            let _ = self.detach(id, child);
        }
        let index = id.index() as usize;
        self.slots[index] = None;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(id.index());
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        let index = id.index() as usize;
        index < self.slots.len()
            && self.generations[index] == id.generation
            && self.slots[index].is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&TransformNode> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.index() as usize].as_ref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TransformNode> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.index() as usize].as_mut()
    }

    pub fn entity_of(&self, id: NodeId) -> Option<EntityId> {
        self.node(id).map(|n| n.entity)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `ancestor` appears on `node`'s parent chain.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.node(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Links `child` under `parent`.
    ///
    /// Fails without touching the graph if either node is dead, the
    /// child already has a parent, or the link would close a cycle.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), HierarchyError> {
        if !self.is_alive(parent) {
            return Err(HierarchyError::DeadNode(parent));
        }
        if !self.is_alive(child) {
            return Err(HierarchyError::DeadNode(child));
        }
        if self.node(child).and_then(|n| n.parent).is_some() {
            return Err(HierarchyError::AlreadyParented(child));
        }
        if parent == child || self.is_ancestor_of(child, parent) {
            return Err(HierarchyError::Cycle { parent, child });
        }

        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.collect_child_events(parent);
        Ok(())
    }

    /// Unlinks `child` from `parent`. The child keeps its local pose
    /// and becomes a parentless root.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), HierarchyError> {
        if !self.is_alive(parent) {
            return Err(HierarchyError::DeadNode(parent));
        }
        if !self.is_alive(child) {
            return Err(HierarchyError::DeadNode(child));
        }
        if self.node(child).and_then(|n| n.parent) != Some(parent) {
            return Err(HierarchyError::NotAChild(child, parent));
        }

        if let Some(node) = self.node_mut(parent) {
            node.children.remove(&child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
        self.collect_child_events(parent);
        Ok(())
    }

    /// Moves `child` under `parent` (or to the root set for `None`),
    /// detaching from the current parent first. Validation happens
    /// before any mutation, so a failed call leaves the graph unchanged.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), HierarchyError> {
        if !self.is_alive(child) {
            return Err(HierarchyError::DeadNode(child));
        }
        let current = self.node(child).and_then(|n| n.parent);
        if current == parent {
            return Ok(());
        }
        if let Some(new_parent) = parent {
            if !self.is_alive(new_parent) {
                return Err(HierarchyError::DeadNode(new_parent));
            }
            if new_parent == child || self.is_ancestor_of(child, new_parent) {
                return Err(HierarchyError::Cycle {
                    parent: new_parent,
                    child,
                });
            }
        }
        if let Some(old) = current {
            self.detach(old, child)?;
        }
        if let Some(new_parent) = parent {
            self.attach(new_parent, child)?;
        }
        Ok(())
    }

    /// Marks a node as externally driven: propagation will neither
    /// compose it with its parent nor descend into its subtree.
    pub fn set_special_root(&mut self, id: NodeId, special: bool) {
        if let Some(node) = self.node_mut(id) {
            node.special_root = special;
        }
    }

    fn collect_child_events(&mut self, parent: NodeId) {
        let mut collected = Vec::new();
        if let Some(node) = self.node_mut(parent) {
            for event in node.children.drain_events() {
                collected.push(HierarchyEvent {
                    parent,
                    child: event.item,
                    action: event.action,
                });
            }
        }
        self.events.extend(collected);
    }

    pub(crate) fn take_events(&mut self) -> Vec<HierarchyEvent> {
        std::mem::take(&mut self.events)
    }

    /// Refreshes the local matrix from the TRS fields (when `use_trs`
    /// is set).
    pub fn update_local_matrix(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.refresh_local();
        }
    }

    /// Recursively refreshes this node's world matrix, updating stale
    /// ancestors first. On a dead node this is a no-op.
    ///
    /// A special root composes with nothing regardless of its parent
    /// link; its world matrix equals its local matrix until an external
    /// driver overwrites it.
    pub fn update_world_matrix(&mut self, id: NodeId) {
        let parent = match self.node(id) {
            Some(node) if !node.special_root => node.parent,
            Some(_) => None,
            None => return,
        };
        if let Some(parent) = parent {
            self.update_world_matrix(parent);
        }
        self.update_world_matrix_non_recursive(id);
    }

    /// Refreshes this node's world matrix assuming the parent's world
    /// matrix is already current.
    pub fn update_world_matrix_non_recursive(&mut self, id: NodeId) {
        let parent_world = match self.node(id) {
            Some(node) if !node.special_root => {
                node.parent.and_then(|p| self.node(p)).map(|p| p.world_matrix())
            }
            Some(_) => None,
            None => return,
        };
        if let Some(node) = self.node_mut(id) {
            node.refresh_local();
            let local = node.local_matrix();
            *node.world_matrix.get_mut() = match parent_world {
                Some(parent_world) => parent_world * local,
                None => local,
            };
        }
    }

    /// Overwrites the world matrix directly. Used by external drivers
    /// for special-root nodes.
    pub fn set_world_matrix(&mut self, id: NodeId, world: Mat4) {
        if let Some(node) = self.node_mut(id) {
            *node.world_matrix.get_mut() = world;
        }
    }

    /// Propagates world matrices through the subtrees rooted at `roots`.
    ///
    /// `roots` must be disjoint subtree roots with no special-root
    /// nodes among them. Special roots encountered deeper in the walk
    /// are skipped along with their subtrees and pushed to `skipped`.
    pub(crate) fn propagate(
        &mut self,
        pool: &ThreadPool,
        roots: &[NodeId],
        skipped: &Mutex<Vec<NodeId>>,
    ) {
        self.update_batch(pool, roots, skipped);
    }

    /// Updates a batch of sibling subtrees, fanning out to the pool
    /// when the batch is large enough.
    fn update_batch(&mut self, pool: &ThreadPool, batch: &[NodeId], skipped: &Mutex<Vec<NodeId>>) {
        if batch.len() >= PARALLEL_THRESHOLD {
            let graph: &TransformGraph = self;
            pool.dispatch(batch, DISPATCH_CHUNKS, DISPATCH_CHUNK_SIZE, |&id| {
                // SAFETY: batch entries are roots of disjoint subtrees,
                // so each worker touches a disjoint node set; ancestors
                // outside the batch are finalized and only read.
                unsafe { graph.update_subtree_unchecked(id, skipped) };
            });
        } else {
            for &id in batch {
                self.update_world_matrix_non_recursive(id);
                let children = self.partition_children(id, skipped);
                self.update_batch(pool, &children, skipped);
            }
        }
    }

    /// Returns the live non-special children of `id`, recording special
    /// roots into `skipped`.
    fn partition_children(&self, id: NodeId, skipped: &Mutex<Vec<NodeId>>) -> Vec<NodeId> {
        let node = match self.node(id) {
            Some(node) => node,
            None => return Vec::new(),
        };
        let mut out = Vec::with_capacity(node.children.len());
        for &child in node.children() {
            match self.node(child) {
                Some(c) if c.special_root => skipped.lock().push(child),
                Some(_) => out.push(child),
                None => {}
            }
        }
        out
    }

    /// Walks one subtree sequentially, writing matrices through the
    /// nodes' cells. No exclusive reference is ever formed; all writes
    /// go through [`UnsafeCell`] behind the shared graph reference.
    ///
    /// # Safety
    ///
    /// No other thread may access any node inside the subtree rooted at
    /// `id` during the call, and ancestor matrices must not be written
    /// for its duration.
    unsafe fn update_subtree_unchecked(&self, id: NodeId, skipped: &Mutex<Vec<NodeId>>) {
        let node = match self.node(id) {
            Some(node) => node,
            None => return,
        };
        node.refresh_local_unsynced();
        let parent_world = node
            .parent
            .filter(|_| !node.special_root)
            .and_then(|p| self.node(p))
            .map(|p| p.world_matrix());
        let local = node.local_matrix();
        *node.world_matrix.get() = match parent_world {
            Some(parent_world) => parent_world * local,
            None => local,
        };
        for &child in node.children() {
            match self.node(child) {
                Some(c) if c.special_root => skipped.lock().push(child),
                Some(_) => self.update_subtree_unchecked(child, skipped),
                None => {}
            }
        }
    }

    /// Sequentially refreshes the subtrees below `id` without touching
    /// `id` itself. Used after an external driver overwrites a node's
    /// world matrix. Nested special roots are skipped.
    pub fn update_children_of(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.node(id) {
            Some(node) => node.children().to_vec(),
            None => return,
        };
        for child in children {
            let special = self.node(child).map(|n| n.special_root).unwrap_or(true);
            if special {
                continue;
            }
            self.update_world_matrix_non_recursive(child);
            self.update_children_of(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(n: usize) -> (TransformGraph, Vec<NodeId>) {
        let mut graph = TransformGraph::new();
        let nodes = (0..n)
            .map(|i| graph.spawn(EntityId::new(i as u32, 0)))
            .collect();
        (graph, nodes)
    }

    #[test]
    fn attach_links_both_directions() {
        let (mut graph, n) = graph_with(2);
        graph.attach(n[0], n[1]).unwrap();
        assert_eq!(graph.node(n[1]).unwrap().parent(), Some(n[0]));
        assert_eq!(graph.node(n[0]).unwrap().children(), &[n[1]]);
    }

    #[test]
    fn attach_rejects_second_parent() {
        let (mut graph, n) = graph_with(3);
        graph.attach(n[0], n[2]).unwrap();
        assert_eq!(
            graph.attach(n[1], n[2]),
            Err(HierarchyError::AlreadyParented(n[2]))
        );
        // first link intact
        assert_eq!(graph.node(n[2]).unwrap().parent(), Some(n[0]));
        assert!(graph.node(n[1]).unwrap().children().is_empty());
    }

    #[test]
    fn attach_rejects_cycles() {
        let (mut graph, n) = graph_with(3);
        graph.attach(n[0], n[1]).unwrap();
        graph.attach(n[1], n[2]).unwrap();
        assert!(matches!(
            graph.set_parent(n[0], Some(n[2])),
            Err(HierarchyError::Cycle { .. })
        ));
        assert!(matches!(
            graph.attach(n[0], n[0]),
            Err(HierarchyError::Cycle { .. })
        ));
        // graph unchanged by the failed reparent
        assert_eq!(graph.node(n[0]).unwrap().parent(), None);
        assert_eq!(graph.node(n[2]).unwrap().parent(), Some(n[1]));
    }

    #[test]
    fn detach_requires_matching_parent() {
        let (mut graph, n) = graph_with(3);
        graph.attach(n[0], n[2]).unwrap();
        assert_eq!(
            graph.detach(n[1], n[2]),
            Err(HierarchyError::NotAChild(n[2], n[1]))
        );
        graph.detach(n[0], n[2]).unwrap();
        assert_eq!(graph.node(n[2]).unwrap().parent(), None);
    }

    #[test]
    fn set_parent_moves_between_parents() {
        let (mut graph, n) = graph_with(3);
        graph.attach(n[0], n[2]).unwrap();
        graph.set_parent(n[2], Some(n[1])).unwrap();
        assert!(graph.node(n[0]).unwrap().children().is_empty());
        assert_eq!(graph.node(n[1]).unwrap().children(), &[n[2]]);
        assert_eq!(graph.node(n[2]).unwrap().parent(), Some(n[1]));
    }

    #[test]
    fn world_matrix_composes_parent_chain() {
        let (mut graph, n) = graph_with(3);
        graph.attach(n[0], n[1]).unwrap();
        graph.attach(n[1], n[2]).unwrap();
        graph.node_mut(n[0]).unwrap().translation = Vec3::new(1.0, 0.0, 0.0);
        graph.node_mut(n[1]).unwrap().translation = Vec3::new(0.0, 2.0, 0.0);
        graph.node_mut(n[2]).unwrap().translation = Vec3::new(0.0, 0.0, 3.0);

        graph.update_world_matrix(n[2]);

        let world = graph.node(n[2]).unwrap().world_translation();
        assert!((world - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn special_root_ignores_parent() {
        let (mut graph, n) = graph_with(2);
        graph.attach(n[0], n[1]).unwrap();
        graph.node_mut(n[0]).unwrap().translation = Vec3::new(5.0, 0.0, 0.0);
        graph.node_mut(n[1]).unwrap().translation = Vec3::new(1.0, 0.0, 0.0);
        graph.set_special_root(n[1], true);

        graph.update_world_matrix(n[1]);

        let world = graph.node(n[1]).unwrap().world_translation();
        assert!((world - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn explicit_local_matrix_bypasses_trs() {
        let (mut graph, n) = graph_with(1);
        let node = graph.node_mut(n[0]).unwrap();
        node.translation = Vec3::new(9.0, 9.0, 9.0);
        node.set_local_matrix(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));

        graph.update_world_matrix(n[0]);

        let world = graph.node(n[0]).unwrap().world_translation();
        assert!((world - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn local_matrix_update_is_deterministic() {
        let (mut graph, n) = graph_with(1);
        let node = graph.node_mut(n[0]).unwrap();
        node.translation = Vec3::new(0.1, 0.2, 0.3);
        node.rotation = Quat::from_rotation_y(0.7);
        node.scaling = Vec3::new(1.5, 1.5, 1.5);

        graph.update_local_matrix(n[0]);
        let first = graph.node(n[0]).unwrap().local_matrix();
        graph.update_local_matrix(n[0]);
        let second = graph.node(n[0]).unwrap().local_matrix();

        assert_eq!(first.to_cols_array(), second.to_cols_array());
    }

    #[test]
    fn update_on_dead_node_is_noop() {
        let (mut graph, n) = graph_with(1);
        graph.despawn(n[0]);
        graph.update_world_matrix(n[0]);
        graph.update_local_matrix(n[0]);
        assert!(graph.node(n[0]).is_none());
    }

    #[test]
    fn despawn_detaches_children() {
        let (mut graph, n) = graph_with(3);
        graph.attach(n[0], n[1]).unwrap();
        graph.attach(n[0], n[2]).unwrap();
        graph.despawn(n[0]);
        assert_eq!(graph.node(n[1]).unwrap().parent(), None);
        assert_eq!(graph.node(n[2]).unwrap().parent(), None);
    }

    #[test]
    fn events_record_attach_and_detach() {
        let (mut graph, n) = graph_with(2);
        graph.attach(n[0], n[1]).unwrap();
        graph.detach(n[0], n[1]).unwrap();
        let events = graph.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, CollectionAction::Add);
        assert_eq!(events[0].parent, n[0]);
        assert_eq!(events[0].child, n[1]);
        assert_eq!(events[1].action, CollectionAction::Remove);
    }

    #[test]
    fn propagate_parallel_matches_sequential() {
        let pool = ThreadPool::new(4);
        let mut graph = TransformGraph::new();
        let root = graph.spawn(EntityId::new(0, 0));
        graph.node_mut(root).unwrap().translation = Vec3::new(10.0, 0.0, 0.0);

        let count = 2000u32;
        let mut children = Vec::new();
        for i in 0..count {
            let child = graph.spawn(EntityId::new(i + 1, 0));
            graph.node_mut(child).unwrap().translation = Vec3::new(0.0, i as f32, 0.0);
            graph.attach(root, child).unwrap();
            children.push(child);
        }

        let skipped = Mutex::new(Vec::new());
        graph.propagate(&pool, &[root], &skipped);
        assert!(skipped.lock().is_empty());

        for (i, &child) in children.iter().enumerate() {
            let world = graph.node(child).unwrap().world_translation();
            assert!((world - Vec3::new(10.0, i as f32, 0.0)).length() < 1e-5);
        }
    }

    #[test]
    fn propagate_parallel_recurses_into_grandchildren() {
        let pool = ThreadPool::new(4);
        let mut graph = TransformGraph::new();
        let root = graph.spawn(EntityId::new(0, 0));
        graph.node_mut(root).unwrap().translation = Vec3::new(0.0, 0.0, 5.0);

        // enough siblings to hit the parallel path, each with a child
        // so workers recurse a level down
        let count = 1200u32;
        let mut grandchildren = Vec::new();
        for i in 0..count {
            let child = graph.spawn(EntityId::new(2 * i + 1, 0));
            graph.node_mut(child).unwrap().translation = Vec3::new(1.0, 0.0, 0.0);
            graph.attach(root, child).unwrap();
            let grand = graph.spawn(EntityId::new(2 * i + 2, 0));
            graph.node_mut(grand).unwrap().translation = Vec3::new(0.0, 1.0, 0.0);
            graph.attach(child, grand).unwrap();
            grandchildren.push(grand);
        }

        let skipped = Mutex::new(Vec::new());
        graph.propagate(&pool, &[root], &skipped);

        for &grand in &grandchildren {
            let world = graph.node(grand).unwrap().world_translation();
            assert!((world - Vec3::new(1.0, 1.0, 5.0)).length() < 1e-5);
        }
    }

    #[test]
    fn propagate_skips_special_subtrees() {
        let pool = ThreadPool::new(2);
        let mut graph = TransformGraph::new();
        let root = graph.spawn(EntityId::new(0, 0));
        let linked = graph.spawn(EntityId::new(1, 0));
        let below = graph.spawn(EntityId::new(2, 0));
        graph.attach(root, linked).unwrap();
        graph.attach(linked, below).unwrap();
        graph.node_mut(root).unwrap().translation = Vec3::new(4.0, 0.0, 0.0);
        graph.set_special_root(linked, true);
        graph.set_world_matrix(linked, Mat4::from_translation(Vec3::new(7.0, 7.0, 7.0)));

        let skipped = Mutex::new(Vec::new());
        graph.propagate(&pool, &[root], &skipped);

        assert_eq!(skipped.into_inner(), vec![linked]);
        let world = graph.node(linked).unwrap().world_translation();
        assert!((world - Vec3::new(7.0, 7.0, 7.0)).length() < 1e-5);
    }
}
