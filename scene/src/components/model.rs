use glam::Mat4;

use crate::component::Component;

use super::AssetHandle;

/// One node of a model's internal skeleton, in model space.
#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: String,
    /// Node pose relative to the model origin.
    pub transform: Mat4,
}

/// A renderable model with an optional node skeleton.
#[derive(Debug, Clone, Default)]
pub struct ModelComponent {
    pub mesh: AssetHandle,
    pub material: AssetHandle,
    pub nodes: Vec<ModelNode>,
}

impl ModelComponent {
    pub fn new(mesh: AssetHandle, material: AssetHandle) -> Self {
        Self {
            mesh,
            material,
            nodes: Vec::new(),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<ModelNode>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Finds a skeleton node by name.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }
}

impl Component for ModelComponent {
    const NAME: &'static str = "Model";
}
