use crate::component::Component;
use crate::entity::EntityId;

/// Links this entity's transform to a skeleton node of another entity's
/// model.
///
/// While linked, the entity's transform node is flagged as a special
/// root: the regular propagation pass leaves it alone and the node link
/// stage drives its world matrix from the target node instead. When the
/// target or node name cannot be resolved, the entity falls back to its
/// own composed transform.
#[derive(Debug, Clone, Default)]
pub struct NodeLinkComponent {
    /// Entity whose model supplies the node. `None` falls back to the
    /// entity's own transform.
    pub target: Option<EntityId>,
    /// Skeleton node to follow. `None` follows the target's root
    /// transform directly.
    pub node_name: Option<String>,
}

impl NodeLinkComponent {
    pub fn to_node(target: EntityId, node_name: impl Into<String>) -> Self {
        Self {
            target: Some(target),
            node_name: Some(node_name.into()),
        }
    }

    pub fn to_entity(target: EntityId) -> Self {
        Self {
            target: Some(target),
            node_name: None,
        }
    }
}

impl Component for NodeLinkComponent {
    const NAME: &'static str = "NodeLink";
}
