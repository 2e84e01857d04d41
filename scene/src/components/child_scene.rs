use crate::component::Component;
use crate::scene_instance::SceneInstance;

/// Embeds a whole scene inside one entity of the outer scene.
///
/// The nested scene runs its own [`crate::EntityManager`]; entities
/// inside it are invisible to the outer scene's processors. The child
/// scene processor vetoes further processing of the carrying entity so
/// the two scenes stay isolated.
pub struct ChildSceneComponent {
    pub instance: SceneInstance,
}

impl ChildSceneComponent {
    pub fn new(instance: SceneInstance) -> Self {
        Self { instance }
    }
}

impl Component for ChildSceneComponent {
    const NAME: &'static str = "ChildScene";
}
