//! Built-in component types.
//!
//! Components are plain data; behavior lives in the matching processors
//! under [`crate::processors`].

mod camera;
mod child_scene;
mod light;
mod model;
mod node_link;
mod script;
mod sprite;

pub use camera::{CameraComponent, Projection};
pub use child_scene::ChildSceneComponent;
pub use light::{LightComponent, LightKind};
pub use model::{ModelComponent, ModelNode};
pub use node_link::NodeLinkComponent;
pub use script::{Script, ScriptComponent, SharedScript};
pub use sprite::SpriteComponent;

/// Opaque reference to an asset (mesh, material, texture) resolved by
/// the renderer outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AssetHandle(pub u64);
