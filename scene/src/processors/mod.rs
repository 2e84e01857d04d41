//! Built-in processors.
//!
//! Order determines stage sequence within a frame: hierarchy
//! bookkeeping first, then scripts and child scenes, transform
//! propagation, node links, and finally the render-data processors.

mod camera;
mod child_scene;
mod hierarchical;
mod light;
mod model;
mod node_link;
mod script;
mod sprite;
mod transform;

pub use camera::{CameraProcessor, RenderCamera};
pub use child_scene::ChildSceneProcessor;
pub use hierarchical::HierarchicalProcessor;
pub use light::{LightProcessor, RenderLight};
pub use model::{ModelProcessor, RenderModel};
pub use node_link::NodeLinkProcessor;
pub use script::ScriptProcessor;
pub use sprite::{SpriteInstance, SpriteProcessor};
pub use transform::TransformProcessor;
