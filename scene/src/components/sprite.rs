use glam::{Vec2, Vec4};

use crate::component::Component;

use super::AssetHandle;

/// A textured quad billboard attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteComponent {
    pub texture: AssetHandle,
    /// Quad extent in world units.
    pub size: Vec2,
    /// RGBA tint.
    pub color: Vec4,
}

impl SpriteComponent {
    pub fn new(texture: AssetHandle, size: Vec2) -> Self {
        Self {
            texture,
            size,
            color: Vec4::ONE,
        }
    }
}

impl Default for SpriteComponent {
    fn default() -> Self {
        Self::new(AssetHandle::default(), Vec2::ONE)
    }
}

impl Component for SpriteComponent {
    const NAME: &'static str = "Sprite";
}
