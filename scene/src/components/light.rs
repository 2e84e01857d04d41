use glam::Vec3;

use crate::component::Component;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Emits along the entity's world -Z axis.
    Directional,
    Point {
        range: f32,
    },
}

/// A light source attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightComponent {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl LightComponent {
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
        }
    }

    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point { range },
            color,
            intensity,
        }
    }
}

impl Default for LightComponent {
    fn default() -> Self {
        Self::directional(Vec3::ONE, 1.0)
    }
}

impl Component for LightComponent {
    const NAME: &'static str = "Light";
}
