use crate::component::Component;

/// Camera projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view, radians.
        fov_y: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// Vertical extent of the view volume.
        height: f32,
        near: f32,
        far: f32,
    },
}

/// A camera attached to an entity. View follows the entity's world
/// transform; projection comes from these parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraComponent {
    pub projection: Projection,
    /// Width over height of the target surface.
    pub aspect: f32,
}

impl CameraComponent {
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y, near, far },
            aspect,
        }
    }

    pub fn orthographic(height: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { height, near, far },
            aspect,
        }
    }
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self::perspective(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Component for CameraComponent {
    const NAME: &'static str = "Camera";
}
