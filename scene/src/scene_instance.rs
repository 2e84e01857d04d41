use log::error;

use crate::manager::EntityManager;
use crate::time::GameTime;

/// A named top-level scene.
///
/// Wraps an [`EntityManager`] and forms the frame's error boundary:
/// update failures are bugs and panic through, while draw failures are
/// logged here and the frame goes on.
pub struct SceneInstance {
    name: String,
    manager: EntityManager,
}

impl SceneInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manager: EntityManager::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &EntityManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut EntityManager {
        &mut self.manager
    }

    /// Steps the scene's simulation. Panics from scripts or processors
    /// propagate to the caller.
    pub fn update(&mut self, time: &GameTime) {
        self.manager.update(time);
    }

    /// Runs the scene's draw pass. A failing processor aborts the rest
    /// of the pass; the error is logged and swallowed here so one
    /// broken scene cannot take the frame down.
    pub fn draw(&mut self, time: &GameTime) {
        if let Err(err) = self.manager.draw(time) {
            error!("scene '{}': {err}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{DrawError, Processor, ProcessorFlow};
    use crate::world::World;
    use crate::EntityId;
    use std::any::Any;

    struct FailingDraw;

    impl Processor for FailingDraw {
        fn name(&self) -> &'static str {
            "failing_draw"
        }

        fn order(&self) -> i32 {
            0
        }

        fn check_entity(&mut self, _: &mut World, _: EntityId, _: bool) -> ProcessorFlow {
            ProcessorFlow::Continue
        }

        fn draw(&mut self, _: &mut World, _: &GameTime) -> Result<(), DrawError> {
            Err(DrawError::new("failing_draw", "device lost"))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn draw_failure_is_contained() {
        let mut scene = SceneInstance::new("main");
        scene
            .manager_mut()
            .register_processor(Box::new(FailingDraw));
        let time = GameTime::new();
        scene.update(&time);
        // does not panic, error is logged and swallowed
        scene.draw(&time);
    }

    #[test]
    fn manager_draw_surfaces_the_error() {
        let mut scene = SceneInstance::new("main");
        scene
            .manager_mut()
            .register_processor(Box::new(FailingDraw));
        let time = GameTime::new();
        let err = scene.manager_mut().draw(&time).unwrap_err();
        assert_eq!(err.processor, "failing_draw");
    }
}
