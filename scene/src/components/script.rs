use std::sync::Arc;

use parking_lot::Mutex;

use aster_core::TrackingCollection;

use crate::component::Component;
use crate::entity::EntityId;
use crate::time::GameTime;
use crate::world::World;

/// User logic invoked once per update for the owning entity.
///
/// Scripts run before transform propagation, so transform writes made
/// here are composed in the same frame. Panics inside a script
/// propagate out of the update pass.
pub trait Script: Send {
    fn update(&mut self, entity: EntityId, world: &mut World, time: &GameTime);
}

/// A script shared between its component slot and the running pass.
pub type SharedScript = Arc<Mutex<dyn Script>>;

/// An ordered list of scripts attached to an entity.
///
/// The list is change-tracked; scripts added during an update run are
/// picked up from the next frame on.
#[derive(Default)]
pub struct ScriptComponent {
    pub scripts: TrackingCollection<SharedScript>,
}

impl ScriptComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<S: Script + 'static>(script: S) -> Self {
        let mut component = Self::new();
        component.add(script);
        component
    }

    pub fn add<S: Script + 'static>(&mut self, script: S) {
        self.scripts.push(Arc::new(Mutex::new(script)));
    }
}

impl Component for ScriptComponent {
    const NAME: &'static str = "Script";
}
