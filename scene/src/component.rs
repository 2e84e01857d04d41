//! Component trait and the explicit type-to-key registry.
//!
//! Component types are registered up front; the registry hands out dense
//! [`ComponentKey`] indices used for entity key masks and processor
//! filters. Registration also declares which processor types should be
//! instantiated automatically when the first entity carrying the
//! component enters a scene.

use std::any::TypeId;
use std::collections::HashMap;

use crate::processor::Processor;

/// A scene component. Stored in an entity's component bag, at most one
/// instance per registered type.
pub trait Component: Send + Sync + 'static {
    /// Human-readable type name, used in logs and registry diagnostics.
    const NAME: &'static str;
}

/// Dense index assigned to a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey(u32);

impl ComponentKey {
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl std::fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

/// Creates a default processor instance for a component type.
pub type ProcessorFactory = fn() -> Box<dyn Processor>;

/// Registry metadata for one component type.
pub struct ComponentInfo {
    name: &'static str,
    type_id: TypeId,
    factories: Vec<ProcessorFactory>,
}

impl ComponentInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn factories(&self) -> &[ProcessorFactory] {
        &self.factories
    }
}

/// Maps component types to keys and default processor factories.
///
/// The key space is append-only. Registering the same type twice returns
/// the existing key and leaves its factories untouched.
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentKey>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `C` with no default processors.
    pub fn register<C: Component>(&mut self) -> ComponentKey {
        self.register_with_processors::<C>(&[])
    }

    /// Registers `C`, declaring processor types to auto-instantiate when
    /// the first entity carrying `C` enters a scene.
    pub fn register_with_processors<C: Component>(
        &mut self,
        factories: &[ProcessorFactory],
    ) -> ComponentKey {
        let type_id = TypeId::of::<C>();
        if let Some(&key) = self.by_type.get(&type_id) {
            return key;
        }
        let key = ComponentKey(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            name: C::NAME,
            type_id,
            factories: factories.to_vec(),
        });
        self.by_type.insert(type_id, key);
        key
    }

    /// Looks up the key for `C`, if registered.
    pub fn key_of<C: Component>(&self) -> Option<ComponentKey> {
        self.by_type.get(&TypeId::of::<C>()).copied()
    }

    /// Looks up the key for `C`.
    ///
    /// # Panics
    ///
    /// Panics if `C` was never registered. Using an unregistered
    /// component type is a programming error, not a runtime condition.
    pub fn expect_key<C: Component>(&self) -> ComponentKey {
        match self.key_of::<C>() {
            Some(key) => key,
            None => panic!("component type '{}' is not registered", C::NAME),
        }
    }

    pub fn info(&self, key: ComponentKey) -> &ComponentInfo {
        &self.infos[key.index()]
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
