use std::any::Any;

use fixedbitset::FixedBitSet;

use crate::component::ComponentKey;
use crate::transform::NodeId;

/// A generational entity identifier.
///
/// Layout: `u32 index` + `u32 generation`.
///
/// - **index**: slot index in the entity store
/// - **generation**: bumped every time a slot is reused, so a stale id
///   held after despawn never resolves to the new occupant
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Entity is manually disabled by user code.
    pub const DISABLED: u32 = 1 << 0;
    /// Entity is disabled because an ancestor was disabled (propagated).
    pub const INHERITED_DISABLED: u32 = 1 << 1;

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation of this entity's slot.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Debug for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Per-entity state: name, component bag, key mask, transform node, flags.
pub(crate) struct EntityRecord {
    pub name: String,
    /// At most one component per key, kept in insertion order.
    pub components: Vec<(ComponentKey, Box<dyn Any + Send + Sync>)>,
    /// Bit per registered [`ComponentKey`] present on this entity.
    pub key_mask: FixedBitSet,
    /// The entity's transform node. Assigned at spawn, never changes.
    pub node: NodeId,
    pub flags: u32,
}

impl EntityRecord {
    pub fn is_effectively_enabled(&self) -> bool {
        self.flags & (EntityId::DISABLED | EntityId::INHERITED_DISABLED) == 0
    }
}

/// Slot-based entity storage with generation tracking and a free list.
#[derive(Default)]
pub(crate) struct EntityStore {
    slots: Vec<Option<EntityRecord>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    alive: usize,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, record: EntityRecord) -> EntityId {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(record);
                index
            }
            None => {
                self.slots.push(Some(record));
                self.generations.push(0);
                (self.slots.len() - 1) as u32
            }
        };
        self.alive += 1;
        EntityId::new(index, self.generations[index as usize])
    }

    pub fn despawn(&mut self, entity: EntityId) -> Option<EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        let index = entity.index() as usize;
        let record = self.slots[index].take();
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(entity.index());
        self.alive -= 1;
        record
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        let index = entity.index() as usize;
        index < self.slots.len()
            && self.generations[index] == entity.generation()
            && self.slots[index].is_some()
    }

    pub fn get(&self, entity: EntityId) -> Option<&EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index() as usize].as_ref()
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index() as usize].as_mut()
    }

    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .map(|r| (EntityId::new(i as u32, self.generations[i]), r))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EntityRecord {
        EntityRecord {
            name: "test".to_string(),
            components: Vec::new(),
            key_mask: FixedBitSet::new(),
            node: NodeId::dangling(),
            flags: 0,
        }
    }

    #[test]
    fn spawn_assigns_sequential_indices() {
        let mut store = EntityStore::new();
        let a = store.spawn(record());
        let b = store.spawn(record());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn despawn_invalidates_id() {
        let mut store = EntityStore::new();
        let a = store.spawn(record());
        assert!(store.is_alive(a));
        store.despawn(a);
        assert!(!store.is_alive(a));
        assert!(store.get(a).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut store = EntityStore::new();
        let a = store.spawn(record());
        store.despawn(a);
        let b = store.spawn(record());
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(!store.is_alive(a));
        assert!(store.is_alive(b));
    }

    #[test]
    fn effectively_enabled_checks_both_flags() {
        let mut r = record();
        assert!(r.is_effectively_enabled());
        r.flags |= EntityId::DISABLED;
        assert!(!r.is_effectively_enabled());
        r.flags = EntityId::INHERITED_DISABLED;
        assert!(!r.is_effectively_enabled());
    }
}
