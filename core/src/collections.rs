//! Change-tracked ordered collections.
//!
//! [`TrackingCollection`] is the substrate for scene membership lists and
//! transform child lists. Instead of firing listeners at mutation time
//! (which invites reentrancy), every structural change is recorded as a
//! [`CollectionEvent`] and consumers drain the queue at a point where no
//! other borrow is alive.

use std::collections::VecDeque;

/// What happened to a collection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionAction {
    Add,
    Remove,
}

/// A single recorded mutation. `index` is the position the item was
/// inserted at or removed from, valid at the time of the mutation.
#[derive(Debug, Clone)]
pub struct CollectionEvent<T> {
    pub action: CollectionAction,
    pub item: T,
    pub index: usize,
}

/// An ordered collection that queues a [`CollectionEvent`] for every
/// add and remove.
///
/// Items must be `Clone` so the event queue can hold its own copy;
/// in practice items are small `Copy` ids or cheaply clonable handles.
#[derive(Debug)]
pub struct TrackingCollection<T: Clone> {
    items: Vec<T>,
    events: VecDeque<CollectionEvent<T>>,
}

impl<T: Clone> Default for TrackingCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TrackingCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Appends an item and records an `Add` event.
    pub fn push(&mut self, item: T) {
        let index = self.items.len();
        self.items.push(item.clone());
        self.events.push_back(CollectionEvent {
            action: CollectionAction::Add,
            item,
            index,
        });
    }

    /// Inserts at `index` and records an `Add` event.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, item: T) {
        self.items.insert(index, item.clone());
        self.events.push_back(CollectionEvent {
            action: CollectionAction::Add,
            item,
            index,
        });
    }

    /// Removes the item at `index` and records a `Remove` event.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at(&mut self, index: usize) -> T {
        let item = self.items.remove(index);
        self.events.push_back(CollectionEvent {
            action: CollectionAction::Remove,
            item: item.clone(),
            index,
        });
        item
    }

    /// Removes all items, recording a `Remove` event per item in
    /// back-to-front order.
    pub fn clear(&mut self) {
        while !self.items.is_empty() {
            self.remove_at(self.items.len() - 1);
        }
    }

    /// Drains the queued change events in mutation order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = CollectionEvent<T>> + '_ {
        self.events.drain(..)
    }

    /// Discards any queued events without observing them.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

impl<T: Clone + PartialEq> TrackingCollection<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    /// Removes the first occurrence of `item`, recording a `Remove`
    /// event. Returns `false` if the item was not present.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.index_of(item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }
}

impl<'a, T: Clone> IntoIterator for &'a TrackingCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_records_add_event() {
        let mut c = TrackingCollection::new();
        c.push(10u32);
        c.push(20);
        let events: Vec<_> = c.drain_events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, CollectionAction::Add);
        assert_eq!(events[0].item, 10);
        assert_eq!(events[0].index, 0);
        assert_eq!(events[1].item, 20);
        assert_eq!(events[1].index, 1);
    }

    #[test]
    fn remove_records_remove_event() {
        let mut c = TrackingCollection::new();
        c.push(1u32);
        c.push(2);
        c.push(3);
        c.clear_events();

        assert!(c.remove(&2));
        assert!(!c.remove(&2));

        let events: Vec<_> = c.drain_events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, CollectionAction::Remove);
        assert_eq!(events[0].item, 2);
        assert_eq!(events[0].index, 1);
        assert_eq!(c.as_slice(), &[1, 3]);
    }

    #[test]
    fn clear_emits_events_back_to_front() {
        let mut c = TrackingCollection::new();
        c.push(1u32);
        c.push(2);
        c.clear_events();
        c.clear();

        let events: Vec<_> = c.drain_events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item, 2);
        assert_eq!(events[1].item, 1);
        assert!(c.is_empty());
    }

    #[test]
    fn events_preserve_mutation_order() {
        let mut c = TrackingCollection::new();
        c.push(1u32);
        c.remove(&1);
        c.push(2);
        let actions: Vec<_> = c.drain_events().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                CollectionAction::Add,
                CollectionAction::Remove,
                CollectionAction::Add
            ]
        );
    }
}
