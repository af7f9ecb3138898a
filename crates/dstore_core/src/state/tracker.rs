//! Change trackers owned by domain entities.
//!
//! An entity keeps one tracker per relation. The trackers record what
//! happened since the last successful persist; [`Change`] is the read-only
//! view the resolver consumes.

use std::time::SystemTime;

/// What a tracker says about its relation.
#[derive(Debug, PartialEq)]
pub enum Change<'a, E> {
    /// Nothing happened since the last persist.
    Unmodified,
    /// A single-valued relation was replaced; `None` after a delete.
    Replaced(Option<&'a E>),
    /// A collection changed incrementally, or was flushed.
    Delta {
        /// Elements added since the last persist (or since the flush).
        added: &'a [E],
        /// Elements deleted since the last persist.
        deleted: &'a [E],
        /// Whether the whole collection was flushed.
        flushed: bool,
    },
}

/// Tracks a relation holding at most one value.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemTracker<E> {
    value: Option<E>,
    modified: bool,
    deleted: bool,
}

impl<E> ItemTracker<E> {
    /// Creates an empty, untouched tracker.
    pub fn new() -> Self {
        Self {
            value: None,
            modified: false,
            deleted: false,
        }
    }

    /// Creates an untouched tracker around an already persisted value.
    pub fn loaded(value: E) -> Self {
        Self {
            value: Some(value),
            modified: false,
            deleted: false,
        }
    }

    /// Replaces the value.
    pub fn update(&mut self, value: E) {
        self.value = Some(value);
        self.modified = true;
    }

    /// Clears the value.
    pub fn delete(&mut self) {
        self.value = None;
        self.deleted = true;
    }

    /// Forgets the recorded changes, keeping the value.
    pub fn reset(&mut self) {
        self.modified = false;
        self.deleted = false;
    }

    /// Current value.
    pub fn get(&self) -> Option<&E> {
        self.value.as_ref()
    }

    /// Whether `update` was called since the last reset.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether `delete` was called since the last reset.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The change to reconcile.
    pub fn change(&self) -> Change<'_, E> {
        if self.modified || self.deleted {
            Change::Replaced(self.value.as_ref())
        } else {
            Change::Unmodified
        }
    }
}

impl<E> Default for ItemTracker<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks a relation holding many values.
///
/// `flush` does not throw the previous elements away: they stay readable
/// through [`CollectionTracker::flushed_elements`] until the next reset.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionTracker<E> {
    elements: Vec<E>,
    added: Vec<E>,
    deleted: Vec<E>,
    flushed_at: Option<SystemTime>,
    flushed_elements: Vec<E>,
}

impl<E> CollectionTracker<E> {
    /// Creates an empty, untouched tracker.
    pub fn new() -> Self {
        Self::loaded(Vec::new())
    }

    /// Creates an untouched tracker around already persisted elements.
    pub fn loaded(elements: Vec<E>) -> Self {
        Self {
            elements,
            added: Vec::new(),
            deleted: Vec::new(),
            flushed_at: None,
            flushed_elements: Vec::new(),
        }
    }

    /// Live elements.
    pub fn elements(&self) -> &[E] {
        &self.elements
    }

    /// Elements added since the last reset or flush.
    pub fn added(&self) -> &[E] {
        &self.added
    }

    /// Elements deleted since the last reset or flush.
    pub fn deleted(&self) -> &[E] {
        &self.deleted
    }

    /// Whether the collection was flushed since the last reset.
    pub fn is_flushed(&self) -> bool {
        self.flushed_at.is_some()
    }

    /// When the collection was last flushed.
    pub fn flushed_at(&self) -> Option<SystemTime> {
        self.flushed_at
    }

    /// Elements that were live when the collection was flushed.
    pub fn flushed_elements(&self) -> &[E] {
        &self.flushed_elements
    }

    /// Empties the collection. Earlier additions and deletions of this cycle
    /// are superseded.
    pub fn flush(&mut self) {
        self.flushed_elements.append(&mut self.elements);
        self.added.clear();
        self.deleted.clear();
        self.flushed_at = Some(SystemTime::now());
    }

    /// Forgets the recorded changes, keeping the live elements.
    pub fn reset(&mut self) {
        self.added.clear();
        self.deleted.clear();
        self.flushed_at = None;
        self.flushed_elements.clear();
    }

    /// The change to reconcile.
    pub fn change(&self) -> Change<'_, E> {
        Change::Delta {
            added: &self.added,
            deleted: &self.deleted,
            flushed: self.is_flushed(),
        }
    }
}

impl<E: Clone + PartialEq> CollectionTracker<E> {
    /// Adds an element.
    pub fn add(&mut self, element: E) {
        self.deleted.retain(|e| e != &element);
        self.elements.push(element.clone());
        self.added.push(element);
    }

    /// Deletes an element.
    pub fn delete(&mut self, element: E) {
        self.elements.retain(|e| e != &element);
        self.added.retain(|e| e != &element);
        self.deleted.push(element);
    }
}

impl<E> Default for CollectionTracker<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_untouched_is_unmodified() {
        let tracker = ItemTracker::loaded(7);
        assert_eq!(tracker.change(), Change::Unmodified);
    }

    #[test]
    fn item_update_and_reset() {
        let mut tracker = ItemTracker::loaded(7);
        tracker.update(9);
        assert!(tracker.is_modified());
        assert_eq!(tracker.change(), Change::Replaced(Some(&9)));

        tracker.reset();
        assert_eq!(tracker.change(), Change::Unmodified);
        assert_eq!(tracker.get(), Some(&9));
    }

    #[test]
    fn item_delete_replaces_with_nothing() {
        let mut tracker = ItemTracker::loaded(7);
        tracker.delete();
        assert!(tracker.is_deleted());
        assert_eq!(tracker.change(), Change::Replaced(None));
    }

    #[test]
    fn collection_delta() {
        let mut tracker = CollectionTracker::loaded(vec![1, 2, 3]);
        tracker.add(4);
        tracker.delete(2);

        assert_eq!(tracker.elements(), [1, 3, 4]);
        assert_eq!(
            tracker.change(),
            Change::Delta {
                added: &[4],
                deleted: &[2],
                flushed: false
            }
        );
    }

    #[test]
    fn deleting_a_fresh_addition_cancels_it() {
        let mut tracker = CollectionTracker::new();
        tracker.add(5);
        tracker.delete(5);
        assert!(tracker.added().is_empty());
        assert_eq!(tracker.deleted(), [5]);
    }

    #[test]
    fn readding_a_deleted_element_withdraws_the_deletion() {
        let mut tracker = CollectionTracker::loaded(vec![5]);
        tracker.delete(5);
        tracker.add(5);
        assert_eq!(tracker.elements(), [5]);
        assert_eq!(tracker.added(), [5]);
        assert!(tracker.deleted().is_empty());
    }

    #[test]
    fn flush_keeps_previous_elements_for_inspection() {
        let mut tracker = CollectionTracker::loaded(vec![1, 2]);
        tracker.add(3);
        tracker.flush();
        tracker.add(10);

        assert!(tracker.is_flushed());
        assert!(tracker.flushed_at().is_some());
        assert_eq!(tracker.flushed_elements(), [1, 2, 3]);
        assert_eq!(tracker.elements(), [10]);
        assert_eq!(
            tracker.change(),
            Change::Delta {
                added: &[10],
                deleted: &[],
                flushed: true
            }
        );

        tracker.reset();
        assert!(!tracker.is_flushed());
        assert!(tracker.flushed_elements().is_empty());
        assert_eq!(tracker.elements(), [10]);
    }
}
