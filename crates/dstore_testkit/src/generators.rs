//! Property-based test generators using proptest.
//!
//! Provides strategies for index values, change states and tracker
//! operations that keep the key-layout constraints (no empty values).

use crate::fixtures::Tag;
use dstore_core::{ChangeState, CollectionTracker};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for index values drawn from a small alphabet, so that generated
/// states overlap with each other and with recorded values.
pub fn index_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f][0-9]?").expect("Invalid regex")
}

/// Strategy for recorded value sets.
pub fn record_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(index_value_strategy(), 0..6)
}

/// Strategy for arbitrary change states.
pub fn change_state_strategy() -> impl Strategy<Value = ChangeState> {
    (
        prop::collection::vec(index_value_strategy(), 0..4),
        prop::collection::vec(index_value_strategy(), 0..4),
        any::<bool>(),
    )
        .prop_map(|(added, deleted, flush)| ChangeState::new(added, deleted, flush))
}

/// One mutation of a tag collection.
#[derive(Debug, Clone)]
pub enum TagOperation {
    /// Add a tag.
    Add(u32),
    /// Delete a tag.
    Delete(u32),
    /// Flush the collection.
    Flush,
}

impl TagOperation {
    /// Applies the operation to a tracker.
    pub fn apply(&self, tags: &mut CollectionTracker<Tag>) {
        match self {
            TagOperation::Add(id) => tags.add(Tag::new(*id, format!("tag-{id}"))),
            TagOperation::Delete(id) => tags.delete(Tag::new(*id, format!("tag-{id}"))),
            TagOperation::Flush => tags.flush(),
        }
    }
}

/// Strategy for tag operations over a handful of tag ids.
pub fn tag_operation_strategy() -> impl Strategy<Value = TagOperation> {
    prop_oneof![
        4 => (1u32..8).prop_map(TagOperation::Add),
        3 => (1u32..8).prop_map(TagOperation::Delete),
        1 => Just(TagOperation::Flush),
    ]
}

/// Strategy for a sequence of tag operations.
pub fn tag_operations_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TagOperation>> {
    prop::collection::vec(tag_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
