//! Secondary indexes.
//!
//! An index maps projected values to document ids. Four shapes exist:
//!
//! | Shape       | Lookup storage                                  | System record |
//! |-------------|-------------------------------------------------|---------------|
//! | `Set`       | set of doc ids per value                        | set of values |
//! | `SortedSet` | sorted set of doc ids per value, with scores    | set of values |
//! | `Unique`    | one hash, field = value, value = doc id         | set of values |
//! | `OneToOne`  | one hash, field = value, value = doc id         | single value  |
//!
//! Every builder follows the same reconciliation: read the system record
//! under a watch, compute the target set of values, unlink the document from
//! values that left, link it to values that arrived, then update the record
//! in the same transaction.

mod one_to_one;
mod set;
mod sorted;
mod unique;
mod values;

pub use one_to_one::OneToOneIndexBuilder;
pub use set::SetIndexBuilder;
pub use sorted::SortedIndexBuilder;
pub use unique::UniqueIndexBuilder;
pub use values::{ComplexValue, ScoredValue};

use crate::error::CoreResult;
use crate::state::{ChangeState, IndexValue};
use std::collections::BTreeSet;
use std::fmt;

/// Structural kind of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexShape {
    /// Value -> set of doc ids.
    Set,
    /// Value -> doc ids ordered by score.
    SortedSet,
    /// Value -> exactly one doc id; a document may hold several values.
    Unique,
    /// Value -> exactly one doc id; a document holds at most one value.
    OneToOne,
}

impl IndexShape {
    /// Lowercase name for errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexShape::Set => "set",
            IndexShape::SortedSet => "sorted set",
            IndexShape::Unique => "unique",
            IndexShape::OneToOne => "one-to-one",
        }
    }
}

impl fmt::Display for IndexShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One index of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRef {
    /// Document type.
    pub doc_type: String,
    /// Document id.
    pub doc_id: String,
    /// Index name.
    pub index: String,
}

impl IndexRef {
    /// Creates an index reference.
    pub fn new(
        doc_type: impl Into<String>,
        doc_id: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            doc_type: doc_type.into(),
            doc_id: doc_id.into(),
            index: index.into(),
        }
    }
}

impl fmt::Display for IndexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.doc_type, self.doc_id, self.index)
    }
}

/// Applies change states to one index shape.
///
/// # Invariants
///
/// - a no-op state performs no engine call at all
/// - after `build`, the system record equals `(A \ deleted) ∪ added`, or
///   `added` when the state flushes, where `A` is the record before
/// - only lookup entries of values entering or leaving the record are
///   written (sorted indexes also refresh the scores of `added`)
/// - the whole read-compute-write cycle is retried on conflict
///
/// # Implementors
///
/// - [`SetIndexBuilder`]
/// - [`SortedIndexBuilder`]
/// - [`UniqueIndexBuilder`]
/// - [`OneToOneIndexBuilder`]
pub trait IndexBuilder {
    /// The values this shape stores.
    type Value: IndexValue;

    /// Reconciles the index of `target` with `state`.
    fn build(&self, target: &IndexRef, state: &ChangeState<Self::Value>) -> CoreResult<()>;
}

/// What one reconciliation writes.
#[derive(Debug)]
pub(crate) struct Plan<V> {
    /// Values the document leaves.
    pub unlink: Vec<String>,
    /// Values the document joins (or refreshes).
    pub link: Vec<V>,
    /// Values entering the system record.
    pub recorded: Vec<String>,
}

/// Computes the writes turning `actual` into the state's target.
///
/// With `refresh`, values already present are linked again; later
/// duplicates of a value replace earlier ones.
pub(crate) fn plan<V: IndexValue>(
    actual: &BTreeSet<String>,
    state: &ChangeState<V>,
    refresh: bool,
) -> Plan<V> {
    let mut target: BTreeSet<String> = if state.should_flush() {
        BTreeSet::new()
    } else {
        let deleted: BTreeSet<&str> = state.deleted().iter().map(IndexValue::member).collect();
        actual
            .iter()
            .filter(|value| !deleted.contains(value.as_str()))
            .cloned()
            .collect()
    };

    let mut link: Vec<V> = Vec::new();
    for value in state.added() {
        let member = value.member();
        target.insert(member.to_string());
        if !refresh && actual.contains(member) {
            continue;
        }
        match link.iter().position(|linked| linked.member() == member) {
            Some(pos) => link[pos] = value.clone(),
            None => link.push(value.clone()),
        }
    }

    Plan {
        unlink: actual.difference(&target).cloned().collect(),
        link,
        recorded: target.difference(actual).cloned().collect(),
    }
}
