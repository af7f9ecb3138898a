//! Pending state transitions of index and reference slots.

use crate::error::{CoreError, CoreResult};
use dstore_codec::Value;
use std::fmt;

/// A value that can occupy an index slot.
///
/// `member` is the string stored in keys and system records.
pub trait IndexValue: Clone + fmt::Debug + Send + Sync + 'static {
    /// The string form stored in keys and system records.
    fn member(&self) -> &str;

    /// Builds a slot value from a plain scalar attribute.
    ///
    /// Returns `Ok(None)` for `Null`, which occupies no slot.
    fn from_scalar(value: &Value) -> CoreResult<Option<Self>>;
}

impl IndexValue for String {
    fn member(&self) -> &str {
        self
    }

    fn from_scalar(value: &Value) -> CoreResult<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        value.to_index_string().map(Some).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "{} cannot be used as an index value",
                value.type_name()
            ))
        })
    }
}

/// An immutable `(added, deleted, should_flush)` transition for one slot.
///
/// `should_flush` means every value recorded for the slot is erased before
/// `added` is applied; `deleted` is then irrelevant.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeState<V = String> {
    added: Vec<V>,
    deleted: Vec<V>,
    should_flush: bool,
}

impl<V> ChangeState<V> {
    /// Creates a transition.
    pub fn new(added: Vec<V>, deleted: Vec<V>, should_flush: bool) -> Self {
        Self {
            added,
            deleted,
            should_flush,
        }
    }

    /// A transition that changes nothing.
    pub fn unchanged() -> Self {
        Self::new(Vec::new(), Vec::new(), false)
    }

    /// Erases everything, then records `added`.
    pub fn replace(added: Vec<V>) -> Self {
        Self::new(added, Vec::new(), true)
    }

    /// Erases everything.
    pub fn flush() -> Self {
        Self::new(Vec::new(), Vec::new(), true)
    }

    /// Values to add.
    pub fn added(&self) -> &[V] {
        &self.added
    }

    /// Values to delete.
    pub fn deleted(&self) -> &[V] {
        &self.deleted
    }

    /// Whether recorded values are erased first.
    pub fn should_flush(&self) -> bool {
        self.should_flush
    }

    /// True when applying this transition can never touch the store.
    pub fn is_noop(&self) -> bool {
        !self.should_flush && self.added.is_empty() && self.deleted.is_empty()
    }

    /// Transforms every value.
    pub fn map<U>(self, mut f: impl FnMut(V) -> U) -> ChangeState<U> {
        ChangeState {
            added: self.added.into_iter().map(&mut f).collect(),
            deleted: self.deleted.into_iter().map(&mut f).collect(),
            should_flush: self.should_flush,
        }
    }
}

impl<V> Default for ChangeState<V> {
    fn default() -> Self {
        Self::unchanged()
    }
}
