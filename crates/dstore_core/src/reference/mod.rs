//! Cached denormalized references.
//!
//! A reference stores a projection of related data next to the document,
//! e.g. the brand title of a product, so readers avoid a join. All
//! references of a document type share one hash; the field of a reference
//! is `{name}:{doc_id}`.

mod item;
mod list;

pub use item::ItemReferenceBuilder;
pub use list::ListReferenceBuilder;

use crate::error::CoreResult;
use crate::state::ChangeState;
use std::fmt;

/// Storage kind of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A single value stored as-is.
    Item,
    /// A list of values stored serialized.
    List,
}

impl ReferenceKind {
    /// Lowercase name for errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Item => "item",
            ReferenceKind::List => "list",
        }
    }
}

/// One reference of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceRef {
    /// Document type.
    pub doc_type: String,
    /// Document id.
    pub doc_id: String,
    /// Reference name.
    pub name: String,
}

impl ReferenceRef {
    /// Creates a reference handle.
    pub fn new(
        doc_type: impl Into<String>,
        doc_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            doc_type: doc_type.into(),
            doc_id: doc_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ReferenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/ref:{}", self.doc_type, self.doc_id, self.name)
    }
}

/// Applies change states to one reference kind.
///
/// The stored field itself is the record reconciliation diffs against; an
/// empty result deletes the field.
///
/// # Implementors
///
/// - [`ItemReferenceBuilder`]
/// - [`ListReferenceBuilder`]
pub trait ReferenceBuilder {
    /// Reconciles the reference of `target` with `state`.
    fn build(&self, target: &ReferenceRef, state: &ChangeState) -> CoreResult<()>;
}
