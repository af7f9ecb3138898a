//! Documents and their declared indexes and references.
//!
//! A [`Document`] wraps an entity for persistence: it exposes the attribute
//! map and declares, in order, the indexes and references the gateway keeps
//! in sync. Each descriptor carries a state function producing the pending
//! [`ChangeState`] from the document, usually through [`StateResolver`].
//!
//! [`StateResolver`]: crate::state::StateResolver

use crate::error::{CoreError, CoreResult};
use crate::index::{IndexShape, ScoredValue};
use crate::reference::ReferenceKind;
use crate::state::ChangeState;
use dstore_codec::Attributes;
use std::fmt;

/// A persistable document.
pub trait Document {
    /// Document type, e.g. `product`.
    fn doc_type(&self) -> &str;

    /// Document id, unique within the type.
    fn doc_id(&self) -> String;

    /// Attributes to store.
    fn attributes(&self) -> Attributes;

    /// Indexes of this document type, in reconciliation order.
    fn indexes() -> Vec<IndexDescriptor<Self>>
    where
        Self: Sized;

    /// References of this document type, in reconciliation order.
    fn references() -> Vec<ReferenceDescriptor<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Pending state of one index, tagged by value kind.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexState {
    /// Plain string values (set, unique and one-to-one indexes).
    Plain(ChangeState),
    /// Scored values (sorted set indexes).
    Scored(ChangeState<ScoredValue>),
}

impl IndexState {
    /// A state erasing everything recorded for `shape`.
    pub fn flush(shape: IndexShape) -> Self {
        match shape {
            IndexShape::SortedSet => IndexState::Scored(ChangeState::flush()),
            _ => IndexState::Plain(ChangeState::flush()),
        }
    }

    /// Kind name for errors.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexState::Plain(_) => "plain",
            IndexState::Scored(_) => "scored",
        }
    }

    /// True when applying this state can never touch the store.
    pub fn is_noop(&self) -> bool {
        match self {
            IndexState::Plain(state) => state.is_noop(),
            IndexState::Scored(state) => state.is_noop(),
        }
    }

    /// Extracts plain state for an index declared as `shape`.
    pub fn into_plain(self, index: &str, shape: IndexShape) -> CoreResult<ChangeState> {
        match self {
            IndexState::Plain(state) => Ok(state),
            other => Err(mismatch(index, shape, &other)),
        }
    }

    /// Extracts scored state for an index declared as `shape`.
    pub fn into_scored(self, index: &str, shape: IndexShape) -> CoreResult<ChangeState<ScoredValue>> {
        match self {
            IndexState::Scored(state) => Ok(state),
            other => Err(mismatch(index, shape, &other)),
        }
    }
}

fn mismatch(index: &str, shape: IndexShape, state: &IndexState) -> CoreError {
    CoreError::ShapeMismatch {
        index: index.to_string(),
        declared: shape.as_str(),
        produced: state.kind(),
    }
}

impl From<ChangeState> for IndexState {
    fn from(state: ChangeState) -> Self {
        IndexState::Plain(state)
    }
}

impl From<ChangeState<ScoredValue>> for IndexState {
    fn from(state: ChangeState<ScoredValue>) -> Self {
        IndexState::Scored(state)
    }
}

type StateFn<D, S> = Box<dyn Fn(&D) -> CoreResult<S> + Send + Sync>;
type Predicate<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;

/// Declaration of one index of a document type.
pub struct IndexDescriptor<D> {
    name: String,
    shape: IndexShape,
    state: StateFn<D, IndexState>,
    should_index: Predicate<D>,
}

impl<D: 'static> IndexDescriptor<D> {
    /// Declares an index with an explicit shape.
    ///
    /// A state function producing the wrong value kind for `shape` fails
    /// with `ShapeMismatch` when the index is built.
    pub fn new<S, F>(name: impl Into<String>, shape: IndexShape, state: F) -> Self
    where
        S: Into<IndexState>,
        F: Fn(&D) -> CoreResult<S> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            shape,
            state: Box::new(move |doc| state(doc).map(Into::into)),
            should_index: Box::new(|_| true),
        }
    }

    /// Declares a set index.
    pub fn set<F>(name: impl Into<String>, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState> + Send + Sync + 'static,
    {
        Self::new(name, IndexShape::Set, state)
    }

    /// Declares a sorted set index.
    pub fn sorted<F>(name: impl Into<String>, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState<ScoredValue>> + Send + Sync + 'static,
    {
        Self::new(name, IndexShape::SortedSet, state)
    }

    /// Declares a unique index.
    pub fn unique<F>(name: impl Into<String>, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState> + Send + Sync + 'static,
    {
        Self::new(name, IndexShape::Unique, state)
    }

    /// Declares a one-to-one index.
    pub fn one_to_one<F>(name: impl Into<String>, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState> + Send + Sync + 'static,
    {
        Self::new(name, IndexShape::OneToOne, state)
    }

    /// Only index documents matching `predicate`.
    #[must_use]
    pub fn when(mut self, predicate: impl Fn(&D) -> bool + Send + Sync + 'static) -> Self {
        self.should_index = Box::new(predicate);
        self
    }
}

impl<D> IndexDescriptor<D> {
    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared shape.
    pub fn shape(&self) -> IndexShape {
        self.shape
    }

    /// Pending state of this index for `doc`.
    pub fn state(&self, doc: &D) -> CoreResult<IndexState> {
        (self.state)(doc)
    }

    /// Whether `doc` takes part in this index.
    pub fn should_index(&self, doc: &D) -> bool {
        (self.should_index)(doc)
    }
}

impl<D> fmt::Debug for IndexDescriptor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Declaration of one reference of a document type.
pub struct ReferenceDescriptor<D> {
    name: String,
    kind: ReferenceKind,
    state: StateFn<D, ChangeState>,
    should_handle: Predicate<D>,
}

impl<D: 'static> ReferenceDescriptor<D> {
    /// Declares a reference.
    pub fn new<F>(name: impl Into<String>, kind: ReferenceKind, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            state: Box::new(state),
            should_handle: Box::new(|_| true),
        }
    }

    /// Declares a single-value reference.
    pub fn item<F>(name: impl Into<String>, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState> + Send + Sync + 'static,
    {
        Self::new(name, ReferenceKind::Item, state)
    }

    /// Declares a list reference.
    pub fn list<F>(name: impl Into<String>, state: F) -> Self
    where
        F: Fn(&D) -> CoreResult<ChangeState> + Send + Sync + 'static,
    {
        Self::new(name, ReferenceKind::List, state)
    }

    /// Only maintain the reference for documents matching `predicate`.
    #[must_use]
    pub fn when(mut self, predicate: impl Fn(&D) -> bool + Send + Sync + 'static) -> Self {
        self.should_handle = Box::new(predicate);
        self
    }
}

impl<D> ReferenceDescriptor<D> {
    /// Reference name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage kind.
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Pending state of this reference for `doc`.
    pub fn state(&self, doc: &D) -> CoreResult<ChangeState> {
        (self.state)(doc)
    }

    /// Whether the reference is maintained for `doc`.
    pub fn should_handle(&self, doc: &D) -> bool {
        (self.should_handle)(doc)
    }
}

impl<D> fmt::Debug for ReferenceDescriptor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
