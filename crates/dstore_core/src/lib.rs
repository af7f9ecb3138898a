//! # dstore Core
//!
//! Document persistence over a Redis-like key-value engine.
//!
//! This crate provides:
//! - `PersistGateway`: writes document attributes and keeps every declared
//!   index and reference in sync, plus read-side lookups
//! - Change tracking (`ItemTracker`, `CollectionTracker`) and the
//!   `StateResolver` turning tracked changes into `ChangeState`s
//! - Index builders for set, sorted set, unique and one-to-one indexes
//! - Reference builders for item and list references
//! - `KeysResolver`: the single source of truth for the key layout
//! - Declarative attribute validation for entity builders
//!
//! ## Reconciliation
//!
//! Every builder diffs against the system record stored in the engine, never
//! against in-memory history, inside a watched transaction that is retried on
//! conflict. Running a build twice converges to the same state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod document;
mod error;
mod gateway;
mod keys;
mod optimistic;
mod validate;

pub mod index;
pub mod reference;
pub mod state;

pub use config::{Config, RetryPolicy};
pub use context::BuildContext;
pub use document::{Document, IndexDescriptor, IndexState, ReferenceDescriptor};
pub use error::{CoreError, CoreResult};
pub use gateway::PersistGateway;
pub use index::{
    ComplexValue, IndexBuilder, IndexRef, IndexShape, OneToOneIndexBuilder, ScoredValue,
    SetIndexBuilder, SortedIndexBuilder, UniqueIndexBuilder,
};
pub use keys::KeysResolver;
pub use optimistic::Optimistic;
pub use reference::{
    ItemReferenceBuilder, ListReferenceBuilder, ReferenceBuilder, ReferenceKind, ReferenceRef,
};
pub use state::{
    Change, ChangeState, CollectionTracker, IndexValue, ItemTracker, Projection, RawState,
    StateResolver,
};
pub use validate::{Check, EntityBuilder, FieldRule, FieldType, Schema, Violation};
