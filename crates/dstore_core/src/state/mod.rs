//! Change tracking and state resolution.
//!
//! Entities record relation changes in trackers; the resolver turns a
//! tracker (or a plain attribute) into a [`ChangeState`] that builders apply.

mod change;
mod resolver;
mod tracker;

pub use change::{ChangeState, IndexValue};
pub use resolver::{Projection, RawState, StateResolver};
pub use tracker::{Change, CollectionTracker, ItemTracker};
