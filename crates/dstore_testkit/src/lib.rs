//! # dstore Testkit
//!
//! Test utilities for dstore.
//!
//! This crate provides:
//! - A catalog fixture domain (products, brands, tags) with a document that
//!   declares every index shape and reference kind
//! - An entity builder with a validation schema
//! - Property-based test generators using proptest
//! - Concurrent stress helpers running writers on separate engine sessions
//!
//! ## Usage
//!
//! ```rust
//! use dstore_testkit::prelude::*;
//!
//! let store = TestStore::new();
//! let mut doc = sample_product(42, 7);
//! store.persist(&mut doc).unwrap();
//!
//! assert_eq!(store.indexed("by_brand_id", "7"), vec!["42"]);
//! assert_eq!(store.record("42", "by_brand_id"), vec!["7"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
