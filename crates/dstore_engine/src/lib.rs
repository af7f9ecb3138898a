//! # dstore Engine
//!
//! Key-value engine abstraction for dstore.
//!
//! This crate provides:
//! - `KeyValueEngine` trait: the Redis-like command surface dstore relies on
//! - `Transaction`: commands queued for `MULTI` / `EXEC`
//! - `InMemoryEngine`: an in-process engine with sessions, `WATCH`, expiry,
//!   and fault injection for tests
//!
//! ## Design Principles
//!
//! - Engines are black boxes that store strings, hashes, sets and sorted sets
//! - Concurrency control is optimistic: watch, read, then execute or abort
//! - Document semantics live in `dstore_core`, never here

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod engine;
mod error;
mod memory;
mod stats;

pub use command::{Command, Transaction};
pub use engine::KeyValueEngine;
pub use error::{EngineError, EngineResult};
pub use memory::{Data, InMemoryEngine};
pub use stats::{EngineStats, StatsSnapshot};
