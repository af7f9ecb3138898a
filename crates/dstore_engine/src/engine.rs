//! Key-value engine trait definition.

use crate::command::{Command, Transaction};
use crate::error::EngineResult;
use std::sync::Arc;

/// A Redis-like key-value engine as seen by one client session.
///
/// Engines are treated as **black boxes**: dstore only needs reads on
/// strings, hashes, sets and sorted sets, single-command writes, and
/// optimistic transactions (`WATCH` / `MULTI` / `EXEC`).
///
/// # Invariants
///
/// - `watch` records the current version of each key for this session
/// - `exec` applies every queued command atomically, or none of them when a
///   watched key changed since `watch`; the failure is
///   [`crate::EngineError::TransactionAborted`]
/// - `exec` and `unwatch` always clear the session's watch set
/// - containers (hash, set, sorted set) that become empty cease to exist
/// - implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`crate::InMemoryEngine`] - shared in-process keyspace, for tests and
///   embedded use
pub trait KeyValueEngine: Send + Sync {
    /// Reads a string value.
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>>;

    /// Reads one field of a hash.
    fn hget(&self, key: &str, field: &str) -> EngineResult<Option<Vec<u8>>>;

    /// Reads several fields of a hash, in the order requested.
    ///
    /// Default implementation calls `hget()` per field.
    fn hmget(&self, key: &str, fields: &[String]) -> EngineResult<Vec<Option<Vec<u8>>>> {
        fields.iter().map(|field| self.hget(key, field)).collect()
    }

    /// Returns the members of a set in ascending order.
    fn smembers(&self, key: &str) -> EngineResult<Vec<String>>;

    /// Returns sorted-set members with `min <= score <= max`, ordered by
    /// score then member.
    fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> EngineResult<Vec<(String, f64)>>;

    /// Applies a single command immediately, outside any transaction.
    fn apply(&self, command: Command) -> EngineResult<()>;

    /// Starts watching keys for modification by anyone.
    fn watch(&self, keys: &[String]) -> EngineResult<()>;

    /// Forgets every watched key of this session.
    fn unwatch(&self) -> EngineResult<()>;

    /// Executes a queued transaction, honoring the session's watch set.
    fn exec(&self, transaction: Transaction) -> EngineResult<()>;

    /// `SET key value`.
    fn set(&self, key: &str, value: Vec<u8>) -> EngineResult<()> {
        self.apply(Command::Set {
            key: key.to_string(),
            value,
            ttl: None,
        })
    }

    /// `DEL key`.
    fn delete(&self, key: &str) -> EngineResult<()> {
        self.apply(Command::Del {
            key: key.to_string(),
        })
    }

    /// `HSET key field value`.
    fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> EngineResult<()> {
        self.apply(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value,
        })
    }

    /// `HDEL key field...`.
    fn hdel(&self, key: &str, fields: Vec<String>) -> EngineResult<()> {
        self.apply(Command::HDel {
            key: key.to_string(),
            fields,
        })
    }

    /// `SADD key member...`.
    fn sadd(&self, key: &str, members: Vec<String>) -> EngineResult<()> {
        self.apply(Command::SAdd {
            key: key.to_string(),
            members,
        })
    }

    /// `SREM key member...`.
    fn srem(&self, key: &str, members: Vec<String>) -> EngineResult<()> {
        self.apply(Command::SRem {
            key: key.to_string(),
            members,
        })
    }

    /// `ZADD key score member...`.
    fn zadd(&self, key: &str, members: Vec<(String, f64)>) -> EngineResult<()> {
        self.apply(Command::ZAdd {
            key: key.to_string(),
            members,
        })
    }

    /// `ZREM key member...`.
    fn zrem(&self, key: &str, members: Vec<String>) -> EngineResult<()> {
        self.apply(Command::ZRem {
            key: key.to_string(),
            members,
        })
    }
}

impl<E: KeyValueEngine + ?Sized> KeyValueEngine for Arc<E> {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn hget(&self, key: &str, field: &str) -> EngineResult<Option<Vec<u8>>> {
        (**self).hget(key, field)
    }

    fn hmget(&self, key: &str, fields: &[String]) -> EngineResult<Vec<Option<Vec<u8>>>> {
        (**self).hmget(key, fields)
    }

    fn smembers(&self, key: &str) -> EngineResult<Vec<String>> {
        (**self).smembers(key)
    }

    fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> EngineResult<Vec<(String, f64)>> {
        (**self).zrange_by_score(key, min, max)
    }

    fn apply(&self, command: Command) -> EngineResult<()> {
        (**self).apply(command)
    }

    fn watch(&self, keys: &[String]) -> EngineResult<()> {
        (**self).watch(keys)
    }

    fn unwatch(&self) -> EngineResult<()> {
        (**self).unwatch()
    }

    fn exec(&self, transaction: Transaction) -> EngineResult<()> {
        (**self).exec(transaction)
    }
}
