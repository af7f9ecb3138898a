//! In-memory engine for tests and embedded use.

use crate::command::{Command, Transaction};
use crate::engine::KeyValueEngine;
use crate::error::{EngineError, EngineResult};
use crate::stats::{EngineStats, StatsSnapshot};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A value stored under one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Plain string (binary safe).
    String(Vec<u8>),
    /// Field/value hash.
    Hash(BTreeMap<String, Vec<u8>>),
    /// Unordered set of members.
    Set(BTreeSet<String>),
    /// Members with scores.
    SortedSet(BTreeMap<String, f64>),
}

impl Data {
    fn is_empty_container(&self) -> bool {
        match self {
            Data::String(_) => false,
            Data::Hash(h) => h.is_empty(),
            Data::Set(s) => s.is_empty(),
            Data::SortedSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

/// The shared keyspace. Every modification bumps the key's version, which is
/// what `WATCH` compares against.
///
/// A version is kept only while its key exists or some session watches it,
/// so the map stays bounded by the live and watched keys.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
    watchers: HashMap<String, usize>,
    clock: u64,
}

impl Keyspace {
    fn purge_if_expired(&mut self, key: &str) {
        let now = Instant::now();
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
            self.touch(key);
            self.forget(key);
        }
    }

    /// Drops the version of a key nobody can observe anymore.
    fn forget(&mut self, key: &str) {
        if !self.entries.contains_key(key) && !self.watchers.contains_key(key) {
            self.versions.remove(key);
        }
    }

    fn watch(&mut self, key: &str) -> u64 {
        self.purge_if_expired(key);
        *self.watchers.entry(key.to_string()).or_insert(0) += 1;
        self.version(key)
    }

    fn release<'k>(&mut self, keys: impl IntoIterator<Item = &'k String>) {
        for key in keys {
            if let Some(count) = self.watchers.get_mut(key.as_str()) {
                *count -= 1;
                if *count == 0 {
                    self.watchers.remove(key.as_str());
                }
            }
            self.forget(key);
        }
    }

    /// Returns the first watched key modified since it was watched. Expired
    /// keys count as modified.
    fn conflict<'w>(&mut self, watched: &'w [(String, u64)]) -> Option<&'w str> {
        for (key, _) in watched {
            self.purge_if_expired(key);
        }
        watched
            .iter()
            .find(|(key, version)| self.version(key) != *version)
            .map(|(key, _)| key.as_str())
    }

    fn live(&mut self, key: &str) -> Option<&Data> {
        self.purge_if_expired(key);
        self.entries.get(key).map(|entry| &entry.data)
    }

    fn existing_mut(&mut self, key: &str) -> Option<&mut Data> {
        self.purge_if_expired(key);
        self.entries.get_mut(key).map(|entry| &mut entry.data)
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        self.clock += 1;
        self.versions.insert(key.to_string(), self.clock);
    }

    fn container_mut(&mut self, key: &str, empty: fn() -> Data) -> &mut Data {
        self.purge_if_expired(key);
        &mut self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                data: empty(),
                expires_at: None,
            })
            .data
    }

    fn drop_if_empty(&mut self, key: &str) {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.data.is_empty_container())
        {
            self.entries.remove(key);
        }
    }

    fn apply(&mut self, command: Command) -> EngineResult<()> {
        let key = command.key().to_string();
        if key.is_empty() {
            return Err(EngineError::invalid_argument("empty key"));
        }

        let changed = match command {
            Command::Set { key, value, ttl } => {
                let expires_at = ttl.map(|ttl| Instant::now() + ttl);
                self.entries.insert(
                    key,
                    Entry {
                        data: Data::String(value),
                        expires_at,
                    },
                );
                true
            }
            Command::Del { key } => {
                self.purge_if_expired(&key);
                self.entries.remove(&key).is_some()
            }
            Command::HSet { key, field, value } => {
                match self.container_mut(&key, || Data::Hash(BTreeMap::new())) {
                    Data::Hash(hash) => {
                        hash.insert(field, value);
                        true
                    }
                    _ => return Err(EngineError::wrong_type(key, "hash")),
                }
            }
            Command::HDel { key, fields } => match self.existing_mut(&key) {
                None => false,
                Some(Data::Hash(hash)) => {
                    let before = hash.len();
                    for field in &fields {
                        hash.remove(field);
                    }
                    hash.len() != before
                }
                Some(_) => return Err(EngineError::wrong_type(key, "hash")),
            },
            Command::SAdd { key, members } => {
                match self.container_mut(&key, || Data::Set(BTreeSet::new())) {
                    Data::Set(set) => {
                        let before = set.len();
                        set.extend(members);
                        set.len() != before
                    }
                    _ => return Err(EngineError::wrong_type(key, "set")),
                }
            }
            Command::SRem { key, members } => match self.existing_mut(&key) {
                None => false,
                Some(Data::Set(set)) => {
                    let before = set.len();
                    for member in &members {
                        set.remove(member);
                    }
                    set.len() != before
                }
                Some(_) => return Err(EngineError::wrong_type(key, "set")),
            },
            Command::ZAdd { key, members } => {
                if members.iter().any(|(_, score)| score.is_nan()) {
                    return Err(EngineError::invalid_argument("score is not a number"));
                }
                match self.container_mut(&key, || Data::SortedSet(BTreeMap::new())) {
                    Data::SortedSet(zset) => {
                        let mut changed = false;
                        for (member, score) in members {
                            changed |= zset.insert(member, score) != Some(score);
                        }
                        changed
                    }
                    _ => return Err(EngineError::wrong_type(key, "zset")),
                }
            }
            Command::ZRem { key, members } => match self.existing_mut(&key) {
                None => false,
                Some(Data::SortedSet(zset)) => {
                    let before = zset.len();
                    for member in &members {
                        zset.remove(member);
                    }
                    zset.len() != before
                }
                Some(_) => return Err(EngineError::wrong_type(key, "zset")),
            },
        };

        self.drop_if_empty(&key);
        if changed {
            self.touch(&key);
        }
        self.forget(&key);
        Ok(())
    }
}

type ExecHook = Box<dyn FnOnce() + Send>;

struct Shared {
    keyspace: Mutex<Keyspace>,
    faults: Mutex<VecDeque<EngineError>>,
    hooks: Mutex<VecDeque<ExecHook>>,
    stats: EngineStats,
}

/// An in-memory, Redis-like engine.
///
/// Every `InMemoryEngine` is one client session over a shared keyspace:
/// [`InMemoryEngine::session`] opens another session on the same data with
/// its own watch set, the way separate processes hold separate connections.
///
/// # Fault injection
///
/// Tests can force the optimistic paths deterministically:
/// - [`InMemoryEngine::fail_next_exec`] makes the next `exec` on any session
///   fail with the given error, without applying anything
/// - [`InMemoryEngine::before_next_exec`] runs a closure right before the next
///   `exec` checks its watches, which is where a concurrent writer would
///   strike
///
/// # Example
///
/// ```rust
/// use dstore_engine::{InMemoryEngine, KeyValueEngine, Transaction, EngineError};
///
/// let alice = InMemoryEngine::new();
/// let bob = alice.session();
///
/// alice.watch(&["counter".to_string()]).unwrap();
/// bob.set("counter", b"1".to_vec()).unwrap();
///
/// let mut tx = Transaction::new();
/// tx.set("counter", "2");
/// assert_eq!(alice.exec(tx), Err(EngineError::TransactionAborted));
/// ```
pub struct InMemoryEngine {
    shared: Arc<Shared>,
    watched: Mutex<Vec<(String, u64)>>,
}

impl InMemoryEngine {
    /// Creates an empty keyspace and a first session on it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                keyspace: Mutex::new(Keyspace::default()),
                faults: Mutex::new(VecDeque::new()),
                hooks: Mutex::new(VecDeque::new()),
                stats: EngineStats::new(),
            }),
            watched: Mutex::new(Vec::new()),
        }
    }

    /// Opens another session on the same keyspace.
    #[must_use]
    pub fn session(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            watched: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next `exec` (on any session) fail with `error`.
    ///
    /// Calls queue up: three calls fail the next three executions.
    pub fn fail_next_exec(&self, error: EngineError) {
        self.shared.faults.lock().push_back(error);
    }

    /// Runs `hook` right before the next `exec` validates its watch set.
    pub fn before_next_exec(&self, hook: impl FnOnce() + Send + 'static) {
        self.shared.hooks.lock().push_back(Box::new(hook));
    }

    /// Returns a copy of the engine counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Returns every live key with its data, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Data> {
        let now = Instant::now();
        let keyspace = self.shared.keyspace.lock();
        keyspace
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at.map_or(true, |at| at > now))
            .map(|(key, entry)| (key.clone(), entry.data.clone()))
            .collect()
    }

    /// Returns live keys starting with `prefix`, in ascending order.
    #[must_use]
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        self.snapshot()
            .into_keys()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    /// Returns the remaining time to live of a key, if it has one.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let keyspace = self.shared.keyspace.lock();
        keyspace
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .and_then(|at| at.checked_duration_since(now))
    }

    /// Removes every key. Versions keep increasing so stale watches still
    /// notice the wipe.
    pub fn flush_all(&self) {
        let mut keyspace = self.shared.keyspace.lock();
        let keys: Vec<String> = keyspace.entries.keys().cloned().collect();
        keyspace.entries.clear();
        for key in keys {
            keyspace.touch(&key);
            keyspace.forget(&key);
        }
    }

    /// Number of keys whose version the keyspace still tracks.
    #[cfg(test)]
    fn tracked_versions(&self) -> usize {
        self.shared.keyspace.lock().versions.len()
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryEngine {
    fn drop(&mut self) {
        let watched = std::mem::take(self.watched.get_mut());
        if !watched.is_empty() {
            self.shared
                .keyspace
                .lock()
                .release(watched.iter().map(|(key, _)| key));
        }
    }
}

impl fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEngine")
            .field("keys", &self.shared.keyspace.lock().entries.len())
            .field("watched", &self.watched.lock().len())
            .finish()
    }
}

impl KeyValueEngine for InMemoryEngine {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let mut keyspace = self.shared.keyspace.lock();
        match keyspace.live(key) {
            None => Ok(None),
            Some(Data::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(EngineError::wrong_type(key, "string")),
        }
    }

    fn hget(&self, key: &str, field: &str) -> EngineResult<Option<Vec<u8>>> {
        let mut keyspace = self.shared.keyspace.lock();
        match keyspace.live(key) {
            None => Ok(None),
            Some(Data::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(EngineError::wrong_type(key, "hash")),
        }
    }

    fn hmget(&self, key: &str, fields: &[String]) -> EngineResult<Vec<Option<Vec<u8>>>> {
        let mut keyspace = self.shared.keyspace.lock();
        match keyspace.live(key) {
            None => Ok(vec![None; fields.len()]),
            Some(Data::Hash(hash)) => Ok(fields.iter().map(|f| hash.get(f).cloned()).collect()),
            Some(_) => Err(EngineError::wrong_type(key, "hash")),
        }
    }

    fn smembers(&self, key: &str) -> EngineResult<Vec<String>> {
        let mut keyspace = self.shared.keyspace.lock();
        match keyspace.live(key) {
            None => Ok(Vec::new()),
            Some(Data::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(EngineError::wrong_type(key, "set")),
        }
    }

    fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> EngineResult<Vec<(String, f64)>> {
        let mut keyspace = self.shared.keyspace.lock();
        match keyspace.live(key) {
            None => Ok(Vec::new()),
            Some(Data::SortedSet(zset)) => {
                let mut members: Vec<(String, f64)> = zset
                    .iter()
                    .filter(|(_, score)| **score >= min && **score <= max)
                    .map(|(member, score)| (member.clone(), *score))
                    .collect();
                members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Ok(members)
            }
            Some(_) => Err(EngineError::wrong_type(key, "zset")),
        }
    }

    fn apply(&self, command: Command) -> EngineResult<()> {
        let result = self.shared.keyspace.lock().apply(command);
        self.shared.stats.record_command();
        result
    }

    fn watch(&self, keys: &[String]) -> EngineResult<()> {
        let mut keyspace = self.shared.keyspace.lock();
        let mut watched = self.watched.lock();
        for key in keys {
            let version = keyspace.watch(key);
            watched.push((key.clone(), version));
        }
        self.shared.stats.record_watch();
        Ok(())
    }

    fn unwatch(&self) -> EngineResult<()> {
        let watched = std::mem::take(&mut *self.watched.lock());
        self.shared
            .keyspace
            .lock()
            .release(watched.iter().map(|(key, _)| key));
        Ok(())
    }

    fn exec(&self, transaction: Transaction) -> EngineResult<()> {
        let hook = self.shared.hooks.lock().pop_front();
        if let Some(hook) = hook {
            hook();
        }

        let watched = std::mem::take(&mut *self.watched.lock());
        let fault = self.shared.faults.lock().pop_front();

        let mut keyspace = self.shared.keyspace.lock();
        let conflict = keyspace.conflict(&watched).map(str::to_string);
        keyspace.release(watched.iter().map(|(key, _)| key));

        if let Some(error) = fault {
            self.shared.stats.record_abort();
            return Err(error);
        }
        if let Some(key) = conflict {
            tracing::trace!(key = %key, "watched key changed, discarding transaction");
            self.shared.stats.record_abort();
            return Err(EngineError::TransactionAborted);
        }

        // Like EXEC, a failing command does not undo the others.
        let mut first_error = None;
        for command in transaction.into_commands() {
            if let Err(error) = keyspace.apply(command) {
                first_error.get_or_insert(error);
            }
            self.shared.stats.record_command();
        }
        self.shared.stats.record_commit();

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn string_set_get_delete() {
        let engine = InMemoryEngine::new();
        engine.set("k", b"v".to_vec()).unwrap();
        assert_eq!(engine.get("k").unwrap(), Some(b"v".to_vec()));

        engine.delete("k").unwrap();
        assert_eq!(engine.get("k").unwrap(), None);
    }

    #[test]
    fn hash_operations() {
        let engine = InMemoryEngine::new();
        engine.hset("h", "a", b"1".to_vec()).unwrap();
        engine.hset("h", "b", b"2".to_vec()).unwrap();

        assert_eq!(engine.hget("h", "a").unwrap(), Some(b"1".to_vec()));
        let many = engine.hmget("h", &members(&["b", "zz", "a"])).unwrap();
        assert_eq!(many, vec![Some(b"2".to_vec()), None, Some(b"1".to_vec())]);

        engine.hdel("h", members(&["a", "b"])).unwrap();
        assert!(engine.snapshot().is_empty(), "empty hash must vanish");
    }

    #[test]
    fn set_operations() {
        let engine = InMemoryEngine::new();
        engine.sadd("s", members(&["b", "a", "b"])).unwrap();
        assert_eq!(engine.smembers("s").unwrap(), members(&["a", "b"]));

        engine.srem("s", members(&["a", "b"])).unwrap();
        assert!(engine.smembers("s").unwrap().is_empty());
        assert!(engine.keys("").is_empty());
    }

    #[test]
    fn sorted_set_range_is_ordered_by_score() {
        let engine = InMemoryEngine::new();
        engine
            .zadd(
                "z",
                vec![("c".into(), 3.0), ("a".into(), 1.0), ("b".into(), 2.0)],
            )
            .unwrap();

        let range = engine.zrange_by_score("z", 1.5, f64::INFINITY).unwrap();
        assert_eq!(range, vec![("b".to_string(), 2.0), ("c".to_string(), 3.0)]);

        engine.zadd("z", vec![("a".into(), 10.0)]).unwrap();
        let all = engine
            .zrange_by_score("z", f64::NEG_INFINITY, f64::INFINITY)
            .unwrap();
        assert_eq!(all.last().unwrap(), &("a".to_string(), 10.0));
    }

    #[test]
    fn nan_score_rejected() {
        let engine = InMemoryEngine::new();
        let result = engine.zadd("z", vec![("a".into(), f64::NAN)]);
        assert!(matches!(result, Err(EngineError::InvalidArgument { .. })));
    }

    #[test]
    fn wrong_type_is_reported() {
        let engine = InMemoryEngine::new();
        engine.sadd("s", members(&["a"])).unwrap();

        assert!(matches!(
            engine.hget("s", "f"),
            Err(EngineError::WrongType { .. })
        ));
        assert!(matches!(
            engine.hset("s", "f", vec![]),
            Err(EngineError::WrongType { .. })
        ));
    }

    #[test]
    fn conflicting_write_aborts_transaction() {
        let alice = InMemoryEngine::new();
        let bob = alice.session();

        alice.watch(&members(&["w"])).unwrap();
        bob.set("w", b"x".to_vec()).unwrap();

        let mut tx = Transaction::new();
        tx.sadd("s", members(&["1"]));
        assert_eq!(alice.exec(tx), Err(EngineError::TransactionAborted));
        assert!(alice.smembers("s").unwrap().is_empty());
        assert_eq!(alice.stats().transactions_aborted, 1);
    }

    #[test]
    fn own_transaction_may_write_watched_key() {
        let engine = InMemoryEngine::new();
        engine.watch(&members(&["w"])).unwrap();

        let mut tx = Transaction::new();
        tx.setex("w", Duration::from_secs(5), "").sadd("s", members(&["1"]));
        engine.exec(tx).unwrap();

        assert_eq!(engine.smembers("s").unwrap(), members(&["1"]));
        assert!(engine.ttl("w").is_some());
    }

    #[test]
    fn exec_clears_watch_set() {
        let alice = InMemoryEngine::new();
        let bob = alice.session();

        alice.watch(&members(&["w"])).unwrap();
        alice.exec(Transaction::new()).unwrap();
        bob.set("w", b"x".to_vec()).unwrap();

        // The earlier watch is gone, so this one commits.
        let mut tx = Transaction::new();
        tx.set("k", "v");
        alice.exec(tx).unwrap();
    }

    #[test]
    fn unwatch_forgets_keys() {
        let alice = InMemoryEngine::new();
        let bob = alice.session();

        alice.watch(&members(&["w"])).unwrap();
        alice.unwatch().unwrap();
        bob.set("w", b"x".to_vec()).unwrap();

        let mut tx = Transaction::new();
        tx.set("k", "v");
        assert!(alice.exec(tx).is_ok());
    }

    #[test]
    fn removing_absent_member_does_not_conflict() {
        let alice = InMemoryEngine::new();
        let bob = alice.session();

        alice.watch(&members(&["s"])).unwrap();
        bob.srem("s", members(&["ghost"])).unwrap();

        assert!(alice.exec(Transaction::new()).is_ok());
    }

    #[test]
    fn keys_expire() {
        let engine = InMemoryEngine::new();
        let mut tx = Transaction::new();
        tx.setex("w", Duration::from_millis(10), "");
        engine.exec(tx).unwrap();
        assert!(engine.get("w").unwrap().is_some());

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(engine.get("w").unwrap(), None);
        assert!(engine.snapshot().is_empty());
    }

    #[test]
    fn injected_fault_discards_transaction() {
        let engine = InMemoryEngine::new();
        engine.fail_next_exec(EngineError::connection("broken pipe"));

        let mut tx = Transaction::new();
        tx.set("k", "v");
        assert!(matches!(
            engine.exec(tx.clone()),
            Err(EngineError::Connection { .. })
        ));
        assert_eq!(engine.get("k").unwrap(), None);

        engine.exec(tx).unwrap();
        assert_eq!(engine.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn hook_simulates_concurrent_writer() {
        let alice = InMemoryEngine::new();
        let bob = alice.session();
        alice.before_next_exec(move || {
            bob.set("w", b"bob".to_vec()).unwrap();
        });

        alice.watch(&members(&["w"])).unwrap();
        let mut tx = Transaction::new();
        tx.set("w", "alice");
        assert_eq!(alice.exec(tx), Err(EngineError::TransactionAborted));
        assert_eq!(alice.get("w").unwrap(), Some(b"bob".to_vec()));
    }

    #[test]
    fn partial_failure_keeps_other_commands() {
        let engine = InMemoryEngine::new();
        engine.set("str", b"x".to_vec()).unwrap();

        let mut tx = Transaction::new();
        tx.sadd("str", members(&["a"])).sadd("s", members(&["a"]));
        assert!(matches!(engine.exec(tx), Err(EngineError::WrongType { .. })));
        assert_eq!(engine.smembers("s").unwrap(), members(&["a"]));
    }

    #[test]
    fn flush_all_invalidates_watches() {
        let alice = InMemoryEngine::new();
        alice.set("w", b"1".to_vec()).unwrap();
        alice.watch(&members(&["w"])).unwrap();
        alice.session().flush_all();

        assert_eq!(
            alice.exec(Transaction::new()),
            Err(EngineError::TransactionAborted)
        );
    }

    #[test]
    fn expired_watched_key_aborts() {
        let alice = InMemoryEngine::new();
        let mut tx = Transaction::new();
        tx.setex("lease", Duration::from_millis(20), b"1".to_vec());
        alice.exec(tx).unwrap();

        alice.watch(&members(&["lease"])).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        let mut tx = Transaction::new();
        tx.set("other", "x");
        assert_eq!(alice.exec(tx), Err(EngineError::TransactionAborted));
        assert_eq!(alice.get("other").unwrap(), None);
    }

    #[test]
    fn created_then_deleted_key_still_aborts() {
        let alice = InMemoryEngine::new();
        let bob = alice.session();

        alice.watch(&members(&["ghost"])).unwrap();
        bob.set("ghost", b"1".to_vec()).unwrap();
        bob.delete("ghost").unwrap();

        assert_eq!(
            alice.exec(Transaction::new()),
            Err(EngineError::TransactionAborted)
        );
    }

    #[test]
    fn versions_follow_live_and_watched_keys() {
        let engine = InMemoryEngine::new();
        for i in 0..100 {
            let key = format!("k{i}");
            engine.set(&key, b"v".to_vec()).unwrap();
            engine.delete(&key).unwrap();
        }
        engine.sadd("s", members(&["a"])).unwrap();
        assert_eq!(engine.tracked_versions(), 1);

        let watcher = engine.session();
        watcher.watch(&members(&["s", "missing"])).unwrap();
        engine.srem("s", members(&["a"])).unwrap();
        assert_eq!(engine.tracked_versions(), 1);

        watcher.unwatch().unwrap();
        assert_eq!(engine.tracked_versions(), 0);

        let dropped = engine.session();
        dropped.watch(&members(&["s"])).unwrap();
        engine.sadd("s", members(&["b"])).unwrap();
        engine.srem("s", members(&["b"])).unwrap();
        drop(dropped);
        assert_eq!(engine.tracked_versions(), 0);
    }

    mod model {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        proptest! {
            #[test]
            fn set_commands_follow_a_btreeset(
                ops in prop::collection::vec((any::<bool>(), "[a-d]"), 0..40)
            ) {
                let engine = InMemoryEngine::new();
                let mut model = BTreeSet::new();
                for (add, member) in ops {
                    if add {
                        engine.sadd("s", vec![member.clone()]).unwrap();
                        model.insert(member);
                    } else {
                        engine.srem("s", vec![member.clone()]).unwrap();
                        model.remove(&member);
                    }
                }
                let expected: Vec<String> = model.iter().cloned().collect();
                prop_assert_eq!(engine.smembers("s").unwrap(), expected);
                prop_assert_eq!(engine.keys("s").is_empty(), model.is_empty());
            }
        }
    }
}
