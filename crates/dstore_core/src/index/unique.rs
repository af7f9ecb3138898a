//! Unique (dictionary) index builder.

use crate::context::BuildContext;
use crate::error::{CoreError, CoreResult};
use crate::index::{plan, IndexBuilder, IndexRef};
use crate::state::ChangeState;
use dstore_engine::{KeyValueEngine, Transaction};
use std::collections::BTreeSet;
use tracing::{trace, warn};

/// Maps each index value to exactly one document id, e.g. slug -> id.
///
/// When two documents claim the same value the last writer wins; the loser
/// keeps the value in its system record but no longer owns the lookup
/// entry, and never removes an entry it does not own.
pub struct UniqueIndexBuilder<'a, E: ?Sized> {
    ctx: BuildContext<'a, E>,
}

impl<'a, E: KeyValueEngine + ?Sized> UniqueIndexBuilder<'a, E> {
    /// Creates a builder.
    pub fn new(ctx: BuildContext<'a, E>) -> Self {
        Self { ctx }
    }
}

impl<E: KeyValueEngine + ?Sized> IndexBuilder for UniqueIndexBuilder<'_, E> {
    type Value = String;

    fn build(&self, target: &IndexRef, state: &ChangeState) -> CoreResult<()> {
        if state.is_noop() {
            trace!(index = %target, "unchanged");
            return Ok(());
        }
        if state.added().iter().any(String::is_empty) {
            return Err(CoreError::invalid_key("index value", "must not be empty"));
        }

        let keys = self.ctx.keys();
        let sentinel = keys.index_watch_key(&target.doc_type, &target.index, &target.doc_id)?;
        let system = keys.system_key(&target.doc_type, &target.index, &target.doc_id)?;
        let lookup = keys.index_hash_key(&target.doc_type, &target.index)?;

        self.ctx.optimistic().run(&sentinel, |engine, tx| {
            let actual: BTreeSet<String> = engine.smembers(&system)?.into_iter().collect();
            let plan = plan(&actual, state, true);

            release(engine, tx, &lookup, target, &plan.unlink)?;
            claim(engine, tx, &lookup, target, &plan.link)?;
            tx.srem(system.as_str(), plan.unlink)
                .sadd(system.as_str(), plan.recorded);
            Ok(())
        })
    }
}

/// Queues removal of the lookup entries of `values` still owned by the
/// target document.
///
/// The lookup hash is watched before its owners are read, so a rival claim
/// landing before `EXEC` aborts the unit instead of losing its entry.
pub(crate) fn release<E: KeyValueEngine + ?Sized>(
    engine: &E,
    tx: &mut Transaction,
    lookup: &str,
    target: &IndexRef,
    values: &[String],
) -> CoreResult<()> {
    if values.is_empty() {
        return Ok(());
    }
    engine.watch(&[lookup.to_string()])?;
    let owners = engine.hmget(lookup, values)?;
    let owned: Vec<String> = values
        .iter()
        .zip(owners)
        .filter(|(_, owner)| owner.as_deref() == Some(target.doc_id.as_bytes()))
        .map(|(value, _)| value.clone())
        .collect();
    tx.hdel(lookup, owned);
    Ok(())
}

/// Queues lookup entries pointing `values` at the target document, skipping
/// entries it already owns.
pub(crate) fn claim<E: KeyValueEngine + ?Sized>(
    engine: &E,
    tx: &mut Transaction,
    lookup: &str,
    target: &IndexRef,
    values: &[String],
) -> CoreResult<()> {
    if values.is_empty() {
        return Ok(());
    }
    engine.watch(&[lookup.to_string()])?;
    let owners = engine.hmget(lookup, values)?;
    for (value, owner) in values.iter().zip(owners) {
        match owner {
            Some(owner) if owner == target.doc_id.as_bytes() => continue,
            Some(owner) => warn!(
                index = %target,
                value = %value,
                previous = %String::from_utf8_lossy(&owner),
                "unique value changes owner"
            ),
            None => {}
        }
        tx.hset(lookup, value.as_str(), target.doc_id.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::keys::KeysResolver;
    use dstore_engine::InMemoryEngine;

    const LOOKUP: &str = "store:doc:product:index:by_sku";

    fn target(id: &str) -> IndexRef {
        IndexRef::new("product", id, "by_sku")
    }

    fn owner(engine: &InMemoryEngine, value: &str) -> Option<String> {
        engine
            .hget(LOOKUP, value)
            .unwrap()
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn maps_each_value_to_document() {
        let engine = InMemoryEngine::new();
        let keys = KeysResolver::default();
        let config = Config::default();
        let builder = UniqueIndexBuilder::new(BuildContext::new(&engine, &keys, &config));

        builder
            .build(&target("1"), &ChangeState::replace(strings(&["a-1", "a-2"])))
            .unwrap();
        assert_eq!(owner(&engine, "a-1").as_deref(), Some("1"));
        assert_eq!(owner(&engine, "a-2").as_deref(), Some("1"));

        builder
            .build(&target("1"), &ChangeState::new(vec![], strings(&["a-1"]), false))
            .unwrap();
        assert_eq!(owner(&engine, "a-1"), None);
        assert_eq!(owner(&engine, "a-2").as_deref(), Some("1"));
    }

    #[test]
    fn last_writer_wins_and_loser_cannot_release() {
        let engine = InMemoryEngine::new();
        let keys = KeysResolver::default();
        let config = Config::default();
        let builder = UniqueIndexBuilder::new(BuildContext::new(&engine, &keys, &config));

        builder
            .build(&target("1"), &ChangeState::replace(strings(&["dup"])))
            .unwrap();
        builder
            .build(&target("2"), &ChangeState::replace(strings(&["dup"])))
            .unwrap();
        assert_eq!(owner(&engine, "dup").as_deref(), Some("2"));

        builder.build(&target("1"), &ChangeState::flush()).unwrap();
        assert_eq!(owner(&engine, "dup").as_deref(), Some("2"));
    }

    #[test]
    fn rival_claim_before_commit_survives_release() {
        let engine = InMemoryEngine::new();
        let keys = KeysResolver::default();
        let config = Config::default();
        let builder = UniqueIndexBuilder::new(BuildContext::new(&engine, &keys, &config));
        builder
            .build(&target("1"), &ChangeState::replace(strings(&["dup"])))
            .unwrap();

        let rival = engine.session();
        engine.before_next_exec(move || {
            let keys = KeysResolver::default();
            let config = Config::default();
            UniqueIndexBuilder::new(BuildContext::new(&rival, &keys, &config))
                .build(&target("2"), &ChangeState::replace(strings(&["dup"])))
                .unwrap();
        });
        builder.build(&target("1"), &ChangeState::flush()).unwrap();

        assert_eq!(owner(&engine, "dup").as_deref(), Some("2"));
        assert!(engine.stats().transactions_aborted >= 1);
        let rival_record = keys.system_key("product", "by_sku", "2").unwrap();
        assert_eq!(engine.smembers(&rival_record).unwrap(), strings(&["dup"]));
        let own_record = keys.system_key("product", "by_sku", "1").unwrap();
        assert!(engine.smembers(&own_record).unwrap().is_empty());
    }

    #[test]
    fn readding_reclaims_lost_value() {
        let engine = InMemoryEngine::new();
        let keys = KeysResolver::default();
        let config = Config::default();
        let builder = UniqueIndexBuilder::new(BuildContext::new(&engine, &keys, &config));

        builder
            .build(&target("1"), &ChangeState::replace(strings(&["dup"])))
            .unwrap();
        builder
            .build(&target("2"), &ChangeState::replace(strings(&["dup"])))
            .unwrap();
        builder
            .build(&target("1"), &ChangeState::replace(strings(&["dup"])))
            .unwrap();
        assert_eq!(owner(&engine, "dup").as_deref(), Some("1"));
    }

    #[test]
    fn owned_values_are_not_rewritten() {
        let engine = InMemoryEngine::new();
        let keys = KeysResolver::default();
        let config = Config::default();
        let builder = UniqueIndexBuilder::new(BuildContext::new(&engine, &keys, &config));

        builder
            .build(&target("1"), &ChangeState::replace(strings(&["a"])))
            .unwrap();
        let before = engine.stats();
        builder
            .build(&target("1"), &ChangeState::replace(strings(&["a"])))
            .unwrap();

        assert_eq!(engine.stats().since(&before).transactions_committed, 0);
    }
}
