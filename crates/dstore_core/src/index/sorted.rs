//! Sorted-set index builder.

use crate::context::BuildContext;
use crate::error::CoreResult;
use crate::index::{plan, IndexBuilder, IndexRef, ScoredValue};
use crate::state::ChangeState;
use dstore_engine::KeyValueEngine;
use std::collections::BTreeSet;
use tracing::trace;

/// Keeps one sorted set of document ids per index value, scored per
/// document. Used for ranked listings.
pub struct SortedIndexBuilder<'a, E: ?Sized> {
    ctx: BuildContext<'a, E>,
}

impl<'a, E: KeyValueEngine + ?Sized> SortedIndexBuilder<'a, E> {
    /// Creates a builder.
    pub fn new(ctx: BuildContext<'a, E>) -> Self {
        Self { ctx }
    }
}

impl<E: KeyValueEngine + ?Sized> IndexBuilder for SortedIndexBuilder<'_, E> {
    type Value = ScoredValue;

    fn build(&self, target: &IndexRef, state: &ChangeState<ScoredValue>) -> CoreResult<()> {
        if state.is_noop() {
            trace!(index = %target, "unchanged");
            return Ok(());
        }

        let keys = self.ctx.keys();
        let sentinel = keys.index_watch_key(&target.doc_type, &target.index, &target.doc_id)?;
        let system = keys.system_key(&target.doc_type, &target.index, &target.doc_id)?;

        self.ctx.optimistic().run(&sentinel, |engine, tx| {
            let actual: BTreeSet<String> = engine.smembers(&system)?.into_iter().collect();
            // Scores may change while the value stays, so added values are
            // always written again.
            let plan = plan(&actual, state, true);

            for value in &plan.unlink {
                let key = keys.index_key(&target.doc_type, &target.index, value)?;
                tx.zrem(key, vec![target.doc_id.clone()]);
            }
            for value in &plan.link {
                let key = keys.index_key(&target.doc_type, &target.index, value.value())?;
                tx.zadd(key, vec![(target.doc_id.clone(), value.score())]);
            }
            tx.srem(system.as_str(), plan.unlink)
                .sadd(system.as_str(), plan.recorded);
            Ok(())
        })
    }
}
