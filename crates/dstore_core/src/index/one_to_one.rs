//! One-to-one index builder.

use crate::context::BuildContext;
use crate::error::{CoreError, CoreResult};
use crate::index::unique::{claim, release};
use crate::index::{IndexBuilder, IndexRef};
use crate::state::ChangeState;
use dstore_codec::CodecError;
use dstore_engine::KeyValueEngine;
use tracing::trace;

/// Maps a document to at most one index value, and that value back to the
/// document. The system record is the single current value.
///
/// Any added value replaces the current one. A state carrying more than one
/// added value is rejected with `TooManyValues`.
pub struct OneToOneIndexBuilder<'a, E: ?Sized> {
    ctx: BuildContext<'a, E>,
}

impl<'a, E: KeyValueEngine + ?Sized> OneToOneIndexBuilder<'a, E> {
    /// Creates a builder.
    pub fn new(ctx: BuildContext<'a, E>) -> Self {
        Self { ctx }
    }
}

impl<E: KeyValueEngine + ?Sized> IndexBuilder for OneToOneIndexBuilder<'_, E> {
    type Value = String;

    fn build(&self, target: &IndexRef, state: &ChangeState) -> CoreResult<()> {
        if state.is_noop() {
            trace!(index = %target, "unchanged");
            return Ok(());
        }
        if state.added().len() > 1 {
            return Err(CoreError::too_many_values(
                target.index.clone(),
                state.added().len(),
            ));
        }

        let keys = self.ctx.keys();
        let sentinel = keys.index_watch_key(&target.doc_type, &target.index, &target.doc_id)?;
        let system = keys.system_key(&target.doc_type, &target.index, &target.doc_id)?;
        let lookup = keys.index_hash_key(&target.doc_type, &target.index)?;

        self.ctx.optimistic().run(&sentinel, |engine, tx| {
            let actual = match engine.get(&system)? {
                Some(bytes) => Some(String::from_utf8(bytes).map_err(|e| {
                    CodecError::decoding_failed(format!("system record {system}: {e}"))
                })?),
                None => None,
            };

            let wanted = match state.added().first() {
                Some(value) => Some(value.clone()),
                None if state.should_flush() => None,
                None if actual.as_ref().is_some_and(|a| state.deleted().contains(a)) => None,
                None => actual.clone(),
            };

            if let Some(current) = &actual {
                if wanted.as_ref() != Some(current) {
                    release(engine, tx, &lookup, target, std::slice::from_ref(current))?;
                }
            }
            if let Some(value) = &wanted {
                if value.is_empty() {
                    return Err(CoreError::invalid_key("index value", "must not be empty"));
                }
                claim(engine, tx, &lookup, target, std::slice::from_ref(value))?;
            }
            match (&actual, &wanted) {
                (current, Some(value)) if current.as_ref() != Some(value) => {
                    tx.set(system.as_str(), value.as_str());
                }
                (Some(_), None) => {
                    tx.del(system.as_str());
                }
                _ => {}
            }
            Ok(())
        })
    }
}
