//! List reference builder.

use crate::context::BuildContext;
use crate::error::CoreResult;
use crate::reference::{ReferenceBuilder, ReferenceRef};
use crate::state::ChangeState;
use dstore_codec::Serializer;
use dstore_engine::KeyValueEngine;
use tracing::trace;

/// Stores a serialized list of projected values in the reference field.
///
/// Deleting removes matching values; adding appends values not yet present,
/// keeping insertion order. An empty list deletes the field.
pub struct ListReferenceBuilder<'a, E: ?Sized, S> {
    ctx: BuildContext<'a, E>,
    serializer: &'a S,
}

impl<'a, E: KeyValueEngine + ?Sized, S: Serializer> ListReferenceBuilder<'a, E, S> {
    /// Creates a builder.
    pub fn new(ctx: BuildContext<'a, E>, serializer: &'a S) -> Self {
        Self { ctx, serializer }
    }
}

impl<E: KeyValueEngine + ?Sized, S: Serializer> ReferenceBuilder for ListReferenceBuilder<'_, E, S> {
    fn build(&self, target: &ReferenceRef, state: &ChangeState) -> CoreResult<()> {
        if state.is_noop() {
            trace!(reference = %target, "unchanged");
            return Ok(());
        }

        let keys = self.ctx.keys();
        let sentinel = keys.ref_watch_key(&target.doc_type, &target.name, &target.doc_id)?;
        let hash = keys.refs_key(&target.doc_type)?;
        let field = keys.ref_field(&target.name, &target.doc_id)?;

        self.ctx.optimistic().run(&sentinel, |engine, tx| {
            let actual: Vec<String> = match engine.hget(&hash, &field)? {
                Some(bytes) => self.serializer.deserialize(&bytes)?,
                None => Vec::new(),
            };

            let mut wanted: Vec<String> = if state.should_flush() {
                Vec::new()
            } else {
                actual
                    .iter()
                    .filter(|value| !state.deleted().contains(value))
                    .cloned()
                    .collect()
            };
            for value in state.added() {
                if !wanted.contains(value) {
                    wanted.push(value.clone());
                }
            }

            if wanted == actual {
                return Ok(());
            }
            if wanted.is_empty() {
                tx.hdel(hash.as_str(), vec![field.clone()]);
            } else {
                tx.hset(hash.as_str(), field.as_str(), self.serializer.serialize(&wanted)?);
            }
            Ok(())
        })
    }
}
