//! Single-value reference builder.

use crate::context::BuildContext;
use crate::error::{CoreError, CoreResult};
use crate::reference::{ReferenceBuilder, ReferenceRef};
use crate::state::ChangeState;
use dstore_engine::KeyValueEngine;
use tracing::trace;

/// Stores one projected value in the reference field.
///
/// Any added value replaces the stored one; more than one added value is
/// rejected with `TooManyValues`.
pub struct ItemReferenceBuilder<'a, E: ?Sized> {
    ctx: BuildContext<'a, E>,
}

impl<'a, E: KeyValueEngine + ?Sized> ItemReferenceBuilder<'a, E> {
    /// Creates a builder.
    pub fn new(ctx: BuildContext<'a, E>) -> Self {
        Self { ctx }
    }
}

impl<E: KeyValueEngine + ?Sized> ReferenceBuilder for ItemReferenceBuilder<'_, E> {
    fn build(&self, target: &ReferenceRef, state: &ChangeState) -> CoreResult<()> {
        if state.is_noop() {
            trace!(reference = %target, "unchanged");
            return Ok(());
        }
        if state.added().len() > 1 {
            return Err(CoreError::too_many_values(
                target.name.clone(),
                state.added().len(),
            ));
        }

        let keys = self.ctx.keys();
        let sentinel = keys.ref_watch_key(&target.doc_type, &target.name, &target.doc_id)?;
        let hash = keys.refs_key(&target.doc_type)?;
        let field = keys.ref_field(&target.name, &target.doc_id)?;

        self.ctx.optimistic().run(&sentinel, |engine, tx| {
            let actual = engine.hget(&hash, &field)?;

            let wanted: Option<Vec<u8>> = match state.added().first() {
                Some(value) => Some(value.clone().into_bytes()),
                None if state.should_flush() => None,
                None => match &actual {
                    Some(bytes) if state.deleted().iter().any(|d| d.as_bytes() == bytes.as_slice()) => None,
                    _ => actual.clone(),
                },
            };

            if wanted == actual {
                return Ok(());
            }
            match wanted {
                Some(bytes) => {
                    tx.hset(hash.as_str(), field.as_str(), bytes);
                }
                None => {
                    tx.hdel(hash.as_str(), vec![field.clone()]);
                }
            }
            Ok(())
        })
    }
}
