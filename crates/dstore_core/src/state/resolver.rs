//! Turning raw relation state into [`ChangeState`].

use crate::error::{CoreError, CoreResult};
use crate::state::change::{ChangeState, IndexValue};
use crate::state::tracker::Change;
use dstore_codec::Value;

/// The raw state a document hands over for one index or reference.
#[derive(Debug)]
pub enum RawState<'a, E> {
    /// A tracked relation.
    Tracked(Change<'a, E>),
    /// A plain list of entities; always a full replacement.
    Entities(&'a [E]),
    /// A plain scalar attribute; always a full replacement.
    Scalar(Value),
    /// A plain list of scalars; always a full replacement.
    Scalars(Vec<Value>),
}

impl<'a, E> From<Change<'a, E>> for RawState<'a, E> {
    fn from(change: Change<'a, E>) -> Self {
        RawState::Tracked(change)
    }
}

/// Projection from an entity to the value stored in an index slot.
pub type Projection<'p, E, V> = &'p dyn Fn(&E) -> V;

/// Computes change states.
///
/// | Input                    | `added`               | `deleted`         | flush     |
/// |--------------------------|-----------------------|-------------------|-----------|
/// | unmodified item          | none                  | none              | no        |
/// | replaced item            | projected value, if any | none            | yes       |
/// | collection delta         | projected added       | projected deleted | if flushed|
/// | entity list              | projected entities    | none              | yes       |
/// | scalar                   | the scalar, unless null | none            | yes       |
/// | scalar list              | every non-null scalar | none              | yes       |
#[derive(Debug, Clone, Copy, Default)]
pub struct StateResolver;

impl StateResolver {
    /// Resolves `raw` into a change state.
    ///
    /// # Errors
    ///
    /// `MissingProjection` when `raw` carries entities and `project` is
    /// `None`; `InvalidOperation` for scalars that cannot name a slot.
    pub fn resolve<E, V: IndexValue>(
        raw: RawState<'_, E>,
        project: Option<Projection<'_, E, V>>,
    ) -> CoreResult<ChangeState<V>> {
        match raw {
            RawState::Tracked(change) => {
                let project = project.ok_or_else(|| CoreError::missing_projection("tracked relation"))?;
                Ok(match change {
                    Change::Unmodified => ChangeState::unchanged(),
                    Change::Replaced(value) => ChangeState::replace(value.map(project).into_iter().collect()),
                    Change::Delta {
                        added,
                        deleted,
                        flushed,
                    } => ChangeState::new(
                        added.iter().map(project).collect(),
                        deleted.iter().map(project).collect(),
                        flushed,
                    ),
                })
            }
            RawState::Entities(entities) => {
                let project = project.ok_or_else(|| CoreError::missing_projection("entity list"))?;
                Ok(ChangeState::replace(entities.iter().map(project).collect()))
            }
            RawState::Scalar(value) => {
                Ok(ChangeState::replace(V::from_scalar(&value)?.into_iter().collect()))
            }
            RawState::Scalars(values) => {
                let mut added = Vec::with_capacity(values.len());
                for value in &values {
                    added.extend(V::from_scalar(value)?);
                }
                Ok(ChangeState::replace(added))
            }
        }
    }

    /// Resolves entity-carrying state with a projection.
    pub fn project<'r, E: 'r, V: IndexValue>(
        raw: impl Into<RawState<'r, E>>,
        project: impl Fn(&E) -> V,
    ) -> CoreResult<ChangeState<V>> {
        let project: Projection<'_, E, V> = &project;
        Self::resolve(raw.into(), Some(project))
    }

    /// Resolves a scalar attribute.
    pub fn scalar(value: impl Into<Value>) -> CoreResult<ChangeState> {
        Self::resolve::<(), String>(RawState::Scalar(value.into()), None)
    }

    /// Resolves a list of scalar attributes.
    pub fn scalars<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> CoreResult<ChangeState> {
        let values = values.into_iter().map(Into::into).collect();
        Self::resolve::<(), String>(RawState::Scalars(values), None)
    }
}
