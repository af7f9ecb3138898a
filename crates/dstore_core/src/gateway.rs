//! The persist gateway.
//!
//! [`PersistGateway`] is the entry point of the crate: it writes document
//! attributes and runs the builder of every declared index and reference.
//! It also offers the read-side lookups the stored layout supports.

use crate::config::Config;
use crate::context::BuildContext;
use crate::document::{Document, IndexState};
use crate::error::{CoreError, CoreResult};
use crate::index::{
    IndexBuilder, IndexRef, IndexShape, OneToOneIndexBuilder, SetIndexBuilder, SortedIndexBuilder,
    UniqueIndexBuilder,
};
use crate::keys::KeysResolver;
use crate::reference::{
    ItemReferenceBuilder, ListReferenceBuilder, ReferenceBuilder, ReferenceKind, ReferenceRef,
};
use crate::state::ChangeState;
use dstore_codec::{Attributes, CodecError, JsonSerializer, Serializer};
use dstore_engine::KeyValueEngine;
use tracing::{debug, trace};

/// Persists documents into a key-value engine.
///
/// # Example
///
/// ```
/// use dstore_codec::{Attributes, Value};
/// use dstore_core::{Config, Document, IndexDescriptor, PersistGateway, StateResolver};
/// use dstore_engine::InMemoryEngine;
///
/// struct Note {
///     id: u32,
///     topic: String,
/// }
///
/// impl Document for Note {
///     fn doc_type(&self) -> &str {
///         "note"
///     }
///
///     fn doc_id(&self) -> String {
///         self.id.to_string()
///     }
///
///     fn attributes(&self) -> Attributes {
///         let mut attrs = Attributes::new();
///         attrs.insert("topic".to_string(), Value::from(self.topic.as_str()));
///         attrs
///     }
///
///     fn indexes() -> Vec<IndexDescriptor<Self>> {
///         vec![IndexDescriptor::set("by_topic", |note: &Note| {
///             StateResolver::scalar(note.topic.as_str())
///         })]
///     }
/// }
///
/// let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
/// let note = Note { id: 1, topic: "rust".to_string() };
/// gateway.persist(&note).unwrap();
///
/// assert_eq!(gateway.ids_by_index("note", "by_topic", "rust").unwrap(), vec!["1"]);
/// assert!(gateway.find("note", "1").unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct PersistGateway<E, S = JsonSerializer> {
    engine: E,
    serializer: S,
    keys: KeysResolver,
    config: Config,
}

impl<E: KeyValueEngine> PersistGateway<E> {
    /// Creates a gateway storing attributes as JSON.
    pub fn new(engine: E, config: Config) -> Self {
        Self::with_serializer(engine, JsonSerializer, config)
    }
}

impl<E: KeyValueEngine, S: Serializer> PersistGateway<E, S> {
    /// Creates a gateway with an explicit attribute serializer.
    pub fn with_serializer(engine: E, serializer: S, config: Config) -> Self {
        Self {
            engine,
            serializer,
            keys: KeysResolver::new(config.prefix.clone()),
            config,
        }
    }

    /// The engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The attribute serializer.
    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    /// The key layout.
    pub fn keys(&self) -> &KeysResolver {
        &self.keys
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn context(&self) -> BuildContext<'_, E> {
        BuildContext::new(&self.engine, &self.keys, &self.config)
    }

    /// Persists `doc`: attributes, then every index it takes part in, then
    /// every reference it maintains.
    ///
    /// Each step commits on its own. On error, earlier steps stay committed
    /// and a later successful persist repairs the rest. The caller resets
    /// the document's trackers after success.
    pub fn persist<D: Document>(&self, doc: &D) -> CoreResult<()> {
        let doc_type = doc.doc_type();
        let doc_id = doc.doc_id();

        self.write_attributes(doc_type, &doc_id, &doc.attributes())?;

        for index in D::indexes() {
            if !index.should_index(doc) {
                trace!(doc_type, doc_id = %doc_id, index = index.name(), "index skipped");
                continue;
            }
            let target = IndexRef::new(doc_type, doc_id.as_str(), index.name());
            self.build_index(&target, index.shape(), index.state(doc)?)?;
        }

        for reference in D::references() {
            if !reference.should_handle(doc) {
                trace!(doc_type, doc_id = %doc_id, reference = reference.name(), "reference skipped");
                continue;
            }
            let target = ReferenceRef::new(doc_type, doc_id.as_str(), reference.name());
            self.build_reference(&target, reference.kind(), &reference.state(doc)?)?;
        }

        debug!(doc_type, doc_id = %doc_id, "document persisted");
        Ok(())
    }

    /// Removes `doc`: flushes every declared index and reference, then
    /// deletes its attributes. Removing twice is the same as removing once.
    pub fn remove<D: Document>(&self, doc: &D) -> CoreResult<()> {
        let doc_type = doc.doc_type();
        let doc_id = doc.doc_id();

        for index in D::indexes() {
            let target = IndexRef::new(doc_type, doc_id.as_str(), index.name());
            self.build_index(&target, index.shape(), IndexState::flush(index.shape()))?;
        }
        for reference in D::references() {
            let target = ReferenceRef::new(doc_type, doc_id.as_str(), reference.name());
            self.build_reference(&target, reference.kind(), &ChangeState::flush())?;
        }

        let hash = self.keys.doc_key(doc_type)?;
        let sentinel = self.keys.doc_watch_key(doc_type, &doc_id)?;
        self.context().optimistic().run(&sentinel, |engine, tx| {
            if engine.hget(&hash, &doc_id)?.is_some() {
                tx.hdel(hash.as_str(), vec![doc_id.clone()]);
            }
            Ok(())
        })?;

        debug!(doc_type, doc_id = %doc_id, "document removed");
        Ok(())
    }

    /// Runs the builder of `shape` for one index.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when `state` carries values of the wrong kind.
    pub fn build_index(&self, target: &IndexRef, shape: IndexShape, state: IndexState) -> CoreResult<()> {
        let ctx = self.context();
        match shape {
            IndexShape::Set => {
                SetIndexBuilder::new(ctx).build(target, &state.into_plain(&target.index, shape)?)
            }
            IndexShape::SortedSet => {
                SortedIndexBuilder::new(ctx).build(target, &state.into_scored(&target.index, shape)?)
            }
            IndexShape::Unique => {
                UniqueIndexBuilder::new(ctx).build(target, &state.into_plain(&target.index, shape)?)
            }
            IndexShape::OneToOne => {
                OneToOneIndexBuilder::new(ctx).build(target, &state.into_plain(&target.index, shape)?)
            }
        }
    }

    /// Runs the builder of `kind` for one reference.
    pub fn build_reference(
        &self,
        target: &ReferenceRef,
        kind: ReferenceKind,
        state: &ChangeState,
    ) -> CoreResult<()> {
        let ctx = self.context();
        match kind {
            ReferenceKind::Item => ItemReferenceBuilder::new(ctx).build(target, state),
            ReferenceKind::List => ListReferenceBuilder::new(ctx, &self.serializer).build(target, state),
        }
    }

    fn write_attributes(&self, doc_type: &str, doc_id: &str, attributes: &Attributes) -> CoreResult<()> {
        let hash = self.keys.doc_key(doc_type)?;
        let sentinel = self.keys.doc_watch_key(doc_type, doc_id)?;
        let encoded = self.serializer.serialize(attributes)?;

        self.context().optimistic().run(&sentinel, |engine, tx| {
            let merged = match engine.hget(&hash, doc_id)? {
                Some(stored) if stored == encoded => {
                    trace!(doc_type, doc_id, "attributes unchanged");
                    return Ok(());
                }
                Some(stored) => {
                    let mut merged: Attributes = self.serializer.deserialize(&stored)?;
                    merged.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                    self.serializer.serialize(&merged)?
                }
                None => encoded.clone(),
            };
            tx.hset(hash.as_str(), doc_id, merged);
            Ok(())
        })
    }

    /// Stored attributes of one document.
    pub fn find(&self, doc_type: &str, doc_id: &str) -> CoreResult<Option<Attributes>> {
        let hash = self.keys.doc_key(doc_type)?;
        match self.engine.hget(&hash, doc_id)? {
            Some(bytes) => Ok(Some(self.serializer.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stored attributes of several documents, in the order of `doc_ids`.
    pub fn find_many(&self, doc_type: &str, doc_ids: &[String]) -> CoreResult<Vec<Option<Attributes>>> {
        let hash = self.keys.doc_key(doc_type)?;
        let mut found = Vec::with_capacity(doc_ids.len());
        for bytes in self.engine.hmget(&hash, doc_ids)? {
            found.push(match bytes {
                Some(bytes) => Some(self.serializer.deserialize(&bytes)?),
                None => None,
            });
        }
        Ok(found)
    }

    /// Ids of the documents a set index lists under `value`, sorted.
    pub fn ids_by_index(&self, doc_type: &str, index: &str, value: &str) -> CoreResult<Vec<String>> {
        let key = self.keys.index_key(doc_type, index, value)?;
        let mut ids = self.engine.smembers(&key)?;
        ids.sort();
        Ok(ids)
    }

    /// Ids and scores of the documents a sorted index lists under `value`
    /// with a score in `[min, max]`, by ascending score.
    pub fn ids_by_sorted_index(
        &self,
        doc_type: &str,
        index: &str,
        value: &str,
        min: f64,
        max: f64,
    ) -> CoreResult<Vec<(String, f64)>> {
        let key = self.keys.index_key(doc_type, index, value)?;
        Ok(self.engine.zrange_by_score(&key, min, max)?)
    }

    /// Id of the document owning `value` in a unique or one-to-one index.
    pub fn id_by_unique(&self, doc_type: &str, index: &str, value: &str) -> CoreResult<Option<String>> {
        if value.is_empty() {
            return Err(CoreError::invalid_key("index value", "must not be empty"));
        }
        let hash = self.keys.index_hash_key(doc_type, index)?;
        self.engine
            .hget(&hash, value)?
            .map(|bytes| text(bytes, value))
            .transpose()
    }

    /// Cached value of an item reference.
    pub fn reference_item(&self, doc_type: &str, name: &str, doc_id: &str) -> CoreResult<Option<String>> {
        let hash = self.keys.refs_key(doc_type)?;
        let field = self.keys.ref_field(name, doc_id)?;
        self.engine
            .hget(&hash, &field)?
            .map(|bytes| text(bytes, &field))
            .transpose()
    }

    /// Cached values of a list reference; empty when nothing is stored.
    pub fn reference_list(&self, doc_type: &str, name: &str, doc_id: &str) -> CoreResult<Vec<String>> {
        let hash = self.keys.refs_key(doc_type)?;
        let field = self.keys.ref_field(name, doc_id)?;
        match self.engine.hget(&hash, &field)? {
            Some(bytes) => Ok(self.serializer.deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

fn text(bytes: Vec<u8>, what: &str) -> CoreResult<String> {
    String::from_utf8(bytes)
        .map_err(|e| CodecError::decoding_failed(format!("{what} is not UTF-8: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IndexDescriptor;
    use crate::error::CoreError;
    use crate::index::ScoredValue;
    use crate::state::StateResolver;
    use dstore_codec::Value;
    use dstore_engine::InMemoryEngine;

    struct Note {
        id: &'static str,
        topic: &'static str,
        title: &'static str,
    }

    impl Document for Note {
        fn doc_type(&self) -> &str {
            "note"
        }

        fn doc_id(&self) -> String {
            self.id.to_string()
        }

        fn attributes(&self) -> Attributes {
            let mut attrs = Attributes::new();
            attrs.insert("topic".to_string(), Value::from(self.topic));
            attrs.insert("title".to_string(), Value::from(self.title));
            attrs
        }

        fn indexes() -> Vec<IndexDescriptor<Self>> {
            vec![
                IndexDescriptor::set("by_topic", |note: &Note| StateResolver::scalar(note.topic)),
                IndexDescriptor::unique("by_title", |note: &Note| StateResolver::scalar(note.title)),
            ]
        }
    }

    fn note(topic: &'static str) -> Note {
        Note {
            id: "1",
            topic,
            title: "hello",
        }
    }

    #[test]
    fn persist_writes_attributes_and_indexes() {
        let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
        gateway.persist(&note("rust")).unwrap();

        let attrs = gateway.find("note", "1").unwrap().unwrap();
        assert_eq!(attrs.get("topic"), Some(&Value::from("rust")));
        assert_eq!(gateway.ids_by_index("note", "by_topic", "rust").unwrap(), vec!["1"]);
        assert_eq!(
            gateway.id_by_unique("note", "by_title", "hello").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn attributes_merge_over_stored_ones() {
        let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
        let mut extra = Attributes::new();
        extra.insert("legacy".to_string(), Value::from(true));
        gateway.write_attributes("note", "1", &extra).unwrap();

        gateway.persist(&note("rust")).unwrap();
        let attrs = gateway.find("note", "1").unwrap().unwrap();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("legacy"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unchanged_attributes_skip_the_write() {
        let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
        gateway.persist(&note("rust")).unwrap();

        let before = gateway.engine().stats();
        gateway.persist(&note("rust")).unwrap();
        let delta = gateway.engine().stats().since(&before);
        // Only the scalar indexes rewrite, and they find nothing to change.
        assert_eq!(delta.transactions_committed, 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
        gateway.persist(&note("rust")).unwrap();

        gateway.remove(&note("rust")).unwrap();
        let once = gateway.engine().snapshot();
        gateway.remove(&note("rust")).unwrap();

        assert_eq!(gateway.engine().snapshot(), once);
        assert!(gateway.engine().keys("store:doc").is_empty());
        assert!(gateway.engine().keys("store:sys").is_empty());
    }

    #[test]
    fn shape_mismatch_fails_fast() {
        let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
        let target = IndexRef::new("note", "1", "ranked");
        let result = gateway.build_index(
            &target,
            IndexShape::Set,
            IndexState::Scored(ChangeState::replace(vec![ScoredValue::new("a", 1.0)])),
        );
        assert!(matches!(result, Err(CoreError::ShapeMismatch { .. })));
        assert!(gateway.engine().keys("").is_empty());
    }

    #[test]
    fn lookups_on_missing_data() {
        let gateway = PersistGateway::new(InMemoryEngine::new(), Config::default());
        assert_eq!(gateway.find("note", "404").unwrap(), None);
        assert!(gateway.ids_by_index("note", "by_topic", "none").unwrap().is_empty());
        assert_eq!(gateway.reference_item("note", "author", "1").unwrap(), None);
        assert!(gateway.reference_list("note", "tags", "1").unwrap().is_empty());
        assert_eq!(
            gateway
                .find_many("note", &["1".to_string(), "2".to_string()])
                .unwrap(),
            vec![None, None]
        );
    }
}
