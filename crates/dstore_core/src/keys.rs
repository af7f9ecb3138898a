//! Key layout of the store.
//!
//! Every key the store reads or writes is built here. With prefix `P`:
//!
//! | Purpose                    | Key                                      | Field        |
//! |----------------------------|------------------------------------------|--------------|
//! | document attributes        | `P:doc:{type}`                           | `{id}`       |
//! | set / sorted-set fan-out   | `P:doc:{type}:index:{name}:{value}`      |              |
//! | unique / one-to-one lookup | `P:doc:{type}:index:{name}`              | `{value}`    |
//! | references                 | `P:doc:{type}:refs`                      | `{name}:{id}`|
//! | system record              | `P:sys:{type}:index:{name}:{id}`         |              |
//! | document sentinel          | `P:watching:{type}:doc:{id}`             |              |
//! | index sentinel             | `P:watching:{type}:index:{name}:{id}`    |              |
//! | reference sentinel         | `P:watching:{type}:ref:{name}:{id}`      |              |
//!
//! Types and names may not contain `:`. Ids and values are always the last
//! component, so they may.

use crate::error::{CoreError, CoreResult};

const SEPARATOR: char = ':';

/// Maps document types, names, ids and values to engine keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysResolver {
    prefix: String,
}

impl KeysResolver {
    /// Creates a resolver for keys under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Hash holding the attributes of every document of a type.
    pub fn doc_key(&self, doc_type: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        Ok(format!("{}:doc:{doc_type}", self.prefix))
    }

    /// Fan-out key listing the documents indexed under `value`.
    pub fn index_key(&self, doc_type: &str, index: &str, value: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        name("index name", index)?;
        tail("index value", value)?;
        Ok(format!("{}:doc:{doc_type}:index:{index}:{value}", self.prefix))
    }

    /// Hash mapping index values to document ids.
    pub fn index_hash_key(&self, doc_type: &str, index: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        name("index name", index)?;
        Ok(format!("{}:doc:{doc_type}:index:{index}", self.prefix))
    }

    /// Hash holding the references of every document of a type.
    pub fn refs_key(&self, doc_type: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        Ok(format!("{}:doc:{doc_type}:refs", self.prefix))
    }

    /// Field of one document's reference inside [`Self::refs_key`].
    pub fn ref_field(&self, reference: &str, doc_id: &str) -> CoreResult<String> {
        name("reference name", reference)?;
        tail("doc id", doc_id)?;
        Ok(format!("{reference}:{doc_id}"))
    }

    /// System record of the values currently indexed for one document.
    pub fn system_key(&self, doc_type: &str, index: &str, doc_id: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        name("index name", index)?;
        tail("doc id", doc_id)?;
        Ok(format!("{}:sys:{doc_type}:index:{index}:{doc_id}", self.prefix))
    }

    /// Sentinel guarding a document's attributes.
    pub fn doc_watch_key(&self, doc_type: &str, doc_id: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        tail("doc id", doc_id)?;
        Ok(format!("{}:watching:{doc_type}:doc:{doc_id}", self.prefix))
    }

    /// Sentinel guarding one index of one document.
    pub fn index_watch_key(&self, doc_type: &str, index: &str, doc_id: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        name("index name", index)?;
        tail("doc id", doc_id)?;
        Ok(format!(
            "{}:watching:{doc_type}:index:{index}:{doc_id}",
            self.prefix
        ))
    }

    /// Sentinel guarding one reference of one document.
    pub fn ref_watch_key(&self, doc_type: &str, reference: &str, doc_id: &str) -> CoreResult<String> {
        name("doc type", doc_type)?;
        name("reference name", reference)?;
        tail("doc id", doc_id)?;
        Ok(format!(
            "{}:watching:{doc_type}:ref:{reference}:{doc_id}",
            self.prefix
        ))
    }
}

impl Default for KeysResolver {
    fn default() -> Self {
        Self::new("store")
    }
}

fn name(component: &'static str, value: &str) -> CoreResult<()> {
    tail(component, value)?;
    if value.contains(SEPARATOR) {
        return Err(CoreError::invalid_key(
            component,
            format!("{value:?} must not contain '{SEPARATOR}'"),
        ));
    }
    Ok(())
}

fn tail(component: &'static str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::invalid_key(component, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let keys = KeysResolver::default();
        assert_eq!(keys.doc_key("product").unwrap(), "store:doc:product");
        assert_eq!(
            keys.index_key("product", "by_brand_id", "7").unwrap(),
            "store:doc:product:index:by_brand_id:7"
        );
        assert_eq!(
            keys.index_hash_key("product", "by_slug").unwrap(),
            "store:doc:product:index:by_slug"
        );
        assert_eq!(keys.refs_key("product").unwrap(), "store:doc:product:refs");
        assert_eq!(keys.ref_field("tags", "42").unwrap(), "tags:42");
        assert_eq!(
            keys.system_key("product", "by_brand_id", "42").unwrap(),
            "store:sys:product:index:by_brand_id:42"
        );
        assert_eq!(
            keys.doc_watch_key("product", "42").unwrap(),
            "store:watching:product:doc:42"
        );
        assert_eq!(
            keys.index_watch_key("product", "by_brand_id", "42").unwrap(),
            "store:watching:product:index:by_brand_id:42"
        );
        assert_eq!(
            keys.ref_watch_key("product", "tags", "42").unwrap(),
            "store:watching:product:ref:tags:42"
        );
    }

    #[test]
    fn custom_prefix() {
        let keys = KeysResolver::new("shop");
        assert_eq!(keys.doc_key("brand").unwrap(), "shop:doc:brand");
    }

    #[test]
    fn rejects_empty_components() {
        let keys = KeysResolver::default();
        assert!(matches!(
            keys.doc_key(""),
            Err(CoreError::InvalidKey { component: "doc type", .. })
        ));
        assert!(keys.index_key("product", "", "7").is_err());
        assert!(keys.index_key("product", "by_brand_id", "").is_err());
        assert!(keys.system_key("product", "by_brand_id", "").is_err());
    }

    #[test]
    fn rejects_separator_in_names() {
        let keys = KeysResolver::default();
        assert!(keys.doc_key("pro:duct").is_err());
        assert!(keys.index_watch_key("product", "by:brand", "1").is_err());
    }

    #[test]
    fn values_and_ids_may_contain_separator() {
        let keys = KeysResolver::default();
        assert_eq!(
            keys.index_key("product", "by_brand_rubric", "7:3").unwrap(),
            "store:doc:product:index:by_brand_rubric:7:3"
        );
        assert!(keys.doc_watch_key("product", "a:b").is_ok());
    }

    #[test]
    fn sentinels_are_distinct_per_resource() {
        let keys = KeysResolver::default();
        let a = keys.index_watch_key("product", "by_brand_id", "42").unwrap();
        let b = keys.index_watch_key("product", "by_slug", "42").unwrap();
        let c = keys.ref_watch_key("product", "by_brand_id", "42").unwrap();
        let d = keys.doc_watch_key("product", "42").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
