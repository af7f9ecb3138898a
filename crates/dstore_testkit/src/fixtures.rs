//! Test fixtures: a small catalog domain and store helpers.
//!
//! The domain is a product with a brand, a brand score used for ranking,
//! tags and SKUs. [`ProductDocument`] declares one index of every shape and
//! one reference of every kind over it.

use dstore_codec::{Attributes, Value};
use dstore_core::{
    Check, CollectionTracker, Config, CoreError, CoreResult, Document, EntityBuilder,
    FieldRule, FieldType, IndexDescriptor, ItemTracker, PersistGateway, ReferenceDescriptor,
    Schema, ScoredValue, StateResolver,
};
use dstore_engine::InMemoryEngine;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Document type of products.
pub const PRODUCT: &str = "product";

/// A brand.
#[derive(Debug, Clone, PartialEq)]
pub struct Brand {
    /// Brand id.
    pub id: u32,
    /// Display title.
    pub title: String,
}

impl Brand {
    /// Creates a brand.
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// The ranking score of a product within its brand.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandScore {
    /// Score.
    pub score: f64,
    /// The brand ranked in.
    pub brand: Brand,
}

impl BrandScore {
    /// Creates a brand score.
    pub fn new(score: f64, brand: Brand) -> Self {
        Self { score, brand }
    }
}

/// A tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Tag id.
    pub id: u32,
    /// Display name.
    pub name: String,
}

impl Tag {
    /// Creates a tag.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A product entity with tracked relations.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Product id.
    pub id: u32,
    /// Title.
    pub title: String,
    /// URL slug, unique across products.
    pub slug: Option<String>,
    /// Price.
    pub price: f64,
    /// Stock keeping units, unique across products.
    pub skus: Vec<String>,
    /// Hidden products are left out of the brand listing.
    pub hidden: bool,
    /// Brand relation.
    pub brand: ItemTracker<Brand>,
    /// Ranking relation.
    pub brand_score: ItemTracker<BrandScore>,
    /// Tag relation.
    pub tags: CollectionTracker<Tag>,
}

impl Product {
    /// Creates a product without relations.
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            slug: None,
            price: 0.0,
            skus: Vec::new(),
            hidden: false,
            brand: ItemTracker::new(),
            brand_score: ItemTracker::new(),
            tags: CollectionTracker::new(),
        }
    }

    /// Sets the slug.
    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Sets the price.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Sets the SKUs.
    #[must_use]
    pub fn with_skus(mut self, skus: &[&str]) -> Self {
        self.skus = skus.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Changes the brand, and ranks the product in it with `score`.
    pub fn set_brand(&mut self, brand: Brand, score: f64) {
        self.brand_score.update(BrandScore::new(score, brand.clone()));
        self.brand.update(brand);
    }

    /// Detaches the brand.
    pub fn clear_brand(&mut self) {
        self.brand.delete();
        self.brand_score.delete();
    }

    /// Forgets tracked changes after a successful persist.
    pub fn reset(&mut self) {
        self.brand.reset();
        self.brand_score.reset();
        self.tags.reset();
    }
}

/// Persistence wrapper of [`Product`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDocument {
    product: Product,
}

impl ProductDocument {
    /// Wraps a product.
    pub fn new(product: Product) -> Self {
        Self { product }
    }

    /// The product.
    pub fn product(&self) -> &Product {
        &self.product
    }

    /// The product, for mutation between persists.
    pub fn product_mut(&mut self) -> &mut Product {
        &mut self.product
    }

    /// Unwraps the product.
    pub fn into_inner(self) -> Product {
        self.product
    }
}

impl Document for ProductDocument {
    fn doc_type(&self) -> &str {
        PRODUCT
    }

    fn doc_id(&self) -> String {
        self.product.id.to_string()
    }

    fn attributes(&self) -> Attributes {
        let product = &self.product;
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), Value::from(product.id));
        attrs.insert("title".to_string(), Value::from(product.title.as_str()));
        attrs.insert("slug".to_string(), Value::from(product.slug.clone()));
        attrs.insert("price".to_string(), Value::from(product.price));
        attrs.insert(
            "skus".to_string(),
            Value::Array(product.skus.iter().map(|s| Value::from(s.as_str())).collect()),
        );
        attrs.insert("hidden".to_string(), Value::from(product.hidden));
        let brand = product.brand.get().map(|brand| {
            let mut map = Attributes::new();
            map.insert("id".to_string(), Value::from(brand.id));
            map.insert("title".to_string(), Value::from(brand.title.as_str()));
            Value::Map(map)
        });
        attrs.insert("brand".to_string(), Value::from(brand));
        attrs
    }

    fn indexes() -> Vec<IndexDescriptor<Self>> {
        vec![
            IndexDescriptor::set("by_brand_id", |doc: &Self| {
                StateResolver::project(doc.product.brand.change(), |brand: &Brand| {
                    brand.id.to_string()
                })
            })
            .when(|doc| !doc.product.hidden),
            IndexDescriptor::one_to_one("by_slug", |doc: &Self| {
                StateResolver::scalar(doc.product.slug.clone())
            }),
            IndexDescriptor::sorted("sorted_by_brand_id", |doc: &Self| {
                StateResolver::project(doc.product.brand_score.change(), |score: &BrandScore| {
                    ScoredValue::new(score.brand.id.to_string(), score.score)
                })
            }),
            IndexDescriptor::set("by_tag", |doc: &Self| {
                StateResolver::project(doc.product.tags.change(), |tag: &Tag| tag.id.to_string())
            }),
            IndexDescriptor::unique("by_sku", |doc: &Self| {
                StateResolver::scalars(doc.product.skus.iter().map(String::as_str))
            }),
        ]
    }

    fn references() -> Vec<ReferenceDescriptor<Self>> {
        vec![
            ReferenceDescriptor::item("brand_title", |doc: &Self| {
                StateResolver::project(doc.product.brand.change(), |brand: &Brand| {
                    brand.title.clone()
                })
            }),
            ReferenceDescriptor::list("tag_names", |doc: &Self| {
                StateResolver::project(doc.product.tags.change(), |tag: &Tag| tag.name.clone())
            }),
        ]
    }
}

/// Builds [`Product`]s from stored attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductEntityBuilder;

impl ProductEntityBuilder {
    fn brand_schema() -> Schema {
        Schema::new()
            .field(FieldRule::required("id", FieldType::Integer).check(Check::PositiveOrZero))
            .field(FieldRule::required("title", FieldType::Text).check(Check::not_blank()))
    }
}

impl EntityBuilder for ProductEntityBuilder {
    type Entity = Product;

    fn schema(&self) -> Schema {
        Schema::new()
            .field(FieldRule::required("id", FieldType::Integer).check(Check::PositiveOrZero))
            .field(FieldRule::required("title", FieldType::Text).check(Check::not_blank()))
            .field(
                FieldRule::optional("slug", FieldType::Text)
                    .check(Check::NotBlank { allow_null: true }),
            )
            .field(FieldRule::required("price", FieldType::Float).check(Check::PositiveOrZero))
            .field(FieldRule::optional("skus", FieldType::Array))
            .field(FieldRule::optional("hidden", FieldType::Bool))
            .field(FieldRule::optional("brand", FieldType::Map).nested(Self::brand_schema()))
    }

    fn make_entity(&self, attrs: &Attributes) -> CoreResult<Product> {
        let id = attrs
            .get("id")
            .and_then(Value::as_i64)
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| CoreError::invalid_operation("product id out of range"))?;
        let title = attrs.get("title").and_then(Value::as_str).unwrap_or_default();

        let mut product = Product::new(id, title);
        product.slug = attrs.get("slug").and_then(Value::as_str).map(str::to_string);
        product.price = attrs.get("price").and_then(Value::as_f64).unwrap_or_default();
        product.hidden = attrs.get("hidden").and_then(Value::as_bool).unwrap_or(false);
        if let Some(Value::Array(skus)) = attrs.get("skus") {
            product.skus = skus
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(brand) = attrs.get("brand").and_then(Value::as_map) {
            let brand_id = brand
                .get("id")
                .and_then(Value::as_i64)
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| CoreError::invalid_operation("brand id out of range"))?;
            let brand_title = brand.get("title").and_then(Value::as_str).unwrap_or_default();
            product.brand = ItemTracker::loaded(Brand::new(brand_id, brand_title));
        }
        Ok(product)
    }
}

/// A gateway over a fresh in-memory engine.
pub struct TestStore {
    /// The gateway under test.
    pub gateway: PersistGateway<InMemoryEngine>,
}

impl TestStore {
    /// Creates a store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a store with `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            gateway: PersistGateway::new(InMemoryEngine::new(), config),
        }
    }

    /// The engine, for fault injection and inspection.
    pub fn engine(&self) -> &InMemoryEngine {
        self.gateway.engine()
    }

    /// A gateway on a new session of the same keyspace.
    pub fn session(&self) -> PersistGateway<InMemoryEngine> {
        PersistGateway::new(self.engine().session(), self.gateway.config().clone())
    }

    /// Persists `doc` and resets its trackers.
    pub fn persist(&self, doc: &mut ProductDocument) -> CoreResult<()> {
        self.gateway.persist(doc)?;
        doc.product_mut().reset();
        Ok(())
    }

    /// Members of the fan-out set of `value` in a set index.
    pub fn indexed(&self, index: &str, value: &str) -> Vec<String> {
        self.gateway
            .ids_by_index(PRODUCT, index, value)
            .unwrap_or_default()
    }

    /// The system record of a set-like index, sorted.
    pub fn record(&self, doc_id: &str, index: &str) -> Vec<String> {
        let Ok(key) = self.gateway.keys().system_key(PRODUCT, index, doc_id) else {
            return Vec::new();
        };
        let mut values = dstore_engine::KeyValueEngine::smembers(self.engine(), &key)
            .unwrap_or_default();
        values.sort();
        values
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A product of brand `brand_id` with two tags, not yet persisted.
pub fn sample_product(id: u32, brand_id: u32) -> ProductDocument {
    let mut product = Product::new(id, format!("Product {id}"))
        .with_slug(format!("product-{id}"))
        .with_price(9.5);
    product.skus = vec![format!("SKU-{id}")];
    product.set_brand(Brand::new(brand_id, format!("Brand {brand_id}")), f64::from(id));
    product.tags.add(Tag::new(1, "new"));
    product.tags.add(Tag::new(2, "sale"));
    ProductDocument::new(product)
}

static TRACING: Once = Once::new();

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_builder_round_trips_document_attributes() {
        let doc = sample_product(5, 7);
        let product = ProductEntityBuilder.create(&doc.attributes()).unwrap();

        assert_eq!(product.id, 5);
        assert_eq!(product.slug.as_deref(), Some("product-5"));
        assert_eq!(product.skus, vec!["SKU-5".to_string()]);
        assert_eq!(product.brand.get(), Some(&Brand::new(7, "Brand 7")));
        assert!(!product.brand.is_modified());
    }

    #[test]
    fn entity_builder_rejects_invalid_attributes() {
        init_tracing();
        let mut attrs = sample_product(5, 7).attributes();
        attrs.insert("price".to_string(), Value::from(-1.0));
        attrs.remove("title");

        assert_eq!(ProductEntityBuilder.create(&attrs), None);
    }
}
