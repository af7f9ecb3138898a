//! Conflict handling: aborted transactions, transient failures and
//! concurrent writers slipping in between watch and commit.

use dstore_core::{
    BuildContext, ChangeState, Config, CoreError, IndexBuilder, IndexRef, KeysResolver,
    RetryPolicy, SetIndexBuilder,
};
use dstore_engine::{EngineError, InMemoryEngine, KeyValueEngine};
use dstore_testkit::prelude::*;
use std::time::Duration;

#[test]
fn one_abort_then_success_matches_uncontended_run() {
    init_tracing();
    let calm = TestStore::new();
    calm.persist(&mut sample_product(42, 7)).unwrap();

    let contended = TestStore::new();
    contended
        .engine()
        .fail_next_exec(EngineError::TransactionAborted);
    contended.persist(&mut sample_product(42, 7)).unwrap();

    assert_eq!(contended.engine().snapshot(), calm.engine().snapshot());
    assert_eq!(contended.engine().stats().transactions_aborted, 1);
}

#[test]
fn transient_engine_errors_are_retried() {
    let store = TestStore::new();
    store
        .engine()
        .fail_next_exec(EngineError::connection("connection reset"));
    store
        .engine()
        .fail_next_exec(EngineError::server("LOADING dataset"));

    store.persist(&mut sample_product(42, 7)).unwrap();
    assert_eq!(store.indexed("by_brand_id", "7"), vec!["42"]);
}

#[test]
fn bounded_policy_gives_up() {
    let store = TestStore::with_config(Config::default().retry(RetryPolicy::bounded(2)));
    store
        .engine()
        .fail_next_exec(EngineError::TransactionAborted);
    store
        .engine()
        .fail_next_exec(EngineError::TransactionAborted);

    let err = store.persist(&mut sample_product(42, 7)).unwrap_err();
    assert_eq!(
        err,
        CoreError::ReconciliationAborted {
            resource: "store:watching:product:doc:42".to_string(),
            attempts: 2,
        }
    );
    assert_eq!(store.gateway.find(PRODUCT, "42").unwrap(), None);
}

#[test]
fn partial_failure_is_repaired_by_next_persist() {
    let store = TestStore::with_config(Config::default().retry(RetryPolicy::no_retry()));
    let mut doc = sample_product(42, 7);

    // Attributes commit, then the first index gives up.
    store.engine().before_next_exec(|| {});
    let engine = store.engine().session();
    store.engine().before_next_exec(move || {
        engine.fail_next_exec(EngineError::TransactionAborted);
    });
    assert!(store.gateway.persist(&doc).is_err());
    assert!(store.gateway.find(PRODUCT, "42").unwrap().is_some());
    assert!(store.indexed("by_brand_id", "7").is_empty());

    store.persist(&mut doc).unwrap();
    assert_eq!(store.indexed("by_brand_id", "7"), vec!["42"]);
    assert_eq!(store.record("42", "by_brand_id"), vec!["7"]);
}

#[test]
fn non_retryable_errors_propagate_at_once() {
    let store = TestStore::new();
    store
        .engine()
        .fail_next_exec(EngineError::invalid_argument("ERR syntax error"));

    let err = store.persist(&mut sample_product(42, 7)).unwrap_err();
    assert!(matches!(err, CoreError::Engine(EngineError::InvalidArgument { .. })));
    assert_eq!(store.engine().stats().transactions_aborted, 1);
}

#[test]
fn concurrent_writer_between_watch_and_exec() {
    let store = TestStore::new();
    let mut doc = sample_product(42, 7);
    store.persist(&mut doc).unwrap();

    doc.product_mut().set_brand(Brand::new(9, "Brand 9"), 1.0);

    // Another process moves the product to brand 8 while this persist is
    // between its watch and its commit.
    let rival = store.session();
    store.engine().before_next_exec(move || {
        rival.persist(&sample_product(42, 8)).unwrap();
    });
    store.persist(&mut doc).unwrap();

    assert!(store.engine().stats().transactions_aborted >= 1);
    assert_eq!(store.record("42", "by_brand_id"), vec!["9"]);
    assert!(store.indexed("by_brand_id", "7").is_empty());
    assert!(store.indexed("by_brand_id", "8").is_empty());
    assert_eq!(store.indexed("by_brand_id", "9"), vec!["42"]);
}

#[test]
fn index_unit_reruns_from_the_state_read() {
    let engine = InMemoryEngine::new();
    let keys = KeysResolver::default();
    let config = Config::default();
    let builder = SetIndexBuilder::new(BuildContext::new(&engine, &keys, &config));
    let target = IndexRef::new(PRODUCT, "42", "by_brand_id");
    builder
        .build(&target, &ChangeState::replace(vec!["7".to_string()]))
        .unwrap();

    // A rival reconciliation records "8" before this one commits.
    let rival = engine.session();
    engine.before_next_exec(move || {
        let keys = KeysResolver::default();
        let config = Config::default();
        SetIndexBuilder::new(BuildContext::new(&rival, &keys, &config))
            .build(
                &IndexRef::new(PRODUCT, "42", "by_brand_id"),
                &ChangeState::replace(vec!["8".to_string()]),
            )
            .unwrap();
    });
    builder
        .build(&target, &ChangeState::replace(vec!["9".to_string()]))
        .unwrap();

    let system = keys.system_key(PRODUCT, "by_brand_id", "42").unwrap();
    assert_eq!(engine.smembers(&system).unwrap(), vec!["9"]);
    for brand in ["7", "8"] {
        let key = keys.index_key(PRODUCT, "by_brand_id", brand).unwrap();
        assert!(engine.smembers(&key).unwrap().is_empty(), "brand {brand}");
    }
}

#[test]
fn sentinels_expire() {
    let store = TestStore::with_config(Config::default().sentinel_ttl(Duration::from_millis(50)));
    store.persist(&mut sample_product(42, 7)).unwrap();

    let sentinel = "store:watching:product:doc:42";
    assert!(store.engine().ttl(sentinel).is_some());
    std::thread::sleep(Duration::from_millis(80));
    assert!(store.engine().keys("store:watching").is_empty());
}
