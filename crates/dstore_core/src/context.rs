//! Shared dependencies of every builder.

use crate::config::Config;
use crate::keys::KeysResolver;
use crate::optimistic::Optimistic;
use dstore_engine::KeyValueEngine;

/// Engine, key layout and configuration a builder works with.
pub struct BuildContext<'a, E: ?Sized> {
    engine: &'a E,
    keys: &'a KeysResolver,
    config: &'a Config,
}

impl<E: ?Sized> Clone for BuildContext<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: ?Sized> Copy for BuildContext<'_, E> {}

impl<'a, E: KeyValueEngine + ?Sized> BuildContext<'a, E> {
    /// Creates a context.
    pub fn new(engine: &'a E, keys: &'a KeysResolver, config: &'a Config) -> Self {
        Self {
            engine,
            keys,
            config,
        }
    }

    /// The engine.
    pub fn engine(&self) -> &'a E {
        self.engine
    }

    /// The key layout.
    pub fn keys(&self) -> &'a KeysResolver {
        self.keys
    }

    /// The configuration.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub(crate) fn optimistic(&self) -> Optimistic<'a, E> {
        Optimistic::new(self.engine, self.config.retry, self.config.sentinel_ttl)
    }
}
