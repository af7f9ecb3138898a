//! Watched units of work.
//!
//! Every mutation of the store goes through [`Optimistic::run`]:
//!
//! 1. `WATCH` the sentinel of the resource
//! 2. read the actual state and queue the writes (the unit closure)
//! 3. `MULTI`, refresh the sentinel with `SETEX`, the queued writes, `EXEC`
//!
//! If `EXEC` aborts, or the engine fails transiently anywhere in between, the
//! unit is run again from step 1 so the state read happens under the new
//! watch. Units that queue nothing never reach `EXEC`.

use crate::config::RetryPolicy;
use crate::error::{CoreError, CoreResult};
use dstore_engine::{KeyValueEngine, Transaction};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Runs watched units against one engine.
pub struct Optimistic<'a, E: ?Sized> {
    engine: &'a E,
    retry: RetryPolicy,
    sentinel_ttl: Duration,
}

impl<'a, E: KeyValueEngine + ?Sized> Optimistic<'a, E> {
    /// Creates a runner.
    pub fn new(engine: &'a E, retry: RetryPolicy, sentinel_ttl: Duration) -> Self {
        Self {
            engine,
            retry,
            sentinel_ttl,
        }
    }

    /// Runs `unit` under a watch on `sentinel` until it commits.
    ///
    /// `unit` reads through the engine it is given and queues writes into the
    /// transaction. Returns the unit's value from the attempt that committed
    /// (or that had nothing to write).
    ///
    /// # Errors
    ///
    /// Non-retryable errors from the unit or the engine are returned at once.
    /// `ReconciliationAborted` when the retry policy is exhausted.
    pub fn run<T>(
        &self,
        sentinel: &str,
        mut unit: impl FnMut(&E, &mut Transaction) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match self.attempt(sentinel, &mut unit) {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() => {
                    if !self.retry.allows_another(attempts) {
                        warn!(resource = %sentinel, attempts, %error, "giving up on conflicting resource");
                        return Err(CoreError::ReconciliationAborted {
                            resource: sentinel.to_string(),
                            attempts,
                        });
                    }
                    warn!(resource = %sentinel, attempt = attempts, %error, "retrying reconciliation");
                    let delay = self.retry.delay_for_attempt(attempts);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn attempt<T>(
        &self,
        sentinel: &str,
        unit: &mut impl FnMut(&E, &mut Transaction) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.engine.watch(&[sentinel.to_string()])?;

        let mut tx = Transaction::new();
        let value = match unit(self.engine, &mut tx) {
            Ok(value) => value,
            Err(error) => {
                self.engine.unwatch()?;
                return Err(error);
            }
        };

        if tx.is_empty() {
            trace!(resource = %sentinel, "nothing to write");
            self.engine.unwatch()?;
            return Ok(value);
        }

        let writes = tx.len();
        let mut guarded = Transaction::new();
        guarded.setex(sentinel, self.sentinel_ttl, Vec::new());
        for command in tx.into_commands() {
            guarded.push(command);
        }
        self.engine.exec(guarded)?;
        debug!(resource = %sentinel, writes, "committed");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dstore_engine::{EngineError, InMemoryEngine};

    fn runner(engine: &InMemoryEngine, retry: RetryPolicy) -> Optimistic<'_, InMemoryEngine> {
        Optimistic::new(engine, retry, Duration::from_secs(5))
    }

    #[test]
    fn commits_with_sentinel() {
        let engine = InMemoryEngine::new();
        runner(&engine, RetryPolicy::default())
            .run("w", |_, tx| {
                tx.sadd("s", vec!["a".into()]);
                Ok(())
            })
            .unwrap();

        assert_eq!(engine.smembers("s").unwrap(), vec!["a".to_string()]);
        assert!(engine.ttl("w").is_some());
    }

    #[test]
    fn empty_unit_skips_exec() {
        let engine = InMemoryEngine::new();
        let before = engine.stats();
        let value = runner(&engine, RetryPolicy::default())
            .run("w", |_, _| Ok(5))
            .unwrap();

        assert_eq!(value, 5);
        let delta = engine.stats().since(&before);
        assert_eq!(delta.transactions_committed, 0);
        assert_eq!(delta.commands_applied, 0);
        assert!(engine.keys("").is_empty());
    }

    #[test]
    fn conflict_reruns_whole_unit() {
        let engine = InMemoryEngine::new();
        let other = engine.session();
        engine.before_next_exec(move || {
            other.set("w", b"x".to_vec()).unwrap();
        });

        let mut runs = 0;
        runner(&engine, RetryPolicy::default())
            .run("w", |e, tx| {
                runs += 1;
                let seen = e.smembers("s")?.len();
                tx.sadd("s", vec![format!("run{seen}")]);
                Ok(())
            })
            .unwrap();

        assert_eq!(runs, 2);
        assert_eq!(engine.smembers("s").unwrap(), vec!["run0".to_string()]);
        assert_eq!(engine.stats().transactions_aborted, 1);
    }

    #[test]
    fn transient_errors_are_retried() {
        let engine = InMemoryEngine::new();
        engine.fail_next_exec(EngineError::connection("reset"));
        engine.fail_next_exec(EngineError::server("LOADING"));

        runner(&engine, RetryPolicy::default())
            .run("w", |_, tx| {
                tx.set("k", "v");
                Ok(())
            })
            .unwrap();
        assert_eq!(engine.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn bounded_policy_gives_up() {
        let engine = InMemoryEngine::new();
        for _ in 0..3 {
            engine.fail_next_exec(EngineError::TransactionAborted);
        }

        let result = runner(&engine, RetryPolicy::bounded(3)).run("w", |_, tx| {
            tx.set("k", "v");
            Ok(())
        });
        assert_eq!(
            result,
            Err(CoreError::ReconciliationAborted {
                resource: "w".to_string(),
                attempts: 3
            })
        );
        assert_eq!(engine.get("k").unwrap(), None);
    }

    #[test]
    fn structural_errors_propagate_without_retry() {
        let engine = InMemoryEngine::new();
        let mut runs = 0;
        let result: CoreResult<()> = runner(&engine, RetryPolicy::default()).run("w", |_, _| {
            runs += 1;
            Err(CoreError::too_many_values("by_slug", 2))
        });

        assert!(matches!(result, Err(CoreError::TooManyValues { .. })));
        assert_eq!(runs, 1);
    }
}
