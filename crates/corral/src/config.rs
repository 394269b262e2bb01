//! Pool configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PoolError;
use crate::policy::{self, DefaultEvictionPolicy, EvictionConfig, EvictionPolicy};

/// How many idle objects a single eviction pass examines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumTests {
    /// Examine up to this many objects (capped at the idle count).
    Count(usize),
    /// Examine `ceil(idle_count / n)` objects, so the whole idle set is
    /// covered in roughly `n` passes.
    Fraction(u32),
}

impl NumTests {
    /// Resolve the budget for a pass over `idle_count` objects.
    pub fn budget(self, idle_count: usize) -> usize {
        match self {
            NumTests::Count(n) => n.min(idle_count),
            NumTests::Fraction(n) => idle_count.div_ceil(n.max(1) as usize),
        }
    }
}

impl Default for NumTests {
    fn default() -> Self {
        NumTests::Count(3)
    }
}

/// Receives errors the pool swallowed instead of surfacing: factory failures
/// during returns, eviction runs and idle top-ups.
///
/// A listener that panics is contained and the panic dropped; the pool never
/// lets observer code take it down.
pub trait SwallowedErrorListener: Send + Sync {
    /// Called once per swallowed error.
    fn on_swallowed(&self, error: &PoolError);
}

impl<F> SwallowedErrorListener for F
where
    F: Fn(&PoolError) + Send + Sync,
{
    fn on_swallowed(&self, error: &PoolError) {
        self(error)
    }
}

/// Configuration for a [`Pool`](crate::Pool).
///
/// Plain struct with builder-style `with_*` methods; `Default` matches the
/// table below.
///
/// | field | default |
/// |---|---|
/// | `max_total` | `Some(8)` |
/// | `max_idle` | `Some(8)` |
/// | `min_idle` | `0` |
/// | `block_when_exhausted` | `true` |
/// | `max_wait` | `None` (wait indefinitely) |
/// | `lifo` | `true` |
/// | `fairness` | `false` |
/// | `test_on_create` / `test_on_borrow` / `test_on_return` / `test_while_idle` | `false` |
/// | `time_between_eviction_runs` | `None` (evictor disabled) |
/// | `num_tests_per_eviction_run` | `NumTests::Count(3)` |
/// | `min_evictable_idle` | `Some(30 min)` |
/// | `soft_min_evictable_idle` | `None` |
/// | `evictor_shutdown_timeout` | `10 s` |
#[derive(Clone)]
pub struct PoolConfig {
    /// Upper bound on live objects; `None` means unbounded.
    pub max_total: Option<usize>,
    /// Upper bound on the idle set; excess returns are destroyed.
    pub max_idle: Option<usize>,
    /// Floor the evictor tops the idle set up to; `0` disables top-up.
    pub min_idle: usize,
    /// When `false`, an exhausted pool fails borrows immediately.
    pub block_when_exhausted: bool,
    /// Default borrow wait: `None` waits indefinitely, `Some(ZERO)` does not
    /// wait at all.
    pub max_wait: Option<Duration>,
    /// `true` borrows the most recently returned object, `false` the least.
    pub lifo: bool,
    /// Serve blocked borrowers in arrival order.
    pub fairness: bool,
    /// Validate freshly created objects before first hand-out.
    pub test_on_create: bool,
    /// Validate reused objects on every borrow.
    pub test_on_borrow: bool,
    /// Validate objects on return; failures destroy instead of pooling.
    pub test_on_return: bool,
    /// Round-trip idle objects through activate/validate/passivate during
    /// eviction runs.
    pub test_while_idle: bool,
    /// Fixed delay between background eviction runs; `None` disables the
    /// evictor task.
    pub time_between_eviction_runs: Option<Duration>,
    /// Per-run eviction test budget.
    pub num_tests_per_eviction_run: NumTests,
    /// Idle age beyond which objects are evicted unconditionally.
    pub min_evictable_idle: Option<Duration>,
    /// Idle age beyond which objects are evicted while `min_idle` is
    /// preserved.
    pub soft_min_evictable_idle: Option<Duration>,
    /// How long closing the last pool waits for the shared evictor worker.
    pub evictor_shutdown_timeout: Duration,
    /// Predicate applied by eviction runs.
    pub eviction_policy: Arc<dyn EvictionPolicy>,
    /// Optional sink for swallowed errors.
    pub swallowed_error_listener: Option<Arc<dyn SwallowedErrorListener>>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: Some(8),
            max_idle: Some(8),
            min_idle: 0,
            block_when_exhausted: true,
            max_wait: None,
            lifo: true,
            fairness: false,
            test_on_create: false,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            time_between_eviction_runs: None,
            num_tests_per_eviction_run: NumTests::default(),
            min_evictable_idle: Some(Duration::from_secs(30 * 60)),
            soft_min_evictable_idle: None,
            evictor_shutdown_timeout: Duration::from_secs(10),
            eviction_policy: Arc::new(DefaultEvictionPolicy),
            swallowed_error_listener: None,
        }
    }
}

impl PoolConfig {
    /// Set the live-object cap; `None` removes the bound.
    pub fn with_max_total(mut self, max_total: Option<usize>) -> Self {
        self.max_total = max_total;
        self
    }

    /// Set the idle-set cap; `None` removes the bound.
    pub fn with_max_idle(mut self, max_idle: Option<usize>) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the idle floor the evictor maintains.
    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Choose between blocking and failing fast on exhaustion.
    pub fn with_block_when_exhausted(mut self, block: bool) -> Self {
        self.block_when_exhausted = block;
        self
    }

    /// Set the default borrow wait budget.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Select the idle discipline.
    pub fn with_lifo(mut self, lifo: bool) -> Self {
        self.lifo = lifo;
        self
    }

    /// Serve blocked borrowers in arrival order.
    pub fn with_fairness(mut self, fairness: bool) -> Self {
        self.fairness = fairness;
        self
    }

    /// Validate freshly created objects before first hand-out.
    pub fn with_test_on_create(mut self, test: bool) -> Self {
        self.test_on_create = test;
        self
    }

    /// Validate reused objects on every borrow.
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = test;
        self
    }

    /// Validate objects on return.
    pub fn with_test_on_return(mut self, test: bool) -> Self {
        self.test_on_return = test;
        self
    }

    /// Round-trip idle objects through the factory during eviction runs.
    pub fn with_test_while_idle(mut self, test: bool) -> Self {
        self.test_while_idle = test;
        self
    }

    /// Enable the background evictor with the given fixed delay.
    pub fn with_time_between_eviction_runs(mut self, period: Option<Duration>) -> Self {
        self.time_between_eviction_runs = period;
        self
    }

    /// Set the per-run eviction test budget.
    pub fn with_num_tests_per_eviction_run(mut self, num_tests: NumTests) -> Self {
        self.num_tests_per_eviction_run = num_tests;
        self
    }

    /// Set the unconditional idle-age eviction threshold.
    pub fn with_min_evictable_idle(mut self, threshold: Option<Duration>) -> Self {
        self.min_evictable_idle = threshold;
        self
    }

    /// Set the `min_idle`-respecting idle-age eviction threshold.
    pub fn with_soft_min_evictable_idle(mut self, threshold: Option<Duration>) -> Self {
        self.soft_min_evictable_idle = threshold;
        self
    }

    /// Bound the wait for the shared evictor worker at shutdown.
    pub fn with_evictor_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.evictor_shutdown_timeout = timeout;
        self
    }

    /// Install an eviction policy by reference.
    pub fn with_eviction_policy(mut self, policy: Arc<dyn EvictionPolicy>) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Install an eviction policy by registry name.
    ///
    /// Returns `self` unchanged (and logs) when no policy is registered
    /// under `name`.
    pub fn with_eviction_policy_named(mut self, name: &str) -> Self {
        match policy::eviction_policy(name) {
            Some(policy) => self.eviction_policy = policy,
            None => tracing::warn!(policy = name, "unknown eviction policy, keeping current"),
        }
        self
    }

    /// Install a swallowed-error listener.
    pub fn with_swallowed_error_listener(
        mut self,
        listener: Arc<dyn SwallowedErrorListener>,
    ) -> Self {
        self.swallowed_error_listener = Some(listener);
        self
    }

    /// The slice of this configuration that eviction policies see.
    pub(crate) fn eviction_config(&self) -> EvictionConfig {
        EvictionConfig {
            idle_evict_duration: self.min_evictable_idle,
            idle_soft_evict_duration: self.soft_min_evictable_idle,
            min_idle: self.min_idle,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("max_total", &self.max_total)
            .field("max_idle", &self.max_idle)
            .field("min_idle", &self.min_idle)
            .field("block_when_exhausted", &self.block_when_exhausted)
            .field("max_wait", &self.max_wait)
            .field("lifo", &self.lifo)
            .field("fairness", &self.fairness)
            .field("test_on_create", &self.test_on_create)
            .field("test_on_borrow", &self.test_on_borrow)
            .field("test_on_return", &self.test_on_return)
            .field("test_while_idle", &self.test_while_idle)
            .field("time_between_eviction_runs", &self.time_between_eviction_runs)
            .field("num_tests_per_eviction_run", &self.num_tests_per_eviction_run)
            .field("min_evictable_idle", &self.min_evictable_idle)
            .field("soft_min_evictable_idle", &self.soft_min_evictable_idle)
            .field("evictor_shutdown_timeout", &self.evictor_shutdown_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = PoolConfig::default();
        assert_eq!(config.max_total, Some(8));
        assert_eq!(config.max_idle, Some(8));
        assert_eq!(config.min_idle, 0);
        assert!(config.block_when_exhausted);
        assert_eq!(config.max_wait, None);
        assert!(config.lifo);
        assert!(!config.fairness);
        assert_eq!(config.num_tests_per_eviction_run, NumTests::Count(3));
        assert_eq!(config.min_evictable_idle, Some(Duration::from_secs(1800)));
        assert_eq!(config.soft_min_evictable_idle, None);
        assert_eq!(config.evictor_shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.time_between_eviction_runs, None);
    }

    #[test]
    fn num_tests_budget() {
        assert_eq!(NumTests::Count(3).budget(10), 3);
        assert_eq!(NumTests::Count(10).budget(4), 4);
        assert_eq!(NumTests::Fraction(2).budget(5), 3);
        assert_eq!(NumTests::Fraction(3).budget(9), 3);
        assert_eq!(NumTests::Fraction(4).budget(0), 0);
    }

    #[test]
    fn named_policy_lookup() {
        let config = PoolConfig::default().with_eviction_policy_named("default");
        let candidate = crate::policy::EvictionCandidate {
            idle_for: Duration::ZERO,
            age: Duration::ZERO,
            borrowed_count: 0,
        };
        assert!(!config
            .eviction_policy
            .evict(&config.eviction_config(), &candidate, 0));
    }
}
