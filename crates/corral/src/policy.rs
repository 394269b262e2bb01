//! Eviction policies: pure predicates deciding whether an idle object should
//! be destroyed by the evictor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Name under which [`DefaultEvictionPolicy`] is pre-registered.
pub const DEFAULT_POLICY_NAME: &str = "default";

/// The slice of pool configuration an eviction policy may consult.
#[derive(Debug, Clone, Copy)]
pub struct EvictionConfig {
    /// Idle age beyond which an object is evicted unconditionally.
    pub idle_evict_duration: Option<Duration>,
    /// Idle age beyond which an object is evicted while the idle count
    /// stays above `min_idle`.
    pub idle_soft_evict_duration: Option<Duration>,
    /// Floor the evictor keeps topped up; soft eviction never digs below it.
    pub min_idle: usize,
}

/// Snapshot of the wrapper under test, taken at the start of the eviction
/// test so the policy sees a consistent picture.
#[derive(Debug, Clone, Copy)]
pub struct EvictionCandidate {
    /// Time since the object was last returned (or created, if never lent).
    pub idle_for: Duration,
    /// Time since the object was created.
    pub age: Duration,
    /// How many times the object has been borrowed.
    pub borrowed_count: u64,
}

/// Decides whether an idle object should be evicted.
///
/// Policies must be pure with respect to pool state: the pool hands them a
/// config slice, a candidate snapshot and the current idle count, nothing
/// else. Register custom policies with [`register_eviction_policy`] to make
/// them addressable by name, or install them directly on the config.
pub trait EvictionPolicy: Send + Sync {
    /// `true` means destroy the candidate.
    fn evict(
        &self,
        config: &EvictionConfig,
        candidate: &EvictionCandidate,
        idle_count: usize,
    ) -> bool;
}

/// Two-threshold policy: soft eviction above `min_idle`, hard eviction
/// regardless of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvictionPolicy;

impl EvictionPolicy for DefaultEvictionPolicy {
    fn evict(
        &self,
        config: &EvictionConfig,
        candidate: &EvictionCandidate,
        idle_count: usize,
    ) -> bool {
        if let Some(soft) = config.idle_soft_evict_duration {
            if candidate.idle_for >= soft && idle_count > config.min_idle {
                return true;
            }
        }
        if let Some(hard) = config.idle_evict_duration {
            if candidate.idle_for >= hard {
                return true;
            }
        }
        false
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn EvictionPolicy>>>> = Lazy::new(|| {
    let mut map: HashMap<String, Arc<dyn EvictionPolicy>> = HashMap::new();
    map.insert(DEFAULT_POLICY_NAME.to_owned(), Arc::new(DefaultEvictionPolicy));
    RwLock::new(map)
});

/// Register a policy under `name`, replacing any previous registration.
pub fn register_eviction_policy(name: impl Into<String>, policy: Arc<dyn EvictionPolicy>) {
    REGISTRY.write().insert(name.into(), policy);
}

/// Look up a policy previously registered under `name`.
pub fn eviction_policy(name: &str) -> Option<Arc<dyn EvictionPolicy>> {
    REGISTRY.read().get(name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hard: Option<u64>, soft: Option<u64>, min_idle: usize) -> EvictionConfig {
        EvictionConfig {
            idle_evict_duration: hard.map(Duration::from_millis),
            idle_soft_evict_duration: soft.map(Duration::from_millis),
            min_idle,
        }
    }

    fn candidate(idle_ms: u64) -> EvictionCandidate {
        EvictionCandidate {
            idle_for: Duration::from_millis(idle_ms),
            age: Duration::from_millis(idle_ms),
            borrowed_count: 0,
        }
    }

    #[test]
    fn keeps_young_objects() {
        let policy = DefaultEvictionPolicy;
        assert!(!policy.evict(&config(Some(100), None, 0), &candidate(50), 5));
    }

    #[test]
    fn hard_threshold_ignores_min_idle() {
        let policy = DefaultEvictionPolicy;
        assert!(policy.evict(&config(Some(100), None, 10), &candidate(150), 1));
    }

    #[test]
    fn soft_threshold_respects_min_idle() {
        let policy = DefaultEvictionPolicy;
        let cfg = config(Some(10_000), Some(100), 2);
        assert!(policy.evict(&cfg, &candidate(150), 3));
        assert!(!policy.evict(&cfg, &candidate(150), 2));
    }

    #[test]
    fn disabled_thresholds_never_evict() {
        let policy = DefaultEvictionPolicy;
        assert!(!policy.evict(&config(None, None, 0), &candidate(u64::MAX / 2), 100));
    }

    #[test]
    fn registry_resolves_default_and_custom() {
        assert!(eviction_policy(DEFAULT_POLICY_NAME).is_some());
        assert!(eviction_policy("no-such-policy").is_none());

        struct Never;
        impl EvictionPolicy for Never {
            fn evict(&self, _: &EvictionConfig, _: &EvictionCandidate, _: usize) -> bool {
                false
            }
        }
        register_eviction_policy("never", Arc::new(Never));
        let policy = eviction_policy("never").unwrap();
        assert!(!policy.evict(&config(Some(1), None, 0), &candidate(1000), 10));
    }
}
