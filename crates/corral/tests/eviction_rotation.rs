//! The eviction cursor rotates fairly: across `K` passes with a per-pass
//! budget of `n`, every idle object is visited either `⌊K·n/N⌋` or
//! `⌊K·n/N⌋ + 1` times.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corral::{FactoryError, NumTests, ObjectFactory, Pool, PoolConfig};
use proptest::prelude::*;

struct Visited {
    id: usize,
}

/// Counts eviction-run activations per object. With no borrows in play,
/// `activate` fires exactly once per cursor visit.
#[derive(Clone, Default)]
struct VisitFactory {
    created: Arc<AtomicUsize>,
    visits: Arc<Mutex<HashMap<usize, usize>>>,
}

impl ObjectFactory<Visited> for VisitFactory {
    fn create(&self) -> Result<Visited, FactoryError> {
        let id = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Visited { id })
    }

    fn destroy(&self, _object: Visited) {}

    fn activate(&self, object: &mut Visited) -> Result<(), FactoryError> {
        *self
            .visits
            .lock()
            .unwrap()
            .entry(object.id)
            .or_insert(0) += 1;
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn eviction_cursor_visits_fairly(
        n in prop::sample::select(vec![2_usize, 3, 5, 7]),
        pool_size in 7_usize..15,
        runs in 1_usize..10,
        lifo in any::<bool>(),
    ) {
        let factory = VisitFactory::default();
        let pool = Pool::with_config(
            PoolConfig::default()
                .with_max_total(None)
                .with_max_idle(None)
                .with_lifo(lifo)
                .with_test_while_idle(true)
                .with_min_evictable_idle(None)
                .with_num_tests_per_eviction_run(NumTests::Count(n)),
            factory.clone(),
        );

        for _ in 0..pool_size {
            pool.add_idle().unwrap();
        }
        for _ in 0..runs {
            pool.evict().unwrap();
        }

        let visits = factory.visits.lock().unwrap();
        let total: usize = visits.values().sum();
        prop_assert_eq!(total, runs * n);

        let lower = runs * n / pool_size;
        for id in 0..pool_size {
            let seen = visits.get(&id).copied().unwrap_or(0);
            prop_assert!(
                seen == lower || seen == lower + 1,
                "object {} visited {} times, expected {} or {}",
                id, seen, lower, lower + 1
            );
        }
    }
}
