//! Statistics tracking for pools.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Number of samples each timing ring retains.
const RING_SIZE: usize = 100;

/// Fixed-size ring of duration samples, written lock-free.
///
/// Readers see a weakly consistent view; that is fine for mean reporting.
struct TimeRing {
    slots: Box<[AtomicU64]>,
    written: AtomicUsize,
}

impl TimeRing {
    fn new() -> Self {
        let slots = (0..RING_SIZE).map(|_| AtomicU64::new(0)).collect();
        Self {
            slots,
            written: AtomicUsize::new(0),
        }
    }

    fn record(&self, sample: Duration) {
        let index = self.written.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.slots[index].store(sample.as_micros() as u64, Ordering::Relaxed);
    }

    fn mean(&self) -> Duration {
        let filled = self.written.load(Ordering::Relaxed).min(self.slots.len());
        if filled == 0 {
            return Duration::ZERO;
        }
        let sum: u64 = self.slots[..filled]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .sum();
        Duration::from_micros(sum / filled as u64)
    }
}

/// Counters a pool maintains across its lifetime.
pub(crate) struct PoolMetrics {
    borrowed: AtomicU64,
    returned: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
    destroyed_by_evictor: AtomicU64,
    destroyed_by_borrow_validation: AtomicU64,
    max_borrow_wait_micros: AtomicU64,
    active_times: TimeRing,
    idle_times: TimeRing,
    wait_times: TimeRing,
}

impl PoolMetrics {
    pub(crate) fn new() -> Self {
        Self {
            borrowed: AtomicU64::new(0),
            returned: AtomicU64::new(0),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            destroyed_by_evictor: AtomicU64::new(0),
            destroyed_by_borrow_validation: AtomicU64::new(0),
            max_borrow_wait_micros: AtomicU64::new(0),
            active_times: TimeRing::new(),
            idle_times: TimeRing::new(),
            wait_times: TimeRing::new(),
        }
    }

    pub(crate) fn record_create(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful borrow: how long the wrapper sat idle and how
    /// long the borrower waited.
    pub(crate) fn record_borrow(&self, idle_for: Duration, waited: Duration) {
        self.borrowed.fetch_add(1, Ordering::Relaxed);
        self.idle_times.record(idle_for);
        self.wait_times.record(waited);
        self.update_max_wait(waited.as_micros() as u64);
    }

    pub(crate) fn record_return(&self, active_for: Duration) {
        self.returned.fetch_add(1, Ordering::Relaxed);
        self.active_times.record(active_for);
    }

    pub(crate) fn record_destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destroy_by_evictor(&self) {
        self.destroyed_by_evictor.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destroy_by_borrow_validation(&self) {
        self.destroyed_by_borrow_validation.fetch_add(1, Ordering::Relaxed);
    }

    fn update_max_wait(&self, waited: u64) {
        let mut current = self.max_borrow_wait_micros.load(Ordering::Relaxed);
        while waited > current {
            match self.max_borrow_wait_micros.compare_exchange_weak(
                current,
                waited,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn snapshot(&self, num_active: usize, num_idle: usize) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            borrowed: self.borrowed.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            destroyed_by_evictor: self.destroyed_by_evictor.load(Ordering::Relaxed),
            destroyed_by_borrow_validation: self
                .destroyed_by_borrow_validation
                .load(Ordering::Relaxed),
            max_borrow_wait: Duration::from_micros(
                self.max_borrow_wait_micros.load(Ordering::Relaxed),
            ),
            mean_active_time: self.active_times.mean(),
            mean_idle_time: self.idle_times.mean(),
            mean_borrow_wait_time: self.wait_times.mean(),
            num_active,
            num_idle,
        }
    }
}

/// Point-in-time view of a pool's counters.
#[derive(Debug, Clone)]
pub struct PoolMetricsSnapshot {
    /// Objects handed to borrowers.
    pub borrowed: u64,
    /// Objects returned by borrowers.
    pub returned: u64,
    /// Objects the factory created for this pool.
    pub created: u64,
    /// Objects destroyed, for any reason.
    pub destroyed: u64,
    /// Objects destroyed by eviction runs.
    pub destroyed_by_evictor: u64,
    /// Objects destroyed because borrow-time validation failed.
    pub destroyed_by_borrow_validation: u64,
    /// Longest wait any borrower experienced.
    pub max_borrow_wait: Duration,
    /// Mean checked-out time over the last 100 returns.
    pub mean_active_time: Duration,
    /// Mean idle time over the last 100 borrows.
    pub mean_idle_time: Duration,
    /// Mean borrower wait over the last 100 borrows.
    pub mean_borrow_wait_time: Duration,
    /// Currently checked-out objects.
    pub num_active: usize,
    /// Currently idle objects.
    pub num_idle: usize,
}

impl fmt::Display for PoolMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pool metrics:")?;
        writeln!(f, "  Borrowed: {} (returned: {})", self.borrowed, self.returned)?;
        writeln!(f, "  Created: {} (destroyed: {})", self.created, self.destroyed)?;
        writeln!(
            f,
            "  Destroyed by evictor: {}, by borrow validation: {}",
            self.destroyed_by_evictor, self.destroyed_by_borrow_validation
        )?;
        writeln!(f, "  Active: {} (idle: {})", self.num_active, self.num_idle)?;
        writeln!(f, "  Max borrow wait: {:?}", self.max_borrow_wait)?;
        writeln!(
            f,
            "  Mean active/idle/wait: {:?} / {:?} / {:?}",
            self.mean_active_time, self.mean_idle_time, self.mean_borrow_wait_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_mean_over_partial_fill() {
        let ring = TimeRing::new();
        ring.record(Duration::from_micros(100));
        ring.record(Duration::from_micros(300));
        assert_eq!(ring.mean(), Duration::from_micros(200));
    }

    #[test]
    fn ring_wraps_after_capacity() {
        let ring = TimeRing::new();
        for _ in 0..RING_SIZE {
            ring.record(Duration::from_micros(10));
        }
        for _ in 0..RING_SIZE {
            ring.record(Duration::from_micros(30));
        }
        assert_eq!(ring.mean(), Duration::from_micros(30));
    }

    #[test]
    fn empty_ring_means_zero() {
        assert_eq!(TimeRing::new().mean(), Duration::ZERO);
    }

    #[test]
    fn max_wait_is_monotonic() {
        let metrics = PoolMetrics::new();
        metrics.record_borrow(Duration::ZERO, Duration::from_millis(5));
        metrics.record_borrow(Duration::ZERO, Duration::from_millis(2));
        let snapshot = metrics.snapshot(0, 0);
        assert_eq!(snapshot.max_borrow_wait, Duration::from_millis(5));
        assert_eq!(snapshot.borrowed, 2);
    }
}
