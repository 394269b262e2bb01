//! The pool core: borrow/return state machine, capacity accounting,
//! eviction passes and the RAII borrow guard.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::deque::{BlockingDeque, Cursor};
use crate::error::{PoolError, PoolResult};
use crate::evictor::{self, EvictorTask};
use crate::factory::ObjectFactory;
use crate::metrics::{PoolMetrics, PoolMetricsSnapshot};
use crate::object::{PooledObject, PooledState};

type Wrapper<T> = Arc<PooledObject<T>>;

#[derive(Clone, Copy)]
enum DestroyReason {
    Normal,
    Evictor,
    BorrowValidation,
}

/// A concurrent object pool.
///
/// Cheap to clone; all clones share the same state. Borrowed objects are
/// handed out as [`Pooled`] guards that return themselves on drop.
///
/// # Example
/// ```
/// use corral::{Pool, PoolConfig};
///
/// let pool = Pool::with_config(
///     PoolConfig::default().with_max_total(Some(4)),
///     || String::with_capacity(256),
/// );
///
/// let mut s = pool.borrow().unwrap();
/// s.push_str("hello");
/// drop(s); // back into the idle set
/// assert_eq!(pool.num_idle(), 1);
/// ```
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<T: Send + 'static> {
    config: PoolConfig,
    factory: Arc<dyn ObjectFactory<T>>,
    /// Idle wrappers, head = most recently returned under LIFO. Unbounded;
    /// `max_idle` is enforced by the return path so returns never block.
    idle: BlockingDeque<Wrapper<T>>,
    /// Every live wrapper, keyed by wrapper id. A wrapper leaves this map
    /// only through `destroy`.
    all: DashMap<u64, Wrapper<T>>,
    /// Creations started but not yet in `all`.
    create_gate: Mutex<usize>,
    create_cv: Condvar,
    metrics: PoolMetrics,
    closed: AtomicBool,
    close_lock: Mutex<()>,
    next_id: AtomicU64,
    /// Persists the eviction iterator position across passes and serializes
    /// concurrent passes.
    eviction_cursor: Mutex<Option<Cursor<Wrapper<T>>>>,
    evictor_registration: Mutex<Option<u64>>,
}

impl<T: Send + 'static> Pool<T> {
    /// Pool with default configuration.
    pub fn new<F>(factory: F) -> Self
    where
        F: ObjectFactory<T> + 'static,
    {
        Self::with_config(PoolConfig::default(), factory)
    }

    /// Pool with the given configuration.
    pub fn with_config<F>(config: PoolConfig, factory: F) -> Self
    where
        F: ObjectFactory<T> + 'static,
    {
        let idle = BlockingDeque::with_fairness(usize::MAX, config.fairness);
        let period = config
            .time_between_eviction_runs
            .filter(|period| !period.is_zero());
        let inner = Arc::new(PoolInner {
            config,
            factory: Arc::new(factory),
            idle,
            all: DashMap::new(),
            create_gate: Mutex::new(0),
            create_cv: Condvar::new(),
            metrics: PoolMetrics::new(),
            closed: AtomicBool::new(false),
            close_lock: Mutex::new(()),
            next_id: AtomicU64::new(0),
            eviction_cursor: Mutex::new(None),
            evictor_registration: Mutex::new(None),
        });
        if let Some(period) = period {
            let target = Arc::downgrade(&inner) as Weak<dyn EvictorTask>;
            let id = evictor::timer().schedule(target, period, period);
            *inner.evictor_registration.lock() = Some(id);
        }
        Self { inner }
    }

    /// Borrow an object, waiting per the configured `max_wait`.
    pub fn borrow(&self) -> PoolResult<Pooled<T>> {
        self.borrow_for(self.inner.config.max_wait)
    }

    /// Borrow an object with an explicit wait budget: `None` waits
    /// indefinitely, `Some(Duration::ZERO)` does not wait at all.
    pub fn borrow_for(&self, max_wait: Option<Duration>) -> PoolResult<Pooled<T>> {
        let wrapper = self.inner.borrow_wrapper(max_wait)?;
        Ok(Pooled {
            inner: Arc::clone(&self.inner),
            wrapper,
            detached: false,
            _marker: PhantomData,
        })
    }

    /// Create one object, passivate it and park it in the idle set. A no-op
    /// when the pool is at capacity.
    pub fn add_idle(&self) -> PoolResult<()> {
        self.inner.add_idle()
    }

    /// Pre-warm the idle set up to `min_idle`.
    pub fn prepare(&self) -> PoolResult<()> {
        self.inner.assert_open()?;
        let target = self.inner.config.min_idle;
        for _ in self.inner.idle.len()..target {
            self.add_idle()?;
        }
        Ok(())
    }

    /// Run one eviction pass over the idle set.
    ///
    /// This is the bare pass; the background evictor additionally tops the
    /// idle set back up to `min_idle` after each tick.
    pub fn evict(&self) -> PoolResult<()> {
        self.inner.evict_pass()
    }

    /// Destroy the object held by `guard` instead of returning it.
    pub fn invalidate(&self, guard: Pooled<T>) -> PoolResult<()> {
        guard.invalidate()
    }

    /// Destroy every currently idle object; allocated ones are untouched.
    pub fn clear(&self) {
        self.inner.clear_idle();
    }

    /// Close the pool: stop the evictor, destroy idle objects, wake blocked
    /// borrowers. Outstanding guards destroy their objects on drop. A second
    /// close is a no-op.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of idle objects.
    pub fn num_idle(&self) -> usize {
        self.inner.idle.len()
    }

    /// Number of objects currently checked out.
    pub fn num_active(&self) -> usize {
        self.inner.all.len().saturating_sub(self.inner.idle.len())
    }

    /// Number of borrowers blocked waiting for an object.
    pub fn num_waiters(&self) -> usize {
        if self.inner.config.block_when_exhausted {
            self.inner.idle.take_waiter_count()
        } else {
            0
        }
    }

    /// Point-in-time counters.
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.inner
            .metrics
            .snapshot(self.num_active(), self.num_idle())
    }

    /// The configuration this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<T: Send + 'static> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("num_idle", &self.num_idle())
            .field("num_active", &self.num_active())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PoolInner<T> {
    fn assert_open(&self) -> PoolResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(PoolError::Closed)
        } else {
            Ok(())
        }
    }

    fn borrow_wrapper(&self, max_wait: Option<Duration>) -> PoolResult<Wrapper<T>> {
        self.assert_open()?;
        let start = Instant::now();
        let deadline = max_wait.and_then(|wait| start.checked_add(wait));

        loop {
            let mut created = false;
            let mut candidate = self.idle.poll_first();

            if candidate.is_none() {
                candidate = self.create()?;
                created = candidate.is_some();
            }

            if candidate.is_none() {
                if !self.config.block_when_exhausted {
                    return Err(PoolError::Exhausted {
                        waited: start.elapsed(),
                    });
                }
                self.assert_open()?;
                candidate = match (max_wait, deadline) {
                    (Some(_), Some(deadline)) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            return Err(PoolError::Exhausted {
                                waited: start.elapsed(),
                            });
                        }
                        match self.idle.poll_first_timeout(remaining) {
                            Ok(Some(wrapper)) => Some(wrapper),
                            Ok(None) => {
                                return Err(PoolError::Exhausted {
                                    waited: start.elapsed(),
                                });
                            }
                            Err(_) => return Err(self.interruption_error()),
                        }
                    }
                    // No wait budget (or one too large to represent).
                    _ => match self.idle.take_first() {
                        Ok(wrapper) => Some(wrapper),
                        Err(_) => return Err(self.interruption_error()),
                    },
                };
            }

            let Some(wrapper) = candidate else { continue };

            if !wrapper.allocate() {
                // Lost the wrapper to an eviction test; it will resurface at
                // the head of the idle set.
                continue;
            }

            let activated = {
                let object = unsafe { wrapper.object_mut() };
                self.factory.activate(object)
            };
            if let Err(err) = activated {
                self.swallow(PoolError::Factory(err));
                self.destroy(&wrapper, DestroyReason::Normal);
                if created {
                    return Err(PoolError::Exhausted {
                        waited: start.elapsed(),
                    });
                }
                continue;
            }

            let validate = if created {
                self.config.test_on_create
            } else {
                self.config.test_on_borrow
            };
            if validate {
                let valid = {
                    let object = unsafe { wrapper.object_mut() };
                    self.factory.validate(object)
                };
                if !valid {
                    self.destroy(&wrapper, DestroyReason::BorrowValidation);
                    if created {
                        return Err(PoolError::Exhausted {
                            waited: start.elapsed(),
                        });
                    }
                    continue;
                }
            }

            let idle_for = wrapper
                .last_borrowed_at()
                .saturating_duration_since(wrapper.last_returned_at());
            self.metrics.record_borrow(idle_for, start.elapsed());
            trace!(id = wrapper.id(), fresh = created, "borrowed pooled object");
            return Ok(wrapper);
        }
    }

    fn interruption_error(&self) -> PoolError {
        if self.closed.load(Ordering::Acquire) {
            PoolError::Closed
        } else {
            PoolError::Interrupted
        }
    }

    /// Create a wrapper if the capacity cap allows it. `Ok(None)` means the
    /// cap is reached; factory errors bubble to the caller.
    fn create(&self) -> PoolResult<Option<Wrapper<T>>> {
        loop {
            self.assert_open()?;
            let mut in_flight = self.create_gate.lock();
            match self.config.max_total {
                Some(max) if self.all.len() + *in_flight >= max => {
                    if *in_flight == 0 {
                        return Ok(None);
                    }
                    // An in-flight creation may fail and free its slot; wait
                    // for the outcome rather than reporting exhaustion.
                    self.create_cv.wait(&mut in_flight);
                    continue;
                }
                _ => {
                    *in_flight += 1;
                }
            }
            break;
        }

        let created = self.factory.create();

        let object = match created {
            Ok(object) => object,
            Err(err) => {
                self.finish_create();
                debug!(error = %err, "factory failed to create object");
                return Err(PoolError::Factory(err));
            }
        };

        // Enter the object into `all` before releasing its in-flight slot so
        // the cap check never sees it counted by neither. The brief window
        // where it is counted by both only errs towards exhaustion.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapper = Arc::new(PooledObject::new(id, object));
        self.all.insert(id, Arc::clone(&wrapper));
        self.metrics.record_create();
        self.finish_create();
        trace!(id, live = self.all.len(), "created pooled object");
        Ok(Some(wrapper))
    }

    /// Release an in-flight creation slot and wake capacity waiters.
    fn finish_create(&self) {
        let mut in_flight = self.create_gate.lock();
        *in_flight -= 1;
        self.create_cv.notify_all();
    }

    /// Remove a wrapper from the pool and run the factory's destroy. Safe to
    /// race: only the invalidation winner proceeds.
    fn destroy(&self, wrapper: &Wrapper<T>, reason: DestroyReason) {
        if !wrapper.invalidate() {
            return;
        }
        self.idle.remove_first_occurrence(wrapper);
        self.all.remove(&wrapper.id());
        if let Some(object) = wrapper.take_object() {
            self.factory.destroy(object);
        }
        self.metrics.record_destroy();
        match reason {
            DestroyReason::Evictor => self.metrics.record_destroy_by_evictor(),
            DestroyReason::BorrowValidation => {
                self.metrics.record_destroy_by_borrow_validation();
            }
            DestroyReason::Normal => {}
        }
        // A destroy frees a capacity slot; let blocked creators recheck.
        self.create_cv.notify_all();
        debug!(id = wrapper.id(), "destroyed pooled object");
    }

    fn return_wrapper(&self, wrapper: &Wrapper<T>) -> PoolResult<()> {
        if !wrapper.mark_returning() {
            return Err(PoolError::IllegalState("object already returned to the pool"));
        }
        let active_for = wrapper.active_duration();

        if self.config.test_on_return {
            let valid = {
                let object = unsafe { wrapper.object_mut() };
                self.factory.validate(object)
            };
            if !valid {
                self.destroy(wrapper, DestroyReason::Normal);
                self.ensure_idle(1, false);
                self.metrics.record_return(active_for);
                return Ok(());
            }
        }

        let passivated = {
            let object = unsafe { wrapper.object_mut() };
            self.factory.passivate(object)
        };
        if let Err(err) = passivated {
            self.swallow(PoolError::Factory(err));
            self.destroy(wrapper, DestroyReason::Normal);
            self.ensure_idle(1, false);
            self.metrics.record_return(active_for);
            return Ok(());
        }

        if !wrapper.deallocate() {
            return Err(PoolError::IllegalState("return raced an invalidation"));
        }
        self.metrics.record_return(active_for);
        trace!(id = wrapper.id(), "returned pooled object");

        let over_cap = self
            .config
            .max_idle
            .is_some_and(|max| self.idle.len() >= max);
        if self.closed.load(Ordering::Acquire) || over_cap {
            self.destroy(wrapper, DestroyReason::Normal);
            return Ok(());
        }

        if self.config.lifo {
            let _ = self.idle.offer_first(Arc::clone(wrapper));
        } else {
            let _ = self.idle.offer_last(Arc::clone(wrapper));
        }
        if self.closed.load(Ordering::Acquire) {
            // Closed while we were inserting; sweep what we just parked.
            self.clear_idle();
        }
        Ok(())
    }

    fn invalidate_wrapper(&self, wrapper: &Wrapper<T>) -> PoolResult<()> {
        if wrapper.state() != PooledState::Invalid {
            self.destroy(wrapper, DestroyReason::Normal);
        }
        self.ensure_idle(1, false);
        Ok(())
    }

    fn add_idle(&self) -> PoolResult<()> {
        self.assert_open()?;
        match self.create()? {
            Some(wrapper) => self.park_new_idle(&wrapper).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Passivate a freshly created wrapper and insert it per the discipline,
    /// enforcing `max_idle` the same way the return path does. `Ok(false)`
    /// means the idle set was full and the wrapper was destroyed instead.
    fn park_new_idle(&self, wrapper: &Wrapper<T>) -> PoolResult<bool> {
        let passivated = {
            // Not yet published to the idle set; the creator is exclusive.
            let object = unsafe { wrapper.object_mut() };
            self.factory.passivate(object)
        };
        if let Err(err) = passivated {
            self.destroy(wrapper, DestroyReason::Normal);
            return Err(PoolError::Factory(err));
        }
        let over_cap = self
            .config
            .max_idle
            .is_some_and(|max| self.idle.len() >= max);
        if self.closed.load(Ordering::Acquire) || over_cap {
            self.destroy(wrapper, DestroyReason::Normal);
            return Ok(false);
        }
        if self.config.lifo {
            let _ = self.idle.offer_first(Arc::clone(wrapper));
        } else {
            let _ = self.idle.offer_last(Arc::clone(wrapper));
        }
        Ok(true)
    }

    /// Top the idle set up to `count`. With `always` unset this only runs
    /// while borrowers are actually waiting (a destroyed return is replaced
    /// so a waiter is not stranded).
    fn ensure_idle(&self, count: usize, always: bool) {
        while !self.closed.load(Ordering::Acquire)
            && self.idle.len() < count
            && (always || self.idle.take_waiter_count() > 0)
        {
            match self.create() {
                Ok(Some(wrapper)) => match self.park_new_idle(&wrapper) {
                    Ok(true) => {}
                    // The idle set is at its cap; creating more would only
                    // destroy them again.
                    Ok(false) => break,
                    Err(err) => {
                        self.swallow(err);
                        break;
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    self.swallow(err);
                    break;
                }
            }
        }
    }

    fn ensure_min_idle(&self) {
        if self.config.min_idle > 0 {
            self.ensure_idle(self.config.min_idle, true);
        }
    }

    /// One eviction pass: visit up to the configured budget of idle
    /// wrappers, least recently returned first, applying the policy and the
    /// optional `test_while_idle` round-trip.
    fn evict_pass(&self) -> PoolResult<()> {
        self.assert_open()?;
        let idle_count = self.idle.len();
        if idle_count == 0 {
            return Ok(());
        }
        let budget = self.config.num_tests_per_eviction_run.budget(idle_count);
        let eviction_config = self.config.eviction_config();

        // Holding the cursor slot serializes overlapping passes and keeps
        // the rotation position across them.
        let mut cursor_slot = self.eviction_cursor.lock();
        let mut tested = 0usize;
        let mut restarted = false;

        while tested < budget && !self.closed.load(Ordering::Acquire) {
            let candidate = loop {
                let cursor = cursor_slot.get_or_insert_with(|| {
                    // Returns land at the head under LIFO and at the tail
                    // under FIFO; start from the opposite end so the least
                    // recently returned wrapper is visited first.
                    if self.config.lifo {
                        self.idle.cursor_back()
                    } else {
                        self.idle.cursor()
                    }
                });
                match cursor.advance(&self.idle) {
                    Some(wrapper) => break Some(wrapper),
                    None => {
                        *cursor_slot = None;
                        if restarted {
                            break None;
                        }
                        restarted = true;
                    }
                }
            };
            let Some(under_test) = candidate else { break };

            if !under_test.start_eviction_test() {
                // Claimed by a borrower (or already condemned) since the
                // cursor saw it; does not count against the budget.
                continue;
            }
            tested += 1;

            let snapshot = under_test.eviction_candidate();
            if self
                .config
                .eviction_policy
                .evict(&eviction_config, &snapshot, self.idle.len())
            {
                self.destroy(&under_test, DestroyReason::Evictor);
                let _ = PooledObject::end_eviction_test(&under_test, &self.idle);
                continue;
            }

            if self.config.test_while_idle {
                self.test_while_idle(&under_test);
            }
            let _ = PooledObject::end_eviction_test(&under_test, &self.idle);
        }
        Ok(())
    }

    /// Round-trip an idle wrapper through the factory; any failure destroys
    /// it on the evictor's account.
    fn test_while_idle(&self, under_test: &Wrapper<T>) {
        let activated = {
            let object = unsafe { under_test.object_mut() };
            self.factory.activate(object)
        };
        if let Err(err) = activated {
            self.swallow(PoolError::Factory(err));
            self.destroy(under_test, DestroyReason::Evictor);
            return;
        }
        let valid = {
            let object = unsafe { under_test.object_mut() };
            self.factory.validate(object)
        };
        if !valid {
            self.destroy(under_test, DestroyReason::Evictor);
            return;
        }
        let passivated = {
            let object = unsafe { under_test.object_mut() };
            self.factory.passivate(object)
        };
        if let Err(err) = passivated {
            self.swallow(PoolError::Factory(err));
            self.destroy(under_test, DestroyReason::Evictor);
        }
    }

    fn clear_idle(&self) {
        while let Some(wrapper) = self.idle.poll_first() {
            self.destroy(&wrapper, DestroyReason::Normal);
        }
    }

    fn close(&self) {
        let _guard = self.close_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("closing pool");
        let registration = self.evictor_registration.lock().take();
        if let Some(id) = registration {
            evictor::timer().cancel(id, self.config.evictor_shutdown_timeout);
        }
        self.clear_idle();
        self.idle.interrupt_take_waiters();
    }

    /// Log a non-surfaced error and hand it to the listener, containing any
    /// listener panic.
    fn swallow(&self, error: PoolError) {
        warn!(error = %error, "swallowed pool error");
        if let Some(listener) = &self.config.swallowed_error_listener {
            let caught = panic::catch_unwind(AssertUnwindSafe(|| listener.on_swallowed(&error)));
            if caught.is_err() {
                warn!("swallowed-error listener panicked");
            }
        }
    }
}

impl<T: Send + 'static> EvictorTask for PoolInner<T> {
    fn run_once(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(err) = self.evict_pass() {
            self.swallow(err);
        }
        self.ensure_min_idle();
    }
}

impl<T: Send + 'static> Drop for PoolInner<T> {
    fn drop(&mut self) {
        if let Some(id) = self.evictor_registration.get_mut().take() {
            evictor::timer().cancel(id, Duration::ZERO);
        }
        // No guards can be alive here (each holds an Arc to this inner);
        // whatever remains is destroyed through the factory.
        let ids: Vec<u64> = self.all.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, wrapper)) = self.all.remove(&id) {
                wrapper.invalidate();
                if let Some(object) = wrapper.take_object() {
                    self.factory.destroy(object);
                }
            }
        }
    }
}

/// RAII guard for a borrowed object; dereferences to `T` and runs the return
/// path on drop.
pub struct Pooled<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
    wrapper: Wrapper<T>,
    detached: bool,
    _marker: PhantomData<T>,
}

impl<T: Send + 'static> Pooled<T> {
    /// Destroy the object instead of returning it. Use this when the caller
    /// knows the object is broken regardless of what `validate` would say.
    pub fn invalidate(mut self) -> PoolResult<()> {
        self.detached = true;
        self.inner.invalidate_wrapper(&self.wrapper)
    }

    /// A handle to the pool this object came from.
    pub fn pool(&self) -> Pool<T> {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }

    /// How many times the underlying object has been lent out.
    pub fn borrowed_count(&self) -> u64 {
        self.wrapper.borrowed_count()
    }
}

impl<T: Send + 'static> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // While `Allocated`, the guard is the payload's exclusive party.
        unsafe { self.wrapper.object_ref() }
    }
}

impl<T: Send + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.wrapper.object_mut() }
    }
}

impl<T: Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Err(err) = self.inner.return_wrapper(&self.wrapper) {
            self.inner.swallow(err);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.wrapper.id())
            .field("object", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn double_return_is_rejected_internally() {
        let pool = Pool::new(|| 1_u32);
        let guard = pool.borrow().unwrap();
        let wrapper = Arc::clone(&guard.wrapper);
        drop(guard);
        let err = pool.inner.return_wrapper(&wrapper).unwrap_err();
        assert!(matches!(err, PoolError::IllegalState(_)));
    }

    #[test]
    fn listener_panic_is_contained() {
        let hits = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&hits);
        let config = PoolConfig::default().with_swallowed_error_listener(Arc::new(
            move |_error: &PoolError| {
                observed.fetch_add(1, Ordering::Relaxed);
                panic!("listener bug");
            },
        ));
        let pool = Pool::with_config(config, || 0_u8);
        pool.inner.swallow(PoolError::Interrupted);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        // The pool is still usable afterwards.
        let _ = pool.borrow().unwrap();
    }

    #[test]
    fn create_respects_in_flight_accounting() {
        let pool = Pool::with_config(PoolConfig::default().with_max_total(Some(1)), || 0_u8);
        let first = pool.inner.create().unwrap();
        assert!(first.is_some());
        let second = pool.inner.create().unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn destroy_removes_from_both_structures() {
        let pool = Pool::new(|| 0_u8);
        pool.add_idle().unwrap();
        assert_eq!(pool.num_idle(), 1);
        let wrapper = pool.inner.idle.peek_first().unwrap();
        pool.inner.destroy(&wrapper, DestroyReason::Normal);
        assert_eq!(pool.num_idle(), 0);
        assert_eq!(pool.inner.all.len(), 0);
        // A racing second destroy is a no-op.
        pool.inner.destroy(&wrapper, DestroyReason::Normal);
        assert_eq!(pool.metrics().destroyed, 1);
    }
}
