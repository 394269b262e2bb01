//! Per-object wrapper: lifecycle state, timestamps and the eviction
//! handshake.

use std::cell::UnsafeCell;
use std::cmp::Ordering;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicU64};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::deque::BlockingDeque;
use crate::policy::EvictionCandidate;

/// Lifecycle state of a pooled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PooledState {
    /// In the idle set, available for borrowing.
    Idle,
    /// Checked out by a borrower.
    Allocated,
    /// Being examined by the evictor.
    Eviction,
    /// A borrower raced the evictor; once the eviction test finishes the
    /// wrapper is re-inserted at the head of the idle set.
    EvictionReturnToHead,
    /// On its way back from a borrower.
    Returning,
    /// Condemned; the next step is destruction.
    Invalid,
    /// Given up on by its borrower.
    Abandoned,
}

impl fmt::Display for PooledState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Allocated => "allocated",
            Self::Eviction => "eviction",
            Self::EvictionReturnToHead => "eviction-return-to-head",
            Self::Returning => "returning",
            Self::Invalid => "invalid",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

struct State {
    state: PooledState,
    last_borrow: Instant,
    last_return: Instant,
    last_use: Instant,
    payload_taken: bool,
}

/// The pool's record binding one user object to its lifecycle state and
/// timestamps.
///
/// State transitions are serialized by a per-wrapper mutex; the transition
/// methods return `false` instead of transitioning when the current state is
/// incompatible, which is how the borrow path and the evictor coordinate
/// without sharing a lock.
pub struct PooledObject<T> {
    id: u64,
    created_at: Instant,
    /// The payload. Taken exactly once, when the wrapper is destroyed.
    object: UnsafeCell<ManuallyDrop<T>>,
    borrowed_count: AtomicU64,
    inner: Mutex<State>,
}

// The payload cell is only touched by whichever party the state machine
// grants exclusive access: the borrower while `Allocated`/`Returning`, the
// evictor while `Eviction`, the destroyer after `Invalid`.
unsafe impl<T: Send> Send for PooledObject<T> {}
unsafe impl<T: Send> Sync for PooledObject<T> {}

impl<T> PooledObject<T> {
    pub(crate) fn new(id: u64, object: T) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            object: UnsafeCell::new(ManuallyDrop::new(object)),
            borrowed_count: AtomicU64::new(0),
            inner: Mutex::new(State {
                state: PooledState::Idle,
                last_borrow: now,
                last_return: now,
                last_use: now,
                payload_taken: false,
            }),
        }
    }

    /// Stable identity of this wrapper within its pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PooledState {
        self.inner.lock().state
    }

    /// How many times this wrapper has been lent out.
    pub fn borrowed_count(&self) -> u64 {
        self.borrowed_count.load(atomic::Ordering::Relaxed)
    }

    /// Time since the wrapper was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the object was last returned (or created, if never lent).
    pub fn idle_duration(&self) -> Duration {
        let inner = self.inner.lock();
        Instant::now().saturating_duration_since(inner.last_return)
    }

    /// Time the object spent (or has spent so far) with its last borrower.
    pub fn active_duration(&self) -> Duration {
        let inner = self.inner.lock();
        if inner.last_return > inner.last_borrow {
            inner.last_return.saturating_duration_since(inner.last_borrow)
        } else {
            Instant::now().saturating_duration_since(inner.last_borrow)
        }
    }

    /// When the object was last returned.
    pub fn last_returned_at(&self) -> Instant {
        self.inner.lock().last_return
    }

    /// When the object was last borrowed.
    pub fn last_borrowed_at(&self) -> Instant {
        self.inner.lock().last_borrow
    }

    /// When the object was last known to be in use.
    pub fn last_used_at(&self) -> Instant {
        self.inner.lock().last_use
    }

    /// Snapshot handed to eviction policies.
    pub(crate) fn eviction_candidate(&self) -> EvictionCandidate {
        EvictionCandidate {
            idle_for: self.idle_duration(),
            age: self.age(),
            borrowed_count: self.borrowed_count(),
        }
    }

    /// Claim the wrapper for a borrower.
    ///
    /// Succeeds only on `Idle → Allocated`. When the wrapper is mid
    /// eviction test it is promoted to `EvictionReturnToHead` and the claim
    /// fails; the evictor re-inserts it at the head of the idle set so it is
    /// offered again before newer items.
    pub fn allocate(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            PooledState::Idle => {
                inner.state = PooledState::Allocated;
                let now = Instant::now();
                inner.last_borrow = now;
                inner.last_use = now;
                self.borrowed_count.fetch_add(1, atomic::Ordering::Relaxed);
                true
            }
            PooledState::Eviction => {
                inner.state = PooledState::EvictionReturnToHead;
                false
            }
            _ => false,
        }
    }

    /// Return the wrapper to `Idle` after a borrow (`Allocated`/`Returning`).
    pub fn deallocate(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            PooledState::Allocated | PooledState::Returning => {
                inner.state = PooledState::Idle;
                let now = Instant::now();
                inner.last_return = now;
                inner.last_use = now;
                true
            }
            _ => false,
        }
    }

    /// First half of the return path: `Allocated → Returning`. A `false`
    /// here is a double return.
    pub fn mark_returning(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == PooledState::Allocated {
            inner.state = PooledState::Returning;
            true
        } else {
            false
        }
    }

    /// Condemn the wrapper. Returns `false` when it was already condemned,
    /// letting concurrent invalidations collapse into one destroy.
    pub fn invalidate(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == PooledState::Invalid {
            false
        } else {
            inner.state = PooledState::Invalid;
            true
        }
    }

    /// Mark the wrapper abandoned by its borrower.
    pub fn mark_abandoned(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            PooledState::Allocated | PooledState::Returning => {
                inner.state = PooledState::Abandoned;
                true
            }
            _ => false,
        }
    }

    /// Begin an eviction test: `Idle → Eviction`. A `false` means another
    /// party got to the wrapper first; the evictor must skip it.
    pub fn start_eviction_test(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == PooledState::Idle {
            inner.state = PooledState::Eviction;
            true
        } else {
            false
        }
    }

    /// Finish an eviction test.
    ///
    /// `Eviction → Idle` returns `true`. `EvictionReturnToHead → Idle`
    /// re-inserts the wrapper at the head of `idle` (the racing borrower
    /// polled it out) and returns `false`. Any other state means the wrapper
    /// left the idle set for good while under test.
    pub fn end_eviction_test(this: &Arc<Self>, idle: &BlockingDeque<Arc<PooledObject<T>>>) -> bool {
        let mut inner = this.inner.lock();
        match inner.state {
            PooledState::Eviction => {
                inner.state = PooledState::Idle;
                true
            }
            PooledState::EvictionReturnToHead => {
                inner.state = PooledState::Idle;
                drop(inner);
                let _ = idle.offer_first(Arc::clone(this));
                false
            }
            _ => false,
        }
    }

    /// Shared access to the payload.
    ///
    /// # Safety
    /// The caller must be the party the state machine currently grants the
    /// payload to, the payload must not have been taken, and no `object_mut`
    /// borrow may be live.
    pub(crate) unsafe fn object_ref(&self) -> &T {
        unsafe { &*self.object.get() }
    }

    /// Exclusive access to the payload.
    ///
    /// # Safety
    /// The caller must be the party the state machine currently grants the
    /// payload to, the payload must not have been taken, and no other
    /// payload borrow may be live.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn object_mut(&self) -> &mut T {
        unsafe { &mut *self.object.get() }
    }

    /// Take the payload out for destruction. Only the invalidation winner
    /// calls this, after the wrapper reached `Invalid`; later callers get
    /// `None`.
    pub(crate) fn take_object(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        if inner.payload_taken {
            return None;
        }
        inner.payload_taken = true;
        Some(unsafe { ManuallyDrop::take(&mut *self.object.get()) })
    }
}

impl<T> Drop for PooledObject<T> {
    fn drop(&mut self) {
        // A wrapper that never went through destroy still owns its payload.
        if !self.inner.get_mut().payload_taken {
            unsafe { ManuallyDrop::drop(self.object.get_mut()) }
        }
    }
}

impl<T> PartialEq for PooledObject<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for PooledObject<T> {}

impl<T> PartialOrd for PooledObject<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders wrappers by last return time; ties broken by identity. The locks
/// are taken one after the other, never nested.
impl<T> Ord for PooledObject<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        let mine = self.last_returned_at();
        let theirs = other.last_returned_at();
        mine.cmp(&theirs).then_with(|| self.id.cmp(&other.id))
    }
}

impl<T> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("borrowed_count", &self.borrowed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_return_cycle() {
        let wrapper = PooledObject::new(1, "payload");
        assert_eq!(wrapper.state(), PooledState::Idle);

        assert!(wrapper.allocate());
        assert_eq!(wrapper.state(), PooledState::Allocated);
        assert!(!wrapper.allocate());
        assert_eq!(wrapper.borrowed_count(), 1);

        assert!(wrapper.mark_returning());
        assert!(!wrapper.mark_returning());
        assert!(wrapper.deallocate());
        assert_eq!(wrapper.state(), PooledState::Idle);
    }

    #[test]
    fn invalidate_is_single_shot() {
        let wrapper = PooledObject::new(1, ());
        assert!(wrapper.invalidate());
        assert!(!wrapper.invalidate());
        assert_eq!(wrapper.state(), PooledState::Invalid);
        assert!(!wrapper.allocate());
    }

    #[test]
    fn eviction_test_round_trip() {
        let wrapper = Arc::new(PooledObject::new(1, ()));
        let idle: BlockingDeque<Arc<PooledObject<()>>> = BlockingDeque::unbounded();

        assert!(wrapper.start_eviction_test());
        assert!(!wrapper.start_eviction_test());
        assert!(PooledObject::end_eviction_test(&wrapper, &idle));
        assert_eq!(wrapper.state(), PooledState::Idle);
        assert!(idle.is_empty());
    }

    #[test]
    fn borrower_racing_evictor_returns_to_head() {
        let idle: BlockingDeque<Arc<PooledObject<i32>>> = BlockingDeque::unbounded();
        let newer = Arc::new(PooledObject::new(2, 2));
        idle.offer_first(Arc::clone(&newer)).unwrap();

        let raced = Arc::new(PooledObject::new(1, 1));
        assert!(raced.start_eviction_test());
        // A borrower polls the wrapper out of the idle set and tries to
        // claim it mid-test.
        assert!(!raced.allocate());
        assert_eq!(raced.state(), PooledState::EvictionReturnToHead);

        assert!(!PooledObject::end_eviction_test(&raced, &idle));
        assert_eq!(raced.state(), PooledState::Idle);
        // Re-inserted ahead of newer items so it is tested again first.
        let head = idle.poll_first().unwrap();
        assert_eq!(head.id(), 1);
    }

    #[test]
    fn take_object_is_single_shot() {
        let wrapper = PooledObject::new(1, String::from("x"));
        assert!(wrapper.invalidate());
        assert_eq!(wrapper.take_object().as_deref(), Some("x"));
        assert_eq!(wrapper.take_object(), None);
    }

    #[test]
    fn ordering_by_last_return_then_id() {
        let a = PooledObject::new(1, ());
        std::thread::sleep(Duration::from_millis(5));
        let b = PooledObject::new(2, ());

        assert!(a < b);

        assert!(a.allocate());
        assert!(a.deallocate());
        // `a` returned most recently now.
        assert!(b < a);
    }

    #[test]
    fn active_duration_freezes_on_return() {
        let wrapper = PooledObject::new(1, ());
        assert!(wrapper.allocate());
        std::thread::sleep(Duration::from_millis(10));
        assert!(wrapper.deallocate());
        let frozen = wrapper.active_duration();
        assert!(frozen >= Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(10));
        assert!(wrapper.active_duration() < frozen + Duration::from_millis(5));
    }
}
