//! A capacity-bounded, doubly-linked blocking deque.
//!
//! One mutex guards all structural state; two condvars signal
//! space-available (`not_full`) and item-available (`not_empty`). The pool
//! uses an unbounded instance as its idle set, but the capacity bound, timed
//! offers and dual-ended blocking takes are first-class features of the
//! component itself.
//!
//! Nodes are reference-counted so cursors survive concurrent removal: an
//! unlinked node keeps its outgoing links, letting an in-flight cursor chase
//! the successor chain back into the live list without ever yielding the
//! same node twice.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// A blocked take was woken by [`BlockingDeque::interrupt_take_waiters`]
/// before an item became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("take interrupted")
    }
}

impl std::error::Error for Interrupted {}

struct NodeCell<T> {
    /// `None` once the node has been unlinked.
    item: Option<T>,
    prev: Option<Weak<Node<T>>>,
    next: Option<Arc<Node<T>>>,
}

struct Node<T> {
    cell: UnsafeCell<NodeCell<T>>,
}

// The cell is only ever touched while the owning deque's mutex is held.
unsafe impl<T: Send> Send for Node<T> {}
unsafe impl<T: Send> Sync for Node<T> {}

impl<T> Node<T> {
    fn new(item: T) -> Arc<Self> {
        Arc::new(Node {
            cell: UnsafeCell::new(NodeCell {
                item: Some(item),
                prev: None,
                next: None,
            }),
        })
    }

    /// Callers must hold the deque mutex and must not overlap two borrows of
    /// the same node's cell.
    #[allow(clippy::mut_from_ref)]
    unsafe fn cell(&self) -> &mut NodeCell<T> {
        unsafe { &mut *self.cell.get() }
    }
}

struct Inner<T> {
    first: Option<Arc<Node<T>>>,
    last: Option<Arc<Node<T>>>,
    len: usize,
    capacity: usize,
    take_waiters: usize,
    interrupt_epoch: u64,
}

impl<T> Inner<T> {
    fn link_first(&mut self, item: T) {
        let node = Node::new(item);
        let old_first = self.first.take();
        unsafe {
            node.cell().next = old_first.clone();
            if let Some(f) = &old_first {
                f.cell().prev = Some(Arc::downgrade(&node));
            }
        }
        if old_first.is_none() {
            self.last = Some(node.clone());
        }
        self.first = Some(node);
        self.len += 1;
    }

    fn link_last(&mut self, item: T) {
        let node = Node::new(item);
        unsafe {
            node.cell().prev = self.last.as_ref().map(Arc::downgrade);
        }
        match self.last.take() {
            Some(l) => {
                unsafe {
                    l.cell().next = Some(node.clone());
                }
                self.last = Some(node);
            }
            None => {
                self.first = Some(node.clone());
                self.last = Some(node);
            }
        }
        self.len += 1;
    }

    fn unlink_first(&mut self) -> Option<T> {
        let f = self.first.take()?;
        // Keep `f.next` pointing at the successor so in-flight cursors chase
        // it back into the list.
        let (item, next) = unsafe {
            let cell = f.cell();
            (cell.item.take(), cell.next.clone())
        };
        match &next {
            Some(n) => unsafe {
                n.cell().prev = None;
            },
            None => self.last = None,
        }
        self.first = next;
        self.len -= 1;
        item
    }

    fn unlink_last(&mut self) -> Option<T> {
        let l = self.last.take()?;
        let (item, prev) = unsafe {
            let cell = l.cell();
            (cell.item.take(), cell.prev.clone())
        };
        match prev.as_ref().and_then(Weak::upgrade) {
            Some(p) => {
                unsafe {
                    p.cell().next = None;
                }
                self.last = Some(p);
            }
            None => self.first = None,
        }
        self.len -= 1;
        item
    }

    /// Unlink an arbitrary listed node. Returns `false` if the node was
    /// already gone.
    fn unlink(&mut self, node: &Arc<Node<T>>) -> bool {
        let (listed, is_first, is_last) = unsafe {
            let cell = node.cell();
            (cell.item.is_some(), cell.prev.is_none(), cell.next.is_none())
        };
        if !listed {
            return false;
        }
        // Exactly the head of the list has no predecessor, exactly the tail
        // has no successor.
        if is_first {
            return self.unlink_first().is_some();
        }
        if is_last {
            return self.unlink_last().is_some();
        }
        unsafe {
            let cell = node.cell();
            cell.item = None;
            let pred = cell.prev.clone().and_then(|w| w.upgrade());
            let next = cell.next.clone();
            if let (Some(p), Some(n)) = (pred, next) {
                n.cell().prev = Some(Arc::downgrade(&p));
                p.cell().next = Some(n);
            }
        }
        self.len -= 1;
        true
    }
}

/// Doubly-linked deque with a capacity, blocking dual-ended operations and
/// weakly-consistent cursors.
pub struct BlockingDeque<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    fair: bool,
}

impl<T> BlockingDeque<T> {
    /// An unfair deque holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self::with_fairness(capacity, false)
    }

    /// An unfair deque with no practical capacity bound.
    pub fn unbounded() -> Self {
        Self::with_fairness(usize::MAX, false)
    }

    /// Full constructor. When `fair` is set, the mutex is released with a
    /// fair handoff so waiters are served in queue order.
    pub fn with_fairness(capacity: usize, fair: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                first: None,
                last: None,
                len: 0,
                capacity,
                take_waiters: 0,
                interrupt_epoch: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            fair,
        }
    }

    fn release(&self, guard: MutexGuard<'_, Inner<T>>) {
        if self.fair {
            MutexGuard::unlock_fair(guard);
        } else {
            drop(guard);
        }
    }

    /// Insert at the head without blocking; `Err` hands the item back when
    /// the deque is full.
    pub fn offer_first(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.len >= inner.capacity {
            self.release(inner);
            return Err(item);
        }
        inner.link_first(item);
        self.not_empty.notify_one();
        self.release(inner);
        Ok(())
    }

    /// Insert at the tail without blocking; `Err` hands the item back when
    /// the deque is full.
    pub fn offer_last(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.len >= inner.capacity {
            self.release(inner);
            return Err(item);
        }
        inner.link_last(item);
        self.not_empty.notify_one();
        self.release(inner);
        Ok(())
    }

    /// Insert at the head, blocking while the deque is full.
    pub fn put_first(&self, item: T) {
        let mut inner = self.inner.lock();
        while inner.len >= inner.capacity {
            self.not_full.wait(&mut inner);
        }
        inner.link_first(item);
        self.not_empty.notify_one();
        self.release(inner);
    }

    /// Insert at the tail, blocking while the deque is full.
    pub fn put_last(&self, item: T) {
        let mut inner = self.inner.lock();
        while inner.len >= inner.capacity {
            self.not_full.wait(&mut inner);
        }
        inner.link_last(item);
        self.not_empty.notify_one();
        self.release(inner);
    }

    /// Insert at the head, blocking up to `timeout` for space.
    pub fn offer_first_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        self.offer_timeout(item, timeout, true)
    }

    /// Insert at the tail, blocking up to `timeout` for space.
    pub fn offer_last_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        self.offer_timeout(item, timeout, false)
    }

    fn offer_timeout(&self, item: T, timeout: Duration, front: bool) -> Result<(), T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        while inner.len >= inner.capacity {
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        self.release(inner);
                        return Err(item);
                    }
                    self.not_full.wait_until(&mut inner, deadline);
                }
                // Timeout too large to represent; wait as if unbounded.
                None => {
                    self.not_full.wait(&mut inner);
                }
            }
        }
        if front {
            inner.link_first(item);
        } else {
            inner.link_last(item);
        }
        self.not_empty.notify_one();
        self.release(inner);
        Ok(())
    }

    /// Remove and return the head item, if any.
    pub fn poll_first(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.unlink_first();
        if item.is_some() {
            self.not_full.notify_one();
        }
        self.release(inner);
        item
    }

    /// Remove and return the tail item, if any.
    pub fn poll_last(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.unlink_last();
        if item.is_some() {
            self.not_full.notify_one();
        }
        self.release(inner);
        item
    }

    /// Remove and return the head item, blocking until one is available.
    pub fn take_first(&self) -> Result<T, Interrupted> {
        self.take(true)
    }

    /// Remove and return the tail item, blocking until one is available.
    pub fn take_last(&self) -> Result<T, Interrupted> {
        self.take(false)
    }

    fn take(&self, front: bool) -> Result<T, Interrupted> {
        let mut inner = self.inner.lock();
        let epoch = inner.interrupt_epoch;
        loop {
            let item = if front {
                inner.unlink_first()
            } else {
                inner.unlink_last()
            };
            if let Some(item) = item {
                self.not_full.notify_one();
                self.release(inner);
                return Ok(item);
            }
            if inner.interrupt_epoch != epoch {
                self.release(inner);
                return Err(Interrupted);
            }
            inner.take_waiters += 1;
            self.not_empty.wait(&mut inner);
            inner.take_waiters -= 1;
        }
    }

    /// Remove and return the head item, blocking up to `timeout`. `Ok(None)`
    /// means the wait timed out.
    pub fn poll_first_timeout(&self, timeout: Duration) -> Result<Option<T>, Interrupted> {
        self.poll_timeout(timeout, true)
    }

    /// Remove and return the tail item, blocking up to `timeout`. `Ok(None)`
    /// means the wait timed out.
    pub fn poll_last_timeout(&self, timeout: Duration) -> Result<Option<T>, Interrupted> {
        self.poll_timeout(timeout, false)
    }

    fn poll_timeout(&self, timeout: Duration, front: bool) -> Result<Option<T>, Interrupted> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        let epoch = inner.interrupt_epoch;
        loop {
            let item = if front {
                inner.unlink_first()
            } else {
                inner.unlink_last()
            };
            if let Some(item) = item {
                self.not_full.notify_one();
                self.release(inner);
                return Ok(Some(item));
            }
            if inner.interrupt_epoch != epoch {
                self.release(inner);
                return Err(Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        self.release(inner);
                        return Ok(None);
                    }
                    inner.take_waiters += 1;
                    self.not_empty.wait_until(&mut inner, deadline);
                    inner.take_waiters -= 1;
                }
                None => {
                    inner.take_waiters += 1;
                    self.not_empty.wait(&mut inner);
                    inner.take_waiters -= 1;
                }
            }
        }
    }

    /// Clone of the head item without removing it.
    pub fn peek_first(&self) -> Option<T>
    where
        T: Clone,
    {
        let inner = self.inner.lock();
        inner
            .first
            .as_ref()
            .and_then(|f| unsafe { f.cell().item.clone() })
    }

    /// Clone of the tail item without removing it.
    pub fn peek_last(&self) -> Option<T>
    where
        T: Clone,
    {
        let inner = self.inner.lock();
        inner
            .last
            .as_ref()
            .and_then(|l| unsafe { l.cell().item.clone() })
    }

    /// Current number of items.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// Whether the deque holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many more items fit before offers start failing.
    pub fn remaining_capacity(&self) -> usize {
        let inner = self.inner.lock();
        inner.capacity.saturating_sub(inner.len)
    }

    /// The construction-time capacity bound.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Number of threads currently blocked in a take or timed poll.
    pub fn take_waiter_count(&self) -> usize {
        self.inner.lock().take_waiters
    }

    /// Whether any listed item equals `needle`.
    pub fn contains(&self, needle: &T) -> bool
    where
        T: PartialEq,
    {
        let inner = self.inner.lock();
        let mut cur = inner.first.clone();
        while let Some(node) = cur {
            let (matched, next) = unsafe {
                let cell = node.cell();
                (cell.item.as_ref() == Some(needle), cell.next.clone())
            };
            if matched {
                return true;
            }
            cur = next;
        }
        false
    }

    /// Unlink the first (head-most) item equal to `needle`.
    pub fn remove_first_occurrence(&self, needle: &T) -> bool
    where
        T: PartialEq,
    {
        let mut inner = self.inner.lock();
        let mut cur = inner.first.clone();
        while let Some(node) = cur {
            let (matched, next) = unsafe {
                let cell = node.cell();
                (cell.item.as_ref() == Some(needle), cell.next.clone())
            };
            if matched {
                let removed = inner.unlink(&node);
                if removed {
                    self.not_full.notify_one();
                }
                self.release(inner);
                return removed;
            }
            cur = next;
        }
        false
    }

    /// Unlink the last (tail-most) item equal to `needle`.
    pub fn remove_last_occurrence(&self, needle: &T) -> bool
    where
        T: PartialEq,
    {
        let mut inner = self.inner.lock();
        let mut cur = inner.last.clone();
        while let Some(node) = cur {
            let (matched, prev) = unsafe {
                let cell = node.cell();
                (
                    cell.item.as_ref() == Some(needle),
                    cell.prev.clone().and_then(|w| w.upgrade()),
                )
            };
            if matched {
                let removed = inner.unlink(&node);
                if removed {
                    self.not_full.notify_one();
                }
                self.release(inner);
                return removed;
            }
            cur = prev;
        }
        false
    }

    /// Move up to `max` items from the head into `out`; returns how many
    /// were moved.
    pub fn drain_to(&self, out: &mut Vec<T>, max: usize) -> usize {
        let mut inner = self.inner.lock();
        let mut moved = 0;
        while moved < max {
            match inner.unlink_first() {
                Some(item) => {
                    out.push(item);
                    moved += 1;
                }
                None => break,
            }
        }
        if moved > 0 {
            self.not_full.notify_all();
        }
        self.release(inner);
        moved
    }

    /// Drop every item and wake all `not_full` waiters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        while inner.unlink_first().is_some() {}
        self.not_full.notify_all();
        self.release(inner);
    }

    /// Wake every thread blocked in `take_*` / `poll_*_timeout`; they fail
    /// with [`Interrupted`].
    pub fn interrupt_take_waiters(&self) {
        let mut inner = self.inner.lock();
        inner.interrupt_epoch += 1;
        self.not_empty.notify_all();
    }

    /// Head-to-tail cursor; see [`Cursor`].
    pub fn cursor(&self) -> Cursor<T> {
        Cursor {
            next: self.inner.lock().first.clone(),
            descending: false,
        }
    }

    /// Tail-to-head cursor; see [`Cursor`].
    pub fn cursor_back(&self) -> Cursor<T> {
        Cursor {
            next: self.inner.lock().last.clone(),
            descending: true,
        }
    }

    /// Non-destructive head-to-tail iteration.
    pub fn iter(&self) -> Iter<'_, T>
    where
        T: Clone,
    {
        Iter {
            deque: self,
            cursor: self.cursor(),
        }
    }

    /// Non-destructive tail-to-head iteration.
    pub fn iter_descending(&self) -> Iter<'_, T>
    where
        T: Clone,
    {
        Iter {
            deque: self,
            cursor: self.cursor_back(),
        }
    }
}

impl<T> Drop for BlockingDeque<T> {
    fn drop(&mut self) {
        // Unchain iteratively; a recursive Arc drop would overflow the stack
        // on long lists.
        let inner = self.inner.get_mut();
        inner.last = None;
        let mut cur = inner.first.take();
        while let Some(node) = cur {
            cur = unsafe { node.cell().next.take() };
        }
    }
}

impl<T> fmt::Debug for BlockingDeque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BlockingDeque")
            .field("len", &inner.len)
            .field("capacity", &inner.capacity)
            .field("take_waiters", &inner.take_waiters)
            .field("fair", &self.fair)
            .finish()
    }
}

/// A weakly-consistent traversal position.
///
/// The cursor tolerates concurrent mutation: it never yields a node twice,
/// and when the node it would visit next has been removed it follows that
/// node's retained successor chain back into the live list. Positions stay
/// valid across calls, which is what lets an eviction pass resume where the
/// previous one stopped.
pub struct Cursor<T> {
    next: Option<Arc<Node<T>>>,
    descending: bool,
}

impl<T: Clone> Cursor<T> {
    /// Yield the next live item, or `None` when the traversal is done.
    pub fn advance(&mut self, deque: &BlockingDeque<T>) -> Option<T> {
        let _inner = deque.inner.lock();
        loop {
            let node = self.next.take()?;
            let (item, follow) = unsafe {
                let cell = node.cell();
                let follow = if self.descending {
                    cell.prev.clone().and_then(|w| w.upgrade())
                } else {
                    cell.next.clone()
                };
                (cell.item.clone(), follow)
            };
            self.next = follow;
            if let Some(item) = item {
                return Some(item);
            }
            // The node was unlinked since we last advanced; keep following
            // its retained links.
        }
    }
}

/// Borrowing iterator over cloned items.
pub struct Iter<'a, T> {
    deque: &'a BlockingDeque<T>,
    cursor: Cursor<T>,
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.cursor.advance(self.deque)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn collect<T: Clone>(deque: &BlockingDeque<T>) -> Vec<T> {
        deque.iter().collect()
    }

    #[test]
    fn offers_and_polls_both_ends() {
        let deque = BlockingDeque::new(4);
        deque.offer_last(2).unwrap();
        deque.offer_first(1).unwrap();
        deque.offer_last(3).unwrap();

        assert_eq!(collect(&deque), vec![1, 2, 3]);
        assert_eq!(deque.peek_first(), Some(1));
        assert_eq!(deque.peek_last(), Some(3));
        assert_eq!(deque.poll_first(), Some(1));
        assert_eq!(deque.poll_last(), Some(3));
        assert_eq!(deque.poll_first(), Some(2));
        assert_eq!(deque.poll_first(), None);
    }

    #[test]
    fn capacity_bound_rejects_offers() {
        let deque = BlockingDeque::new(2);
        deque.offer_first(1).unwrap();
        deque.offer_first(2).unwrap();
        assert_eq!(deque.offer_first(3), Err(3));
        assert_eq!(deque.offer_last(4), Err(4));
        assert_eq!(deque.remaining_capacity(), 0);

        assert_eq!(deque.poll_last(), Some(1));
        assert_eq!(deque.remaining_capacity(), 1);
        deque.offer_last(5).unwrap();
        assert_eq!(collect(&deque), vec![2, 5]);
    }

    #[test]
    fn timed_offer_gives_item_back_on_timeout() {
        let deque = BlockingDeque::new(1);
        deque.offer_first(1).unwrap();
        let err = deque.offer_last_timeout(2, Duration::from_millis(20));
        assert_eq!(err, Err(2));
    }

    #[test]
    fn put_blocks_until_space() {
        let deque = Arc::new(BlockingDeque::new(1));
        deque.offer_first("a").unwrap();

        let producer = {
            let deque = Arc::clone(&deque);
            thread::spawn(move || deque.put_last("b"))
        };
        thread::sleep(Duration::from_millis(30));
        assert_eq!(deque.poll_first(), Some("a"));
        producer.join().unwrap();
        assert_eq!(deque.poll_first(), Some("b"));
    }

    #[test]
    fn take_blocks_until_item() {
        let deque = Arc::new(BlockingDeque::new(4));
        let taker = {
            let deque = Arc::clone(&deque);
            thread::spawn(move || deque.take_first())
        };
        thread::sleep(Duration::from_millis(30));
        deque.offer_last(42).unwrap();
        assert_eq!(taker.join().unwrap(), Ok(42));
    }

    #[test]
    fn timed_poll_times_out_empty() {
        let deque: BlockingDeque<i32> = BlockingDeque::new(4);
        let start = Instant::now();
        let polled = deque.poll_first_timeout(Duration::from_millis(40)).unwrap();
        assert_eq!(polled, None);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn interrupt_wakes_take_waiters() {
        let deque: Arc<BlockingDeque<i32>> = Arc::new(BlockingDeque::new(4));
        let takers: Vec<_> = (0..3)
            .map(|_| {
                let deque = Arc::clone(&deque);
                thread::spawn(move || deque.take_first())
            })
            .collect();
        while deque.take_waiter_count() < 3 {
            thread::yield_now();
        }
        deque.interrupt_take_waiters();
        for taker in takers {
            assert_eq!(taker.join().unwrap(), Err(Interrupted));
        }
        // Fresh takers are unaffected by a past interrupt.
        deque.offer_first(1).unwrap();
        assert_eq!(deque.take_first(), Ok(1));
    }

    #[test]
    fn interrupt_does_not_starve_delivery() {
        let deque: Arc<BlockingDeque<i32>> = Arc::new(BlockingDeque::new(4));
        let taker = {
            let deque = Arc::clone(&deque);
            thread::spawn(move || deque.poll_first_timeout(Duration::from_secs(5)))
        };
        while deque.take_waiter_count() < 1 {
            thread::yield_now();
        }
        deque.offer_first(9).unwrap();
        assert_eq!(taker.join().unwrap(), Ok(Some(9)));
    }

    #[test]
    fn remove_occurrences_by_equality() {
        let deque = BlockingDeque::new(8);
        for n in [1, 2, 3, 2, 4] {
            deque.offer_last(n).unwrap();
        }
        assert!(deque.contains(&2));
        assert!(deque.remove_first_occurrence(&2));
        assert_eq!(collect(&deque), vec![1, 3, 2, 4]);
        assert!(deque.remove_last_occurrence(&2));
        assert_eq!(collect(&deque), vec![1, 3, 4]);
        assert!(!deque.remove_first_occurrence(&2));
        assert!(!deque.contains(&2));
    }

    #[test]
    fn drain_moves_from_head() {
        let deque = BlockingDeque::new(8);
        for n in 0..5 {
            deque.offer_last(n).unwrap();
        }
        let mut out = Vec::new();
        assert_eq!(deque.drain_to(&mut out, 3), 3);
        assert_eq!(out, vec![0, 1, 2]);
        assert_eq!(deque.len(), 2);
        assert_eq!(deque.drain_to(&mut out, 10), 2);
        assert!(deque.is_empty());
    }

    #[test]
    fn descending_iteration() {
        let deque = BlockingDeque::new(8);
        for n in 0..4 {
            deque.offer_last(n).unwrap();
        }
        let back_to_front: Vec<_> = deque.iter_descending().collect();
        assert_eq!(back_to_front, vec![3, 2, 1, 0]);
    }

    #[test]
    fn cursor_survives_removal_of_upcoming_node() {
        let deque = BlockingDeque::new(8);
        for n in 1..=4 {
            deque.offer_last(n).unwrap();
        }
        let mut cursor = deque.cursor();
        assert_eq!(cursor.advance(&deque), Some(1));
        // The node the cursor would visit next disappears.
        assert!(deque.remove_first_occurrence(&2));
        assert_eq!(cursor.advance(&deque), Some(3));
        assert_eq!(cursor.advance(&deque), Some(4));
        assert_eq!(cursor.advance(&deque), None);
    }

    #[test]
    fn cursor_chases_removed_head_chain() {
        let deque = BlockingDeque::new(8);
        for n in 1..=4 {
            deque.offer_last(n).unwrap();
        }
        let mut cursor = deque.cursor();
        // Everything ahead of the cursor is consumed before it moves.
        assert_eq!(deque.poll_first(), Some(1));
        assert_eq!(deque.poll_first(), Some(2));
        assert_eq!(cursor.advance(&deque), Some(3));
        assert_eq!(cursor.advance(&deque), Some(4));
        assert_eq!(cursor.advance(&deque), None);
    }

    #[test]
    fn clear_wakes_not_full_waiters() {
        let deque = Arc::new(BlockingDeque::new(1));
        deque.offer_first(1).unwrap();
        let producer = {
            let deque = Arc::clone(&deque);
            thread::spawn(move || deque.put_first(2))
        };
        thread::sleep(Duration::from_millis(30));
        deque.clear();
        producer.join().unwrap();
        assert_eq!(deque.len(), 1);
        assert_eq!(deque.peek_first(), Some(2));
    }

    #[test]
    fn fair_deque_round_trips() {
        let deque = BlockingDeque::with_fairness(4, true);
        deque.offer_first(1).unwrap();
        deque.offer_last(2).unwrap();
        assert_eq!(deque.poll_first(), Some(1));
        assert_eq!(deque.poll_first(), Some(2));
    }
}
