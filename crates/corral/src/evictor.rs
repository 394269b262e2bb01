//! Process-wide eviction scheduler.
//!
//! One lazily-started background thread serves every pool in the process.
//! Pools register a weak tick target; the last deregistration retires the
//! worker with a bounded join so graceful shutdown never hangs on it. The
//! worker thread never blocks process exit.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

/// A pool-side tick target: one eviction pass plus idle top-up.
pub(crate) trait EvictorTask: Send + Sync {
    fn run_once(&self);
}

static TIMER: Lazy<EvictionTimer> = Lazy::new(EvictionTimer::new);

/// The process-wide scheduler instance.
pub(crate) fn timer() -> &'static EvictionTimer {
    &TIMER
}

struct ScheduledTask {
    target: Weak<dyn EvictorTask>,
    period: Duration,
    next_due: Instant,
}

struct TimerInner {
    tasks: HashMap<u64, ScheduledTask>,
    next_task_id: u64,
    worker: Option<JoinHandle<()>>,
    /// Bumped whenever the current worker is retired; a worker whose epoch
    /// no longer matches must exit even if tasks reappeared.
    worker_epoch: u64,
}

pub(crate) struct EvictionTimer {
    inner: Mutex<TimerInner>,
    cv: Condvar,
}

impl EvictionTimer {
    fn new() -> Self {
        Self {
            inner: Mutex::new(TimerInner {
                tasks: HashMap::new(),
                next_task_id: 0,
                worker: None,
                worker_epoch: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Register a tick target with the given initial delay and fixed delay
    /// between completions. Returns the registration id for `cancel`.
    pub(crate) fn schedule(
        &'static self,
        target: Weak<dyn EvictorTask>,
        delay: Duration,
        period: Duration,
    ) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_task_id;
        inner.next_task_id += 1;
        inner.tasks.insert(
            id,
            ScheduledTask {
                target,
                period,
                next_due: Instant::now() + delay,
            },
        );

        // A worker that died from a panicking task is replaced here.
        if inner.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            inner.worker = None;
        }
        if inner.worker.is_none() {
            inner.worker_epoch += 1;
            let epoch = inner.worker_epoch;
            let handle = thread::Builder::new()
                .name("corral-evictor".into())
                .spawn(move || worker_loop(epoch))
                .expect("failed to spawn evictor worker thread");
            inner.worker = Some(handle);
        }
        self.cv.notify_all();
        id
    }

    /// Deregister a tick target. When this was the last registration the
    /// worker is retired, waiting up to `join_timeout` for it to stop.
    pub(crate) fn cancel(&self, id: u64, join_timeout: Duration) {
        let handle = {
            let mut inner = self.inner.lock();
            inner.tasks.remove(&id);
            if inner.tasks.is_empty() {
                inner.worker_epoch += 1;
                inner.worker.take()
            } else {
                None
            }
        };
        self.cv.notify_all();

        if let Some(handle) = handle {
            let deadline = Instant::now() + join_timeout;
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    tracing::warn!(
                        timeout = ?join_timeout,
                        "evictor worker did not stop in time, detaching"
                    );
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub(crate) fn task_count(&self) -> usize {
        self.inner.lock().tasks.len()
    }
}

fn worker_loop(epoch: u64) {
    let timer = timer();
    let mut inner = timer.inner.lock();
    loop {
        if inner.worker_epoch != epoch {
            return;
        }

        let now = Instant::now();
        let mut due: Vec<(u64, Arc<dyn EvictorTask>)> = Vec::new();
        let mut dead: Vec<u64> = Vec::new();
        let mut wakeup: Option<Instant> = None;
        for (&id, task) in &inner.tasks {
            if task.next_due <= now {
                match task.target.upgrade() {
                    Some(target) => due.push((id, target)),
                    None => dead.push(id),
                }
            } else {
                wakeup = Some(wakeup.map_or(task.next_due, |w| w.min(task.next_due)));
            }
        }
        for id in dead {
            inner.tasks.remove(&id);
        }

        if !due.is_empty() {
            drop(inner);
            for (_, target) in &due {
                target.run_once();
            }
            inner = timer.inner.lock();
            let completed = Instant::now();
            for (id, _) in due {
                if let Some(task) = inner.tasks.get_mut(&id) {
                    task.next_due = completed + task.period;
                }
            }
            continue;
        }

        if inner.tasks.is_empty() {
            // Every target was dropped without an explicit cancel.
            inner.worker = None;
            return;
        }

        match wakeup {
            Some(deadline) => {
                timer.cv.wait_until(&mut inner, deadline);
            }
            None => {
                timer.cv.wait(&mut inner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        ticks: AtomicUsize,
    }

    impl EvictorTask for Counting {
        fn run_once(&self) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn ticks_at_fixed_delay_until_cancelled() {
        let task = Arc::new(Counting {
            ticks: AtomicUsize::new(0),
        });
        let weak = Arc::downgrade(&task) as Weak<dyn EvictorTask>;
        let id = timer().schedule(weak, Duration::from_millis(5), Duration::from_millis(10));

        thread::sleep(Duration::from_millis(120));
        let ticked = task.ticks.load(Ordering::Relaxed);
        assert!(ticked >= 2, "expected at least 2 ticks, saw {ticked}");

        timer().cancel(id, Duration::from_secs(1));
        let after_cancel = task.ticks.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(task.ticks.load(Ordering::Relaxed), after_cancel);
    }

    #[test]
    fn dropped_targets_are_reaped() {
        let task = Arc::new(Counting {
            ticks: AtomicUsize::new(0),
        });
        let weak = Arc::downgrade(&task) as Weak<dyn EvictorTask>;
        let id = timer().schedule(weak, Duration::from_millis(5), Duration::from_millis(5));
        drop(task);

        thread::sleep(Duration::from_millis(60));
        // The worker has either reaped the dead registration already or will
        // on its next pass; cancelling afterwards must be a no-op.
        timer().cancel(id, Duration::from_secs(1));
        assert!(timer().task_count() < 16);
    }
}
