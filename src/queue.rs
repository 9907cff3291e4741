//! Ready queue variants.
//!
//! Both variants hold their `VecDeque`(s) behind a single `Mutex` plus a
//! `Condvar` that workers wait on only when told to block — the default
//! path is the busy-wait loop in `worker.rs`, so `pop` here is non-blocking
//! and shutdown is signalled with an explicit sentinel value rather than by
//! poisoning the queue. `PriorityQueue` keeps all three priority levels
//! under that same mutex rather than one lock per level, so a push to one
//! level is always serialized against a pop from another.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::task::Priority;

/// A value popped off the ready queue: either a task to run, or the
/// shutdown sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyItem<T> {
    Task(T),
    Shutdown,
}

/// Single-FIFO ready queue.
pub struct FifoQueue<T> {
    inner: Mutex<VecDeque<T>>,
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        FifoQueue {
            inner: Mutex::new(VecDeque::new()),
            stopped: Mutex::new(false),
            cond: Condvar::new(),
        }
    }
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.inner.lock().unwrap().push_back(item);
        self.cond.notify_one();
    }

    /// Non-blocking pop: the worker's busy-wait loop calls this and backs
    /// off on `None` rather than parking here.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake any worker parked in `wait_for_work` — used by the opt-in
    /// `requeue_not_ready` path (see `RuntimeConfig`) where a worker gives up
    /// its timeslice instead of spinning.
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }

    pub fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }

    /// Parks the calling thread on the condvar for at most `timeout`, or
    /// until a push/notify wakes it. Used by workers configured to requeue
    /// instead of busy-wait when the queue is empty.
    pub fn wait_for_work(&self, timeout: std::time::Duration) {
        let guard = self.inner.lock().unwrap();
        let _ = self.cond.wait_timeout(guard, timeout);
    }
}

/// The three priority buckets, guarded together by one mutex so a push to
/// one level is always serialized against a pop from another.
#[derive(Default)]
struct Levels<T> {
    high: VecDeque<T>,
    normal: VecDeque<T>,
    low: VecDeque<T>,
}

/// Three-level priority-FIFO ready queue: pop always drains `High` before
/// `Normal` before `Low`, preserving FIFO order within a level.
pub struct PriorityQueue<T> {
    levels: Mutex<Levels<T>>,
    cond: Condvar,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        PriorityQueue {
            levels: Mutex::new(Levels::default()),
            cond: Condvar::new(),
        }
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T, priority: Priority) {
        let mut levels = self.levels.lock().unwrap();
        let level = match priority {
            Priority::High => &mut levels.high,
            Priority::Normal => &mut levels.normal,
            Priority::Low => &mut levels.low,
        };
        level.push_back(item);
        drop(levels);
        self.cond.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut levels = self.levels.lock().unwrap();
        levels
            .high
            .pop_front()
            .or_else(|| levels.normal.pop_front())
            .or_else(|| levels.low.pop_front())
    }

    pub fn len(&self) -> usize {
        let levels = self.levels.lock().unwrap();
        levels.high.len() + levels.normal.len() + levels.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify_all(&self) {
        self.cond.notify_all();
    }

    /// See [`FifoQueue::wait_for_work`].
    pub fn wait_for_work(&self, timeout: std::time::Duration) {
        let guard = self.levels.lock().unwrap();
        let _ = self.cond.wait_timeout(guard, timeout);
    }
}

/// The ready-queue strategy a `Runtime` is configured with.
/// `WorkItem` (defined in `worker.rs`) pushed
/// with `Priority::Normal` behaves identically under either variant, so
/// switching strategies never changes single-priority submission semantics.
pub enum ReadyQueue<T> {
    Fifo(FifoQueue<T>),
    Priority(PriorityQueue<T>),
}

impl<T> ReadyQueue<T> {
    pub fn push(&self, item: T, priority: Priority) {
        match self {
            ReadyQueue::Fifo(q) => q.push(item),
            ReadyQueue::Priority(q) => q.push(item, priority),
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        match self {
            ReadyQueue::Fifo(q) => q.try_pop(),
            ReadyQueue::Priority(q) => q.try_pop(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReadyQueue::Fifo(q) => q.len(),
            ReadyQueue::Priority(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify_all(&self) {
        match self {
            ReadyQueue::Fifo(q) => q.notify_all(),
            ReadyQueue::Priority(q) => q.notify_all(),
        }
    }

    pub fn wait_for_work(&self, timeout: std::time::Duration) {
        match self {
            ReadyQueue::Fifo(q) => q.wait_for_work(timeout),
            ReadyQueue::Priority(q) => q.wait_for_work(timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_preserves_order() {
        let q: FifoQueue<i32> = FifoQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn priority_drains_high_before_normal_before_low() {
        let q: PriorityQueue<i32> = PriorityQueue::new();
        q.push(1, Priority::Low);
        q.push(2, Priority::Normal);
        q.push(3, Priority::High);
        q.push(4, Priority::High);
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), Some(4));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(1));
    }
}
