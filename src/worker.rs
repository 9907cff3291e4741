//! Worker thread main loop.
//!
//! A worker never blocks waiting for work: it tries to pop a ready task,
//! and on failure spins with an exponentially growing backoff, the same
//! idea as a `rep; nop` CPU-relax hint in a busy-wait loop.
//! `std::hint::spin_loop()` is the direct Rust equivalent of that asm hint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::ids::TaskId;
use crate::queue::ReadyQueue;
use crate::task::Priority;

/// Shutdown sentinel pushed once per worker by `Runtime::run` when the ready
/// queue is drained: a sentinel value rather than a separate stop flag each
/// worker has to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    Run(TaskId),
    Shutdown,
}

const MAX_SPIN: u32 = 1 << 20;

/// Tracks one worker's current backoff spin count. Doubles on an empty pop,
/// resets to 1 on a successful one.
pub struct Backoff {
    spins: AtomicUsize,
}

impl Backoff {
    pub fn new() -> Self {
        Backoff { spins: AtomicUsize::new(1) }
    }

    /// Spin for the current backoff amount, then double it (capped).
    pub fn spin_and_grow(&self) {
        let n = self.spins.load(Ordering::Relaxed);
        for _ in 0..n {
            std::hint::spin_loop();
        }
        let next = (n * 2).min(MAX_SPIN as usize);
        self.spins.store(next, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.spins.store(1, Ordering::Relaxed);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Pop-or-spin loop: called repeatedly by a worker thread until it returns
/// `WorkItem::Shutdown`. Kept free of `Runtime` specifics so it can be unit
/// tested against a bare queue.
///
/// `park_timeout` selects the idle strategy: `None` busy-waits with
/// `backoff` (the default, lowest latency); `Some(d)` parks on the queue's
/// condvar for at most `d` instead, trading latency for CPU usage —
/// `RuntimeConfig::requeue_not_ready`.
pub fn next_work_item(queue: &ReadyQueue<WorkItem>, backoff: &Backoff, park_timeout: Option<Duration>) -> WorkItem {
    loop {
        match queue.try_pop() {
            Some(item) => {
                backoff.reset();
                return item;
            }
            None => match park_timeout {
                Some(timeout) => queue.wait_for_work(timeout),
                None => backoff.spin_and_grow(),
            },
        }
    }
}

pub struct WorkerHandle {
    pub id: usize,
    join: Option<std::thread::JoinHandle<()>>,
}

const PARK_TIMEOUT: Duration = Duration::from_millis(1);

impl WorkerHandle {
    pub fn spawn(
        id: usize,
        queue: Arc<ReadyQueue<WorkItem>>,
        park_on_idle: bool,
        mut run_one: impl FnMut(TaskId) + Send + 'static,
    ) -> Self {
        let join = std::thread::Builder::new()
            .name(format!("toyrt-worker-{id}"))
            .spawn(move || {
                let backoff = Backoff::new();
                let park_timeout = park_on_idle.then_some(PARK_TIMEOUT);
                loop {
                    match next_work_item(&queue, &backoff, park_timeout) {
                        WorkItem::Run(task) => run_one(task),
                        WorkItem::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn worker thread");
        WorkerHandle { id, join: Some(join) }
    }

    pub fn join(&mut self) {
        if let Some(h) = self.join.take() {
            h.join().expect("worker thread panicked");
        }
    }
}
