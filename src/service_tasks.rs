//! Execution bodies for the five fixed internal task kinds.
//!
//! These are not user `Task`s; they are produced internally by the `Runtime`
//! (e.g. `flush_to_disk` submits a `Flush` task so the operation participates
//! in the same dependency graph and ready queue as everything else) and
//! dispatched here by `TaskKind`. All five are callback tasks
//! (`TaskKind::is_callback`): the post-execution hook runs them inline on
//! whichever thread completes their last predecessor, rather than handing
//! them to a worker through the ready queue — they're small and synchronous,
//! never worth a queue round-trip.

use std::sync::{Arc, Mutex};

use crate::data::DataSlot;
use crate::ids::DataId;
use crate::io::{IoQueue, IoRequest};
use crate::lru::Lru;

/// `Sync` is a no-op body: its only purpose is to exist as a join point in
/// the dependency graph, letting a caller block until a subgraph has
/// completed without naming every leaf task.
pub fn run_sync() {}

/// Pushes an explicit spill-to-disk request regardless of memory pressure,
/// used by `Runtime::flush_to_disk`. Unlike LRU-triggered eviction this does
/// not require the data to be cold; it only requires `dirty` to decide
/// whether a write is actually necessary. Once persisted, the data is marked
/// oldest in the LRU so the next `maybe_evict` pass prefers it over data
/// nobody has explicitly asked to checkpoint.
pub fn run_flush(id: DataId, slot: &Arc<DataSlot>, io: &IoQueue, lru: &Mutex<Lru>) {
    if !slot.dirty.load(std::sync::atomic::Ordering::Acquire) {
        return;
    }
    let buf = {
        let guard = slot.inner.lock().unwrap();
        guard.pack()
    };
    io.push(IoRequest::Write { id, buf });
    slot.dirty.store(false, std::sync::atomic::Ordering::Release);
    lru.lock().unwrap().mark_oldest(id);
}

/// Drops the in-memory representation of data that is known to be safely
/// persisted (or was never swappable in the first place, e.g. at
/// `unregister_data` time). Ref-count must already be zero; the runtime
/// enforces this before submitting the task — deallocate only fires after
/// every referencing task has completed.
pub fn run_deallocate(slot: &Arc<DataSlot>) {
    let mut guard = slot.inner.lock().unwrap();
    guard.deallocate();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;

    struct Blob(Vec<u8>);
    impl Data for Blob {
        fn pack(&self) -> Vec<u8> {
            self.0.clone()
        }
        fn unpack(&mut self, buf: &[u8]) {
            self.0 = buf.to_vec();
        }
        fn deallocate(&mut self) {
            self.0.clear();
        }
        fn size(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn flush_skips_when_not_dirty() {
        let slot = Arc::new(DataSlot::new(Box::new(Blob(vec![1, 2, 3])), true));
        slot.dirty.store(false, std::sync::atomic::Ordering::Release);
        let io = IoQueue::new();
        let lru = Mutex::new(Lru::new());
        run_flush(DataId(0), &slot, &io, &lru);
        assert_eq!(io.bytes_written.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[test]
    fn flush_marks_data_oldest_in_lru() {
        let slot = Arc::new(DataSlot::new(Box::new(Blob(vec![1, 2, 3])), true));
        let io = IoQueue::new();
        let lru = Mutex::new(Lru::new());
        lru.lock().unwrap().touch(DataId(0));
        lru.lock().unwrap().touch(DataId(1));
        run_flush(DataId(0), &slot, &io, &lru);
        assert_eq!(io.bytes_written.load(std::sync::atomic::Ordering::Relaxed), 3);
        assert_eq!(lru.lock().unwrap().pop_oldest(), Some(DataId(0)));
    }

    #[test]
    fn deallocate_clears_the_blob() {
        let slot = Arc::new(DataSlot::new(Box::new(Blob(vec![1, 2, 3])), true));
        run_deallocate(&slot);
        assert_eq!(slot.inner.lock().unwrap().size(), 0);
    }
}
