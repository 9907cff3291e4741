//! Data handle contract and registry.
//!
//! A `Data` is identified by a stable [`DataId`], not by address: the
//! runtime never compares `&dyn Data` pointers. The scheduler-owned
//! bookkeeping fields (`swapped`, `dirty`, `prefetch_in_flight`, `ref_count`,
//! `old_size`) live alongside the user's object in a [`DataSlot`], each field
//! with the narrowest synchronization it needs: cross-thread flags are
//! atomics with acquire/release ordering, never a plain bool behind a mutex
//! the worker would have to block on just to poll "has this swapped in yet".

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ids::DataId;

/// User-provided contract for a unit of state the runtime can move between
/// memory and disk (and, in distributed mode, between ranks).
///
/// `pack`/`unpack` split what a C-style two-mode `pack(void** ptr)` API would
/// conflate: the size-only query becomes [`Data::packed_size`], since a
/// nullable out-pointer is not an idiomatic Rust signature.
pub trait Data: Send {
    /// Serialize into a freshly allocated buffer.
    fn pack(&self) -> Vec<u8>;

    /// Size in bytes `pack` would produce, without allocating or copying.
    fn packed_size(&self) -> usize {
        self.size()
    }

    /// Restore state from a buffer produced by a prior `pack`.
    fn unpack(&mut self, buf: &[u8]);

    /// Drop the in-memory representation. Identity and metadata survive.
    fn deallocate(&mut self);

    /// Current size in bytes of the live in-memory representation.
    fn size(&self) -> usize;
}

/// Scheduler-owned bookkeeping plus the user object, addressed by [`DataId`].
pub struct DataSlot {
    pub(crate) inner: Mutex<Box<dyn Data>>,

    /// Home rank in distributed mode; -1 = not yet placed.
    pub(crate) rank: AtomicI32,
    /// Wire identifier; 0 is illegal and invariant-checked before a send/recv.
    pub(crate) tag: AtomicU32,
    /// Last observed size, used for resident-byte accounting.
    pub(crate) old_size: AtomicUsize,
    /// Number of not-yet-completed tasks referencing this data.
    pub(crate) ref_count: AtomicI32,
    /// True iff the data is on disk (or being written to disk).
    pub(crate) swapped: AtomicBool,
    /// True iff the in-memory version differs from the on-disk copy.
    pub(crate) dirty: AtomicBool,
    /// True iff a prefetch request has been pushed to the I/O thread.
    pub(crate) prefetch_in_flight: AtomicBool,
    /// User-declared: if false the runtime must keep this resident forever.
    pub(crate) swappable: AtomicBool,
}

impl DataSlot {
    pub(crate) fn new(data: Box<dyn Data>, swappable: bool) -> Self {
        DataSlot {
            inner: Mutex::new(data),
            rank: AtomicI32::new(-1),
            tag: AtomicU32::new(0),
            old_size: AtomicUsize::new(0),
            ref_count: AtomicI32::new(0),
            swapped: AtomicBool::new(false),
            // dirty(true): nothing is on disk yet, so the in-memory copy is
            // trivially "different".
            dirty: AtomicBool::new(true),
            prefetch_in_flight: AtomicBool::new(false),
            swappable: AtomicBool::new(swappable),
        }
    }

    /// Acquire-load: the only field a worker polls directly.
    pub fn is_swapped(&self) -> bool {
        self.swapped.load(Ordering::Acquire)
    }

    pub fn rank(&self) -> i32 {
        self.rank.load(Ordering::Relaxed)
    }

    pub fn set_rank(&self, rank: i32) {
        self.rank.store(rank, Ordering::Relaxed);
    }

    pub fn tag(&self) -> u32 {
        self.tag.load(Ordering::Relaxed)
    }

    pub fn set_tag(&self, tag: u32) {
        assert_ne!(tag, 0, "data tag 0 is reserved and illegal");
        self.tag.store(tag, Ordering::Relaxed);
    }

    pub fn swappable(&self) -> bool {
        self.swappable.load(Ordering::Relaxed)
    }

    pub fn set_swappable(&self, swappable: bool) {
        self.swappable.store(swappable, Ordering::Relaxed);
    }

    pub fn old_size(&self) -> usize {
        self.old_size.load(Ordering::Relaxed)
    }
}

/// Dense registry of [`DataSlot`]s, indexed by [`DataId`].
///
/// Entries are never removed by index (identity must stay stable): a call
/// to `unregister` nulls the slot instead of shrinking the vector.
#[derive(Default)]
pub struct DataTable {
    slots: Mutex<Vec<Option<std::sync::Arc<DataSlot>>>>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, data: Box<dyn Data>, swappable: bool) -> (DataId, std::sync::Arc<DataSlot>) {
        let slot = std::sync::Arc::new(DataSlot::new(data, swappable));
        let mut slots = self.slots.lock().unwrap();
        let id = DataId(slots.len() as u32);
        slots.push(Some(slot.clone()));
        (id, slot)
    }

    pub fn get(&self, id: DataId) -> std::sync::Arc<DataSlot> {
        self.slots
            .lock()
            .unwrap()
            .get(id.index())
            .and_then(|s| s.clone())
            .unwrap_or_else(|| panic!("use of unregistered {id:?}"))
    }

    /// Caller must have already checked the ref count is zero; here we just
    /// drop the runtime's strong reference to the slot.
    pub fn unregister(&self, id: DataId) {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("use of unregistered {id:?}"));
        assert!(slot.is_some(), "double unregister of {id:?}");
        *slot = None;
    }
}
