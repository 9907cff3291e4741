//! Replica cache.
//!
//! Tracks, per [`DataId`], the set of ranks known to hold a valid copy: a
//! bit vector indexed by rank. A write anywhere invalidates every other
//! rank's copy; a receive completing adds exactly the receiving rank.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ids::DataId;

#[derive(Default, Clone)]
struct Validity {
    /// `valid_on[rank]` — resized lazily as ranks are observed.
    valid_on: Vec<bool>,
}

impl Validity {
    fn ensure_len(&mut self, n: usize) {
        if self.valid_on.len() < n {
            self.valid_on.resize(n, false);
        }
    }
}

#[derive(Default)]
pub struct ReplicaCache {
    entries: Mutex<HashMap<DataId, Validity>>,
}

impl ReplicaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_valid(&self, id: DataId, rank: i32, world_size: usize) {
        let mut entries = self.entries.lock().unwrap();
        let v = entries.entry(id).or_default();
        v.ensure_len(world_size);
        v.valid_on[rank as usize] = true;
    }

    /// Invalidate every rank's copy except `writer` — called when a write
    /// completes on `writer`.
    pub fn invalidate_others(&self, id: DataId, writer: i32, world_size: usize) {
        let mut entries = self.entries.lock().unwrap();
        let v = entries.entry(id).or_default();
        v.ensure_len(world_size);
        for (rank, valid) in v.valid_on.iter_mut().enumerate() {
            *valid = rank as i32 == writer;
        }
    }

    pub fn is_valid_on(&self, id: DataId, rank: i32) -> bool {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&id)
            .map(|v| v.valid_on.get(rank as usize).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Ranks holding a valid copy of `id`, ascending.
    pub fn valid_ranks(&self, id: DataId) -> Vec<i32> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&id)
            .map(|v| {
                v.valid_on
                    .iter()
                    .enumerate()
                    .filter(|(_, &valid)| valid)
                    .map(|(r, _)| r as i32)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Choose the source rank a task executing on `dest` should pull `id`
    /// from: the already-valid rank requiring the least communication. When
    /// several ranks are valid, prefer `dest` itself (no transfer needed),
    /// else the lowest-numbered valid rank — a deterministic tie-break so
    /// repeated runs schedule transfers identically.
    pub fn best_source(&self, id: DataId, dest: i32) -> Option<i32> {
        let valid = self.valid_ranks(id);
        if valid.contains(&dest) {
            return Some(dest);
        }
        valid.into_iter().min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_invalidates_other_ranks() {
        let cache = ReplicaCache::new();
        cache.mark_valid(DataId(0), 0, 3);
        cache.mark_valid(DataId(0), 1, 3);
        cache.invalidate_others(DataId(0), 1, 3);
        assert!(!cache.is_valid_on(DataId(0), 0));
        assert!(cache.is_valid_on(DataId(0), 1));
    }

    #[test]
    fn best_source_prefers_dest_then_lowest_rank() {
        let cache = ReplicaCache::new();
        cache.mark_valid(DataId(0), 2, 4);
        cache.mark_valid(DataId(0), 1, 4);
        assert_eq!(cache.best_source(DataId(0), 3), Some(1));
        assert_eq!(cache.best_source(DataId(0), 2), Some(2));
    }
}
