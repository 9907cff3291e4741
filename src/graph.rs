//! Dependency derivation.
//!
//! For every `Data`, the graph remembers the last writer and the set of
//! readers since that writer. Submitting a task with a declared access list
//! walks its accesses in order and adds an edge for each RAW/WAW/WAR hazard,
//! deduplicated through a `(pred, succ)` set — without the dedup set a task
//! touching the same predecessor twice (e.g. reading two different pieces of
//! data last written by the same task) would double-count its in-degree and
//! never become ready.

use std::collections::{HashMap, HashSet};

use crate::ids::{DataId, TaskId};
use crate::task::{Access, AccessMode};

struct AccessState {
    last_writer: Option<TaskId>,
    readers_since_write: Vec<TaskId>,
}

impl Default for AccessState {
    fn default() -> Self {
        AccessState {
            last_writer: None,
            readers_since_write: Vec::new(),
        }
    }
}

/// Tracks per-data access history and produces dependency edges as tasks are
/// submitted. A task is assumed to be submitted only after every task it
/// could depend on.
#[derive(Default)]
pub struct DependencyGraph {
    state: HashMap<DataId, AccessState>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the deduplicated set of predecessor tasks for `task`'s access
    /// list, and update the per-data access history to reflect `task` as the
    /// new last writer/reader. Returns predecessors in no particular order;
    /// the caller is responsible for turning each into a successor-list
    /// entry plus an in-degree increment on `task`.
    pub fn insert_task(&mut self, task: TaskId, accesses: &[Access]) -> Vec<TaskId> {
        let mut preds = HashSet::new();

        for access in accesses {
            let entry = self.state.entry(access.data).or_default();
            match access.mode {
                AccessMode::Read => {
                    if let Some(w) = entry.last_writer {
                        if w != task {
                            preds.insert(w);
                        }
                    }
                }
                AccessMode::Write => {
                    if let Some(w) = entry.last_writer {
                        if w != task {
                            preds.insert(w);
                        }
                    }
                    for &r in &entry.readers_since_write {
                        if r != task {
                            preds.insert(r);
                        }
                    }
                }
            }
        }

        for access in accesses {
            let entry = self.state.entry(access.data).or_default();
            match access.mode {
                AccessMode::Read => entry.readers_since_write.push(task),
                AccessMode::Write => {
                    entry.last_writer = Some(task);
                    entry.readers_since_write.clear();
                }
            }
        }

        preds.into_iter().collect()
    }
}
