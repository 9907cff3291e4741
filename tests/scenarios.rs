//! Single-process scenario tests.
//!
//! A small `Counter` `Data` impl stands in as a numeric test fixture:
//! pack/unpack is a straightforward little-endian i64.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use toyrt::{Access, AccessMode, Data, Priority, RuntimeConfig, Task};

struct Counter(i64);

impl Data for Counter {
    fn pack(&self) -> Vec<u8> {
        self.0.to_le_bytes().to_vec()
    }
    fn unpack(&mut self, buf: &[u8]) {
        self.0 = i64::from_le_bytes(buf.try_into().unwrap());
    }
    fn deallocate(&mut self) {
        self.0 = 0;
    }
    fn size(&self) -> usize {
        8
    }
}

struct RecordOrder {
    log: Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
}

impl Task for RecordOrder {
    fn call(&mut self) {
        self.log.lock().unwrap().push(self.label);
    }
}

struct Increment {
    counter: Arc<AtomicI64>,
    amount: i64,
}

impl Task for Increment {
    fn call(&mut self) {
        self.counter.fetch_add(self.amount, Ordering::SeqCst);
    }
}

/// A RAW chain (write -> read) executes in submission-implied dependency
/// order regardless of worker count.
#[test]
fn raw_chain_respects_order() {
    let rt = toyrt::Runtime::new(RuntimeConfig::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let data = rt.register_data(Counter(0));

    rt.submit(
        RecordOrder { log: log.clone(), label: "writer" },
        vec![Access { data, mode: AccessMode::Write }],
        Priority::Normal,
    );
    rt.submit(
        RecordOrder { log: log.clone(), label: "reader" },
        vec![Access { data, mode: AccessMode::Read }],
        Priority::Normal,
    );

    let stats = rt.run(4);
    assert_eq!(stats.tasks_executed, 2);
    assert_eq!(*log.lock().unwrap(), vec!["writer", "reader"]);
}

/// Out-of-core: with a memory budget tiny enough to force eviction, every
/// task still completes and data read back after a swap is correct.
#[test]
fn tight_memory_budget_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = RuntimeConfig::new().max_memory_size(16).spill_dir(dir.path());
    let rt = toyrt::Runtime::new(config);

    let mut ids = Vec::new();
    for i in 0..8 {
        ids.push(rt.register_data(Counter(i)));
    }

    let total = Arc::new(AtomicI64::new(0));
    for &id in &ids {
        rt.submit(
            Increment { counter: total.clone(), amount: 1 },
            vec![Access { data: id, mode: AccessMode::Read }],
            Priority::Normal,
        );
    }

    let stats = rt.run(2);
    assert_eq!(stats.tasks_executed, 8);
    assert_eq!(total.load(Ordering::SeqCst), 8);
}

/// With the priority ready queue, a task submitted at `High` that becomes
/// ready alongside a `Low` one runs first.
#[test]
fn priority_queue_orders_high_before_low() {
    let rt = toyrt::Runtime::with_queue_kind(RuntimeConfig::new(), toyrt::QueueKind::Priority);
    let log = Arc::new(Mutex::new(Vec::new()));

    // Submit low first so, absent priority, FIFO order would run it first.
    rt.submit(RecordOrder { log: log.clone(), label: "low" }, vec![], Priority::Low);
    rt.submit(RecordOrder { log: log.clone(), label: "high" }, vec![], Priority::High);

    rt.run(1);
    assert_eq!(*log.lock().unwrap(), vec!["high", "low"]);
}

/// Graphviz and timeline dumps succeed and produce non-empty output once a
/// graph has executed.
#[test]
fn dumps_graphviz_and_timeline() {
    let rt = toyrt::Runtime::new(RuntimeConfig::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let data = rt.register_data(Counter(0));

    rt.submit(
        RecordOrder { log: log.clone(), label: "a" },
        vec![Access { data, mode: AccessMode::Write }],
        Priority::Normal,
    );
    rt.submit(
        RecordOrder { log: log.clone(), label: "b" },
        vec![Access { data, mode: AccessMode::Read }],
        Priority::Normal,
    );
    rt.run(2);

    let dir = tempfile::tempdir().unwrap();
    let graphviz_path = dir.path().join("graph.dot");
    let timeline_path = dir.path().join("timeline.json");
    rt.graphviz_dump(&graphviz_path).unwrap();
    rt.dump_timeline(&timeline_path).unwrap();

    let graphviz = std::fs::read_to_string(&graphviz_path).unwrap();
    assert!(graphviz.starts_with("digraph toyrt {"));
    assert!(graphviz.contains("t0 -> t1"));

    let timeline = std::fs::read_to_string(&timeline_path).unwrap();
    assert!(timeline.contains("task_name"));
}

/// A progress callback fires and eventually reports full completion.
#[test]
fn progress_callback_reaches_full_completion() {
    let rt = toyrt::Runtime::new(RuntimeConfig::new());
    let last = Arc::new(Mutex::new(0.0f64));
    let last_clone = last.clone();
    rt.set_progress_callback(25, move |frac| {
        *last_clone.lock().unwrap() = frac;
    });

    for _ in 0..10 {
        rt.submit(RecordOrder { log: Arc::new(Mutex::new(Vec::new())), label: "x" }, vec![], Priority::Normal);
    }
    rt.run(2);

    assert!((*last.lock().unwrap() - 1.0).abs() < 1e-9);
}

/// `unregister_data` after every referencing task has completed succeeds;
/// calling it while a task still holds a reference panics.
#[test]
fn unregister_after_completion_succeeds() {
    let rt = toyrt::Runtime::new(RuntimeConfig::new());
    let data = rt.register_data(Counter(42));
    rt.submit(
        RecordOrder { log: Arc::new(Mutex::new(Vec::new())), label: "only" },
        vec![Access { data, mode: AccessMode::Read }],
        Priority::Normal,
    );
    rt.run(1);
    rt.unregister_data(data);
}
