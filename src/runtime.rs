//! The central orchestrator: a single explicit `Runtime` handle rather than
//! a scheduler singleton, an I/O thread singleton, and an MPI communication
//! singleton.
//!
//! Everything lives here as one `Arc<RuntimeInner>`, constructed once per
//! `Runtime::new` and threaded explicitly into every worker/I/O/comm thread
//! it spawns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::data::{Data, DataTable};
use crate::distributed::transport::ClusterTransport;
use crate::distributed::Cluster;
use crate::graph::DependencyGraph;
use crate::ids::{DataId, TaskId};
use crate::io::{FileIoBackend, IoBackend, IoQueue, IoRequest, IoThread};
use crate::lru::Lru;
use crate::queue::{FifoQueue, PriorityQueue, ReadyQueue};
use crate::service_tasks;
use crate::task::{Access, AccessMode, Priority, TaskKind, TaskRecord};
use crate::timeline::{TimedDataRecorder, Timeline};
use crate::worker::{WorkItem, WorkerHandle};

/// Strategy selector for the ready queue; passed to `Runtime::new` alongside
/// `RuntimeConfig` so callers that need priority scheduling opt in
/// explicitly: both are legitimate, not one a strict upgrade of the other —
/// FIFO has lower per-push overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Fifo,
    Priority,
}

/// A user-visible callback invoked roughly every
/// `progress_frequency_percent` of total submitted tasks completed.
pub type ProgressCallback = Box<dyn Fn(f64) + Send>;

/// Statistics returned by `Runtime::run`: the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub tasks_executed: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

struct ProgressState {
    completed: u64,
    total: u64,
    next_wakeup: u64,
    callback: Option<ProgressCallback>,
    frequency_percent: u32,
}

impl ProgressState {
    fn new(frequency_percent: u32) -> Self {
        ProgressState {
            completed: 0,
            total: 0,
            next_wakeup: 0,
            callback: None,
            frequency_percent,
        }
    }

    fn recompute_next_wakeup(&mut self) {
        let step = (self.total * self.frequency_percent as u64 / 100).max(1);
        self.next_wakeup = self.completed + step;
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    data: DataTable,
    tasks: Mutex<Vec<Arc<TaskRecord>>>,
    graph: Mutex<DependencyGraph>,
    lru: Mutex<Lru>,
    resident_bytes: AtomicUsize,
    ready: Arc<ReadyQueue<WorkItem>>,
    io_queue: Arc<IoQueue>,
    io_backend: Arc<dyn IoBackend>,
    timeline: Timeline,
    ready_depth_recorder: TimedDataRecorder<usize>,
    resident_bytes_recorder: TimedDataRecorder<usize>,
    cluster: Mutex<Option<Cluster>>,
    progress: Mutex<ProgressState>,
    progress_cond: Condvar,
    /// Serializes in-degree decrement, successor enqueue, and LRU
    /// re-insertion. An instance field, not a global: no hidden singleton
    /// state.
    post_exec: Mutex<()>,
}

/// The task-parallel runtime. Cheap to clone (an `Arc` underneath); clones
/// all refer to the same scheduler state, with the sharing explicit in the
/// type rather than hidden behind a singleton.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_queue_kind(config, QueueKind::Fifo)
    }

    pub fn with_queue_kind(config: RuntimeConfig, queue_kind: QueueKind) -> Self {
        let spill_dir = config
            .spill_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(format!("toyrt_ooc_{}", std::process::id())));
        let io_backend: Arc<dyn IoBackend> =
            Arc::new(FileIoBackend::new(&spill_dir).expect("failed to initialize spill directory"));

        let ready = Arc::new(match queue_kind {
            QueueKind::Fifo => ReadyQueue::Fifo(FifoQueue::new()),
            QueueKind::Priority => ReadyQueue::Priority(PriorityQueue::new()),
        });

        let progress_frequency = config.progress_frequency_percent;
        let inner = RuntimeInner {
            config,
            data: DataTable::new(),
            tasks: Mutex::new(Vec::new()),
            graph: Mutex::new(DependencyGraph::new()),
            lru: Mutex::new(Lru::new()),
            resident_bytes: AtomicUsize::new(0),
            ready,
            io_queue: Arc::new(IoQueue::new()),
            io_backend,
            timeline: Timeline::new(),
            ready_depth_recorder: TimedDataRecorder::new(),
            resident_bytes_recorder: TimedDataRecorder::new(),
            cluster: Mutex::new(None),
            progress: Mutex::new(ProgressState::new(progress_frequency)),
            progress_cond: Condvar::new(),
            post_exec: Mutex::new(()),
        };
        Runtime { inner: Arc::new(inner) }
    }

    pub fn set_cluster(&self, transport: Arc<dyn ClusterTransport>) {
        *self.inner.cluster.lock().unwrap() = Some(Cluster::new(transport));
    }

    pub fn rank(&self) -> i32 {
        self.inner
            .cluster
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.rank())
            .unwrap_or(0)
    }

    pub fn world_size(&self) -> usize {
        self.inner
            .cluster
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.world_size())
            .unwrap_or(1)
    }

    pub fn set_progress_callback(&self, frequency_percent: u32, callback: impl Fn(f64) + Send + 'static) {
        let mut progress = self.inner.progress.lock().unwrap();
        progress.frequency_percent = frequency_percent;
        progress.callback = Some(Box::new(callback));
        progress.recompute_next_wakeup();
    }

    /// Register a `Data` before it is ever referenced by a task access list.
    /// Every `DataId` a task's access list names must already be registered;
    /// `submit`/`insert_task` only look it up, they never register on first
    /// use.
    pub fn register_data(&self, data: impl Data + 'static) -> DataId {
        let size = data.size();
        let (id, slot) = self.inner.data.register(Box::new(data), true);
        slot.old_size.store(size, Ordering::Release);
        self.inner.resident_bytes.fetch_add(size, Ordering::AcqRel);
        self.inner.lru.lock().unwrap().touch(id);
        id
    }

    /// Mark a registered `Data` as pinned (`swappable = false`) or eligible
    /// for eviction again. Defaults to swappable at `register_data` time.
    pub fn set_swappable(&self, id: DataId, swappable: bool) {
        self.inner.data.get(id).set_swappable(swappable);
    }

    pub fn unregister_data(&self, id: DataId) {
        let slot = self.inner.data.get(id);
        let ref_count = slot.ref_count.load(Ordering::Acquire);
        assert_eq!(ref_count, 0, "unregister_data called while tasks still reference {id:?}");
        self.inner.lru.lock().unwrap().remove(id);
        self.inner.data.unregister(id);
    }

    pub fn get_data_on_node(&self, id: DataId, node: i32) -> bool {
        self.inner
            .cluster
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.replicas.is_valid_on(id, node))
            .unwrap_or(node == 0)
    }

    /// Submit a user task with its declared access list, executing locally
    /// (node 0 in single-process mode).
    pub fn submit(&self, task: impl crate::task::Task + 'static, accesses: Vec<Access>, priority: Priority) -> TaskId {
        self.submit_distributed(task, accesses, self.rank(), priority)
    }

    pub fn submit_distributed(
        &self,
        task: impl crate::task::Task + 'static,
        accesses: Vec<Access>,
        executing_node: i32,
        priority: Priority,
    ) -> TaskId {
        self.ensure_data_local(&accesses, executing_node);
        self.insert_task(TaskKind::User(Box::new(task)), accesses, executing_node, priority)
    }

    /// For every access whose data isn't yet known-valid on `node`, insert a
    /// `DistRecv` task that pulls it from its current best source. The recv
    /// is submitted as a `Write` access on the same `DataId`, so the normal
    /// dependency-derivation machinery makes it a predecessor of whatever
    /// the caller submits next against that data — no separate edge-tracking
    /// path is needed for distributed transfers: locate the owning rank,
    /// issue the transfer, and let the existing dependency graph handle the
    /// wait.
    fn ensure_data_local(&self, accesses: &[Access], node: i32) {
        if self.inner.cluster.lock().unwrap().is_none() {
            return;
        }
        for access in accesses {
            let already_valid = {
                let cluster = self.inner.cluster.lock().unwrap();
                cluster.as_ref().map(|c| c.replicas.is_valid_on(access.data, node)).unwrap_or(true)
            };
            if already_valid {
                continue;
            }
            let source = {
                let cluster = self.inner.cluster.lock().unwrap();
                cluster.as_ref().and_then(|c| c.replicas.best_source(access.data, node))
            };
            let Some(source) = source else { continue };
            if source == node {
                continue;
            }
            let tag = access.data.index() as u32 + 1;
            let recv_accesses = vec![Access { data: access.data, mode: AccessMode::Write }];
            self.insert_task(
                TaskKind::DistRecv { data: access.data, peer: source, tag },
                recv_accesses,
                node,
                Priority::High,
            );
        }
    }

    /// Explicitly post the matching send for a `DistRecv` a peer has
    /// submitted (or will submit) against `id`. Two-sided like MPI: nothing
    /// here discovers that a receive is wanted, so distributed callers post
    /// sends and receives in pairs, the same way a posted `MPI_Irecv` on one
    /// end needs a matching `MPI_Issend` on the other.
    pub fn send_data_to(&self, id: DataId, peer: i32, tag: u32) -> TaskId {
        let accesses = vec![Access { data: id, mode: AccessMode::Read }];
        self.insert_task(TaskKind::DistSend { data: id, peer, tag }, accesses, self.rank(), Priority::High)
    }

    /// Explicitly post the matching receive for a `send_data_to` a peer has
    /// issued (or will issue) against `id`. The counterpart to `send_data_to`
    /// for callers that want to name a transfer directly instead of relying
    /// on `submit_distributed`'s automatic replica-tracking path.
    pub fn recv_data_from(&self, id: DataId, peer: i32, tag: u32) -> TaskId {
        let accesses = vec![Access { data: id, mode: AccessMode::Write }];
        self.insert_task(TaskKind::DistRecv { data: id, peer, tag }, accesses, self.rank(), Priority::High)
    }

    pub fn flush_to_disk(&self, id: DataId) -> TaskId {
        let accesses = vec![Access { data: id, mode: AccessMode::Write }];
        self.insert_task(TaskKind::Flush(id), accesses, self.rank(), Priority::Normal)
    }

    fn insert_task(&self, kind: TaskKind, accesses: Vec<Access>, executing_node: i32, priority: Priority) -> TaskId {
        let mut tasks = self.inner.tasks.lock().unwrap();
        let id = TaskId(tasks.len() as u32);

        for access in &accesses {
            // Lazy registration path is not exercised here: callers are
            // expected to have registered every `DataId` they reference
            // already (via `register_data` or a prior task's access list).
            let _ = self.inner.data.get(access.data);
        }

        let mut preds = self.inner.graph.lock().unwrap().insert_task(id, &accesses);
        preds.sort_by_key(|p| p.index());

        for access in &accesses {
            self.inner.data.get(access.data).ref_count.fetch_add(1, Ordering::AcqRel);
        }

        let record = Arc::new(TaskRecord::new(kind, accesses, priority, executing_node));
        tasks.push(record.clone());

        self.inner.progress.lock().unwrap().total += 1;

        record.in_degree.store(preds.len() as u32, Ordering::Release);
        if preds.is_empty() {
            drop(tasks);
            self.enqueue_ready(id, &record);
        } else {
            for pred in preds {
                tasks[pred.index()].successors.lock().unwrap().push(id);
            }
        }

        id
    }

    /// A task whose in-degree just reached zero either runs inline
    /// (callback kinds: `Sync`/`Flush`/`Deallocate`) or goes to the ready
    /// queue for a worker to pick up. Must never be called while holding
    /// `post_exec`: inline execution re-enters `post_execution` for its own
    /// successors, which would deadlock on a non-reentrant mutex.
    fn enqueue_ready(&self, id: TaskId, record: &Arc<TaskRecord>) {
        let kind_is_callback = record.kind.lock().unwrap().is_callback();
        if kind_is_callback {
            self.run_one(usize::MAX, id);
        } else {
            self.inner.ready.push(WorkItem::Run(id), record.priority);
            self.inner.ready_depth_recorder.record(self.inner.ready.len());
        }
    }

    /// Run the full graph to completion with `n_workers` worker threads.
    pub fn run(&self, n_workers: usize) -> RunStats {
        assert!(n_workers > 0, "worker count must be positive");

        let runtime = self.clone();
        let mut io_thread = {
            let runtime = runtime.clone();
            IoThread::spawn(self.inner.io_queue.clone(), self.inner.io_backend.clone(), move |id, payload| {
                runtime.on_io_complete(id, payload)
            })
        };

        // Spin up the communication thread whenever a cluster is attached;
        // `comm.run` drains whatever `dispatch_send`/`dispatch_recv` queue
        // and finishes the originating task's post-execution bookkeeping
        // once each transfer's wire round-trip actually completes.
        let comm = {
            let cluster = self.inner.cluster.lock().unwrap();
            cluster.as_ref().map(|c| (c.comm.clone(), c.transport.clone()))
        };
        let comm_thread = comm.as_ref().map(|(comm, transport)| {
            let comm = comm.clone();
            let transport = transport.clone();
            let runtime = runtime.clone();
            std::thread::Builder::new()
                .name("toyrt-comm".into())
                .spawn(move || {
                    comm.run(transport, move |task_id, data, payload| {
                        runtime.complete_dist_task(task_id, data, payload);
                    });
                })
                .expect("failed to spawn communication thread")
        });

        // The frequency-percent callback cadence is fixed against the total
        // submitted task count as of now, not as of whenever the first task
        // happened to be submitted.
        self.inner.progress.lock().unwrap().recompute_next_wakeup();

        let park_on_idle = self.inner.config.requeue_not_ready;
        let mut workers: Vec<WorkerHandle> = (0..n_workers)
            .map(|worker_id| {
                let runtime = runtime.clone();
                WorkerHandle::spawn(worker_id, self.inner.ready.clone(), park_on_idle, move |task_id| {
                    runtime.run_one(worker_id, task_id);
                })
            })
            .collect();

        // Drain: block until every submitted task has completed, then push
        // one shutdown sentinel per worker.
        {
            let mut progress = self.inner.progress.lock().unwrap();
            while progress.completed < progress.total {
                progress = self.inner.progress_cond.wait(progress).unwrap();
            }
        }

        for _ in 0..n_workers {
            self.inner.ready.push(WorkItem::Shutdown, Priority::High);
        }
        for w in &mut workers {
            w.join();
        }

        if let Some((comm, _)) = &comm {
            comm.stop();
        }
        if let Some(handle) = comm_thread {
            handle.join().expect("communication thread panicked");
        }

        self.inner.io_queue.stop();
        io_thread.join();

        RunStats {
            tasks_executed: self.inner.progress.lock().unwrap().completed,
            bytes_written: self.inner.io_queue.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.inner.io_queue.bytes_read.load(Ordering::Relaxed),
        }
    }

    fn run_one(&self, worker_id: usize, task_id: TaskId) {
        let record = self.inner.tasks.lock().unwrap()[task_id.index()].clone();

        for access in &record.accesses {
            self.ensure_resident(access.data);
        }

        let start_ms = self.inner.timeline.now_ms();

        let mut deferred = false;
        let (name, extra) = {
            let mut kind = record.kind.lock().unwrap();
            let name = kind.name();
            let extra = match &mut *kind {
                TaskKind::User(task) => {
                    task.call();
                    task.extra_data()
                }
                TaskKind::Sync => {
                    service_tasks::run_sync();
                    serde_json::json!({})
                }
                TaskKind::Flush(id) => {
                    let slot = self.inner.data.get(*id);
                    service_tasks::run_flush(*id, &slot, &self.inner.io_queue, &self.inner.lru);
                    serde_json::json!({})
                }
                TaskKind::Deallocate(id) => {
                    let slot = self.inner.data.get(*id);
                    service_tasks::run_deallocate(&slot);
                    serde_json::json!({})
                }
                TaskKind::DistSend { data, peer, tag } => {
                    deferred = self.dispatch_send(*data, *peer, *tag, task_id);
                    serde_json::json!({})
                }
                TaskKind::DistRecv { data, peer, tag } => {
                    deferred = self.dispatch_recv(*data, *peer, *tag, task_id);
                    serde_json::json!({})
                }
            };
            (name, extra)
        };

        let end_ms = self.inner.timeline.now_ms();
        self.inner.timeline.record_span(worker_id, name, start_ms, end_ms, extra);
        trace!(worker = worker_id, task = task_id.index(), "task completed");

        if deferred {
            // The queued transfer hasn't actually happened yet: the
            // communication thread finishes this task's accesses and
            // post-execution once it does (see `complete_dist_task`), so a
            // dependent task can't observe data that hasn't arrived.
            return;
        }

        for access in &record.accesses {
            self.finish_access(access);
        }

        self.post_execution(task_id, &record);
        self.maybe_evict();
    }

    /// Invoked by the communication thread once a deferred `DistSend`'s or
    /// `DistRecv`'s wire transfer actually completes. Applies the received
    /// payload (if any), then runs the same access-release/post-execution
    /// path `run_one` runs inline for every other task kind.
    fn complete_dist_task(&self, task_id: TaskId, data: DataId, payload: Option<Vec<u8>>) {
        let record = self.inner.tasks.lock().unwrap()[task_id.index()].clone();

        if let Some(buf) = payload {
            let slot = self.inner.data.get(data);
            slot.inner.lock().unwrap().unpack(&buf);
        }

        for access in &record.accesses {
            self.finish_access(access);
        }

        self.post_execution(task_id, &record);
        self.maybe_evict();
    }

    /// Release one task's hold on `access`'s data: on a write, mark it dirty
    /// and fold any size change into the resident-byte total, then drop the
    /// reference and bump the data's recency in the LRU index.
    fn finish_access(&self, access: &Access) {
        let slot = self.inner.data.get(access.data);
        if access.mode == AccessMode::Write {
            debug_assert!(
                slot.ref_count.load(Ordering::Acquire) > 0,
                "write task finishing without a live reference to {:?}",
                access.data
            );
            debug_assert!(!slot.is_swapped(), "write task observed {:?} still swapped out", access.data);

            slot.dirty.store(true, Ordering::Release);
            let new_size = slot.inner.lock().unwrap().size();
            let old_size = slot.old_size();
            if new_size > old_size {
                self.inner.resident_bytes.fetch_add(new_size - old_size, Ordering::AcqRel);
            } else if new_size < old_size {
                self.inner.resident_bytes.fetch_sub(old_size - new_size, Ordering::AcqRel);
            }
            slot.old_size.store(new_size, Ordering::Release);
        }
        slot.ref_count.fetch_sub(1, Ordering::AcqRel);
        self.inner.lru.lock().unwrap().touch(access.data);
    }

    /// Post-execution hook: decrement successor in-degrees, enqueue or
    /// inline-execute whichever reach zero, then update progress and notify.
    /// Serialized by a single mutex — lock ordering must stay "successors
    /// before LRU/eviction" or a newly-ready task could race its own data's
    /// eviction.
    fn post_execution(&self, task_id: TaskId, record: &Arc<TaskRecord>) {
        let now_ready = {
            let _guard = self.inner.post_exec.lock().unwrap();
            let successors = record.successors.lock().unwrap().clone();
            let tasks = self.inner.tasks.lock().unwrap();
            let mut now_ready = Vec::new();
            for succ_id in successors {
                let succ = tasks[succ_id.index()].clone();
                let prev = succ.in_degree.fetch_sub(1, Ordering::AcqRel);
                if prev == 1 {
                    now_ready.push((succ_id, succ));
                }
            }
            now_ready
            // `_guard` (and the `tasks` lock) drop here, before any inline
            // execution below can re-enter this function.
        };
        for (succ_id, succ) in now_ready {
            self.enqueue_ready(succ_id, &succ);
        }
        self.post_execution_tail(task_id);
    }

    fn post_execution_tail(&self, _task_id: TaskId) {
        let mut progress = self.inner.progress.lock().unwrap();
        progress.completed += 1;
        if progress.completed >= progress.next_wakeup || progress.completed >= progress.total {
            let frac = progress.completed as f64 / progress.total.max(1) as f64;
            if let Some(cb) = &progress.callback {
                cb(frac);
            }
            progress.recompute_next_wakeup();
        }
        self.inner.progress_cond.notify_all();
    }

    fn on_io_complete(&self, id: DataId, payload: Option<Vec<u8>>) {
        let slot = self.inner.data.get(id);
        match payload {
            Some(buf) => {
                let mut guard = slot.inner.lock().unwrap();
                guard.unpack(&buf);
                let size = guard.size();
                drop(guard);
                self.inner.resident_bytes.fetch_add(size, Ordering::AcqRel);
                slot.swapped.store(false, Ordering::Release);
                slot.dirty.store(false, Ordering::Release);
                slot.prefetch_in_flight.store(false, Ordering::Release);
            }
            None => {
                slot.swapped.store(true, Ordering::Release);
            }
        }
        debug!(data = id.index(), "io complete");
    }

    /// Worker-side wait-for-swap-in: busy-wait on `swapped` after issuing (at
    /// most one) prefetch read. Data must be resident before `call()` runs.
    /// `prefetch_in_flight` gates against two workers double-issuing a read
    /// for the same data when it fans out to multiple ready successors.
    fn ensure_resident(&self, id: DataId) {
        let slot = self.inner.data.get(id);
        if !slot.is_swapped() {
            return;
        }
        if !slot.prefetch_in_flight.swap(true, Ordering::AcqRel) {
            self.inner.io_queue.push(IoRequest::Read { id });
        }
        while slot.is_swapped() {
            std::hint::spin_loop();
        }
    }

    /// Called whenever resident bytes exceed the configured budget. Evicts
    /// least-recently-used swappable, zero-refcount data until back under
    /// budget.
    fn maybe_evict(&self) {
        let mut skipped_in_a_row = 0usize;
        while self.inner.resident_bytes.load(Ordering::Acquire) > self.inner.config.max_memory_size {
            let mut lru = self.inner.lru.lock().unwrap();
            let pinned_count = lru.len();
            let Some(id) = lru.pop_oldest() else { break };
            drop(lru);

            let slot = self.inner.data.get(id);
            if slot.ref_count.load(Ordering::Acquire) != 0 || !slot.swappable() {
                // Not evictable right now (still referenced, or the user
                // pinned it): put it back as most-recently-touched and keep
                // scanning. If every resident entry is pinned this loop
                // still terminates once we've seen them all once.
                self.inner.lru.lock().unwrap().touch(id);
                skipped_in_a_row += 1;
                if skipped_in_a_row >= pinned_count {
                    break;
                }
                continue;
            }
            skipped_in_a_row = 0;
            let size = slot.inner.lock().unwrap().size();
            if slot.dirty.load(Ordering::Acquire) {
                let buf = slot.inner.lock().unwrap().pack();
                self.inner.io_queue.push(IoRequest::Write { id, buf });
            }
            slot.inner.lock().unwrap().deallocate();
            slot.swapped.store(true, Ordering::Release);
            self.inner.resident_bytes.fetch_sub(size, Ordering::AcqRel);
            self.inner.resident_bytes_recorder.record(self.inner.resident_bytes.load(Ordering::Relaxed));
        }
    }

    /// Queue the wire send; returns `true` if it was actually queued (a
    /// cluster is attached), in which case the caller must defer this
    /// task's post-execution until `complete_dist_task` fires.
    fn dispatch_send(&self, id: DataId, peer: i32, tag: u32, task_id: TaskId) -> bool {
        let cluster = self.inner.cluster.lock().unwrap();
        let Some(cluster) = cluster.as_ref() else {
            return false;
        };
        let slot = self.inner.data.get(id);
        let buf = slot.inner.lock().unwrap().pack();
        cluster
            .comm
            .submit_send(crate::distributed::comm::PendingSend { task: task_id, data: id, peer, tag, buf });
        cluster.replicas.invalidate_others(id, cluster.rank(), cluster.world_size());
        true
    }

    /// Queue the wire receive; see `dispatch_send` for the return-value
    /// contract.
    fn dispatch_recv(&self, id: DataId, peer: i32, tag: u32, task_id: TaskId) -> bool {
        let cluster = self.inner.cluster.lock().unwrap();
        let Some(cluster) = cluster.as_ref() else {
            return false;
        };
        let slot = self.inner.data.get(id);
        let len = slot.old_size();
        cluster
            .comm
            .submit_recv(crate::distributed::comm::PendingRecv { task: task_id, data: id, peer, tag, len });
        cluster.replicas.mark_valid(id, cluster.rank(), cluster.world_size());
        true
    }

    /// Graphviz dump: one node per task, colored by task kind name, cycling
    /// through a 14-color palette.
    pub fn graphviz_dump(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        const PALETTE: [&str; 14] = [
            "red", "blue", "green", "orange", "purple", "cyan", "magenta", "yellow", "brown", "pink", "gray", "olive",
            "teal", "navy",
        ];
        let tasks = self.inner.tasks.lock().unwrap();
        let mut color_of: HashMap<&'static str, &'static str> = HashMap::new();
        let mut next_color = 0usize;

        let mut out = String::new();
        out.push_str("digraph toyrt {\n");
        for (idx, record) in tasks.iter().enumerate() {
            let name = record.kind.lock().unwrap().name();
            let color = *color_of.entry(name).or_insert_with(|| {
                let c = PALETTE[next_color % PALETTE.len()];
                next_color += 1;
                c
            });
            out.push_str(&format!("  t{idx} [label=\"{name}\" color={color}];\n"));
            for succ in record.successors.lock().unwrap().iter() {
                out.push_str(&format!("  t{idx} -> t{};\n", succ.index()));
            }
        }
        out.push_str("}\n");
        std::fs::write(path, out)
    }

    pub fn dump_timeline(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        self.inner.timeline.dump(path)
    }

    /// Current resident byte total (`dataSize` in spec terms), exposed for
    /// observability and for tests asserting the memory-budget invariants.
    pub fn resident_bytes(&self) -> usize {
        self.inner.resident_bytes.load(Ordering::Acquire)
    }

    /// Whether a registered `Data`'s in-memory representation has been
    /// evicted to disk. Exposed for tests asserting swap-eligibility
    /// invariants.
    pub fn is_swapped(&self, id: DataId) -> bool {
        self.inner.data.get(id).is_swapped()
    }

    pub fn dump_recorders(&self, dir: impl AsRef<Path>) -> std::io::Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.inner.ready_depth_recorder.dump(dir.join("tasks.txt"))?;
        self.inner.resident_bytes_recorder.dump(dir.join("data_size.txt"))?;
        Ok(())
    }
}
