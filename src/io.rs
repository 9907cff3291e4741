//! Out-of-core spill backend and its service thread.
//!
//! `FileIoBackend` shards the spill directory: files are bucketed into
//! subdirectories of at most 1000 entries each (`NNNN/MMMMMM`) so a long run
//! never puts hundreds of thousands of files in one directory. The service
//! thread (`IoThread`) drains a request queue on a dedicated thread: one
//! `Mutex<VecDeque<Request>>` plus a `Condvar`, woken on push and on stop.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Result, RuntimeError};
use crate::ids::DataId;

const FILES_PER_SHARD: u64 = 1000;

/// Pluggable spill backend. A `FileIoBackend` is the only implementation
/// shipped; tests may swap in an in-memory fake.
pub trait IoBackend: Send + Sync {
    fn write(&self, id: DataId, buf: &[u8]) -> Result<()>;
    fn read(&self, id: DataId) -> Result<Vec<u8>>;
    fn remove(&self, id: DataId) -> Result<()>;
}

/// Sharded spill directory: `<root>/<shard>/<seq>` where `shard = id / 1000`
/// and `seq = id % 1000`. Not zero-padded, since nothing reads the names
/// back as sorted text.
pub struct FileIoBackend {
    root: PathBuf,
}

impl FileIoBackend {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| RuntimeError::SpillDirCreate {
            path: root.clone(),
            source,
        })?;
        Ok(FileIoBackend { root })
    }

    fn path_for(&self, id: DataId) -> PathBuf {
        let idx = id.index() as u64;
        let shard = idx / FILES_PER_SHARD;
        let seq = idx % FILES_PER_SHARD;
        self.root.join(shard.to_string()).join(seq.to_string())
    }

    fn ensure_shard_dir(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| RuntimeError::Backend {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

impl IoBackend for FileIoBackend {
    fn write(&self, id: DataId, buf: &[u8]) -> Result<()> {
        let path = self.path_for(id);
        self.ensure_shard_dir(&path)?;
        let mut file = std::fs::File::create(&path).map_err(|source| RuntimeError::Backend {
            path: path.clone(),
            source,
        })?;
        file.write_all(buf).map_err(|source| RuntimeError::Backend { path, source })
    }

    fn read(&self, id: DataId) -> Result<Vec<u8>> {
        let path = self.path_for(id);
        let mut file = std::fs::File::open(&path).map_err(|source| RuntimeError::Backend {
            path: path.clone(),
            source,
        })?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|source| RuntimeError::Backend {
            path: path.clone(),
            source,
        })?;
        Ok(buf)
    }

    fn remove(&self, id: DataId) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RuntimeError::Backend { path, source }),
        }
    }
}

/// A unit of spill work. `Write` carries the already-packed bytes: packing
/// happens on the submitting worker, before the request is ever enqueued.
/// `Read` fills in the data on completion via the `Runtime`'s post-read
/// hook, driven from `service_tasks`.
pub enum IoRequest {
    Write { id: DataId, buf: Vec<u8> },
    Read { id: DataId },
}

/// The I/O thread's request queue plus the resident/written/read byte
/// counters `tracing` spans and recorders read to report queue depth.
pub struct IoQueue {
    requests: Mutex<VecDeque<IoRequest>>,
    cond: Condvar,
    stopped: Mutex<bool>,
    pub bytes_written: AtomicU64,
    pub bytes_read: AtomicU64,
}

impl Default for IoQueue {
    fn default() -> Self {
        IoQueue {
            requests: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            stopped: Mutex::new(false),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
        }
    }
}

impl IoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, req: IoRequest) {
        self.requests.lock().unwrap().push_back(req);
        self.cond.notify_one();
    }

    /// Blocking pop used by the I/O service thread's main loop: unlike the
    /// ready queue, the I/O thread has no useful work to busy-wait on, so it
    /// parks on the condvar instead.
    fn pop_blocking(&self) -> Option<IoRequest> {
        let mut guard = self.requests.lock().unwrap();
        loop {
            if let Some(req) = guard.pop_front() {
                return Some(req);
            }
            if *self.stopped.lock().unwrap() {
                return None;
            }
            guard = self.cond.wait(guard).unwrap();
        }
    }

    pub fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

/// Drains an [`IoQueue`] against an [`IoBackend`] on a dedicated thread.
pub struct IoThread {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl IoThread {
    pub fn spawn(
        queue: Arc<IoQueue>,
        backend: Arc<dyn IoBackend>,
        mut on_complete: impl FnMut(DataId, Option<Vec<u8>>) + Send + 'static,
    ) -> Self {
        let handle = std::thread::Builder::new()
            .name("toyrt-io".into())
            .spawn(move || {
                while let Some(req) = queue.pop_blocking() {
                    match req {
                        IoRequest::Write { id, buf } => {
                            let len = buf.len() as u64;
                            backend.write(id, &buf).expect("spill write failed");
                            queue.bytes_written.fetch_add(len, Ordering::Relaxed);
                            on_complete(id, None);
                        }
                        IoRequest::Read { id } => {
                            let buf = backend.read(id).expect("spill read failed");
                            queue.bytes_read.fetch_add(buf.len() as u64, Ordering::Relaxed);
                            on_complete(id, Some(buf));
                        }
                    }
                }
            })
            .expect("failed to spawn I/O thread");
        IoThread { handle: Some(handle) }
    }

    pub fn join(&mut self) {
        if let Some(h) = self.handle.take() {
            h.join().expect("I/O thread panicked");
        }
    }
}
