//! Communication thread: two-phase transfer with a per-`(peer, tag)`
//! serialization gate.
//!
//! Only one in-flight send per `(peer, tag)` pair is allowed at a time; a
//! second send to the same pair queues behind the first rather than racing
//! it, because MPI does not guarantee message ordering between overlapping
//! non-blocking sends to the same destination/tag. Each transfer is two
//! messages — a `u64` size, then the payload — so the receiver can allocate
//! before reading.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use super::transport::ClusterTransport;
use crate::ids::{DataId, TaskId};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct Gate {
    peer: i32,
    tag: u32,
}

pub struct PendingSend {
    pub task: TaskId,
    pub data: DataId,
    pub peer: i32,
    pub tag: u32,
    pub buf: Vec<u8>,
}

pub struct PendingRecv {
    pub task: TaskId,
    pub data: DataId,
    pub peer: i32,
    pub tag: u32,
    pub len: usize,
}

enum PendingOp {
    Send(PendingSend),
    Recv(PendingRecv),
}

/// Queues transfers behind a per-`(peer, tag)` gate and drains them on a
/// dedicated thread once their transport request completes.
pub struct CommThread {
    queued: Mutex<VecDeque<PendingOp>>,
    in_flight: Mutex<HashMap<Gate, ()>>,
    cond: Condvar,
    stopped: Mutex<bool>,
    pub sends_completed: AtomicU64,
    pub recvs_completed: AtomicU64,
}

impl Default for CommThread {
    fn default() -> Self {
        CommThread {
            queued: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            stopped: Mutex::new(false),
            sends_completed: AtomicU64::new(0),
            recvs_completed: AtomicU64::new(0),
        }
    }
}

impl CommThread {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submit_send(&self, send: PendingSend) {
        self.queued.lock().unwrap().push_back(PendingOp::Send(send));
        self.cond.notify_one();
    }

    pub fn submit_recv(&self, recv: PendingRecv) {
        self.queued.lock().unwrap().push_back(PendingOp::Recv(recv));
        self.cond.notify_one();
    }

    pub fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.cond.notify_all();
    }

    /// Run the service loop on the calling thread. Intended to be invoked
    /// from a dedicated `std::thread`; split out so tests can drive it
    /// synchronously one step at a time via `step`. `on_complete` is the
    /// deferred completion callback — for a `DistSend`/`DistRecv` task the
    /// scheduler does not run its post-execution bookkeeping until this
    /// fires, since enqueuing the transfer is not the same as finishing it.
    pub fn run(
        self: &Arc<Self>,
        transport: Arc<dyn ClusterTransport>,
        mut on_complete: impl FnMut(TaskId, DataId, Option<Vec<u8>>),
    ) {
        loop {
            match self.step(&transport) {
                Some((task, id, payload)) => on_complete(task, id, payload),
                None => {
                    if *self.stopped.lock().unwrap() && self.queued.lock().unwrap().is_empty() {
                        return;
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Try to start the next queued operation whose `(peer, tag)` gate is
    /// free, blocking its transport round-trip, release the gate, and
    /// report completion. Returns `None` if nothing could run this tick
    /// (everything gated or queue empty) — callers should spin or sleep.
    fn step(&self, transport: &Arc<dyn ClusterTransport>) -> Option<(TaskId, DataId, Option<Vec<u8>>)> {
        let op = {
            let mut queued = self.queued.lock().unwrap();
            let mut in_flight = self.in_flight.lock().unwrap();
            let idx = queued.iter().position(|op| {
                let gate = gate_of(op);
                !in_flight.contains_key(&gate)
            })?;
            let op = queued.remove(idx).unwrap();
            in_flight.insert(gate_of(&op), ());
            op
        };

        let gate = gate_of(&op);
        let (task, id, payload) = match op {
            PendingOp::Send(send) => {
                let mut req = transport
                    .isend(send.peer, send.tag, send.buf)
                    .expect("cluster send failed");
                while !req.test().expect("cluster send poll failed") {
                    std::hint::spin_loop();
                }
                self.sends_completed.fetch_add(1, Ordering::Relaxed);
                (send.task, send.data, None)
            }
            PendingOp::Recv(recv) => {
                let mut req = transport
                    .irecv(recv.peer, recv.tag, recv.len)
                    .expect("cluster recv failed");
                while !req.test().expect("cluster recv poll failed") {
                    std::hint::spin_loop();
                }
                self.recvs_completed.fetch_add(1, Ordering::Relaxed);
                (recv.task, recv.data, req.take_payload())
            }
        };

        self.in_flight.lock().unwrap().remove(&gate);
        self.cond.notify_all();
        Some((task, id, payload))
    }
}

fn gate_of(op: &PendingOp) -> Gate {
    match op {
        PendingOp::Send(s) => Gate { peer: s.peer, tag: s.tag },
        PendingOp::Recv(r) => Gate { peer: r.peer, tag: r.tag },
    }
}
