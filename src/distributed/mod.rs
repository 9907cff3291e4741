//! Distributed execution layer, entirely optional: a single-process
//! `Runtime` simply never constructs a [`Cluster`].

pub mod cache;
pub mod comm;
pub mod transport;

use std::sync::Arc;

use self::cache::ReplicaCache;
use self::comm::CommThread;
use self::transport::ClusterTransport;

/// Everything distributed mode adds to a `Runtime`: the transport, the
/// replica cache, and the communication thread's queue. Held as
/// `Option<Cluster>` on the runtime so single-rank mode pays nothing for it.
pub struct Cluster {
    pub transport: Arc<dyn ClusterTransport>,
    pub replicas: ReplicaCache,
    pub comm: Arc<CommThread>,
}

impl Cluster {
    pub fn new(transport: Arc<dyn ClusterTransport>) -> Self {
        Cluster {
            transport,
            replicas: ReplicaCache::new(),
            comm: CommThread::new(),
        }
    }

    pub fn rank(&self) -> i32 {
        self.transport.rank()
    }

    pub fn world_size(&self) -> usize {
        self.transport.size()
    }
}
