//! Cluster transport abstraction.
//!
//! No crate in this workspace's dependency corpus wraps MPI directly, so
//! distributed mode is expressed against this trait instead — a
//! non-blocking send/recv/test trio that any real transport (an MPI
//! binding, TCP, a message queue) can implement. `TcpTransport` below is the
//! reference implementation.

use std::io;

/// A non-blocking, in-flight send or receive. `test()` is polled by the
/// communication thread's loop; a `false` return means "still pending."
pub trait ClusterRequest: Send {
    fn test(&mut self) -> io::Result<bool>;

    /// For a completed receive, take the payload (`None` for sends, and for
    /// a receive not yet completed). Consumes the result so it can only be
    /// taken once.
    fn take_payload(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// Non-blocking point-to-point transport between ranks.
pub trait ClusterTransport: Send + Sync {
    fn rank(&self) -> i32;
    fn size(&self) -> usize;

    fn isend(&self, peer: i32, tag: u32, buf: Vec<u8>) -> io::Result<Box<dyn ClusterRequest>>;
    fn irecv(&self, peer: i32, tag: u32, len: usize) -> io::Result<Box<dyn ClusterRequest>>;
}

#[cfg(feature = "distributed")]
pub mod tcp {
    //! `TcpTransport`: one `TcpStream` per peer, length-prefixed framing
    //! (`u64` size then payload).

    use super::*;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::Mutex;

    pub struct TcpRequest {
        done: bool,
        result: Option<Vec<u8>>,
    }

    impl ClusterRequest for TcpRequest {
        fn test(&mut self) -> io::Result<bool> {
            Ok(self.done)
        }

        fn take_payload(&mut self) -> Option<Vec<u8>> {
            self.result.take()
        }
    }

    /// Blocking-under-the-hood transport: each `isend`/`irecv` performs its
    /// I/O synchronously before returning an already-completed request. This
    /// keeps the reference implementation simple; a higher-throughput
    /// transport would hand work to its own service thread instead.
    pub struct TcpTransport {
        rank: i32,
        size: usize,
        peers: Mutex<HashMap<i32, TcpStream>>,
    }

    impl TcpTransport {
        pub fn new(rank: i32, size: usize, peers: HashMap<i32, TcpStream>) -> Self {
            TcpTransport {
                rank,
                size,
                peers: Mutex::new(peers),
            }
        }
    }

    impl ClusterTransport for TcpTransport {
        fn rank(&self) -> i32 {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: i32, _tag: u32, buf: Vec<u8>) -> io::Result<Box<dyn ClusterRequest>> {
            let mut peers = self.peers.lock().unwrap();
            let stream = peers
                .get_mut(&peer)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no connection to rank {peer}")))?;
            stream.write_all(&(buf.len() as u64).to_le_bytes())?;
            stream.write_all(&buf)?;
            Ok(Box::new(TcpRequest { done: true, result: None }))
        }

        fn irecv(&self, peer: i32, _tag: u32, len: usize) -> io::Result<Box<dyn ClusterRequest>> {
            let mut peers = self.peers.lock().unwrap();
            let stream = peers
                .get_mut(&peer)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no connection to rank {peer}")))?;
            let mut size_buf = [0u8; 8];
            stream.read_exact(&mut size_buf)?;
            let incoming_len = u64::from_le_bytes(size_buf) as usize;
            debug_assert_eq!(incoming_len, len, "declared recv length mismatch");
            let mut buf = vec![0u8; incoming_len];
            stream.read_exact(&mut buf)?;
            Ok(Box::new(TcpRequest { done: true, result: Some(buf) }))
        }
    }
}

/// In-process loopback transport pairing two `Runtime`s in the same process
/// for testing: no sockets, just a pair of channels.
pub struct LoopbackTransport {
    rank: i32,
    size: usize,
    tx: std::sync::mpsc::Sender<(u32, Vec<u8>)>,
    rx: std::sync::Mutex<std::sync::mpsc::Receiver<(u32, Vec<u8>)>>,
}

impl LoopbackTransport {
    /// Build a connected pair: messages sent on one end arrive on the other.
    pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
        let (tx_a, rx_b) = std::sync::mpsc::channel();
        let (tx_b, rx_a) = std::sync::mpsc::channel();
        (
            LoopbackTransport {
                rank: 0,
                size: 2,
                tx: tx_a,
                rx: std::sync::Mutex::new(rx_a),
            },
            LoopbackTransport {
                rank: 1,
                size: 2,
                tx: tx_b,
                rx: std::sync::Mutex::new(rx_b),
            },
        )
    }
}

struct LoopbackRequest {
    result: Option<Vec<u8>>,
}

impl ClusterRequest for LoopbackRequest {
    fn test(&mut self) -> io::Result<bool> {
        Ok(true)
    }

    fn take_payload(&mut self) -> Option<Vec<u8>> {
        self.result.take()
    }
}

impl ClusterTransport for LoopbackTransport {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, _peer: i32, tag: u32, buf: Vec<u8>) -> io::Result<Box<dyn ClusterRequest>> {
        self.tx
            .send((tag, buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer disconnected"))?;
        Ok(Box::new(LoopbackRequest { result: None }))
    }

    fn irecv(&self, _peer: i32, tag: u32, _len: usize) -> io::Result<Box<dyn ClusterRequest>> {
        let (recv_tag, buf) = self
            .rx
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer disconnected"))?;
        debug_assert_eq!(recv_tag, tag, "tag mismatch on loopback transport");
        Ok(Box::new(LoopbackRequest { result: Some(buf) }))
    }
}
