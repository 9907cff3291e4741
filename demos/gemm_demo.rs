//! Tiled matrix multiply driven through the runtime's scheduler.
//!
//! ```bash
//! cargo run --example gemm_demo
//! ```
//!
//! Builds an N x N grid of tiles, submits one task per (i, j, k) product with
//! read/write access lists describing the real data hazards, and lets the
//! scheduler discover the parallelism: every k-product feeding a given output
//! tile can run concurrently, and only the accumulation into that tile
//! serializes.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use toyrt::{Access, AccessMode, Data, Priority, Runtime, RuntimeConfig, Task};
use tracing::info;

const TILE: usize = 8;
const GRID: usize = 4;

#[derive(Clone)]
struct TileData(Vec<f64>);

impl Data for TileData {
    fn pack(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
    fn unpack(&mut self, buf: &[u8]) {
        self.0 = buf.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect();
    }
    fn deallocate(&mut self) {
        self.0.clear();
    }
    fn size(&self) -> usize {
        self.0.len() * 8
    }
}

struct MatMulTile {
    a: Arc<Mutex<Vec<f64>>>,
    b: Arc<Mutex<Vec<f64>>>,
    c: Arc<Mutex<Vec<f64>>>,
}

impl Task for MatMulTile {
    fn call(&mut self) {
        let a = self.a.lock().unwrap();
        let b = self.b.lock().unwrap();
        let mut c = self.c.lock().unwrap();
        for i in 0..TILE {
            for j in 0..TILE {
                let mut acc = 0.0;
                for k in 0..TILE {
                    acc += a[i * TILE + k] * b[k * TILE + j];
                }
                c[i * TILE + j] += acc;
            }
        }
    }
}

fn identity_tile() -> Vec<f64> {
    let mut t = vec![0.0; TILE * TILE];
    for i in 0..TILE {
        t[i * TILE + i] = 1.0;
    }
    t
}

fn main() {
    toyrt::init_tracing();

    let rt = Runtime::new(RuntimeConfig::new());

    let a_tiles: Vec<Arc<Mutex<Vec<f64>>>> = (0..GRID * GRID).map(|_| Arc::new(Mutex::new(identity_tile()))).collect();
    let b_tiles: Vec<Arc<Mutex<Vec<f64>>>> = (0..GRID * GRID)
        .map(|idx| Arc::new(Mutex::new(vec![(idx + 1) as f64; TILE * TILE])))
        .collect();
    let c_tiles: Vec<Arc<Mutex<Vec<f64>>>> = (0..GRID * GRID).map(|_| Arc::new(Mutex::new(vec![0.0; TILE * TILE]))).collect();

    let a_ids: Vec<_> = a_tiles.iter().map(|t| rt.register_data(TileData(t.lock().unwrap().clone()))).collect();
    let b_ids: Vec<_> = b_tiles.iter().map(|t| rt.register_data(TileData(t.lock().unwrap().clone()))).collect();
    let c_ids: Vec<_> = c_tiles.iter().map(|t| rt.register_data(TileData(t.lock().unwrap().clone()))).collect();

    let start = Instant::now();
    for i in 0..GRID {
        for j in 0..GRID {
            for k in 0..GRID {
                let a_idx = i * GRID + k;
                let b_idx = k * GRID + j;
                let c_idx = i * GRID + j;
                rt.submit(
                    MatMulTile {
                        a: a_tiles[a_idx].clone(),
                        b: b_tiles[b_idx].clone(),
                        c: c_tiles[c_idx].clone(),
                    },
                    vec![
                        Access { data: a_ids[a_idx], mode: AccessMode::Read },
                        Access { data: b_ids[b_idx], mode: AccessMode::Read },
                        Access { data: c_ids[c_idx], mode: AccessMode::Write },
                    ],
                    Priority::Normal,
                );
            }
        }
    }

    let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let stats = rt.run(workers);
    let elapsed = start.elapsed();

    info!(
        tasks_executed = stats.tasks_executed,
        workers, ?elapsed, "gemm grid complete"
    );

    for (idx, c) in c_tiles.iter().enumerate() {
        let expected = (idx + 1) as f64;
        let max_err = c.lock().unwrap().iter().map(|v| (v - expected).abs()).fold(0.0, f64::max);
        info!(tile = idx, max_err, "tile verified");
    }

    if let Ok(path) = std::env::var("TOYRT_TIMELINE_OUT") {
        rt.dump_timeline(&path).expect("timeline dump failed");
        info!(path, "wrote timeline");
    }
}
