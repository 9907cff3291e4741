//! A tiled GEMM (`C := alpha*A*B + beta*C`) built as an ordinary downstream
//! user of `Task`/`Data`. The compute kernel itself is out of scope for the
//! runtime crate (see DESIGN.md Non-goals), but exercising the scheduler
//! against a realistic dependency shape — an 8x8 grid of tiles where each
//! output tile fans in from 8 partial-product accumulations before a final
//! scaling step — is the natural validation for "does this actually
//! schedule a DAG with fan-in and a finalization stage correctly."

use std::sync::{Arc, Mutex};

use toyrt::{Access, AccessMode, Data, Priority, Runtime, RuntimeConfig, Task};

const N: usize = 64;
const TILES: usize = 8;
const TILE: usize = N / TILES;
const ALPHA: f64 = 2.0;
const BETA: f64 = 0.5;

#[derive(Clone)]
struct Tile(Vec<f64>);

impl Data for Tile {
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

/// Accumulates one `A[i][k] * B[k][j]` partial product into a tile's running
/// sum. `TILES` of these (one per `k`) feed the same accumulator tile before
/// its `ScaleTile` finalizer runs.
struct AccumulateProduct {
    a: Arc<Mutex<Vec<f64>>>,
    b: Arc<Mutex<Vec<f64>>>,
    accum: Arc<Mutex<Vec<f64>>>,
}

impl Task for AccumulateProduct {
    fn call(&mut self) {
        let a = self.a.lock().unwrap();
        let b = self.b.lock().unwrap();
        let mut accum = self.accum.lock().unwrap();
        for i in 0..TILE {
            for j in 0..TILE {
                let mut acc = 0.0;
                for k in 0..TILE {
                    acc += a[i * TILE + k] * b[k * TILE + j];
                }
                accum[i * TILE + j] += acc;
            }
        }
    }
}

/// Finalizes one output tile: `C := alpha*accum + beta*C_orig`. Reads the
/// fully-accumulated `A*B` partial sum and the tile's original contents
/// (captured before any task touched it), writes the scaled combination into
/// the output tile.
struct ScaleTile {
    accum: Arc<Mutex<Vec<f64>>>,
    c_orig: Vec<f64>,
    c_out: Arc<Mutex<Vec<f64>>>,
}

impl Task for ScaleTile {
    fn call(&mut self) {
        let accum = self.accum.lock().unwrap();
        let mut c_out = self.c_out.lock().unwrap();
        for idx in 0..TILE * TILE {
            c_out[idx] = ALPHA * accum[idx] + BETA * self.c_orig[idx];
        }
    }
}

fn tile_of(matrix: &[f64], tile_row: usize, tile_col: usize) -> Vec<f64> {
    let mut out = vec![0.0; TILE * TILE];
    for i in 0..TILE {
        for j in 0..TILE {
            out[i * TILE + j] = matrix[(tile_row * TILE + i) * N + (tile_col * TILE + j)];
        }
    }
    out
}

/// Computes the same result the tiled run does, accumulating in the same
/// tile-grouped order (`k`-tile outer, in-tile `k` inner) so the two are
/// bit-comparable rather than merely close: floating-point addition isn't
/// associative, so summing the same terms in a different grouping would
/// drift past a tight tolerance even on a correct implementation.
fn sequential_gemm(a: &[f64], b: &[f64], c: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; N * N];
    for i in 0..N {
        for j in 0..N {
            let mut acc = 0.0;
            for kt in 0..TILES {
                for k in 0..TILE {
                    let k_global = kt * TILE + k;
                    acc += a[i * N + k_global] * b[k_global * N + j];
                }
            }
            out[i * N + j] = ALPHA * acc + BETA * c[i * N + j];
        }
    }
    out
}

/// 8x8 grid of 8x8 tiles: every output tile's `TILES` partial products run
/// concurrently (they only write their own tile's accumulator), and the
/// scheduler must hold the finalizing `ScaleTile` back until all `TILES` of
/// them have completed, since it both reads the accumulator and is the sole
/// writer of the output tile.
#[test]
fn tiled_gemm_matches_sequential_reference() {
    let rt = Runtime::new(RuntimeConfig::new());

    let a: Vec<f64> = (0..N * N).map(|idx| ((idx % 13) as f64 - 6.0) * 0.1).collect();
    let b: Vec<f64> = (0..N * N).map(|idx| ((idx % 17) as f64 - 8.0) * 0.1).collect();
    let c: Vec<f64> = (0..N * N).map(|idx| ((idx % 5) as f64 - 2.0) * 0.1).collect();

    let reference = sequential_gemm(&a, &b, &c);

    let a_tiles: Vec<Vec<Arc<Mutex<Vec<f64>>>>> =
        (0..TILES).map(|i| (0..TILES).map(|k| Arc::new(Mutex::new(tile_of(&a, i, k)))).collect()).collect();
    let b_tiles: Vec<Vec<Arc<Mutex<Vec<f64>>>>> =
        (0..TILES).map(|k| (0..TILES).map(|j| Arc::new(Mutex::new(tile_of(&b, k, j)))).collect()).collect();
    let c_orig_tiles: Vec<Vec<Vec<f64>>> = (0..TILES).map(|i| (0..TILES).map(|j| tile_of(&c, i, j)).collect()).collect();

    let accum_tiles: Vec<Vec<Arc<Mutex<Vec<f64>>>>> =
        (0..TILES).map(|_| (0..TILES).map(|_| Arc::new(Mutex::new(vec![0.0; TILE * TILE]))).collect()).collect();
    let c_out_tiles: Vec<Vec<Arc<Mutex<Vec<f64>>>>> =
        (0..TILES).map(|_| (0..TILES).map(|_| Arc::new(Mutex::new(vec![0.0; TILE * TILE]))).collect()).collect();

    let a_ids: Vec<Vec<_>> = (0..TILES)
        .map(|i| (0..TILES).map(|k| rt.register_data(Tile(a_tiles[i][k].lock().unwrap().clone()))).collect())
        .collect();
    let b_ids: Vec<Vec<_>> = (0..TILES)
        .map(|k| (0..TILES).map(|j| rt.register_data(Tile(b_tiles[k][j].lock().unwrap().clone()))).collect())
        .collect();
    let accum_ids: Vec<Vec<_>> = (0..TILES)
        .map(|_| (0..TILES).map(|_| rt.register_data(Tile(vec![0.0; TILE * TILE]))).collect())
        .collect();
    let c_ids: Vec<Vec<_>> = (0..TILES)
        .map(|_| (0..TILES).map(|_| rt.register_data(Tile(vec![0.0; TILE * TILE]))).collect())
        .collect();

    for i in 0..TILES {
        for j in 0..TILES {
            for k in 0..TILES {
                rt.submit(
                    AccumulateProduct {
                        a: a_tiles[i][k].clone(),
                        b: b_tiles[k][j].clone(),
                        accum: accum_tiles[i][j].clone(),
                    },
                    vec![
                        Access { data: a_ids[i][k], mode: AccessMode::Read },
                        Access { data: b_ids[k][j], mode: AccessMode::Read },
                        Access { data: accum_ids[i][j], mode: AccessMode::Write },
                    ],
                    Priority::Normal,
                );
            }

            rt.submit(
                ScaleTile {
                    accum: accum_tiles[i][j].clone(),
                    c_orig: c_orig_tiles[i][j].clone(),
                    c_out: c_out_tiles[i][j].clone(),
                },
                vec![
                    Access { data: accum_ids[i][j], mode: AccessMode::Read },
                    Access { data: c_ids[i][j], mode: AccessMode::Write },
                ],
                Priority::Normal,
            );
        }
    }

    let stats = rt.run(8);
    assert_eq!(stats.tasks_executed, TILES * TILES * TILES + TILES * TILES);

    for i in 0..TILES {
        for j in 0..TILES {
            let got = c_out_tiles[i][j].lock().unwrap();
            for r in 0..TILE {
                for col in 0..TILE {
                    let expected = reference[(i * TILE + r) * N + (j * TILE + col)];
                    let actual = got[r * TILE + col];
                    assert!(
                        (actual - expected).abs() < 1e-15,
                        "tile ({i},{j}) [{r}][{col}]: {actual} != {expected}"
                    );
                }
            }
        }
    }
}
