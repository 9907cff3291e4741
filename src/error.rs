//! Error taxonomy.
//!
//! Contract violations and invariant breaches are not represented here: they
//! are `assert!`/`panic!` at the call site, since there is no user-visible
//! recovery channel for them. `RuntimeError` only covers the handful of
//! operations that are genuinely fallible before they become fatal —
//! spill-directory setup and transport I/O — so the low-level backends stay
//! testable with ordinary `Result`s even though callers ultimately
//! `.expect()` them.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("failed to create spill directory {path}: {source}")]
    SpillDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O backend failure on {path}: {source}")]
    Backend {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport failure talking to rank {peer}: {source}")]
    Transport {
        peer: i32,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
