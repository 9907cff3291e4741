//! A task-parallel runtime: DAG scheduling over declared data access lists,
//! out-of-core memory management via LRU disk swapping, and an optional
//! distributed execution layer behind a pluggable cluster transport.
//!
//! The central entry point is [`runtime::Runtime`]. Build one with
//! [`config::RuntimeConfig`], register [`data::Data`] and submit
//! [`task::Task`]s with their declared [`task::Access`] lists, then call
//! [`runtime::Runtime::run`].

pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod ids;
pub mod io;
pub mod lru;
pub mod queue;
pub mod distributed;
pub mod runtime;
pub mod service_tasks;
pub mod task;
pub mod timeline;
pub mod worker;

pub use config::RuntimeConfig;
pub use data::Data;
pub use error::{Result, RuntimeError};
pub use ids::{DataId, TaskId};
pub use runtime::{QueueKind, Runtime, RunStats};
pub use task::{Access, AccessMode, Priority, Task};

/// Installs a `tracing-subscriber` env-filter subscriber reading
/// `TOYRT_LOG` (falling back to `info`). Call once, near `main`; a second
/// call is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("TOYRT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
