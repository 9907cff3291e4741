//! `RuntimeConfig`: the programmatic configuration surface. There is no
//! file-based format; callers set the same fields this struct exposes as
//! builder methods directly, the way command-line flags would parse into
//! them.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub(crate) max_memory_size: usize,
    pub(crate) spill_dir: Option<PathBuf>,
    pub(crate) progress_frequency_percent: u32,
    pub(crate) requeue_not_ready: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            // Unlimited by default: callers opt into a budget explicitly via
            // `.max_memory_size(..)` rather than hitting eviction pressure
            // they never asked for.
            max_memory_size: usize::MAX,
            spill_dir: None,
            progress_frequency_percent: 10,
            requeue_not_ready: false,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte budget above which the LRU evicts swappable data to disk.
    pub fn max_memory_size(mut self, bytes: usize) -> Self {
        self.max_memory_size = bytes;
        self
    }

    /// Spill directory; defaults to a fresh `toyrt_ooc_XXXXXX` under the
    /// system temp dir.
    pub fn spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    /// Percentage of total task count between progress callback
    /// invocations.
    pub fn progress_frequency_percent(mut self, percent: u32) -> Self {
        assert!(percent > 0 && percent <= 100, "progress frequency must be in (0, 100]");
        self.progress_frequency_percent = percent;
        self
    }

    /// Enables a "park on condvar instead of busy-wait" branch for workers
    /// with nothing ready to run, trading latency for CPU usage. Off by
    /// default.
    pub fn requeue_not_ready(mut self, enabled: bool) -> Self {
        self.requeue_not_ready = enabled;
        self
    }
}
