//! Recorder and timeline.
//!
//! `TimedDataRecorder<T>` is an append-only `(elapsed_ms, value)` log, dumped
//! as whitespace-separated text. `Timeline` is the per-worker
//! task-execution span log, dumped as a single `timeline.json` array.

use std::fmt::Display;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

/// Append-only `(elapsed since recorder creation, value)` log.
pub struct TimedDataRecorder<T> {
    start: Instant,
    points: Mutex<Vec<(u64, T)>>,
}

impl<T: Display + Clone> TimedDataRecorder<T> {
    pub fn new() -> Self {
        TimedDataRecorder {
            start: Instant::now(),
            points: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, value: T) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.points.lock().unwrap().push((elapsed, value));
    }

    /// Write `<elapsed_ms> <value>` one pair per line.
    pub fn dump(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let points = self.points.lock().unwrap();
        let mut out = String::new();
        for (t, v) in points.iter() {
            out.push_str(&format!("{t} {v}\n"));
        }
        std::fs::write(path, out)
    }
}

impl<T: Display + Clone> Default for TimedDataRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Clone)]
pub struct TaskSpan {
    pub worker: usize,
    pub task_name: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub extra: Value,
}

/// Collects one [`TaskSpan`] per task execution, across all workers, and
/// dumps the whole set as a single JSON array to `timeline.json`.
pub struct Timeline {
    start: Instant,
    spans: Mutex<Vec<TaskSpan>>,
}

impl Timeline {
    pub fn new() -> Self {
        Timeline {
            start: Instant::now(),
            spans: Mutex::new(Vec::new()),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn record_span(&self, worker: usize, task_name: &str, start_ms: u64, end_ms: u64, extra: Value) {
        self.spans.lock().unwrap().push(TaskSpan {
            worker,
            task_name: task_name.to_string(),
            start_ms,
            end_ms,
            extra,
        });
    }

    pub fn dump(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let spans = self.spans.lock().unwrap();
        let json = serde_json::to_vec_pretty(&*spans)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&json)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
