use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the capture loop and read by status requests.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_processed: AtomicU64,
    frames_dropped: AtomicU64,
    write_failures: AtomicU64,
    batches_dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    /// Frames passed through because detection or encoding failed.
    pub frames_dropped: u64,
    /// Attendance events lost to storage errors.
    pub write_failures: u64,
    /// Recognition batches discarded because the hub was full.
    pub batches_dropped: u64,
}

impl PipelineStats {
    pub fn frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failed(&self, count: u64) {
        self.write_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn batch_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }
}
