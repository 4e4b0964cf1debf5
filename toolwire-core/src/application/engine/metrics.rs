use crate::infrastructure::sse::StreamOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative engine counters. Dropped frames never reach the user, so they
/// are counted here instead.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    dispatches: AtomicU64,
    failures: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    frames_skipped: AtomicU64,
    streams_completed: AtomicU64,
    streams_truncated: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dispatches: u64,
    pub failures: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub frames_skipped: u64,
    /// Streams that ended on the terminal sentinel.
    pub streams_completed: u64,
    /// Streams that ended without it.
    pub streams_truncated: u64,
}

impl EngineMetrics {
    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream(&self, outcome: &StreamOutcome) {
        self.frames_delivered
            .fetch_add(outcome.delivered, Ordering::Relaxed);
        self.frames_dropped.fetch_add(outcome.dropped, Ordering::Relaxed);
        self.frames_skipped.fetch_add(outcome.skipped, Ordering::Relaxed);
        if outcome.completed {
            self.streams_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.streams_truncated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_truncated: self.streams_truncated.load(Ordering::Relaxed),
        }
    }
}
