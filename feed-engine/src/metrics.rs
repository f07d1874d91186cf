use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FeedMetricsInner {
    days_processed: AtomicU64,
    batches_enqueued: AtomicU64,
    points_enqueued: AtomicU64,
    synthetic_points: AtomicU64,
    source_misses: AtomicU64,
    backpressure_pauses: AtomicU64,
}

/// Cheap shared counters for one feed run.
#[derive(Clone, Default)]
pub struct FeedMetrics {
    inner: Arc<FeedMetricsInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedMetricsSnapshot {
    pub days_processed: u64,
    pub batches_enqueued: u64,
    pub points_enqueued: u64,
    pub synthetic_points: u64,
    pub source_misses: u64,
    pub backpressure_pauses: u64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_day(&self) {
        self.inner.days_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, points: usize) {
        self.inner.batches_enqueued.fetch_add(1, Ordering::Relaxed);
        if points > 0 {
            self.inner
                .points_enqueued
                .fetch_add(points as u64, Ordering::Relaxed);
        }
    }

    pub fn record_synthetic(&self, points: usize) {
        if points > 0 {
            self.inner
                .synthetic_points
                .fetch_add(points as u64, Ordering::Relaxed);
        }
    }

    pub fn record_source_miss(&self) {
        self.inner.source_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure_pause(&self) {
        self.inner
            .backpressure_pauses
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedMetricsSnapshot {
        FeedMetricsSnapshot {
            days_processed: self.inner.days_processed.load(Ordering::Relaxed),
            batches_enqueued: self.inner.batches_enqueued.load(Ordering::Relaxed),
            points_enqueued: self.inner.points_enqueued.load(Ordering::Relaxed),
            synthetic_points: self.inner.synthetic_points.load(Ordering::Relaxed),
            source_misses: self.inner.source_misses.load(Ordering::Relaxed),
            backpressure_pauses: self.inner.backpressure_pauses.load(Ordering::Relaxed),
        }
    }
}
