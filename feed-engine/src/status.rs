use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Consumer-visible lifecycle flags of a feed run. Every flag is
/// single-writer and monotonic within a run, so plain atomic stores with
/// release ordering on publication are sufficient.
#[derive(Clone, Default)]
pub struct FeedStatus {
    inner: Arc<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    is_active: AtomicBool,
    loading_complete: AtomicBool,
    end_of_streams: AtomicBool,
    end_of_bridges: AtomicBool,
    exit_requested: AtomicBool,
    loaded_frontier_ns: AtomicI64,
}

impl FeedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from run start until every exit path has released its readers.
    pub fn is_active(&self) -> bool {
        self.inner.is_active.load(Ordering::Relaxed)
    }

    /// True once the day loop has finished; bridges may still hold data.
    pub fn loading_complete(&self) -> bool {
        self.inner.loading_complete.load(Ordering::Relaxed)
    }

    /// True once every reader is exhausted.
    pub fn end_of_streams(&self) -> bool {
        self.inner.end_of_streams.load(Ordering::Relaxed)
    }

    /// True once every bridge is drained with its latch set. The consumer's
    /// shutdown signal.
    pub fn end_of_bridges(&self) -> bool {
        self.inner.end_of_bridges.load(Ordering::Relaxed)
    }

    pub fn exit_requested(&self) -> bool {
        self.inner.exit_requested.load(Ordering::Relaxed)
    }

    /// Upper bound on the cross-section of data the consumer may treat as
    /// fully arrived. Monotonically non-decreasing.
    pub fn loaded_frontier_ns(&self) -> i64 {
        self.inner.loaded_frontier_ns.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, value: bool) {
        self.inner.is_active.store(value, Ordering::Release);
    }

    pub(crate) fn set_loading_complete(&self) {
        self.inner.loading_complete.store(true, Ordering::Release);
    }

    pub(crate) fn set_end_of_streams(&self) {
        self.inner.end_of_streams.store(true, Ordering::Release);
    }

    pub(crate) fn set_end_of_bridges(&self) {
        self.inner.end_of_bridges.store(true, Ordering::Release);
    }

    pub(crate) fn request_exit(&self) {
        self.inner.exit_requested.store(true, Ordering::Release);
    }

    pub(crate) fn publish_frontier(&self, frontier_ns: i64) {
        self.inner
            .loaded_frontier_ns
            .store(frontier_ns, Ordering::Release);
    }
}
