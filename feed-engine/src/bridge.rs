use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_types::types::DataPoint;
use parking_lot::Mutex;

/// One ordered batch of data points sharing a frontier window.
pub type Batch = Vec<DataPoint>;

/// Bounded FIFO of batches delivering one subscription's data to the
/// consumer. Capacity is advisory: `enqueue` never blocks, the producer
/// inspects `len` in its backpressure gate instead. Single producer, single
/// consumer, plus a controller that may `clear` concurrently during
/// shutdown.
#[derive(Clone)]
pub struct FeedBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    queue: Mutex<VecDeque<Batch>>,
    end_of_bridge: AtomicBool,
    capacity: usize,
}

impl FeedBridge {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                queue: Mutex::new(VecDeque::new()),
                end_of_bridge: AtomicBool::new(false),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn enqueue(&self, batch: Batch) {
        self.inner.queue.lock().push_back(batch);
    }

    pub fn try_dequeue(&self) -> Option<Batch> {
        self.inner.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.queue.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn at_capacity(&self) -> bool {
        self.len() >= self.inner.capacity
    }

    /// True once this stream will produce no more batches, either for the
    /// current day (no source) or permanently (stream drained).
    pub fn end_of_bridge(&self) -> bool {
        self.inner.end_of_bridge.load(Ordering::Relaxed)
    }

    pub fn set_end_of_bridge(&self, value: bool) {
        self.inner.end_of_bridge.store(value, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::types::{DataPoint, Tick};

    fn tick(ts_ns: i64) -> DataPoint {
        DataPoint::Tick(Tick {
            symbol: "SPY".to_string(),
            ts_ns,
            price: 1.0,
            size: 1,
        })
    }

    #[test]
    fn fifo_ordering() {
        let bridge = FeedBridge::new(4);
        bridge.enqueue(vec![tick(1)]);
        bridge.enqueue(vec![tick(2)]);
        assert_eq!(bridge.len(), 2);
        assert_eq!(bridge.try_dequeue().unwrap()[0].ts_ns(), 1);
        assert_eq!(bridge.try_dequeue().unwrap()[0].ts_ns(), 2);
        assert!(bridge.try_dequeue().is_none());
    }

    #[test]
    fn capacity_is_advisory() {
        let bridge = FeedBridge::new(1);
        bridge.enqueue(vec![tick(1)]);
        assert!(bridge.at_capacity());
        // A second enqueue still lands; the producer gate is responsible
        // for pausing.
        bridge.enqueue(vec![tick(2)]);
        assert_eq!(bridge.len(), 2);
    }

    #[test]
    fn clear_discards_everything() {
        let bridge = FeedBridge::new(4);
        bridge.enqueue(vec![tick(1)]);
        bridge.enqueue(vec![tick(2)]);
        bridge.clear();
        assert!(bridge.is_empty());
        assert!(bridge.try_dequeue().is_none());
    }

    #[test]
    fn end_of_bridge_latch_is_resettable() {
        let bridge = FeedBridge::new(4);
        assert!(!bridge.end_of_bridge());
        bridge.set_end_of_bridge(true);
        assert!(bridge.end_of_bridge());
        bridge.set_end_of_bridge(false);
        assert!(!bridge.end_of_bridge());
    }
}
