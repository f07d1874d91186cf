use std::time::Duration;

use chrono::NaiveDate;
use core_types::config::DEFAULT_TOTAL_BRIDGE_MAX;

const DEFAULT_BACKPRESSURE_PAUSE_MS: u64 = 5;
const DEFAULT_DRAIN_POLL_MS: u64 = 100;

/// Runtime knobs for one feed engine instance.
#[derive(Clone, Debug)]
pub struct FeedEngineConfig {
    pub label: String,
    /// Inclusive first tradeable day considered.
    pub period_start: NaiveDate,
    /// Inclusive last tradeable day considered.
    pub period_finish: NaiveDate,
    /// Total queued batches across all bridges; each bridge gets an equal
    /// share.
    pub total_bridge_max: usize,
    /// Sleep applied while the backpressure gate holds the producer.
    pub backpressure_pause: Duration,
    /// Poll interval of the termination drain.
    pub drain_poll: Duration,
}

impl FeedEngineConfig {
    pub fn new(label: impl Into<String>, period_start: NaiveDate, period_finish: NaiveDate) -> Self {
        Self {
            label: label.into(),
            period_start,
            period_finish,
            total_bridge_max: DEFAULT_TOTAL_BRIDGE_MAX,
            backpressure_pause: Duration::from_millis(DEFAULT_BACKPRESSURE_PAUSE_MS),
            drain_poll: Duration::from_millis(DEFAULT_DRAIN_POLL_MS),
        }
    }

    pub fn with_total_bridge_max(mut self, max: usize) -> Self {
        self.total_bridge_max = max.max(1);
        self
    }

    pub fn with_backpressure_pause(mut self, pause: Duration) -> Self {
        self.backpressure_pause = pause;
        self
    }

    pub fn with_drain_poll(mut self, poll: Duration) -> Self {
        self.drain_poll = poll;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let start = NaiveDate::from_ymd_opt(2013, 5, 1).unwrap();
        let finish = NaiveDate::from_ymd_opt(2013, 5, 3).unwrap();
        let config = FeedEngineConfig::new("test", start, finish);
        assert_eq!(config.total_bridge_max, DEFAULT_TOTAL_BRIDGE_MAX);
        assert_eq!(config.backpressure_pause, Duration::from_millis(5));
        assert_eq!(config.drain_poll, Duration::from_millis(100));
    }

    #[test]
    fn bridge_max_floor_is_one() {
        let start = NaiveDate::from_ymd_opt(2013, 5, 1).unwrap();
        let config = FeedEngineConfig::new("test", start, start).with_total_bridge_max(0);
        assert_eq!(config.total_bridge_max, 1);
    }
}
