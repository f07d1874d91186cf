//! Historical market-data feed engine.
//!
//! Drives a backtest: per tradeable day it rotates every subscription's
//! reader onto that day's source, merges the streams behind a shared time
//! frontier, synthesizes fill-forward bars across gaps, and delivers batches
//! to the consumer through per-subscription bounded bridges with
//! backpressure.

mod bridge;
mod config;
mod fill_forward;
mod metrics;
mod status;

pub use bridge::{Batch, FeedBridge};
pub use config::FeedEngineConfig;
pub use metrics::{FeedMetrics, FeedMetricsSnapshot};
pub use status::FeedStatus;

use std::sync::Arc;

use chrono::NaiveDate;
use core_types::time::{
    date_of_ns, date_start_ns, round_down, NANOS_PER_DAY, NANOS_PER_MILLI, NANOS_PER_MINUTE,
};
use core_types::types::SubscriptionConfig;
use dayfile_source::SubscriptionReader;
use engine_api::{Engine, EngineError, EngineHealth, EngineResult};
use log::{debug, error, info};
use market_calendar::MarketCalendar;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// One subscription paired with the reader that serves it. Order matters:
/// the position in the construction vector is the bridge index.
pub struct FeedSubscription {
    pub config: SubscriptionConfig,
    pub reader: Box<dyn SubscriptionReader>,
}

impl FeedSubscription {
    pub fn new(config: SubscriptionConfig, reader: Box<dyn SubscriptionReader>) -> Self {
        Self { config, reader }
    }
}

pub(crate) struct StreamState {
    pub(crate) config: SubscriptionConfig,
    pub(crate) reader: Box<dyn SubscriptionReader>,
    pub(crate) bridge: FeedBridge,
    /// High-water mark of the last emitted bar, real or synthetic. `None`
    /// until the first real point primes it.
    pub(crate) fill_forward_frontier: Option<i64>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no subscriptions configured")]
    NoSubscriptions,
    #[error("empty period: {start} is after {finish}")]
    EmptyPeriod { start: NaiveDate, finish: NaiveDate },
    #[error("engine already ran to completion")]
    Finished,
}

/// Blocking producer behind a start/stop lifecycle. The consumer holds
/// [`FeedBridge`] and [`FeedStatus`] handles and drains independently.
pub struct HistoryFeedEngine {
    inner: Arc<FeedEngineInner>,
}

impl HistoryFeedEngine {
    pub fn new(
        config: FeedEngineConfig,
        subscriptions: Vec<FeedSubscription>,
        calendar: Arc<dyn MarketCalendar>,
    ) -> Result<Self, FeedError> {
        if subscriptions.is_empty() {
            return Err(FeedError::NoSubscriptions);
        }
        if config.period_start > config.period_finish {
            return Err(FeedError::EmptyPeriod {
                start: config.period_start,
                finish: config.period_finish,
            });
        }
        let stream_count = subscriptions.len();
        let per_bridge_max = (config.total_bridge_max / stream_count).max(1);
        // Tick subscriptions are ignored for the fill-forward cadence so bar
        // streams keep a sensible increment, but they drive the merge
        // frontier at millisecond granularity.
        let bar_increment_ns = subscriptions
            .iter()
            .filter_map(|s| s.config.resolution.bar_increment_ns())
            .min()
            .unwrap_or(NANOS_PER_MINUTE);
        let frontier_increment_ns = subscriptions
            .iter()
            .map(|s| s.config.resolution.frontier_increment_ns())
            .min()
            .unwrap_or(NANOS_PER_MILLI);
        let mut symbols = Vec::with_capacity(stream_count);
        let mut bridges = Vec::with_capacity(stream_count);
        let mut streams = Vec::with_capacity(stream_count);
        for subscription in subscriptions {
            let bridge = FeedBridge::new(per_bridge_max);
            symbols.push(subscription.config.symbol.clone());
            bridges.push(bridge.clone());
            streams.push(StreamState {
                config: subscription.config,
                reader: subscription.reader,
                bridge,
                fill_forward_frontier: None,
            });
        }
        Ok(Self {
            inner: Arc::new(FeedEngineInner {
                config,
                calendar,
                symbols,
                bridges,
                bar_increment_ns,
                frontier_increment_ns,
                status: FeedStatus::new(),
                metrics: FeedMetrics::new(),
                cancel: CancellationToken::new(),
                workset: Mutex::new(Some(streams)),
                state: Mutex::new(EngineRuntimeState::Idle),
            }),
        })
    }

    /// Bridge handles in subscription order. Cheap clones.
    pub fn bridges(&self) -> Vec<FeedBridge> {
        self.inner.bridges.clone()
    }

    pub fn status(&self) -> FeedStatus {
        self.inner.status.clone()
    }

    pub fn metrics(&self) -> FeedMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Cooperative cancel: flags the producer, wakes its sleeps, and purges
    /// queued data. Data loss here is accepted; the consumer is being shut
    /// down.
    pub fn exit(&self) {
        info!("[{}] exit requested", self.inner.config.label);
        self.inner.status.request_exit();
        self.inner.cancel.cancel();
        self.purge_data();
    }

    /// Clears every bridge. Safe to call concurrently with the producer; an
    /// in-flight enqueue may land after the sweep, which the shutdown
    /// semantics accept.
    pub fn purge_data(&self) {
        for bridge in &self.inner.bridges {
            bridge.clear();
        }
    }
}

impl Engine for HistoryFeedEngine {
    fn start(&self) -> EngineResult<()> {
        let mut guard = self.inner.state.lock();
        match &*guard {
            EngineRuntimeState::Running(_) => return Err(EngineError::AlreadyRunning),
            EngineRuntimeState::Stopped => {
                return Err(EngineError::Failure {
                    source: Box::new(FeedError::Finished),
                })
            }
            EngineRuntimeState::Idle => {}
        }
        let runtime = Runtime::new().map_err(|err| EngineError::Failure { source: err.into() })?;
        let runner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            runner.run().await;
        });
        *guard = EngineRuntimeState::Running(RuntimeBundle { runtime, handle });
        info!("[{}] history feed engine started", self.inner.config.label);
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let bundle = {
            let mut guard = self.inner.state.lock();
            match std::mem::replace(&mut *guard, EngineRuntimeState::Stopped) {
                EngineRuntimeState::Running(bundle) => bundle,
                other => {
                    *guard = other;
                    return Err(EngineError::NotRunning);
                }
            }
        };
        self.exit();
        if let Err(err) = bundle.runtime.block_on(async { bundle.handle.await }) {
            error!("[{}] feed runtime join error: {err}", self.inner.config.label);
        }
        info!("[{}] history feed engine stopped", self.inner.config.label);
        Ok(())
    }

    fn health(&self) -> EngineHealth {
        let guard = self.inner.state.lock();
        match &*guard {
            EngineRuntimeState::Running(_) => {
                let status = &self.inner.status;
                let frontier = match status.loaded_frontier_ns() {
                    0 => None,
                    ns => Some(ns),
                };
                if status.loading_complete() && !status.is_active() {
                    EngineHealth::stopped().with_detail("run complete")
                } else if status.loading_complete() {
                    EngineHealth::draining(frontier)
                } else {
                    EngineHealth::loading(frontier)
                }
            }
            EngineRuntimeState::Idle => EngineHealth::idle(),
            EngineRuntimeState::Stopped => EngineHealth::stopped(),
        }
    }
}

struct FeedEngineInner {
    config: FeedEngineConfig,
    calendar: Arc<dyn MarketCalendar>,
    symbols: Vec<String>,
    bridges: Vec<FeedBridge>,
    bar_increment_ns: i64,
    frontier_increment_ns: i64,
    status: FeedStatus,
    metrics: FeedMetrics,
    cancel: CancellationToken,
    workset: Mutex<Option<Vec<StreamState>>>,
    state: Mutex<EngineRuntimeState>,
}

impl FeedEngineInner {
    async fn run(self: Arc<Self>) {
        let Some(mut streams) = self.workset.lock().take() else {
            return;
        };
        self.status.set_active(true);
        info!(
            "[{}] feed starting: {} stream(s), {} -> {}",
            self.config.label,
            streams.len(),
            self.config.period_start,
            self.config.period_finish
        );
        self.run_day_loop(&mut streams).await;
        self.status.set_loading_complete();
        self.run_drain(&mut streams).await;
        for stream in streams.iter_mut() {
            stream.reader.dispose();
        }
        self.status.set_active(false);
        let snapshot = self.metrics.snapshot();
        info!(
            "[{}] feed finished: {} day(s), {} batch(es), {} point(s), {} synthetic",
            self.config.label,
            snapshot.days_processed,
            snapshot.batches_enqueued,
            snapshot.points_enqueued,
            snapshot.synthetic_points
        );
    }

    async fn run_day_loop(&self, streams: &mut [StreamState]) {
        let days = self.calendar.tradeable_days(
            &self.symbols,
            self.config.period_start,
            self.config.period_finish,
        );
        for date in days {
            if self.status.exit_requested() {
                break;
            }
            self.metrics.record_day();
            self.open_day(streams, date);
            self.backpressure_gate(streams).await;
            if self.status.exit_requested() {
                break;
            }
            self.run_frontier_loop(streams, date);
        }
    }

    fn open_day(&self, streams: &mut [StreamState], date: NaiveDate) {
        for stream in streams.iter_mut() {
            let has_source = stream.reader.refresh_source(date);
            stream.bridge.set_end_of_bridge(!has_source);
            if !has_source {
                self.metrics.record_source_miss();
                debug!(
                    "[{}] no source for {}/{} on {}",
                    self.config.label, stream.config.symbol, stream.config.resolution, date
                );
            }
        }
    }

    /// Holds the producer while the consumer is genuinely behind: some
    /// active bridge is at capacity and the only empty bridges belong to
    /// inactive streams.
    async fn backpressure_gate(&self, streams: &[StreamState]) {
        let stream_count = streams.len();
        loop {
            if self.status.exit_requested() {
                return;
            }
            let full = streams.iter().filter(|s| s.bridge.at_capacity()).count();
            let empty = streams.iter().filter(|s| s.bridge.is_empty()).count();
            let active = streams
                .iter()
                .filter(|s| !s.bridge.end_of_bridge())
                .count();
            if full == 0 || stream_count - active != empty {
                return;
            }
            self.metrics.record_backpressure_pause();
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = sleep(self.config.backpressure_pause) => {}
            }
        }
    }

    fn run_frontier_loop(&self, streams: &mut [StreamState], date: NaiveDate) {
        let day_start = date_start_ns(date);
        let next_midnight = day_start + NANOS_PER_DAY;
        let mut frontier = day_start + self.frontier_increment_ns;
        // The frontier may sit exactly on the next midnight for one final
        // synthesis step; the `ts < frontier` drain guard keeps day D+1 data
        // out of day D's batches.
        while (date_of_ns(frontier) == date || frontier == next_midnight)
            && !self.status.exit_requested()
        {
            for stream in streams.iter_mut() {
                if stream.reader.end_of_stream() {
                    stream.bridge.set_end_of_bridge(true);
                }
            }
            if streams.iter().all(|s| s.bridge.end_of_bridge()) {
                break;
            }

            let mut early_bird: Option<i64> = None;
            for stream in streams.iter_mut() {
                if stream.bridge.end_of_bridge() {
                    continue;
                }
                let mut cache: Batch = Vec::new();
                while let Some(point) = stream.reader.current() {
                    if point.ts_ns() >= frontier {
                        break;
                    }
                    cache.push(point.clone());
                    if !stream.reader.move_next() {
                        break;
                    }
                }
                if !stream.reader.end_of_stream() {
                    if let Some(point) = stream.reader.current() {
                        let ts = point.ts_ns();
                        early_bird = Some(early_bird.map_or(ts, |lowest| lowest.min(ts)));
                    }
                }
                if !cache.is_empty() {
                    stream.fill_forward_frontier = Some(cache[0].ts_ns());
                    self.metrics.record_batch(cache.len());
                    stream.bridge.enqueue(cache);
                }
                let synthesized = fill_forward::synthesize(stream, self.bar_increment_ns);
                self.metrics.record_synthetic(synthesized);
            }

            self.status.publish_frontier(frontier);
            frontier = match early_bird {
                Some(early) if early > frontier => {
                    round_down(early, self.frontier_increment_ns) + self.frontier_increment_ns
                }
                _ => frontier + self.frontier_increment_ns,
            };
        }
    }

    async fn run_drain(&self, streams: &mut [StreamState]) {
        while !self.status.exit_requested() {
            for stream in streams.iter_mut() {
                if stream.bridge.is_empty() && stream.reader.end_of_stream() {
                    stream.bridge.set_end_of_bridge(true);
                }
            }
            if streams.iter().all(|s| s.bridge.end_of_bridge()) {
                self.status.set_end_of_streams();
            }
            if self.status.end_of_streams()
                && streams
                    .iter()
                    .all(|s| s.bridge.is_empty() && s.bridge.end_of_bridge())
            {
                self.status.set_end_of_bridges();
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.drain_poll) => {}
            }
        }
    }
}

enum EngineRuntimeState {
    Idle,
    Running(RuntimeBundle),
    Stopped,
}

struct RuntimeBundle {
    runtime: Runtime,
    handle: JoinHandle<()>,
}
