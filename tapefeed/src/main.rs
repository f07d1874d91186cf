use std::{process, sync::Arc, thread, time::Duration};

use config::ConfigError;
use core_types::config::{AppConfig, PeriodError};
use dayfile_source::DayFileReader;
use engine_api::{Engine, EngineError};
use feed_engine::{FeedEngineConfig, FeedError, FeedSubscription, HistoryFeedEngine};
use log::info;
use market_calendar::{MarketCalendar, WeekdayCalendar};
use thiserror::Error;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("tapefeed failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let period_start = config.feed.period_start_date()?;
    let period_finish = config.feed.period_finish_date()?;
    let calendar: Arc<dyn MarketCalendar> = Arc::new(WeekdayCalendar::new());

    let subscriptions: Vec<FeedSubscription> = config
        .subscriptions
        .iter()
        .map(|sub| {
            let reader =
                DayFileReader::new(sub.clone(), calendar.clone(), config.feed.data_dir.clone());
            FeedSubscription::new(sub.clone(), Box::new(reader))
        })
        .collect();

    let engine = HistoryFeedEngine::new(
        FeedEngineConfig::new("tapefeed", period_start, period_finish)
            .with_total_bridge_max(config.feed.total_bridge_max),
        subscriptions,
        calendar,
    )?;

    println!(
        "tapefeed replaying {} subscription(s) from {} through {} (data dir {})",
        config.subscriptions.len(),
        period_start,
        period_finish,
        config.feed.data_dir
    );

    let bridges = engine.bridges();
    let status = engine.status();
    engine.start()?;

    let mut delivered = vec![0usize; bridges.len()];
    while !status.end_of_bridges() {
        let mut drained_any = false;
        for (idx, bridge) in bridges.iter().enumerate() {
            while let Some(batch) = bridge.try_dequeue() {
                delivered[idx] += batch.len();
                drained_any = true;
            }
        }
        if !drained_any {
            thread::sleep(Duration::from_millis(10));
        }
    }
    info!("all bridges drained, stopping engine");
    engine.stop()?;

    for (sub, count) in config.subscriptions.iter().zip(delivered.iter()) {
        println!("{}/{}: {} point(s)", sub.symbol, sub.resolution, count);
    }
    let metrics = engine.metrics();
    println!(
        "{} day(s), {} batch(es), {} real point(s), {} synthetic, {} missing source(s)",
        metrics.days_processed,
        metrics.batches_enqueued,
        metrics.points_enqueued,
        metrics.synthetic_points,
        metrics.source_misses
    );
    Ok(())
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
