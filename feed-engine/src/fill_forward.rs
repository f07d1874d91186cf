//! Fill-forward synthesis: clones the last known bar across data gaps at the
//! subscription set's bar increment, bounded by market hours.

use crate::StreamState;

/// Runs once per stream at the end of a frontier step. Returns the number of
/// synthetic points enqueued.
///
/// Two regimes:
/// - the reader ended prematurely while the market is still open: project the
///   last bar forward to the close;
/// - a gap between two known points: fill the open portion of the gap,
///   skipping closed hours without emitting inside them.
pub(crate) fn synthesize(stream: &mut StreamState, bar_increment_ns: i64) -> usize {
    if !stream.config.fill_data_forward {
        return 0;
    }
    let Some(previous_ts) = stream.reader.previous().map(|p| p.ts_ns()) else {
        return 0;
    };
    if stream.fill_forward_frontier.is_none() {
        stream.fill_forward_frontier = Some(previous_ts);
    }
    let mut frontier = stream.fill_forward_frontier.unwrap_or(previous_ts);
    let mut emitted = 0usize;

    if stream.reader.end_of_stream() {
        // Premature end of stream: the retained cursor value is the last
        // real bar; clone it forward while the market stays open.
        let Some(template) = stream.reader.current().cloned() else {
            return 0;
        };
        let mut ts = frontier + bar_increment_ns;
        while stream.reader.market_open(ts) {
            stream.bridge.enqueue(vec![template.with_ts_ns(ts)]);
            frontier = ts;
            emitted += 1;
            ts += bar_increment_ns;
        }
        stream.fill_forward_frontier = Some(frontier);
        return emitted;
    }

    let Some(current_ts) = stream.reader.current().map(|p| p.ts_ns()) else {
        return 0;
    };
    let Some(template) = stream.reader.previous().cloned() else {
        return 0;
    };
    let mut ts = frontier + bar_increment_ns;
    while ts < current_ts {
        if stream.config.extended_market_hours {
            if stream.reader.extended_market_open(ts) {
                stream.bridge.enqueue(vec![template.with_ts_ns(ts)]);
                frontier = ts;
                emitted += 1;
            }
        } else if stream.reader.market_open(ts) {
            stream.bridge.enqueue(vec![template.with_ts_ns(ts)]);
            frontier = ts;
            emitted += 1;
        } else {
            // The gap spans a closed period. Jump to the next real point and
            // walk backward to the start of the contiguous open run leading
            // up to it; the outer step then resumes from there.
            ts = current_ts;
            while stream.reader.market_open(ts) {
                ts -= bar_increment_ns;
            }
        }
        ts += bar_increment_ns;
    }
    stream.fill_forward_frontier = Some(frontier);
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeedBridge;
    use chrono::NaiveDate;
    use core_types::time::{date_start_ns, NANOS_PER_HOUR, NANOS_PER_MINUTE};
    use core_types::types::{DataPoint, Resolution, SubscriptionConfig, TradeBar};
    use dayfile_source::ScriptedReader;
    use market_calendar::WeekdayCalendar;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn day1() -> NaiveDate {
        // 2013-05-01, a Wednesday.
        NaiveDate::from_ymd_opt(2013, 5, 1).unwrap()
    }

    fn day2() -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 5, 2).unwrap()
    }

    fn at(date: NaiveDate, hour: i64, minute: i64) -> i64 {
        date_start_ns(date) + hour * NANOS_PER_HOUR + minute * NANOS_PER_MINUTE
    }

    fn bar(ts_ns: i64, close: f64) -> DataPoint {
        DataPoint::TradeBar(TradeBar {
            symbol: "SPY".to_string(),
            ts_ns,
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        })
    }

    fn stream_with(
        config: SubscriptionConfig,
        days: BTreeMap<NaiveDate, Vec<DataPoint>>,
    ) -> StreamState {
        let reader = ScriptedReader::new(config.clone(), Arc::new(WeekdayCalendar::new()), days);
        StreamState {
            config,
            reader: Box::new(reader),
            bridge: FeedBridge::new(16),
            fill_forward_frontier: None,
        }
    }

    fn drain_times(bridge: &FeedBridge) -> Vec<i64> {
        let mut times = Vec::new();
        while let Some(batch) = bridge.try_dequeue() {
            assert_eq!(batch.len(), 1, "synthetic batches carry one point");
            times.push(batch[0].ts_ns());
        }
        times
    }

    #[test]
    fn disabled_fill_forward_emits_nothing() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 9, 31), 1.0), bar(at(day1(), 9, 35), 2.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        assert_eq!(synthesize(&mut stream, NANOS_PER_MINUTE), 0);
        assert!(stream.bridge.is_empty());
    }

    #[test]
    fn no_previous_point_means_no_fill() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute).with_fill_forward(true);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 9, 31), 1.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert_eq!(synthesize(&mut stream, NANOS_PER_MINUTE), 0);
    }

    #[test]
    fn gap_between_points_fills_open_minutes() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute).with_fill_forward(true);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 9, 31), 1.0), bar(at(day1(), 9, 35), 2.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        stream.fill_forward_frontier = Some(at(day1(), 9, 31));

        let emitted = synthesize(&mut stream, NANOS_PER_MINUTE);
        assert_eq!(emitted, 3);
        assert_eq!(
            drain_times(&stream.bridge),
            vec![at(day1(), 9, 32), at(day1(), 9, 33), at(day1(), 9, 34)]
        );
        assert_eq!(stream.fill_forward_frontier, Some(at(day1(), 9, 34)));
    }

    #[test]
    fn synthetic_bars_clone_the_previous_payload() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute).with_fill_forward(true);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 9, 31), 7.5), bar(at(day1(), 9, 33), 9.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        stream.fill_forward_frontier = Some(at(day1(), 9, 31));

        assert_eq!(synthesize(&mut stream, NANOS_PER_MINUTE), 1);
        let batch = stream.bridge.try_dequeue().unwrap();
        match &batch[0] {
            DataPoint::TradeBar(b) => {
                assert_eq!(b.ts_ns, at(day1(), 9, 32));
                assert_eq!(b.close, 7.5);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn premature_end_of_stream_projects_to_the_close() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute).with_fill_forward(true);
        let mut days = BTreeMap::new();
        days.insert(
            day1(),
            vec![bar(at(day1(), 15, 57), 1.0), bar(at(day1(), 15, 58), 2.0)],
        );
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        assert!(!stream.reader.move_next());
        assert!(stream.reader.end_of_stream());
        stream.fill_forward_frontier = Some(at(day1(), 15, 58));

        let emitted = synthesize(&mut stream, NANOS_PER_MINUTE);
        // 15:59 and the inclusive 16:00 close bar.
        assert_eq!(emitted, 2);
        assert_eq!(
            drain_times(&stream.bridge),
            vec![at(day1(), 15, 59), at(day1(), 16, 0)]
        );
        // Projected bars clone the retained last value.
        assert_eq!(stream.fill_forward_frontier, Some(at(day1(), 16, 0)));
    }

    #[test]
    fn overnight_gap_skips_closed_hours() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute).with_fill_forward(true);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 15, 58), 1.0), bar(at(day1(), 15, 59), 2.0)]);
        days.insert(day2(), vec![bar(at(day2(), 9, 32), 3.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        assert!(stream.reader.refresh_source(day2()));
        stream.fill_forward_frontier = Some(at(day1(), 15, 59));

        let emitted = synthesize(&mut stream, NANOS_PER_MINUTE);
        // The missing close bar, then the first open minute of the next day;
        // nothing inside the overnight closure.
        assert_eq!(emitted, 2);
        assert_eq!(
            drain_times(&stream.bridge),
            vec![at(day1(), 16, 0), at(day2(), 9, 31)]
        );
    }

    #[test]
    fn extended_hours_fill_uses_the_extended_session() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute)
            .with_fill_forward(true)
            .with_extended_hours(true);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 19, 58), 1.0), bar(at(day1(), 20, 5), 2.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        stream.fill_forward_frontier = Some(at(day1(), 19, 58));

        let emitted = synthesize(&mut stream, NANOS_PER_MINUTE);
        // 19:59 and the inclusive 20:00 extended close; post-close minutes
        // are skipped without emission.
        assert_eq!(emitted, 2);
        assert_eq!(
            drain_times(&stream.bridge),
            vec![at(day1(), 19, 59), at(day1(), 20, 0)]
        );
    }

    #[test]
    fn frontier_primes_from_previous_when_unset() {
        let config = SubscriptionConfig::new("SPY", Resolution::Minute).with_fill_forward(true);
        let mut days = BTreeMap::new();
        days.insert(day1(), vec![bar(at(day1(), 9, 31), 1.0), bar(at(day1(), 9, 33), 2.0)]);
        let mut stream = stream_with(config, days);
        assert!(stream.reader.refresh_source(day1()));
        assert!(stream.reader.move_next());
        assert_eq!(stream.fill_forward_frontier, None);

        let emitted = synthesize(&mut stream, NANOS_PER_MINUTE);
        assert_eq!(emitted, 1);
        assert_eq!(drain_times(&stream.bridge), vec![at(day1(), 9, 32)]);
    }
}
