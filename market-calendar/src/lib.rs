//! Trading calendar: tradeable-day enumeration and session predicates.
//!
//! The feed engine consumes this as an interface; [`WeekdayCalendar`] is the
//! shipped fixed-session implementation. Exchange-specific calendars with
//! holiday schedules plug in behind [`MarketCalendar`].

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use core_types::time::{date_of_ns, time_of_ns};

pub trait MarketCalendar: Send + Sync {
    /// Ascending dates in `[start, finish]` on which at least one of
    /// `symbols` trades.
    fn tradeable_days(
        &self,
        symbols: &[String],
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Box<dyn Iterator<Item = NaiveDate> + Send>;

    /// Regular-session predicate. Half-open on the left so that end-stamped
    /// bars resolve naturally: a timestamp equal to the session open is
    /// pre-open, one equal to the close is the last in-session bar.
    fn market_open(&self, symbol: &str, ts_ns: i64) -> bool;

    /// Regular plus pre/post session, same boundary convention.
    fn extended_market_open(&self, symbol: &str, ts_ns: i64) -> bool;
}

/// Intraday session boundaries applied to every tradeable day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub extended_open: NaiveTime,
    pub extended_close: NaiveTime,
}

impl SessionHours {
    /// US-equity template: 09:30-16:00 regular, 04:00-20:00 extended.
    pub fn us_equity() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            extended_open: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            extended_close: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        }
    }

    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open,
            close,
            extended_open: open,
            extended_close: close,
        }
    }

    pub fn with_extended(mut self, open: NaiveTime, close: NaiveTime) -> Self {
        self.extended_open = open;
        self.extended_close = close;
        self
    }

    fn in_regular(&self, t: NaiveTime) -> bool {
        self.open < t && t <= self.close
    }

    fn in_extended(&self, t: NaiveTime) -> bool {
        self.extended_open < t && t <= self.extended_close
    }
}

/// Fixed-session calendar: every Monday-Friday is tradeable, with the same
/// hours for all symbols.
#[derive(Clone, Debug)]
pub struct WeekdayCalendar {
    hours: SessionHours,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self {
            hours: SessionHours::us_equity(),
        }
    }

    pub fn with_hours(mut self, hours: SessionHours) -> Self {
        self.hours = hours;
        self
    }

    pub fn hours(&self) -> SessionHours {
        self.hours
    }
}

impl Default for WeekdayCalendar {
    fn default() -> Self {
        Self::new()
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl MarketCalendar for WeekdayCalendar {
    fn tradeable_days(
        &self,
        _symbols: &[String],
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Box<dyn Iterator<Item = NaiveDate> + Send> {
        Box::new(
            start
                .iter_days()
                .take_while(move |date| *date <= finish)
                .filter(|date| is_weekday(*date)),
        )
    }

    fn market_open(&self, _symbol: &str, ts_ns: i64) -> bool {
        is_weekday(date_of_ns(ts_ns)) && self.hours.in_regular(time_of_ns(ts_ns))
    }

    fn extended_market_open(&self, _symbol: &str, ts_ns: i64) -> bool {
        is_weekday(date_of_ns(ts_ns)) && self.hours.in_extended(time_of_ns(ts_ns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::time::{date_start_ns, NANOS_PER_HOUR, NANOS_PER_MINUTE};

    fn wednesday() -> NaiveDate {
        // 2013-05-01 was a Wednesday.
        NaiveDate::from_ymd_opt(2013, 5, 1).unwrap()
    }

    fn at(date: NaiveDate, hour: i64, minute: i64) -> i64 {
        date_start_ns(date) + hour * NANOS_PER_HOUR + minute * NANOS_PER_MINUTE
    }

    #[test]
    fn tradeable_days_skip_weekends() {
        let cal = WeekdayCalendar::new();
        let days: Vec<NaiveDate> = cal
            .tradeable_days(
                &["SPY".to_string()],
                NaiveDate::from_ymd_opt(2013, 5, 3).unwrap(),
                NaiveDate::from_ymd_opt(2013, 5, 7).unwrap(),
            )
            .collect();
        // Fri, Mon, Tue; Sat/Sun excluded.
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2013, 5, 3).unwrap(),
                NaiveDate::from_ymd_opt(2013, 5, 6).unwrap(),
                NaiveDate::from_ymd_opt(2013, 5, 7).unwrap(),
            ]
        );
    }

    #[test]
    fn session_boundaries_are_left_open() {
        let cal = WeekdayCalendar::new();
        let day = wednesday();
        assert!(!cal.market_open("SPY", at(day, 9, 30)));
        assert!(cal.market_open("SPY", at(day, 9, 31)));
        assert!(cal.market_open("SPY", at(day, 16, 0)));
        assert!(!cal.market_open("SPY", at(day, 16, 1)));
    }

    #[test]
    fn extended_session_covers_pre_and_post() {
        let cal = WeekdayCalendar::new();
        let day = wednesday();
        assert!(cal.extended_market_open("SPY", at(day, 4, 1)));
        assert!(cal.extended_market_open("SPY", at(day, 19, 59)));
        assert!(!cal.extended_market_open("SPY", at(day, 20, 1)));
        assert!(!cal.market_open("SPY", at(day, 4, 1)));
    }

    #[test]
    fn weekends_are_closed_at_any_time() {
        let cal = WeekdayCalendar::new();
        let saturday = NaiveDate::from_ymd_opt(2013, 5, 4).unwrap();
        assert!(!cal.market_open("SPY", at(saturday, 12, 0)));
        assert!(!cal.extended_market_open("SPY", at(saturday, 12, 0)));
    }
}
