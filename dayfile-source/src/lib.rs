//! Per-day file sources for feed subscriptions.
//!
//! A [`SubscriptionReader`] is a cursor over one subscription's time-ordered
//! data points, rotated one source per tradeable day by the feed engine. The
//! trait is the only file-format boundary in the workspace; [`DayFileReader`]
//! is the shipped CSV implementation and [`ScriptedReader`] serves harnesses
//! and integration tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::vec::IntoIter;

use chrono::{Datelike, NaiveDate};
use core_types::types::{DataPoint, Resolution, SubscriptionConfig, Tick, TradeBar};
use log::warn;
use market_calendar::MarketCalendar;
use thiserror::Error;

/// Cursor over one subscription's per-day sources.
///
/// `refresh_source` opens the source for a date and loads the first point;
/// `move_next` advances the `(previous, current)` pair. On exhaustion the
/// end-of-stream latch is set and the cursor retains its last values so
/// fill-forward can keep cloning them; a later successful refresh clears the
/// latch.
pub trait SubscriptionReader: Send + Sync {
    /// Open the source for `date`. Returns true iff a source exists and its
    /// first data point is loaded into `current`.
    fn refresh_source(&mut self, date: NaiveDate) -> bool;

    /// Advance the cursor. On success `previous` takes the prior `current`.
    /// Returns false and latches end-of-stream once the day is exhausted.
    fn move_next(&mut self) -> bool;

    fn current(&self) -> Option<&DataPoint>;

    fn previous(&self) -> Option<&DataPoint>;

    fn end_of_stream(&self) -> bool;

    /// Regular-hours query bound to this subscription's symbol.
    fn market_open(&self, ts_ns: i64) -> bool;

    /// Extended-hours query bound to this subscription's symbol.
    fn extended_market_open(&self, ts_ns: i64) -> bool;

    /// Release buffers and handles. Idempotent.
    fn dispose(&mut self);
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("line {line}: expected {expected} fields, got {got}")]
    FieldCount {
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: invalid {field} '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// Reads `{data_dir}/{symbol}/{resolution}/{YYYY-MM-DD}.csv`.
///
/// Tick rows are `ts_ns,price,size`; bar rows are
/// `ts_ns,open,high,low,close,volume`. Malformed or time-regressing rows are
/// skipped with a warning; a missing file is a missing source, not an error.
pub struct DayFileReader {
    config: SubscriptionConfig,
    calendar: Arc<dyn MarketCalendar>,
    data_dir: PathBuf,
    pending: IntoIter<DataPoint>,
    current: Option<DataPoint>,
    previous: Option<DataPoint>,
    end_of_stream: bool,
}

impl DayFileReader {
    pub fn new(
        config: SubscriptionConfig,
        calendar: Arc<dyn MarketCalendar>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            calendar,
            data_dir: data_dir.into(),
            pending: Vec::new().into_iter(),
            current: None,
            previous: None,
            end_of_stream: false,
        }
    }

    pub fn source_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(&self.config.symbol)
            .join(self.config.resolution.as_str())
            .join(format!(
                "{:04}-{:02}-{:02}.csv",
                date.year(),
                date.month(),
                date.day()
            ))
    }

    fn parse_day(&self, path: &Path, contents: &str) -> Vec<DataPoint> {
        let mut points = Vec::new();
        let mut skipped = 0usize;
        let mut last_ts = i64::MIN;
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line, idx + 1, &self.config) {
                Ok(point) => {
                    if point.ts_ns() < last_ts {
                        skipped += 1;
                        continue;
                    }
                    last_ts = point.ts_ns();
                    points.push(point);
                }
                Err(err) => {
                    skipped += 1;
                    warn!(
                        "[{}/{}] {}: {}",
                        self.config.symbol,
                        self.config.resolution,
                        path.display(),
                        err
                    );
                }
            }
        }
        if skipped > 0 {
            warn!(
                "[{}/{}] skipped {} unusable row(s) in {}",
                self.config.symbol,
                self.config.resolution,
                skipped,
                path.display()
            );
        }
        points
    }
}

fn parse_line(line: &str, lineno: usize, config: &SubscriptionConfig) -> Result<DataPoint, SourceError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let expected = match config.resolution {
        Resolution::Tick => 3,
        _ => 6,
    };
    if fields.len() != expected {
        return Err(SourceError::FieldCount {
            line: lineno,
            expected,
            got: fields.len(),
        });
    }
    let ts_ns = parse_field::<i64>(fields[0], lineno, "ts_ns")?;
    match config.resolution {
        Resolution::Tick => Ok(DataPoint::Tick(Tick {
            symbol: config.symbol.clone(),
            ts_ns,
            price: parse_field(fields[1], lineno, "price")?,
            size: parse_field(fields[2], lineno, "size")?,
        })),
        _ => Ok(DataPoint::TradeBar(TradeBar {
            symbol: config.symbol.clone(),
            ts_ns,
            open: parse_field(fields[1], lineno, "open")?,
            high: parse_field(fields[2], lineno, "high")?,
            low: parse_field(fields[3], lineno, "low")?,
            close: parse_field(fields[4], lineno, "close")?,
            volume: parse_field(fields[5], lineno, "volume")?,
        })),
    }
}

fn parse_field<T: std::str::FromStr>(
    value: &str,
    line: usize,
    field: &'static str,
) -> Result<T, SourceError> {
    value.parse().map_err(|_| SourceError::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

impl SubscriptionReader for DayFileReader {
    fn refresh_source(&mut self, date: NaiveDate) -> bool {
        let path = self.source_path(date);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "[{}/{}] cannot read {}: {}",
                        self.config.symbol,
                        self.config.resolution,
                        path.display(),
                        err
                    );
                }
                self.end_of_stream = true;
                return false;
            }
        };
        let mut iter = self.parse_day(&path, &contents).into_iter();
        match iter.next() {
            Some(first) => {
                if let Some(prior) = self.current.take() {
                    self.previous = Some(prior);
                }
                self.current = Some(first);
                self.pending = iter;
                self.end_of_stream = false;
                true
            }
            None => {
                self.end_of_stream = true;
                false
            }
        }
    }

    fn move_next(&mut self) -> bool {
        match self.pending.next() {
            Some(next) => {
                if let Some(prior) = self.current.take() {
                    self.previous = Some(prior);
                }
                self.current = Some(next);
                true
            }
            None => {
                self.end_of_stream = true;
                false
            }
        }
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn previous(&self) -> Option<&DataPoint> {
        self.previous.as_ref()
    }

    fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    fn market_open(&self, ts_ns: i64) -> bool {
        self.calendar.market_open(&self.config.symbol, ts_ns)
    }

    fn extended_market_open(&self, ts_ns: i64) -> bool {
        self.calendar.extended_market_open(&self.config.symbol, ts_ns)
    }

    fn dispose(&mut self) {
        self.pending = Vec::new().into_iter();
        self.current = None;
        self.previous = None;
    }
}

/// In-memory reader with pre-scripted per-day data. Used by integration
/// tests and replay harnesses that do not want a filesystem.
pub struct ScriptedReader {
    config: SubscriptionConfig,
    calendar: Arc<dyn MarketCalendar>,
    days: BTreeMap<NaiveDate, Vec<DataPoint>>,
    pending: IntoIter<DataPoint>,
    current: Option<DataPoint>,
    previous: Option<DataPoint>,
    end_of_stream: bool,
}

impl ScriptedReader {
    pub fn new(
        config: SubscriptionConfig,
        calendar: Arc<dyn MarketCalendar>,
        days: BTreeMap<NaiveDate, Vec<DataPoint>>,
    ) -> Self {
        Self {
            config,
            calendar,
            days,
            pending: Vec::new().into_iter(),
            current: None,
            previous: None,
            end_of_stream: false,
        }
    }
}

impl SubscriptionReader for ScriptedReader {
    fn refresh_source(&mut self, date: NaiveDate) -> bool {
        let points = self.days.get(&date).cloned().unwrap_or_default();
        let mut iter = points.into_iter();
        match iter.next() {
            Some(first) => {
                if let Some(prior) = self.current.take() {
                    self.previous = Some(prior);
                }
                self.current = Some(first);
                self.pending = iter;
                self.end_of_stream = false;
                true
            }
            None => {
                self.end_of_stream = true;
                false
            }
        }
    }

    fn move_next(&mut self) -> bool {
        match self.pending.next() {
            Some(next) => {
                if let Some(prior) = self.current.take() {
                    self.previous = Some(prior);
                }
                self.current = Some(next);
                true
            }
            None => {
                self.end_of_stream = true;
                false
            }
        }
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn previous(&self) -> Option<&DataPoint> {
        self.previous.as_ref()
    }

    fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    fn market_open(&self, ts_ns: i64) -> bool {
        self.calendar.market_open(&self.config.symbol, ts_ns)
    }

    fn extended_market_open(&self, ts_ns: i64) -> bool {
        self.calendar.extended_market_open(&self.config.symbol, ts_ns)
    }

    fn dispose(&mut self) {
        self.pending = Vec::new().into_iter();
        self.current = None;
        self.previous = None;
    }
}
