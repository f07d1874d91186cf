use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::{
    NANOS_PER_DAY, NANOS_PER_HOUR, NANOS_PER_MILLI, NANOS_PER_MINUTE, NANOS_PER_SECOND,
};

/// Cadence at which a subscription produces data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// Bar period in nanoseconds. Ticks have no bar period.
    pub fn bar_increment_ns(&self) -> Option<i64> {
        match self {
            Resolution::Tick => None,
            Resolution::Second => Some(NANOS_PER_SECOND),
            Resolution::Minute => Some(NANOS_PER_MINUTE),
            Resolution::Hour => Some(NANOS_PER_HOUR),
            Resolution::Daily => Some(NANOS_PER_DAY),
        }
    }

    /// Step used for merge-frontier advancement. Ticks contribute one
    /// millisecond so tick streams interleave at sub-second granularity.
    pub fn frontier_increment_ns(&self) -> i64 {
        self.bar_increment_ns().unwrap_or(NANOS_PER_MILLI)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Tick => "tick",
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "tick" => Ok(Resolution::Tick),
            "second" => Ok(Resolution::Second),
            "minute" => Ok(Resolution::Minute),
            "hour" => Ok(Resolution::Hour),
            "daily" | "day" => Ok(Resolution::Daily),
            other => Err(ParseResolutionError {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resolution '{value}'")]
pub struct ParseResolutionError {
    pub value: String,
}

/// Immutable description of one feed subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub symbol: String,
    pub resolution: Resolution,
    #[serde(default)]
    pub fill_data_forward: bool,
    #[serde(default)]
    pub extended_market_hours: bool,
}

impl SubscriptionConfig {
    pub fn new(symbol: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            symbol: symbol.into(),
            resolution,
            fill_data_forward: false,
            extended_market_hours: false,
        }
    }

    pub fn with_fill_forward(mut self, enabled: bool) -> Self {
        self.fill_data_forward = enabled;
        self
    }

    pub fn with_extended_hours(mut self, enabled: bool) -> Self {
        self.extended_market_hours = enabled;
        self
    }
}

/// Single trade print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub ts_ns: i64,
    pub price: f64,
    pub size: u32,
}

/// OHLCV bar. Timestamps are end-of-period stamps: a one-minute bar stamped
/// 09:31 covers 09:30-09:31.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeBar {
    pub symbol: String,
    pub ts_ns: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Top-of-book bar, end-of-period stamped like [`TradeBar`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteBar {
    pub symbol: String,
    pub ts_ns: i64,
    pub bid: f64,
    pub ask: f64,
    pub bid_sz: u32,
    pub ask_sz: u32,
}

/// One element of a feed stream. Tagged variants instead of a subtype
/// hierarchy; fill-forward clones a point and restamps its time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataPoint {
    Tick(Tick),
    TradeBar(TradeBar),
    QuoteBar(QuoteBar),
}

impl DataPoint {
    pub fn ts_ns(&self) -> i64 {
        match self {
            DataPoint::Tick(t) => t.ts_ns,
            DataPoint::TradeBar(b) => b.ts_ns,
            DataPoint::QuoteBar(q) => q.ts_ns,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            DataPoint::Tick(t) => &t.symbol,
            DataPoint::TradeBar(b) => &b.symbol,
            DataPoint::QuoteBar(q) => &q.symbol,
        }
    }

    /// Deep clone carrying the synthesized timestamp. Payload is preserved.
    pub fn with_ts_ns(&self, ts_ns: i64) -> DataPoint {
        let mut cloned = self.clone();
        match &mut cloned {
            DataPoint::Tick(t) => t.ts_ns = ts_ns,
            DataPoint::TradeBar(b) => b.ts_ns = ts_ns,
            DataPoint::QuoteBar(q) => q.ts_ns = ts_ns,
        }
        cloned
    }
}
