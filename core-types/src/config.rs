use chrono::NaiveDate;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SubscriptionConfig;

pub const DEFAULT_TOTAL_BRIDGE_MAX: usize = 500_000;

/// Application configuration for the orchestrator binary, loaded from
/// `config.toml` plus `APP_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub feed: FeedSettings,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("APP"))
            .build()?;
        settings.try_deserialize()
    }
}

/// Backtest window and reader location knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    pub data_dir: String,
    /// Inclusive first day, `YYYY-MM-DD`.
    pub period_start: String,
    /// Inclusive last day, `YYYY-MM-DD`.
    pub period_finish: String,
    #[serde(default = "default_total_bridge_max")]
    pub total_bridge_max: usize,
}

fn default_total_bridge_max() -> usize {
    DEFAULT_TOTAL_BRIDGE_MAX
}

impl FeedSettings {
    pub fn period_start_date(&self) -> Result<NaiveDate, PeriodError> {
        parse_date(&self.period_start)
    }

    pub fn period_finish_date(&self) -> Result<NaiveDate, PeriodError> {
        parse_date(&self.period_finish)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, PeriodError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| PeriodError::InvalidDate {
        value: value.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("invalid period date '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Resolution;
    use config::FileFormat;

    #[test]
    fn app_config_deserializes_subscriptions_from_toml() {
        let toml = r#"
            [feed]
            data_dir = "data"
            period_start = "2013-05-01"
            period_finish = "2013-05-03"

            [[subscriptions]]
            symbol = "SPY"
            resolution = "minute"
            fill_data_forward = true
            extended_market_hours = true

            [[subscriptions]]
            symbol = "AAPL"
            resolution = "tick"
        "#;
        let settings = Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        let app: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(app.feed.data_dir, "data");
        assert_eq!(app.feed.total_bridge_max, DEFAULT_TOTAL_BRIDGE_MAX);
        assert_eq!(app.subscriptions.len(), 2);
        assert_eq!(app.subscriptions[0].symbol, "SPY");
        assert_eq!(app.subscriptions[0].resolution, Resolution::Minute);
        assert!(app.subscriptions[0].fill_data_forward);
        assert!(app.subscriptions[0].extended_market_hours);
        assert_eq!(app.subscriptions[1].resolution, Resolution::Tick);
        assert!(!app.subscriptions[1].fill_data_forward);
        assert!(!app.subscriptions[1].extended_market_hours);
    }

    #[test]
    fn period_dates_parse() {
        let settings = FeedSettings {
            data_dir: "data".to_string(),
            period_start: "2013-05-01".to_string(),
            period_finish: "2013-05-03".to_string(),
            total_bridge_max: DEFAULT_TOTAL_BRIDGE_MAX,
        };
        assert_eq!(
            settings.period_start_date().unwrap(),
            NaiveDate::from_ymd_opt(2013, 5, 1).unwrap()
        );
        assert_eq!(
            settings.period_finish_date().unwrap(),
            NaiveDate::from_ymd_opt(2013, 5, 3).unwrap()
        );
    }

    #[test]
    fn malformed_period_date_is_rejected() {
        let settings = FeedSettings {
            data_dir: "data".to_string(),
            period_start: "05/01/2013".to_string(),
            period_finish: "2013-05-03".to_string(),
            total_bridge_max: DEFAULT_TOTAL_BRIDGE_MAX,
        };
        assert!(settings.period_start_date().is_err());
    }
}
