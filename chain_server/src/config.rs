//! Immutable engine parameters.

use std::time::Duration;

use chain_common::{ChainError, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use strum_macros::{Display, EnumString};

/// What happens to the feeds of legs that leave the ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Display, EnumString)]
#[clap(rename_all = "lower")]
#[strum(serialize_all = "lowercase")]
pub enum RetentionPolicy {
    /// Feeds keep running, so a strike re-entering the ladder costs no resubscription.
    #[default]
    Keep,
    /// Feeds are unsubscribed and the leg returns to not-subscribed.
    Release,
}

/// Engine parameters, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Instrument code of the underlying.
    pub underlying_code: String,
    /// Distance between neighbouring strikes.
    pub strike_step: i64,
    /// Number of strikes on the ladder (odd).
    pub strike_count: usize,
    /// Expiry instant of the option series.
    pub expiry: DateTime<Utc>,
    /// Period of the recomputation loop.
    pub recompute_interval: Duration,
    /// Feed retention for legs leaving the ladder.
    pub retention: RetentionPolicy,
}

impl ChainConfig {
    /// Validated configuration with a one-second recomputation interval and `Keep` retention.
    pub fn new(
        underlying_code: impl Into<String>,
        strike_step: i64,
        strike_count: usize,
        expiry: DateTime<Utc>,
    ) -> Result<Self> {
        let config = Self {
            underlying_code: underlying_code.into(),
            strike_step,
            strike_count,
            expiry,
            recompute_interval: Duration::from_secs(1),
            retention: RetentionPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replaces the retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Replaces the recomputation interval.
    pub fn with_recompute_interval(mut self, interval: Duration) -> Result<Self> {
        self.recompute_interval = interval;
        self.validate()?;
        Ok(self)
    }

    /// Checks every parameter.
    pub fn validate(&self) -> Result<()> {
        if self.underlying_code.trim().is_empty() {
            return Err(ChainError::Config("underlying code is empty".to_string()));
        }
        if self.strike_step <= 0 {
            return Err(ChainError::Config(format!(
                "strike step must be positive, got {}",
                self.strike_step
            )));
        }
        if self.strike_count == 0 || self.strike_count % 2 == 0 {
            return Err(ChainError::Config(format!(
                "strike count must be odd, got {}",
                self.strike_count
            )));
        }
        if self.recompute_interval.is_zero() {
            return Err(ChainError::Config(
                "recompute interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 21, 15, 50, 0).unwrap()
    }

    #[test]
    fn accepts_odd_count_and_positive_step() {
        let config = ChainConfig::new("SiH4", 1000, 11, expiry()).unwrap();
        assert_eq!(config.retention, RetentionPolicy::Keep);
        assert_eq!(config.recompute_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_invalid_ladder_shape() {
        assert!(matches!(
            ChainConfig::new("SiH4", 1000, 10, expiry()),
            Err(ChainError::Config(_))
        ));
        assert!(ChainConfig::new("SiH4", 0, 11, expiry()).is_err());
        assert!(ChainConfig::new("SiH4", 1000, 0, expiry()).is_err());
        assert!(ChainConfig::new(" ", 1000, 11, expiry()).is_err());
    }

    #[test]
    fn rejects_zero_interval() {
        let config = ChainConfig::new("SiH4", 1000, 11, expiry()).unwrap();
        assert!(config.with_recompute_interval(Duration::ZERO).is_err());
    }

    #[test]
    fn retention_parses_from_text() {
        assert_eq!("release".parse::<RetentionPolicy>().unwrap(), RetentionPolicy::Release);
        assert_eq!(RetentionPolicy::Keep.to_string(), "keep");
    }
}
