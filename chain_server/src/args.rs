//! Command-line arguments for the option chain server.
//!
//! This module defines the CLI interface using `clap` and its conversion into the
//! validated `ChainConfig`. See `main` for end-to-end usage.
use crate::config::{ChainConfig, RetentionPolicy};
use chain_common::net::SNAPSHOT_PORT;
use chain_common::{ChainError, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Expiry instant of the option series, RFC 3339 (e.g. 2024-03-21T18:50:00+03:00).
    #[clap(long)]
    pub expiry: String,

    /// Path to the series listing (exchange ISS securities JSON).
    #[clap(long, default_value = "data/series.json")]
    pub series: String,

    /// Instrument code of the underlying future.
    #[clap(long, default_value = "SiH4")]
    pub underlying_code: String,

    /// Distance between neighbouring strikes.
    #[clap(long, default_value_t = 1000)]
    pub strike_step: i64,

    /// Number of strikes on the ladder; must be odd.
    #[clap(long, default_value_t = 11)]
    pub strike_count: usize,

    /// Period of the volatility recomputation loop, in milliseconds.
    #[clap(long, default_value_t = 1000)]
    pub recompute_interval_ms: u64,

    /// What happens to the feeds of strikes leaving the ladder.
    #[clap(long, value_enum, default_value_t = RetentionPolicy::Keep)]
    pub retention: RetentionPolicy,

    /// TCP port of the snapshot endpoint.
    #[clap(long, default_value_t = SNAPSHOT_PORT)]
    pub snapshot_port: u16,

    /// Initial underlying price of the simulated exchange.
    #[clap(long, default_value_t = 100000.0)]
    pub simulator_price: f64,

    /// Push cadence of the simulated exchange, in milliseconds.
    #[clap(long, default_value_t = 500)]
    pub simulator_interval_ms: u64,
}

impl Args {
    /// Parsed expiry instant.
    pub fn expiry(&self) -> Result<DateTime<Utc>> {
        let raw = self.expiry.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|expiry| expiry.with_timezone(&Utc))
            .map_err(|e| ChainError::Config(format!("invalid expiry {:?}: {}", raw, e)))
    }
}

impl TryFrom<&Args> for ChainConfig {
    type Error = ChainError;

    fn try_from(args: &Args) -> Result<Self> {
        ChainConfig::new(
            args.underlying_code.trim(),
            args.strike_step,
            args.strike_count,
            args.expiry()?,
        )?
        .with_retention(args.retention)
        .with_recompute_interval(Duration::from_millis(args.recompute_interval_ms))
    }
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
pub fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}
