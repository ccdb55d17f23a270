//! Command-line arguments for the chain dashboard.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use chain_common::net::{SNAPSHOT_PORT, SnapshotView};
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the option chain server is running.
    #[clap(long, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// TCP port of the snapshot endpoint.
    #[clap(long, default_value_t = SNAPSHOT_PORT)]
    pub port: u16,

    /// View to fetch: the volatility table or the full model as JSON.
    #[clap(long, value_enum, default_value_t = SnapshotView::Chart)]
    pub view: SnapshotView,

    /// Refresh period in milliseconds; fetch once when absent.
    #[clap(long)]
    pub interval_ms: Option<u64>,
}
