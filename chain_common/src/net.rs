//! Shared networking constants and helpers used by the server and the dashboard client.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// TCP port of the snapshot endpoint.
pub const SNAPSHOT_PORT: u16 = 8090;

/// Helper to format an IPv4 address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

/// View requested from the snapshot endpoint.
///
/// The request is the view name as text (`model` or `chart`), optionally followed by a
/// newline.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    Eq,
    PartialEq,
)]
#[clap(rename_all = "lower")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SnapshotView {
    /// Full model snapshot.
    Model,
    /// Per-strike volatility chart.
    Chart,
}
