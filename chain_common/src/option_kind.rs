//! Option kind (call/put) shared between server and client.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Kind of an option contract.
///
/// Serialized with the exchange's single-letter codes (`C`/`P`); parsing also accepts
/// the spelled-out names.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
)]
#[strum(ascii_case_insensitive)]
pub enum OptionKind {
    /// Right to buy the underlying at the strike.
    #[serde(rename = "C")]
    #[strum(to_string = "C", serialize = "call")]
    Call,
    /// Right to sell the underlying at the strike.
    #[serde(rename = "P")]
    #[strum(to_string = "P", serialize = "put")]
    Put,
}

impl OptionKind {
    /// Both kinds, calls first.
    pub const ALL: [OptionKind; 2] = [OptionKind::Call, OptionKind::Put];

    /// Intrinsic value at the given underlying price.
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionKind::Call => (spot - strike).max(0.0),
            OptionKind::Put => (strike - spot).max(0.0),
        }
    }
}
