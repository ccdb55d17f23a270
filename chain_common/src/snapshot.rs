//! Read-only views of the option chain model served to dashboards.
//!
//! `ChainSnapshot` is the full model view; `ChartData` is the compact per-strike
//! volatility table for the current ladder. Both are plain copies taken under the
//! model lock, so readers never see a half-applied update.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::option_kind::OptionKind;
use crate::protocol::{QuoteData, UnderlyingQuote};

/// Subscription state of one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// No subscribe request issued.
    #[default]
    Unsubscribed,
    /// Request issued, nothing received yet.
    Pending,
    /// At least one push message received.
    Active,
}

/// Implied volatilities of one leg, in percent. `None` means unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Volatilities {
    /// Volatility implied by the last trade.
    pub last_price_volatility: Option<f64>,
    /// Volatility implied by the best bid.
    pub bid_volatility: Option<f64>,
    /// Volatility implied by the best ask.
    pub ask_volatility: Option<f64>,
}

/// Underlying part of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingSnapshot {
    /// Instrument code of the underlying.
    pub code: String,
    /// Quote feed status.
    pub status: FeedStatus,
    /// Latest quote, once received.
    pub quote: Option<UnderlyingQuote>,
}

/// One option leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSnapshot {
    /// Exchange instrument code.
    pub code: String,
    /// Listing fields of the contract.
    pub security: Map<String, Value>,
    /// Quote feed status.
    pub quotes_status: FeedStatus,
    /// Latest quote.
    pub quotes: Option<QuoteData>,
    /// Instrument feed status.
    pub instrument_status: FeedStatus,
    /// Latest instrument payload, verbatim.
    pub instrument: Option<Value>,
    /// Derived volatilities.
    pub volatilities: Volatilities,
}

impl LegSnapshot {
    /// Exchange theoretical volatility carried by the instrument payload.
    pub fn theoretical_volatility(&self) -> Option<f64> {
        self.instrument
            .as_ref()
            .and_then(|data| data.get("volatility"))
            .and_then(Value::as_f64)
    }
}

/// Both legs of one strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeSnapshot {
    /// Strike price.
    pub strike: i64,
    /// Call leg, if created.
    pub call: Option<LegSnapshot>,
    /// Put leg, if created.
    pub put: Option<LegSnapshot>,
}

/// Full model view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Underlying quote and feed status.
    pub underlying: UnderlyingSnapshot,
    /// Central strike of the current ladder.
    pub central_strike: Option<i64>,
    /// Current ladder, ascending; empty before the first underlying price.
    pub ladder: Vec<i64>,
    /// Every strike with a created leg, ascending.
    pub strikes: Vec<StrikeSnapshot>,
}

impl ChainSnapshot {
    /// Leg at `strike` of `kind`, if created.
    pub fn leg(&self, strike: i64, kind: OptionKind) -> Option<&LegSnapshot> {
        let row = self.strikes.iter().find(|row| row.strike == strike)?;
        match kind {
            OptionKind::Call => row.call.as_ref(),
            OptionKind::Put => row.put.as_ref(),
        }
    }
}

/// One row of the volatility chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    /// Strike price.
    pub strike: i64,
    /// Exchange theoretical volatility of the call.
    pub volatility: Option<f64>,
    /// Call volatilities.
    pub call: Volatilities,
    /// Put volatilities.
    pub put: Volatilities,
}

/// Volatility chart over the current ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Underlying last price.
    pub last_price: f64,
    /// Ladder strikes, ascending.
    pub strikes: Vec<ChartRow>,
}
