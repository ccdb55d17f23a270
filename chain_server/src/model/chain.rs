//! Option chain model: the underlying quote, the current strike ladder and every option
//! leg created so far, together with the registry correlating subscriptions to them.
//!
//! Each leg has two independent feeds (quotes and instrument). A feed is either absent
//! (not subscribed), `Pending` (request issued, registry entry recorded) or `Active`
//! (first push message received). Legs are created the first time the ladder includes
//! their strike and are never removed.
//!
//! The model is plain data; `ChainEngine` owns the only instance behind its lock and
//! implements the transitions.

use std::collections::BTreeMap;

use chain_common::OptionKind;
use chain_common::protocol::{QuoteData, SubscriptionId, UnderlyingQuote};
use chain_common::series::SeriesEntry;
use chain_common::snapshot::{
    ChainSnapshot, ChartData, ChartRow, FeedStatus, LegSnapshot, StrikeSnapshot,
    UnderlyingSnapshot, Volatilities,
};
use serde_json::{Map, Value};

use crate::model::ladder::StrikeLadder;
use crate::model::registry::SubscriptionRegistry;

/// Address of an option leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegKey {
    /// Strike price.
    pub strike: i64,
    /// Call or put.
    pub kind: OptionKind,
}

impl LegKey {
    /// Key of the `kind` leg at `strike`.
    pub fn new(strike: i64, kind: OptionKind) -> Self {
        Self { strike, kind }
    }
}

/// Subscription state of one feed; holds the latest payload once active.
#[derive(Debug, Clone, PartialEq)]
pub enum Feed<T> {
    /// Request issued under this id, nothing received yet.
    Pending(SubscriptionId),
    /// Receiving data.
    Active {
        /// Subscription id.
        id: SubscriptionId,
        /// Latest payload.
        data: T,
    },
}

impl<T> Feed<T> {
    /// Subscription id of the feed.
    pub fn id(&self) -> &SubscriptionId {
        match self {
            Feed::Pending(id) => id,
            Feed::Active { id, .. } => id,
        }
    }

    /// Consumes the feed, keeping its id.
    pub fn into_id(self) -> SubscriptionId {
        match self {
            Feed::Pending(id) => id,
            Feed::Active { id, .. } => id,
        }
    }

    /// Latest payload, once active.
    pub fn data(&self) -> Option<&T> {
        match self {
            Feed::Pending(_) => None,
            Feed::Active { data, .. } => Some(data),
        }
    }

    /// `true` once a push message has been received.
    pub fn is_active(&self) -> bool {
        matches!(self, Feed::Active { .. })
    }

    /// Stores `data`, activating a pending feed. Returns the replaced payload.
    pub fn update(&mut self, data: T) -> Option<T> {
        match self {
            Feed::Pending(id) => {
                let id = id.clone();
                *self = Feed::Active { id, data };
                None
            }
            Feed::Active { data: current, .. } => Some(std::mem::replace(current, data)),
        }
    }
}

/// Status of an optional feed.
pub fn feed_status<T>(feed: Option<&Feed<T>>) -> FeedStatus {
    match feed {
        None => FeedStatus::Unsubscribed,
        Some(Feed::Pending(_)) => FeedStatus::Pending,
        Some(Feed::Active { .. }) => FeedStatus::Active,
    }
}

/// One option contract tracked by the model.
#[derive(Debug, Clone)]
pub struct OptionLeg {
    /// Exchange instrument code.
    pub code: String,
    /// Listing fields of the contract.
    pub security: Map<String, Value>,
    /// Quotes feed.
    pub quotes: Option<Feed<QuoteData>>,
    /// Instrument feed; the payload is kept verbatim.
    pub instrument: Option<Feed<Value>>,
    /// Derived volatilities.
    pub volatilities: Volatilities,
}

impl OptionLeg {
    /// Unsubscribed leg for a listed contract.
    pub fn from_entry(entry: &SeriesEntry) -> Self {
        Self {
            code: entry.code.clone(),
            security: entry.fields.clone(),
            quotes: None,
            instrument: None,
            volatilities: Volatilities::default(),
        }
    }

    /// Latest quote, once the quotes feed is active.
    pub fn quote(&self) -> Option<&QuoteData> {
        self.quotes.as_ref().and_then(Feed::data)
    }

    fn snapshot(&self) -> LegSnapshot {
        LegSnapshot {
            code: self.code.clone(),
            security: self.security.clone(),
            quotes_status: feed_status(self.quotes.as_ref()),
            quotes: self.quote().cloned(),
            instrument_status: feed_status(self.instrument.as_ref()),
            instrument: self.instrument.as_ref().and_then(Feed::data).cloned(),
            volatilities: self.volatilities,
        }
    }
}

/// The option chain aggregate.
#[derive(Debug, Default)]
pub struct ChainModel {
    /// Underlying quotes feed.
    pub underlying: Option<Feed<UnderlyingQuote>>,
    /// Current ladder; `None` before the first underlying price.
    pub ladder: Option<StrikeLadder>,
    /// Every leg created so far.
    pub legs: BTreeMap<LegKey, OptionLeg>,
    /// Subscription id correlation.
    pub registry: SubscriptionRegistry,
}

impl ChainModel {
    /// Empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying last price, once received.
    pub fn underlying_price(&self) -> Option<f64> {
        self.underlying
            .as_ref()
            .and_then(Feed::data)
            .map(|quote| quote.last_price)
    }

    /// Full copy of the model for readers.
    pub fn snapshot(&self, underlying_code: &str) -> ChainSnapshot {
        let mut strikes: Vec<StrikeSnapshot> = Vec::new();
        for (key, leg) in &self.legs {
            if strikes.last().is_none_or(|row| row.strike != key.strike) {
                strikes.push(StrikeSnapshot {
                    strike: key.strike,
                    call: None,
                    put: None,
                });
            }
            if let Some(row) = strikes.last_mut() {
                match key.kind {
                    OptionKind::Call => row.call = Some(leg.snapshot()),
                    OptionKind::Put => row.put = Some(leg.snapshot()),
                }
            }
        }

        ChainSnapshot {
            underlying: UnderlyingSnapshot {
                code: underlying_code.to_string(),
                status: feed_status(self.underlying.as_ref()),
                quote: self.underlying.as_ref().and_then(Feed::data).copied(),
            },
            central_strike: self.ladder.as_ref().map(StrikeLadder::central),
            ladder: self
                .ladder
                .as_ref()
                .map(|ladder| ladder.strikes().to_vec())
                .unwrap_or_default(),
            strikes,
        }
    }

    /// Volatility chart over the current ladder; `None` until a price and ladder exist.
    pub fn chart(&self) -> Option<ChartData> {
        let last_price = self.underlying_price()?;
        let ladder = self.ladder.as_ref()?;

        let strikes = ladder
            .strikes()
            .iter()
            .map(|&strike| {
                let call = self.legs.get(&LegKey::new(strike, OptionKind::Call));
                let put = self.legs.get(&LegKey::new(strike, OptionKind::Put));
                ChartRow {
                    strike,
                    volatility: call
                        .and_then(|leg| leg.instrument.as_ref())
                        .and_then(Feed::data)
                        .and_then(|data| data.get("volatility"))
                        .and_then(Value::as_f64),
                    call: call.map(|leg| leg.volatilities).unwrap_or_default(),
                    put: put.map(|leg| leg.volatilities).unwrap_or_default(),
                }
            })
            .collect();

        Some(ChartData {
            last_price,
            strikes,
        })
    }
}
