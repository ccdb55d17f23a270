#![allow(dead_code)]

use std::sync::Arc;

use chain_common::OptionKind;
use chain_common::protocol::{FeedKind, OutboundRequest, SubscriptionId};
use chain_common::series::{OptionSeries, SeriesEntry};
use chain_server::engine::{ChainEngine, EventOutcome};
use chain_server::model::clock::ManualClock;
use chain_server::{ChainConfig, RetentionPolicy};
use chrono::{DateTime, Duration, TimeZone, Utc};
use crossbeam_channel::{Receiver, unbounded};
use serde_json::{Value, json};

pub const UNDERLYING: &str = "SiH4";
pub const STEP: i64 = 1000;
pub const COUNT: usize = 11;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap()
}

pub fn code(strike: i64, kind: OptionKind) -> String {
    format!("Si{strike}{kind}")
}

/// Listed strikes 90000..=112000, both kinds.
pub fn series() -> OptionSeries {
    OptionSeries::from_entries((90..=112).flat_map(|k| {
        OptionKind::ALL.into_iter().map(move |kind| {
            let strike = k * 1000;
            SeriesEntry::new(code(strike, kind), strike, kind)
        })
    }))
}

pub fn underlying_quote(price: f64) -> Value {
    json!({
        "last_price": price,
        "last_price_timestamp": 1708430400,
        "bid": price - 1.0,
        "ask": price + 1.0,
    })
}

/// Engine over a manual clock with its outbound channel captured.
pub struct Harness {
    pub engine: Arc<ChainEngine>,
    pub clock: Arc<ManualClock>,
    outbound: Receiver<OutboundRequest>,
    pub sent: Vec<OutboundRequest>,
}

impl Harness {
    pub fn new(retention: RetentionPolicy) -> Self {
        let config = ChainConfig::new(UNDERLYING, STEP, COUNT, start_time() + Duration::days(30))
            .unwrap()
            .with_retention(retention);
        let clock = Arc::new(ManualClock::new(start_time()));
        let (tx, rx) = unbounded();
        let engine = Arc::new(ChainEngine::new(config, series(), clock.clone(), tx));
        Self {
            engine,
            clock,
            outbound: rx,
            sent: Vec::new(),
        }
    }

    /// Requests enqueued since the previous drain.
    pub fn drain(&mut self) -> Vec<OutboundRequest> {
        let fresh: Vec<OutboundRequest> = self.outbound.try_iter().collect();
        self.sent.extend(fresh.iter().cloned());
        fresh
    }

    /// Id of the latest subscribe request for `code` and `feed`.
    pub fn id_of(&mut self, code: &str, feed: FeedKind) -> SubscriptionId {
        self.drain();
        self.sent
            .iter()
            .rev()
            .find(|r| r.code.as_deref() == Some(code) && r.feed() == Some(feed))
            .map(|r| r.guid.clone())
            .unwrap_or_else(|| panic!("no {feed:?} subscription for {code}"))
    }

    pub fn leg_id(&mut self, strike: i64, kind: OptionKind, feed: FeedKind) -> SubscriptionId {
        self.id_of(&code(strike, kind), feed)
    }

    pub fn push(&self, id: &SubscriptionId, payload: Value) -> EventOutcome {
        self.engine.submit_inbound_event(id, &payload).unwrap()
    }

    /// Subscribes the underlying and delivers its first price.
    pub fn start(&mut self, price: f64) -> EventOutcome {
        self.engine.subscribe_underlying().unwrap().unwrap();
        let id = self.id_of(UNDERLYING, FeedKind::Quotes);
        self.push(&id, underlying_quote(price))
    }

    pub fn move_underlying(&mut self, price: f64) -> EventOutcome {
        let id = self.id_of(UNDERLYING, FeedKind::Quotes);
        self.push(&id, underlying_quote(price))
    }
}
