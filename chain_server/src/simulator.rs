//! Simulated exchange standing in for the push transport.
//!
//! The `ExchangeSimulator` runs a background thread that drains the engine's outbound
//! request channel and, on a fixed cadence, pushes JSON envelopes for every live
//! subscription onto the inbound channel:
//! - the underlying moves by a small random walk around its last price;
//! - options are priced with Black-Scholes at a smile volatility, with noise on the
//!   mid, a spread around it and an occasional new last trade;
//! - instrument payloads carry the smile volatility in percent as `volatility`.
//!
//! Unsubscribe requests stop the corresponding stream. Codes missing from the series
//! listing (other than the underlying) receive nothing.

use crate::model::volatility::{VolatilitySolver, black_price};
use chain_common::protocol::{FeedKind, InboundMessage, OutboundRequest, SubscriptionId};
use chain_common::series::OptionSeries;
use chain_common::{ChainError, OptionKind, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, select, tick};
use log::{debug, error, info, warn};
use rand::Rng;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const BASE_VOLATILITY: f64 = 0.15;
const SMILE_CURVATURE: f64 = 2.0;
const TRADE_PROBABILITY: f64 = 0.2;

/// Parameters of the simulated market.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Code of the underlying instrument.
    pub underlying_code: String,
    /// Starting underlying price.
    pub initial_price: f64,
    /// Expiry of the listed options.
    pub expiry: DateTime<Utc>,
    /// Period between two publication rounds.
    pub interval: Duration,
}

#[derive(Debug, Clone)]
struct Subscription {
    code: String,
    feed: FeedKind,
}

/// Background market that answers subscribe requests with synthetic push messages.
pub struct ExchangeSimulator {
    config: SimulatorConfig,
    contracts: HashMap<String, (i64, OptionKind)>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    last_trades: HashMap<String, f64>,
    price: f64,
}

/// Next underlying price: a uniform step within `[-0.1%, +0.1%]`, kept positive.
pub fn next_price(current_price: f64) -> f64 {
    let mut rng = rand::rng();
    let change: f64 = rng.random_range(-0.001..0.001);
    (current_price * (1.0 + change)).max(0.01)
}

/// Annualised smile volatility at `strike` for an underlying at `spot`.
pub fn smile_volatility(spot: f64, strike: f64) -> f64 {
    let moneyness = (strike / spot).ln();
    BASE_VOLATILITY + SMILE_CURVATURE * moneyness * moneyness
}

impl ExchangeSimulator {
    /// Simulator quoting the contracts of `series`.
    pub fn new(config: SimulatorConfig, series: &OptionSeries) -> Self {
        let contracts = series
            .iter()
            .map(|entry| (entry.code.clone(), (entry.strike, entry.kind)))
            .collect();
        Self {
            price: config.initial_price,
            config,
            contracts,
            subscriptions: HashMap::new(),
            last_trades: HashMap::new(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Start the simulator thread.
    ///
    /// The thread stops on shutdown, when the engine drops the request channel or when
    /// the inbound side is closed.
    pub fn start(
        mut self,
        requests: Receiver<OutboundRequest>,
        inbound: Sender<String>,
        shutdown: Receiver<()>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let ticks = tick(self.config.interval);
            info!(
                "Exchange simulator started (Thread ID: {:?})",
                thread::current().id()
            );

            loop {
                select! {
                    recv(shutdown) -> _ => break,
                    recv(requests) -> request => match request {
                        Ok(request) => self.accept(request),
                        Err(_) => break,
                    },
                    recv(ticks) -> _ => {
                        if let Err(e) = self.publish(&inbound) {
                            error!("Exchange simulator failed to publish: {}", e);
                            break;
                        }
                    }
                }
            }
            info!("Exchange simulator stopping...");
        })
    }

    /// Records a subscribe request or drops the stream an unsubscribe names.
    pub fn accept(&mut self, request: OutboundRequest) {
        match (request.feed(), request.code) {
            (Some(feed), Some(code)) => {
                debug!("Simulator: {:?} stream for {} under {}", feed, code, request.guid);
                self.subscriptions
                    .insert(request.guid, Subscription { code, feed });
            }
            (Some(_), None) => warn!("Ignoring subscribe request {} without code", request.guid),
            (None, _) => {
                self.subscriptions.remove(&request.guid);
            }
        }
    }

    /// Moves the market one step and pushes a message for every live subscription.
    /// Returns the number of messages sent.
    pub fn publish(&mut self, inbound: &Sender<String>) -> Result<usize> {
        self.price = next_price(self.price);
        let now = Utc::now();
        let years = VolatilitySolver::new(self.config.expiry).years_to_expiry(now);

        let mut messages = Vec::with_capacity(self.subscriptions.len());
        let subscriptions: Vec<(SubscriptionId, Subscription)> = self
            .subscriptions
            .iter()
            .map(|(id, sub)| (id.clone(), sub.clone()))
            .collect();
        for (guid, subscription) in subscriptions {
            if let Some(data) = self.payload(&subscription, now, years) {
                messages.push(InboundMessage { guid, data }.to_json()?);
            }
        }

        let sent = messages.len();
        for message in messages {
            inbound
                .send(message)
                .map_err(|e| ChainError::ChannelSend(e.to_string()))?;
        }
        Ok(sent)
    }

    fn payload(&mut self, subscription: &Subscription, now: DateTime<Utc>, years: f64) -> Option<Value> {
        let spot = self.price.round();
        if subscription.code == self.config.underlying_code {
            return Some(json!({
                "last_price": spot,
                "last_price_timestamp": now.timestamp(),
                "bid": spot - 1.0,
                "ask": spot + 1.0,
            }));
        }

        let &(strike, kind) = self.contracts.get(&subscription.code)?;
        let vol = smile_volatility(spot, strike as f64);
        let theoretical = black_price(spot, strike as f64, vol, years, kind);

        match subscription.feed {
            FeedKind::Instrument => Some(json!({
                "symbol": subscription.code,
                "strikePrice": strike,
                "optionSide": kind.to_string(),
                "theorPrice": theoretical.round(),
                "volatility": vol * 100.0,
            })),
            FeedKind::Quotes => {
                let mut rng = rand::rng();
                let mid = theoretical * (1.0 + rng.random_range(-0.02..0.02));
                let half_spread = (mid * 0.03).max(1.0);
                if rng.random_bool(TRADE_PROBABILITY) {
                    self.last_trades.insert(subscription.code.clone(), mid.round());
                }
                let last = self.last_trades.get(&subscription.code).copied();
                Some(json!({
                    "last_price": last,
                    "last_price_timestamp": last.map(|_| now.timestamp()),
                    "bid": (mid - half_spread).max(0.0).round(),
                    "ask": (mid + half_spread).round(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_common::series::SeriesEntry;
    use crossbeam_channel::unbounded;

    fn simulator() -> ExchangeSimulator {
        let series = OptionSeries::from_entries([
            SeriesEntry::new("Si100000C", 100000, OptionKind::Call),
            SeriesEntry::new("Si100000P", 100000, OptionKind::Put),
        ]);
        let config = SimulatorConfig {
            underlying_code: "SiH4".to_string(),
            initial_price: 100000.0,
            expiry: Utc::now() + chrono::Duration::days(30),
            interval: Duration::from_millis(10),
        };
        ExchangeSimulator::new(config, &series)
    }

    #[test]
    fn random_walk_stays_close() {
        for _ in 0..100 {
            let price = next_price(100000.0);
            assert!((99899.0..=100101.0).contains(&price), "{price}");
        }
    }

    #[test]
    fn smile_is_lowest_at_the_money() {
        assert_eq!(smile_volatility(100000.0, 100000.0), BASE_VOLATILITY);
        assert!(smile_volatility(100000.0, 90000.0) > BASE_VOLATILITY);
        assert!(smile_volatility(100000.0, 110000.0) > BASE_VOLATILITY);
    }

    #[test]
    fn publishes_one_message_per_known_subscription() {
        let mut sim = simulator();
        let (tx, rx) = unbounded();
        let underlying = SubscriptionId::from("u");
        sim.accept(OutboundRequest::subscribe(FeedKind::Quotes, "SiH4", underlying.clone()));
        sim.accept(OutboundRequest::subscribe(FeedKind::Instrument, "Si100000C", SubscriptionId::from("i")));
        sim.accept(OutboundRequest::subscribe(FeedKind::Quotes, "Si999999C", SubscriptionId::from("x")));
        assert_eq!(sim.subscriptions(), 3);

        assert_eq!(sim.publish(&tx).unwrap(), 2);
        let messages: Vec<InboundMessage> = rx
            .try_iter()
            .map(|text| InboundMessage::from_json(&text).unwrap().unwrap())
            .collect();
        let quote = messages.iter().find(|m| m.guid == underlying).unwrap();
        assert!(quote.data["last_price"].as_f64().unwrap() > 0.0);
        let instrument = messages.iter().find(|m| m.guid.as_str() == "i").unwrap();
        assert!((instrument.data["volatility"].as_f64().unwrap() - 15.0).abs() < 1.0);
    }

    #[test]
    fn unsubscribe_stops_the_stream() {
        let mut sim = simulator();
        let (tx, rx) = unbounded();
        let id = SubscriptionId::from("q");
        sim.accept(OutboundRequest::subscribe(FeedKind::Quotes, "Si100000P", id.clone()));
        sim.accept(OutboundRequest::unsubscribe(id));
        assert_eq!(sim.publish(&tx).unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }
}
