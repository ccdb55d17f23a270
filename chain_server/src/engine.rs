//! Event correlator over the shared option chain model.
//!
//! `ChainEngine` owns the single `ChainModel` behind one mutex. Every mutation and every
//! multi-field read takes that lock, so:
//! - a reader never sees a ladder replacement or its cascade of new legs half applied;
//! - the inbound-event context and the recomputation timer never interleave inside an
//!   update.
//!
//! Subscriptions are issued while the lock is held: the id is registered first and the
//! request is then placed on the unbounded outbound channel, which never blocks. A push
//! message can therefore not arrive for an id the registry does not know yet.
//!
//! Inbound routing:
//! - underlying quotes replace the stored quote; a changed last price rebuilds the
//!   ladder, subscribes legs that entered it and refreshes bid/ask volatility of every
//!   ladder leg;
//! - leg quotes refresh that leg's bid/ask volatility every time, and its last-trade
//!   volatility only when the last traded price changed;
//! - instrument payloads are stored verbatim;
//! - messages for unknown ids are dropped.

use std::collections::btree_map::Entry;
use std::sync::{Arc, Mutex};

use chain_common::protocol::{
    FeedKind, InboundMessage, OutboundRequest, QuoteData, SubscriptionId, UnderlyingQuote,
};
use chain_common::series::OptionSeries;
use chain_common::snapshot::{ChainSnapshot, ChartData, Volatilities};
use chain_common::{ChainError, OptionKind, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use log::{debug, info};
use serde_json::Value;

use crate::config::{ChainConfig, RetentionPolicy};
use crate::model::chain::{ChainModel, Feed, LegKey, OptionLeg};
use crate::model::clock::Clock;
use crate::model::ladder::StrikeLadder;
use crate::model::registry::{SubscriptionRegistry, Target};
use crate::model::volatility::VolatilitySolver;

/// What an inbound message did to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not a push message (acknowledgement, heartbeat).
    Ignored,
    /// Unknown or retired subscription id; nothing changed.
    Dropped,
    /// Underlying quote stored.
    Underlying {
        /// Last price differs from the previous one.
        price_changed: bool,
        /// Subscribe requests issued for legs entering the ladder.
        subscribed: usize,
    },
    /// Leg quote stored and its volatilities refreshed.
    LegQuotes(LegKey),
    /// Leg instrument payload stored.
    LegInstrument(LegKey),
}

/// Model store and event correlator.
pub struct ChainEngine {
    config: ChainConfig,
    series: OptionSeries,
    solver: VolatilitySolver,
    clock: Arc<dyn Clock>,
    outbound: Sender<OutboundRequest>,
    model: Mutex<ChainModel>,
}

impl ChainEngine {
    /// Creates the engine. Subscribe requests are placed on `outbound`.
    pub fn new(
        config: ChainConfig,
        series: OptionSeries,
        clock: Arc<dyn Clock>,
        outbound: Sender<OutboundRequest>,
    ) -> Self {
        Self {
            solver: VolatilitySolver::new(config.expiry),
            config,
            series,
            clock,
            outbound,
            model: Mutex::new(ChainModel::new()),
        }
    }

    /// Engine parameters.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Issues the underlying quotes subscription. Returns `None` if already issued.
    pub fn subscribe_underlying(&self) -> Result<Option<SubscriptionId>> {
        let mut model = self.model.lock()?;
        if model.underlying.is_some() {
            return Ok(None);
        }
        let id = self.issue(
            &mut model.registry,
            Target::Underlying,
            FeedKind::Quotes,
            &self.config.underlying_code,
        )?;
        model.underlying = Some(Feed::Pending(id.clone()));
        info!("Subscribed to {} quotes", self.config.underlying_code);
        Ok(Some(id))
    }

    /// Decodes a raw push message and routes it.
    pub fn submit_raw(&self, text: &str) -> Result<EventOutcome> {
        match InboundMessage::from_json(text)? {
            Some(message) => self.submit_inbound_event(&message.guid, &message.data),
            None => Ok(EventOutcome::Ignored),
        }
    }

    /// Routes one push message to the model.
    ///
    /// A malformed payload is an error and leaves the model untouched; an unknown id
    /// is `EventOutcome::Dropped`.
    pub fn submit_inbound_event(&self, id: &SubscriptionId, payload: &Value) -> Result<EventOutcome> {
        let now = self.clock.now();
        let mut model = self.model.lock()?;
        let Some(target) = model.registry.resolve(id) else {
            debug!("Dropping message for unknown subscription {}", id);
            return Ok(EventOutcome::Dropped);
        };

        match target {
            Target::Underlying => self.on_underlying_quote(&mut model, id, payload, now),
            Target::Leg {
                key,
                feed: FeedKind::Quotes,
            } => self.on_leg_quote(&mut model, key, id, payload, now),
            Target::Leg {
                key,
                feed: FeedKind::Instrument,
            } => self.on_leg_instrument(&mut model, key, id, payload),
        }
    }

    /// Refreshes bid/ask volatility of every ladder leg with an active quotes feed.
    ///
    /// No-op before the first underlying price. Returns the number of legs refreshed.
    pub fn recompute_volatilities(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut model = self.model.lock()?;
        Ok(self.refresh_ladder_volatilities(&mut model, now))
    }

    /// Full copy of the model.
    pub fn snapshot(&self) -> Result<ChainSnapshot> {
        let model = self.model.lock()?;
        Ok(model.snapshot(&self.config.underlying_code))
    }

    /// Volatility chart over the current ladder, once a price and ladder exist.
    pub fn chart(&self) -> Result<Option<ChartData>> {
        let model = self.model.lock()?;
        Ok(model.chart())
    }

    /// Re-issues, under fresh ids, every feed without an active stream after the
    /// transport restored its session: a pending underlying feed and the pending or
    /// missing feeds of ladder legs. Old ids are retired. Returns the requests issued.
    pub fn reconnected(&self) -> Result<usize> {
        let mut model = self.model.lock()?;
        let ChainModel {
            underlying,
            ladder,
            legs,
            registry,
        } = &mut *model;

        let mut issued = 0;
        if self.reissue_pending(
            registry,
            underlying,
            Target::Underlying,
            FeedKind::Quotes,
            &self.config.underlying_code,
        )? {
            issued += 1;
        }

        if let Some(ladder) = ladder.as_ref() {
            for &strike in ladder.strikes() {
                for kind in OptionKind::ALL {
                    let key = LegKey::new(strike, kind);
                    let Some(leg) = legs.get_mut(&key) else {
                        continue;
                    };
                    let quotes = Target::Leg {
                        key,
                        feed: FeedKind::Quotes,
                    };
                    let instrument = Target::Leg {
                        key,
                        feed: FeedKind::Instrument,
                    };
                    if self.reissue_pending(registry, &mut leg.quotes, quotes, FeedKind::Quotes, &leg.code)? {
                        issued += 1;
                    }
                    if self.reissue_pending(
                        registry,
                        &mut leg.instrument,
                        instrument,
                        FeedKind::Instrument,
                        &leg.code,
                    )? {
                        issued += 1;
                    }
                    issued += self.subscribe_leg(registry, key, leg)?;
                }
            }
        }

        info!("Re-issued {} subscriptions after reconnect", issued);
        Ok(issued)
    }

    fn on_underlying_quote(
        &self,
        model: &mut ChainModel,
        id: &SubscriptionId,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<EventOutcome> {
        let quote = UnderlyingQuote::try_from(QuoteData::from_payload(payload)?)?;
        let Some(feed) = model.underlying.as_mut().filter(|feed| feed.id() == id) else {
            return Ok(EventOutcome::Dropped);
        };
        let ladder = StrikeLadder::around(
            quote.last_price,
            self.config.strike_step,
            self.config.strike_count,
        )
        .ok_or_else(|| {
            ChainError::MalformedPayload(format!(
                "underlying last_price {} is out of the strike range",
                quote.last_price
            ))
        })?;

        let previous = feed.update(quote).map(|previous| previous.last_price);
        if previous == Some(quote.last_price) {
            return Ok(EventOutcome::Underlying {
                price_changed: false,
                subscribed: 0,
            });
        }
        debug!(
            "Underlying last price {:?} -> {}",
            previous, quote.last_price
        );

        let subscribed = if model.ladder.as_ref() != Some(&ladder) {
            self.apply_ladder(model, ladder)?
        } else {
            0
        };
        self.refresh_ladder_volatilities(model, now);

        Ok(EventOutcome::Underlying {
            price_changed: true,
            subscribed,
        })
    }

    fn on_leg_quote(
        &self,
        model: &mut ChainModel,
        key: LegKey,
        id: &SubscriptionId,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<EventOutcome> {
        let quote = QuoteData::from_payload(payload)?;
        let spot = model.underlying_price();
        let Some(leg) = model.legs.get_mut(&key) else {
            return Ok(EventOutcome::Dropped);
        };
        let Some(feed) = leg.quotes.as_mut().filter(|feed| feed.id() == id) else {
            return Ok(EventOutcome::Dropped);
        };

        // A trade is a completed event: its volatility only moves with a new trade price.
        let last_trade_changed = feed
            .data()
            .is_none_or(|previous| previous.last_price != quote.last_price);
        feed.update(quote.clone());

        if let Some(spot) = spot {
            let volatilities = &mut leg.volatilities;
            if last_trade_changed {
                volatilities.last_price_volatility =
                    self.solver.solve(now, spot, key.strike, quote.last_price, key.kind);
            }
            volatilities.bid_volatility = self.solver.solve(now, spot, key.strike, quote.bid, key.kind);
            volatilities.ask_volatility = self.solver.solve(now, spot, key.strike, quote.ask, key.kind);
        }
        Ok(EventOutcome::LegQuotes(key))
    }

    fn on_leg_instrument(
        &self,
        model: &mut ChainModel,
        key: LegKey,
        id: &SubscriptionId,
        payload: &Value,
    ) -> Result<EventOutcome> {
        if !payload.is_object() {
            return Err(ChainError::MalformedPayload(
                "instrument payload is not an object".to_string(),
            ));
        }
        let Some(feed) = model
            .legs
            .get_mut(&key)
            .and_then(|leg| leg.instrument.as_mut())
            .filter(|feed| feed.id() == id)
        else {
            return Ok(EventOutcome::Dropped);
        };
        feed.update(payload.clone());
        Ok(EventOutcome::LegInstrument(key))
    }

    /// Installs `ladder`, creating and subscribing legs that entered it. Under the
    /// `Release` policy, legs that left it are unsubscribed.
    fn apply_ladder(&self, model: &mut ChainModel, ladder: StrikeLadder) -> Result<usize> {
        info!(
            "Strike ladder centred on {}: {:?}",
            ladder.central(),
            ladder.strikes()
        );
        let previous = model.ladder.replace(ladder);
        let ChainModel {
            ladder,
            legs,
            registry,
            ..
        } = model;
        let Some(ladder) = ladder.as_ref() else {
            return Ok(0);
        };

        let mut subscribed = 0;
        for &strike in ladder.strikes() {
            for kind in OptionKind::ALL {
                let key = LegKey::new(strike, kind);
                let leg = match legs.entry(key) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => match self.series.get(strike, kind) {
                        Some(listed) => entry.insert(OptionLeg::from_entry(listed)),
                        None => {
                            debug!("No listed {} contract at strike {}", kind, strike);
                            continue;
                        }
                    },
                };
                subscribed += self.subscribe_leg(registry, key, leg)?;
            }
        }

        if self.config.retention == RetentionPolicy::Release {
            let departed = previous
                .iter()
                .flat_map(|previous| previous.strikes().iter().copied())
                .filter(|strike| !ladder.contains(*strike));
            for strike in departed {
                for kind in OptionKind::ALL {
                    if let Some(leg) = legs.get_mut(&LegKey::new(strike, kind)) {
                        self.release_leg(registry, leg)?;
                    }
                }
            }
        }
        Ok(subscribed)
    }

    fn refresh_ladder_volatilities(&self, model: &mut ChainModel, now: DateTime<Utc>) -> usize {
        let Some(spot) = model.underlying_price() else {
            return 0;
        };
        let ChainModel { ladder, legs, .. } = model;
        let Some(ladder) = ladder.as_ref() else {
            return 0;
        };

        let mut refreshed = 0;
        for &strike in ladder.strikes() {
            for kind in OptionKind::ALL {
                let Some(leg) = legs.get_mut(&LegKey::new(strike, kind)) else {
                    continue;
                };
                let Some(quote) = leg.quote() else {
                    continue;
                };
                let bid = self.solver.solve(now, spot, strike, quote.bid, kind);
                let ask = self.solver.solve(now, spot, strike, quote.ask, kind);
                leg.volatilities.bid_volatility = bid;
                leg.volatilities.ask_volatility = ask;
                refreshed += 1;
            }
        }
        refreshed
    }

    fn subscribe_leg(
        &self,
        registry: &mut SubscriptionRegistry,
        key: LegKey,
        leg: &mut OptionLeg,
    ) -> Result<usize> {
        let mut issued = 0;
        if leg.quotes.is_none() {
            let target = Target::Leg {
                key,
                feed: FeedKind::Quotes,
            };
            let id = self.issue(registry, target, FeedKind::Quotes, &leg.code)?;
            leg.quotes = Some(Feed::Pending(id));
            issued += 1;
        }
        if leg.instrument.is_none() {
            let target = Target::Leg {
                key,
                feed: FeedKind::Instrument,
            };
            let id = self.issue(registry, target, FeedKind::Instrument, &leg.code)?;
            leg.instrument = Some(Feed::Pending(id));
            issued += 1;
        }
        Ok(issued)
    }

    fn release_leg(&self, registry: &mut SubscriptionRegistry, leg: &mut OptionLeg) -> Result<()> {
        let quotes = leg.quotes.take().map(Feed::into_id);
        let instrument = leg.instrument.take().map(Feed::into_id);
        leg.volatilities = Volatilities::default();

        for id in quotes.into_iter().chain(instrument) {
            registry.retire(&id);
            debug!("Unsubscribing {} ({})", leg.code, id);
            self.outbound
                .send(OutboundRequest::unsubscribe(id))
                .map_err(|e| ChainError::ChannelSend(e.to_string()))?;
        }
        Ok(())
    }

    fn reissue_pending<T>(
        &self,
        registry: &mut SubscriptionRegistry,
        slot: &mut Option<Feed<T>>,
        target: Target,
        feed: FeedKind,
        code: &str,
    ) -> Result<bool> {
        let Some(Feed::Pending(stale)) = slot.as_ref() else {
            return Ok(false);
        };
        registry.retire(stale);
        let id = self.issue(registry, target, feed, code)?;
        *slot = Some(Feed::Pending(id));
        Ok(true)
    }

    /// Registers a fresh id for `target` and enqueues its subscribe request.
    fn issue(
        &self,
        registry: &mut SubscriptionRegistry,
        target: Target,
        feed: FeedKind,
        code: &str,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId::generate();
        registry.register(id.clone(), target)?;
        if let Err(e) = self
            .outbound
            .send(OutboundRequest::subscribe(feed, code, id.clone()))
        {
            registry.retire(&id);
            return Err(ChainError::ChannelSend(e.to_string()));
        }
        debug!("Subscribed to {:?} of {} under {}", feed, code, id);
        Ok(id)
    }
}
