//! Exchange push-protocol messages exchanged with the transport layer.
//!
//! Outbound, the engine issues `OutboundRequest`s: a subscribe request per feed, each
//! tagged with a freshly generated `SubscriptionId`, or an unsubscribe for a retired id.
//! Inbound, every push message is an `InboundMessage` envelope carrying the same id and
//! a feed-specific `data` record. Values are JSON encoded.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ChainError;

/// Exchange tag sent with every subscribe request.
pub const EXCHANGE: &str = "MOEX";

/// Opaque correlation id pairing a subscribe request with its push responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Generates a new random (UUID v4) id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// String form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of feed a subscription delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Last trade and top of book.
    Quotes,
    /// Instrument description including the exchange theoretical volatility.
    Instrument,
}

impl FeedKind {
    /// Opcode of the subscribe request for this feed.
    pub fn opcode(&self) -> Opcode {
        match self {
            FeedKind::Quotes => Opcode::QuotesSubscribe,
            FeedKind::Instrument => Opcode::InstrumentsGetAndSubscribeV2,
        }
    }
}

/// Request operation understood by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    /// Subscribe to quotes of an instrument.
    QuotesSubscribe,
    /// Fetch an instrument description and subscribe to its changes.
    InstrumentsGetAndSubscribeV2,
    /// Cancel the subscription with the given guid.
    #[serde(rename = "unsubscribe")]
    Unsubscribe,
}

/// Request placed on the outbound subscription channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Requested operation.
    pub opcode: Opcode,
    /// Instrument code (absent for unsubscribe).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Exchange tag (absent for unsubscribe).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Correlation id.
    pub guid: SubscriptionId,
    /// Authorization token, filled in by the transport before sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl OutboundRequest {
    /// Creates a subscribe request for `feed` on instrument `code`.
    pub fn subscribe(feed: FeedKind, code: &str, guid: SubscriptionId) -> Self {
        OutboundRequest {
            opcode: feed.opcode(),
            code: Some(String::from(code)),
            exchange: Some(String::from(EXCHANGE)),
            guid,
            token: None,
        }
    }

    /// Creates an unsubscribe request for `guid`.
    pub fn unsubscribe(guid: SubscriptionId) -> Self {
        OutboundRequest {
            opcode: Opcode::Unsubscribe,
            code: None,
            exchange: None,
            guid,
            token: None,
        }
    }

    /// Feed this request subscribes to; `None` for unsubscribe.
    pub fn feed(&self) -> Option<FeedKind> {
        match self.opcode {
            Opcode::QuotesSubscribe => Some(FeedKind::Quotes),
            Opcode::InstrumentsGetAndSubscribeV2 => Some(FeedKind::Instrument),
            Opcode::Unsubscribe => None,
        }
    }

    /// Encode the request to JSON text.
    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Push message received from the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Correlation id of the subscription this message belongs to.
    pub guid: SubscriptionId,
    /// Feed-specific payload.
    pub data: Value,
}

impl InboundMessage {
    /// Decodes a push message.
    ///
    /// Messages lacking `guid` or `data` (request acknowledgements, heartbeats) yield
    /// `Ok(None)`. Text that is not a JSON object is an error.
    pub fn from_json(text: &str) -> Result<Option<Self>, ChainError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(ChainError::MalformedPayload(
                "inbound message is not a JSON object".to_string(),
            ));
        };
        let (Some(guid), Some(data)) = (fields.remove("guid"), fields.remove("data")) else {
            return Ok(None);
        };
        let guid = guid
            .as_str()
            .map(SubscriptionId::from)
            .ok_or_else(|| ChainError::MalformedPayload("guid is not a string".to_string()))?;
        Ok(Some(InboundMessage { guid, data }))
    }

    /// Encode the message to JSON text.
    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Quote record delivered by a quotes feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    /// Last traded price.
    #[serde(default)]
    pub last_price: Option<f64>,
    /// Time of the last trade, seconds since the Unix epoch.
    #[serde(default)]
    pub last_price_timestamp: Option<i64>,
    /// Best bid.
    #[serde(default)]
    pub bid: Option<f64>,
    /// Best ask.
    #[serde(default)]
    pub ask: Option<f64>,
}

impl QuoteData {
    /// Reads a quote record from an inbound payload.
    pub fn from_payload(payload: &Value) -> Result<Self, ChainError> {
        if !payload.is_object() {
            return Err(ChainError::MalformedPayload(
                "quote payload is not an object".to_string(),
            ));
        }
        serde_json::from_value(payload.clone())
            .map_err(|e| ChainError::MalformedPayload(format!("quote payload: {e}")))
    }
}

/// Latest quote of the underlying. Its prices are either all known or the quote is absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingQuote {
    /// Last traded price.
    pub last_price: f64,
    /// Time of the last trade, seconds since the Unix epoch.
    pub last_price_timestamp: Option<i64>,
    /// Best bid.
    pub bid: f64,
    /// Best ask.
    pub ask: f64,
}

impl TryFrom<QuoteData> for UnderlyingQuote {
    type Error = ChainError;

    fn try_from(quote: QuoteData) -> Result<Self, Self::Error> {
        let (Some(last_price), Some(bid), Some(ask)) = (quote.last_price, quote.bid, quote.ask)
        else {
            return Err(ChainError::MalformedPayload(
                "underlying quote needs last_price, bid and ask".to_string(),
            ));
        };
        if !(last_price.is_finite() && last_price > 0.0) {
            return Err(ChainError::MalformedPayload(format!(
                "underlying last_price {last_price} is not a positive number"
            )));
        }
        Ok(UnderlyingQuote {
            last_price,
            last_price_timestamp: quote.last_price_timestamp,
            bid,
            ask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_request_uses_exchange_opcodes() {
        let guid = SubscriptionId::from("abc");
        let quotes = OutboundRequest::subscribe(FeedKind::Quotes, "SiH4", guid.clone());
        let value: Value = serde_json::from_str(&quotes.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"opcode": "QuotesSubscribe", "code": "SiH4", "exchange": "MOEX", "guid": "abc"})
        );

        let instrument = OutboundRequest::subscribe(FeedKind::Instrument, "Si100000BC4", guid);
        assert!(
            instrument
                .to_json()
                .unwrap()
                .contains("\"InstrumentsGetAndSubscribeV2\"")
        );
        assert_eq!(instrument.feed(), Some(FeedKind::Instrument));
    }

    #[test]
    fn unsubscribe_carries_only_opcode_and_guid() {
        let request = OutboundRequest::unsubscribe(SubscriptionId::from("abc"));
        let value: Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"opcode": "unsubscribe", "guid": "abc"}));
        assert_eq!(request.feed(), None);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SubscriptionId::generate(), SubscriptionId::generate());
    }

    #[test]
    fn inbound_envelope_without_data_is_ignored() {
        let ack = r#"{"requestGuid": "abc", "httpCode": 200, "message": "Handled successfully"}"#;
        assert_eq!(InboundMessage::from_json(ack).unwrap(), None);

        let push = r#"{"guid": "abc", "data": {"bid": 1.0}}"#;
        let message = InboundMessage::from_json(push).unwrap().unwrap();
        assert_eq!(message.guid.as_str(), "abc");
        assert_eq!(message.data, json!({"bid": 1.0}));
    }

    #[test]
    fn inbound_non_json_is_an_error() {
        assert!(InboundMessage::from_json("not json").is_err());
        assert!(matches!(
            InboundMessage::from_json("[1, 2]"),
            Err(ChainError::MalformedPayload(_))
        ));
    }

    #[test]
    fn quote_payload_fields_are_optional_but_typed() {
        let quote = QuoteData::from_payload(&json!({"bid": 120.0, "ask": 130.0, "volume": 3}))
            .unwrap();
        assert_eq!(quote.bid, Some(120.0));
        assert_eq!(quote.last_price, None);

        let err = QuoteData::from_payload(&json!({"bid": "n/a"})).unwrap_err();
        assert!(matches!(err, ChainError::MalformedPayload(_)));
        assert!(QuoteData::from_payload(&json!(42)).is_err());
    }

    #[test]
    fn underlying_quote_requires_all_prices() {
        let full = QuoteData::from_payload(&json!({"last_price": 100000.0, "bid": 99999.0, "ask": 100001.0}))
            .unwrap();
        let quote = UnderlyingQuote::try_from(full).unwrap();
        assert_eq!(quote.last_price, 100000.0);
        assert_eq!(quote.last_price_timestamp, None);

        let partial = QuoteData::from_payload(&json!({"last_price": 100000.0})).unwrap();
        assert!(UnderlyingQuote::try_from(partial).is_err());

        let negative = QuoteData::from_payload(&json!({"last_price": -1.0, "bid": 1.0, "ask": 2.0}))
            .unwrap();
        assert!(UnderlyingQuote::try_from(negative).is_err());
    }
}
