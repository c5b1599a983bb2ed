//! Position lifecycle events from the exchange contract.
//!
//! The exchange publishes `OPEN`, `CLOSE` and `PositionUpdated` events whose
//! first three topics are `(kind, trader, symbol)`. Events that do not decode
//! to that shape are skipped; they belong to other parts of the contract.

use async_trait::async_trait;
use tracing::debug;

use crate::error::ChainError;
use crate::exchange::PerpContract;
use crate::rpc::RawEvent;
use crate::scval::ScVal;

/// Topic symbols that mark a position change.
const POSITION_TOPICS: [&str; 3] = ["OPEN", "CLOSE", "PositionUpdated"];

/// Kind of position lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionEventKind {
    Open,
    Close,
    Updated,
}

impl PositionEventKind {
    fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "OPEN" => Some(Self::Open),
            "CLOSE" => Some(Self::Close),
            "PositionUpdated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// A decoded position change: which trader moved in which market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionEvent {
    pub kind: PositionEventKind,
    pub trader: String,
    pub symbol: String,
    pub ledger: u32,
}

impl PositionEvent {
    /// Decode a raw contract event; `None` when the topics don't match the
    /// expected `(kind, trader, symbol)` shape.
    pub fn decode(raw: &RawEvent) -> Option<Self> {
        let kind = raw
            .topic
            .first()
            .and_then(|t| ScVal::from_base64(t).ok())
            .as_ref()
            .and_then(ScVal::as_symbol)
            .and_then(PositionEventKind::from_topic)?;

        let trader = raw
            .topic
            .get(1)
            .and_then(|t| ScVal::from_base64(t).ok())
            .as_ref()
            .and_then(ScVal::as_address)
            .map(|a| a.to_strkey())?;

        let symbol = raw
            .topic
            .get(2)
            .and_then(|t| ScVal::from_base64(t).ok())
            .as_ref()
            .and_then(ScVal::as_symbol)
            .map(str::to_string)?;

        Some(Self {
            kind,
            trader,
            symbol,
            ledger: raw.ledger,
        })
    }
}

/// Ledger-event feed for the scanner.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Current ledger sequence number.
    async fn latest_ledger(&self) -> Result<u32, ChainError>;

    /// Decoded position events since `start_ledger`.
    async fn position_events(&self, start_ledger: u32) -> Result<Vec<PositionEvent>, ChainError>;
}

#[async_trait]
impl EventSource for PerpContract {
    async fn latest_ledger(&self) -> Result<u32, ChainError> {
        self.client().rpc().latest_ledger().await
    }

    async fn position_events(&self, start_ledger: u32) -> Result<Vec<PositionEvent>, ChainError> {
        let leading_topics: Vec<String> = POSITION_TOPICS
            .iter()
            .map(|t| ScVal::sym(t).to_base64())
            .collect();

        let raw = self
            .client()
            .rpc()
            .contract_events(start_ledger, self.contract_id(), &leading_topics)
            .await?;

        let mut events = Vec::with_capacity(raw.len());
        for event in &raw {
            match PositionEvent::decode(event) {
                Some(decoded) => events.push(decoded),
                None => debug!(ledger = event.ledger, "skipping undecodable event"),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scval::ScAddress;

    fn raw_event(topics: Vec<ScVal>) -> RawEvent {
        RawEvent {
            contract_id: "C".into(),
            topic: topics.iter().map(ScVal::to_base64).collect(),
            value: None,
            ledger: 1234,
        }
    }

    #[test]
    fn test_decode_open_event() {
        let trader = ScAddress::Account([8u8; 32]);
        let raw = raw_event(vec![
            ScVal::sym("OPEN"),
            ScVal::Address(trader.clone()),
            ScVal::sym("BTCUSD"),
        ]);

        let event = PositionEvent::decode(&raw).unwrap();
        assert_eq!(event.kind, PositionEventKind::Open);
        assert_eq!(event.trader, trader.to_strkey());
        assert_eq!(event.symbol, "BTCUSD");
        assert_eq!(event.ledger, 1234);
    }

    #[test]
    fn test_decode_skips_unrelated_topic() {
        let raw = raw_event(vec![
            ScVal::sym("DEPOSIT"),
            ScVal::Address(ScAddress::Account([1u8; 32])),
        ]);
        assert!(PositionEvent::decode(&raw).is_none());
    }

    #[test]
    fn test_decode_skips_malformed_topics() {
        // Trader topic is a symbol instead of an address.
        let raw = raw_event(vec![
            ScVal::sym("CLOSE"),
            ScVal::sym("not-an-address"),
            ScVal::sym("XLMUSD"),
        ]);
        assert!(PositionEvent::decode(&raw).is_none());

        // Missing symbol topic.
        let raw = raw_event(vec![
            ScVal::sym("CLOSE"),
            ScVal::Address(ScAddress::Account([2u8; 32])),
        ]);
        assert!(PositionEvent::decode(&raw).is_none());
    }
}
