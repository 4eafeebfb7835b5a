//! Parser module for raw order book events
//!
//! Streaming connectors hand over JSON text in one canonical shape:
//!
//! ```json
//! {"type": "snapshot", "sequence": 12, "timestamp": 1672531200000,
//!  "bids": [["50000.00", "1.5"]], "asks": [["50001.00", "1.0"]]}
//! ```
//!
//! `type` is `snapshot` or `update`. Sequence and timestamp are optional.
//! Prices and quantities may be strings or JSON numbers.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{AggregatorError, Result};
use crate::orderbook::Level;

/// Whether an event carries a full book or changes to one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[serde(alias = "book", alias = "partial")]
    Snapshot,
    #[serde(alias = "delta", alias = "depthUpdate")]
    Update,
}

/// A normalized order book event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Venue sequence number
    #[serde(default, alias = "seq", alias = "u")]
    pub sequence: Option<u64>,

    /// Venue timestamp (milliseconds)
    #[serde(default, rename = "timestamp", alias = "ts", alias = "E")]
    pub timestamp_ms: Option<u64>,

    #[serde(default, alias = "b", deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<Level>,

    #[serde(default, alias = "a", deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<Level>,
}

impl BookEvent {
    pub fn snapshot(bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self {
            kind: EventKind::Snapshot,
            sequence: None,
            timestamp_ms: None,
            bids,
            asks,
        }
    }

    pub fn update(bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self {
            kind: EventKind::Update,
            ..Self::snapshot(bids, asks)
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Parse and validate a raw event
    pub fn parse(raw: &str) -> Result<Self> {
        let event: BookEvent = serde_json::from_str(raw)?;
        event.validate()?;
        Ok(event)
    }

    /// Reject levels no venue could have meant
    pub fn validate(&self) -> Result<()> {
        for level in self.bids.iter().chain(self.asks.iter()) {
            if level.price <= Decimal::ZERO {
                return Err(AggregatorError::MalformedEvent(format!(
                    "Non-positive price {}",
                    level.price
                )));
            }
            if level.quantity < Decimal::ZERO {
                return Err(AggregatorError::MalformedEvent(format!(
                    "Negative quantity {} at price {}",
                    level.quantity, level.price
                )));
            }
        }
        Ok(())
    }
}

fn decimal_from_value(value: &Value) -> std::result::Result<Decimal, String> {
    match value {
        Value::String(s) => Decimal::from_str(s).map_err(|e| e.to_string()),
        Value::Number(n) => Decimal::from_str(&n.to_string()).map_err(|e| e.to_string()),
        other => Err(format!("Expected decimal, got {other}")),
    }
}

/// Custom deserializer for price levels from array of pairs
fn deserialize_price_levels<'de, D>(deserializer: D) -> std::result::Result<Vec<Level>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<Value>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            Ok(Level {
                price: decimal_from_value(&pair[0]).map_err(serde::de::Error::custom)?,
                quantity: decimal_from_value(&pair[1]).map_err(serde::de::Error::custom)?,
            })
        })
        .collect()
}
