//! Order book module
//!
//! Immutable per-venue book snapshots, the mutable working book used to
//! build them, and the concurrent store holding the latest one per key.

mod book;
mod bookkeeper;

pub use book::OrderBook;
pub use bookkeeper::Bookkeeper;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// A single level in the order book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl Level {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Best known state of one venue's book for one instrument.
///
/// Bids are ordered best (highest) first, asks best (lowest) first.
/// Never mutated after construction; updates replace the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    /// Source timestamp in milliseconds, when the venue provides one
    pub timestamp_ms: Option<u64>,
    /// Source sequence number, when the venue provides one
    pub sequence: Option<u64>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self {
            bids,
            asks,
            timestamp_ms: None,
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Absolute spread between best ask and best bid
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// A book with no levels on either side. Still a real, known state.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
