//! Working order book
//!
//! Uses BTreeMap for efficient sorted price level management. The ingestion
//! buffer keeps one of these per key and turns it into immutable
//! [`OrderBookSnapshot`]s for the store.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{Level, OrderBookSnapshot, Side};

/// Mutable book for a single (exchange, instrument)
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<Decimal, Decimal>,
    /// Levels per side published in snapshots
    max_depth: usize,
    sequence: Option<u64>,
    timestamp_ms: Option<u64>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(max_depth: usize) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            max_depth,
            sequence: None,
            timestamp_ms: None,
        }
    }

    /// Replace the whole book with the given levels
    pub fn reset(&mut self, bids: &[Level], asks: &[Level]) {
        self.bids.clear();
        self.asks.clear();

        for level in bids.iter().filter(|l| l.quantity > Decimal::ZERO) {
            self.bids.insert(Reverse(level.price), level.quantity);
        }

        for level in asks.iter().filter(|l| l.quantity > Decimal::ZERO) {
            self.asks.insert(level.price, level.quantity);
        }
    }

    /// Apply incremental changes on top of the current levels.
    ///
    /// A zero quantity removes the level. Levels beyond the snapshot depth
    /// are kept so deletions near the top are refilled from below.
    pub fn apply_delta(&mut self, bids: &[Level], asks: &[Level]) {
        for level in bids {
            self.update_side(Side::Bid, level);
        }

        for level in asks {
            self.update_side(Side::Ask, level);
        }
    }

    /// Record the ordering markers of the last applied event
    pub fn set_markers(&mut self, sequence: Option<u64>, timestamp_ms: Option<u64>) {
        self.sequence = sequence;
        self.timestamp_ms = timestamp_ms;
    }

    /// Update a single price level
    fn update_side(&mut self, side: Side, level: &Level) {
        match side {
            Side::Bid => {
                if level.quantity == Decimal::ZERO {
                    self.bids.remove(&Reverse(level.price));
                } else {
                    self.bids.insert(Reverse(level.price), level.quantity);
                }
            }
            Side::Ask => {
                if level.quantity == Decimal::ZERO {
                    self.asks.remove(&level.price);
                } else {
                    self.asks.insert(level.price, level.quantity);
                }
            }
        }
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Freeze the best `max_depth` levels per side into an immutable snapshot
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            bids: self
                .bids
                .iter()
                .take(self.max_depth)
                .map(|(Reverse(p), q)| Level::new(*p, *q))
                .collect(),
            asks: self
                .asks
                .iter()
                .take(self.max_depth)
                .map(|(p, q)| Level::new(*p, *q))
                .collect(),
            timestamp_ms: self.timestamp_ms,
            sequence: self.sequence,
        }
    }
}
