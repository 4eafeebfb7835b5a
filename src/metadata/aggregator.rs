//! Metadata aggregator
//!
//! Per-exchange instrument metadata, fee schedules and account snapshots.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{AccountSnapshot, Balance, FeeSchedule, InstrumentMetadata};
use crate::identity::{Currency, ExchangeId, Instrument};

/// One `Arc`-wrapped instrument map per exchange.
///
/// A bulk upsert swaps the exchange's `Arc` in one write, so readers see the
/// old map or the new one. A single-entry upsert copies the map under that
/// exchange's shard lock if any reader still holds the previous `Arc`.
#[derive(Debug)]
struct PerExchange<V> {
    maps: DashMap<ExchangeId, Arc<HashMap<Instrument, V>>>,
}

impl<V: Clone> PerExchange<V> {
    fn new() -> Self {
        Self {
            maps: DashMap::new(),
        }
    }

    fn replace(&self, exchange: ExchangeId, map: HashMap<Instrument, V>) {
        self.maps.insert(exchange, Arc::new(map));
    }

    fn upsert(&self, exchange: ExchangeId, instrument: Instrument, value: V) {
        let mut entry = self.maps.entry(exchange).or_default();
        Arc::make_mut(entry.value_mut()).insert(instrument, value);
    }

    fn get(&self, exchange: ExchangeId, instrument: &Instrument) -> Option<V> {
        self.maps
            .get(&exchange)
            .and_then(|map| map.get(instrument).cloned())
    }

    fn get_map(&self, exchange: ExchangeId) -> Option<Arc<HashMap<Instrument, V>>> {
        self.maps.get(&exchange).map(|map| Arc::clone(map.value()))
    }
}

/// Concurrent store of everything a venue reports besides its order books.
///
/// The three kinds are kept in separate maps and never touch each other.
#[derive(Debug)]
pub struct MetadataAggregator {
    metadata: PerExchange<InstrumentMetadata>,
    fees: PerExchange<FeeSchedule>,
    accounts: DashMap<ExchangeId, Arc<AccountSnapshot>>,
}

impl Default for MetadataAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataAggregator {
    pub fn new() -> Self {
        Self {
            metadata: PerExchange::new(),
            fees: PerExchange::new(),
            accounts: DashMap::new(),
        }
    }

    /// Replace the full instrument metadata map of an exchange
    pub fn upsert_metadata(
        &self,
        exchange: ExchangeId,
        metadata: HashMap<Instrument, InstrumentMetadata>,
    ) {
        debug!(exchange = %exchange, instruments = metadata.len(), "Replacing instrument metadata");
        self.metadata.replace(exchange, metadata);
    }

    pub fn upsert_instrument_metadata(
        &self,
        exchange: ExchangeId,
        instrument: Instrument,
        metadata: InstrumentMetadata,
    ) {
        self.metadata.upsert(exchange, instrument, metadata);
    }

    pub fn get_metadata(
        &self,
        exchange: ExchangeId,
        instrument: &Instrument,
    ) -> Option<InstrumentMetadata> {
        self.metadata.get(exchange, instrument)
    }

    pub fn get_metadata_map(
        &self,
        exchange: ExchangeId,
    ) -> Option<Arc<HashMap<Instrument, InstrumentMetadata>>> {
        self.metadata.get_map(exchange)
    }

    /// Replace the full fee map of an exchange
    pub fn upsert_fee_map(&self, exchange: ExchangeId, fees: HashMap<Instrument, FeeSchedule>) {
        let approximated = fees.values().filter(|f| f.is_approximated()).count();
        debug!(
            exchange = %exchange,
            instruments = fees.len(),
            approximated,
            "Replacing fee map"
        );
        self.fees.replace(exchange, fees);
    }

    pub fn upsert_fee(&self, exchange: ExchangeId, instrument: Instrument, fee: FeeSchedule) {
        self.fees.upsert(exchange, instrument, fee);
    }

    pub fn get_fee(&self, exchange: ExchangeId, instrument: &Instrument) -> Option<FeeSchedule> {
        self.fees.get(exchange, instrument)
    }

    pub fn get_fee_map(
        &self,
        exchange: ExchangeId,
    ) -> Option<Arc<HashMap<Instrument, FeeSchedule>>> {
        self.fees.get_map(exchange)
    }

    pub fn upsert_account_info(&self, exchange: ExchangeId, account: AccountSnapshot) {
        debug!(exchange = %exchange, currencies = account.balances.len(), "Replacing account info");
        self.accounts.insert(exchange, Arc::new(account));
    }

    pub fn get_account_info(&self, exchange: ExchangeId) -> Option<Arc<AccountSnapshot>> {
        self.accounts
            .get(&exchange)
            .map(|account| Arc::clone(account.value()))
    }

    /// Balance of one currency from the latest account snapshot
    pub fn get_balance(&self, exchange: ExchangeId, currency: &Currency) -> Option<Balance> {
        self.accounts
            .get(&exchange)
            .and_then(|account| account.balance(currency).cloned())
    }
}
