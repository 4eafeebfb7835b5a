//! Snapshot store
//!
//! Holds the latest order book snapshot per (exchange, instrument).

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

use super::OrderBookSnapshot;
use crate::identity::{BookKey, ExchangeId, Instrument};

/// Concurrent store of the current book per key.
///
/// Keys are flat `(exchange, instrument)` pairs in a sharded map, so writers
/// for different keys only meet when their keys share a shard, and there is
/// no per-exchange inner map to create. Values are `Arc`s: a reader either
/// gets the previous snapshot or the new one, never a partial write.
#[derive(Debug, Default)]
pub struct Bookkeeper {
    books: DashMap<BookKey, Arc<OrderBookSnapshot>>,
}

impl Bookkeeper {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }

    /// Insert or replace the current snapshot for the key
    pub fn upsert(
        &self,
        exchange: ExchangeId,
        instrument: Instrument,
        snapshot: OrderBookSnapshot,
    ) {
        self.upsert_shared(exchange, instrument, Arc::new(snapshot));
    }

    /// Same as [`Bookkeeper::upsert`] for a snapshot that is already shared
    pub fn upsert_shared(
        &self,
        exchange: ExchangeId,
        instrument: Instrument,
        snapshot: Arc<OrderBookSnapshot>,
    ) {
        trace!(exchange = %exchange, instrument = %instrument, "Upserting order book");
        self.books.insert((exchange, instrument), snapshot);
    }

    /// Current snapshot, or `None` if nothing was ever upserted for the key
    pub fn get(
        &self,
        exchange: ExchangeId,
        instrument: &Instrument,
    ) -> Option<Arc<OrderBookSnapshot>> {
        self.books
            .get(&(exchange, instrument.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, exchange: ExchangeId, instrument: &Instrument) -> bool {
        self.books.contains_key(&(exchange, instrument.clone()))
    }

    /// Number of keys with a snapshot
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Exchanges that have at least one snapshot
    pub fn exchanges(&self) -> Vec<ExchangeId> {
        self.books
            .iter()
            .map(|entry| entry.key().0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Instruments with a snapshot for the exchange, sorted
    pub fn instruments(&self, exchange: ExchangeId) -> Vec<Instrument> {
        let mut instruments: Vec<Instrument> = self
            .books
            .iter()
            .filter(|entry| entry.key().0 == exchange)
            .map(|entry| entry.key().1.clone())
            .collect();
        instruments.sort();
        instruments
    }

    /// Current snapshots of every instrument of the exchange.
    ///
    /// Each snapshot is individually consistent; the set is not a
    /// point-in-time view across instruments.
    pub fn snapshot_all(&self, exchange: ExchangeId) -> Vec<(Instrument, Arc<OrderBookSnapshot>)> {
        let mut books: Vec<_> = self
            .books
            .iter()
            .filter(|entry| entry.key().0 == exchange)
            .map(|entry| (entry.key().1.clone(), Arc::clone(entry.value())))
            .collect();
        books.sort_by(|a, b| a.0.cmp(&b.0));
        books
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Level;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Barrier;
    use std::thread;

    fn btc_usd() -> Instrument {
        Instrument::new("BTC", "USD")
    }

    /// Book whose every level carries `tag`, so a torn value is detectable
    fn tagged_book(tag: u64, levels: usize) -> OrderBookSnapshot {
        let quantity = Decimal::from(tag);
        OrderBookSnapshot::new(
            (0..levels)
                .map(|i| Level::new(Decimal::from(50_000 - i as i64), quantity))
                .collect(),
            (0..levels)
                .map(|i| Level::new(Decimal::from(50_001 + i as i64), quantity))
                .collect(),
        )
        .with_sequence(tag)
    }

    #[test]
    fn test_upsert_then_get() {
        let store = Bookkeeper::new();
        let book = OrderBookSnapshot::new(vec![Level::new(dec!(50000), dec!(1))], vec![]);

        store.upsert(ExchangeId::Kraken, btc_usd(), book.clone());

        assert_eq!(*store.get(ExchangeId::Kraken, &btc_usd()).unwrap(), book);
    }

    #[test]
    fn test_miss_is_distinct_from_empty_book() {
        let store = Bookkeeper::new();
        let eth_usd = Instrument::new("ETH", "USD");
        assert!(store.get(ExchangeId::Gemini, &eth_usd).is_none());

        store.upsert(ExchangeId::Gemini, eth_usd.clone(), OrderBookSnapshot::default());
        let book = store.get(ExchangeId::Gemini, &eth_usd).unwrap();
        assert!(book.is_empty());

        // Same instrument on another venue is still unknown
        assert!(store.get(ExchangeId::Kraken, &eth_usd).is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let store = Bookkeeper::new();
        store.upsert(ExchangeId::CoinbasePro, btc_usd(), tagged_book(1, 2));
        store.upsert(ExchangeId::CoinbasePro, btc_usd(), tagged_book(2, 2));

        let book = store.get(ExchangeId::CoinbasePro, &btc_usd()).unwrap();
        assert_eq!(book.sequence, Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_listing() {
        let store = Bookkeeper::new();
        store.upsert(ExchangeId::Kraken, Instrument::new("ETH", "USD"), tagged_book(1, 1));
        store.upsert(ExchangeId::Kraken, btc_usd(), tagged_book(1, 1));
        store.upsert(ExchangeId::Bitfinex, btc_usd(), tagged_book(1, 1));

        assert_eq!(store.exchanges(), vec![ExchangeId::Kraken, ExchangeId::Bitfinex]);
        assert_eq!(
            store.instruments(ExchangeId::Kraken),
            vec![btc_usd(), Instrument::new("ETH", "USD")]
        );
        assert_eq!(store.snapshot_all(ExchangeId::Bitfinex).len(), 1);
        assert!(store.snapshot_all(ExchangeId::Gemini).is_empty());
    }

    #[test]
    fn test_concurrent_first_upserts_for_new_exchange() {
        let store = Arc::new(Bookkeeper::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let instrument = Instrument::new(&format!("C{i}"), "USD");
                    store.upsert(ExchangeId::Bitfinex, instrument, tagged_book(i, 1));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.instruments(ExchangeId::Bitfinex).len(), 8);
    }

    #[test]
    fn test_readers_never_see_torn_snapshot() {
        let store = Arc::new(Bookkeeper::new());
        store.upsert(ExchangeId::Kraken, btc_usd(), tagged_book(1, 50));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..500 {
                        let book = tagged_book(w * 1000 + n + 1, 50);
                        store.upsert(ExchangeId::Kraken, btc_usd(), book);
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let book = store.get(ExchangeId::Kraken, &btc_usd()).unwrap();
                        let tag = Decimal::from(book.sequence.unwrap());
                        assert_eq!(book.bids.len(), 50);
                        assert_eq!(book.asks.len(), 50);
                        assert!(book
                            .bids
                            .iter()
                            .chain(book.asks.iter())
                            .all(|l| l.quantity == tag));
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_keys_are_isolated_under_concurrent_writes() {
        let store = Arc::new(Bookkeeper::new());

        let handles: Vec<_> = ExchangeId::ALL
            .into_iter()
            .enumerate()
            .map(|(i, exchange)| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 1..=200u64 {
                        store.upsert(exchange, btc_usd(), tagged_book(i as u64 * 10_000 + n, 3));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for (i, exchange) in ExchangeId::ALL.into_iter().enumerate() {
            let book = store.get(exchange, &btc_usd()).unwrap();
            assert_eq!(book.sequence, Some(i as u64 * 10_000 + 200));
        }
    }
}
