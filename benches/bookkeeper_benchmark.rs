//! Benchmarks for the store and ingestion hot paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use market_aggregator::{
    BookEvent, BookMode, Bookkeeper, ExchangeId, Instrument, Level, OrderBookBuffer,
    OrderBookSnapshot,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn create_levels(levels: usize, start: i64, step: i64) -> Vec<Level> {
    (0..levels as i64)
        .map(|i| Level::new(Decimal::from(start + i * step), Decimal::from_str("1.5").unwrap()))
        .collect()
}

fn create_snapshot(levels: usize) -> OrderBookSnapshot {
    OrderBookSnapshot::new(create_levels(levels, 50000, -1), create_levels(levels, 50001, 1))
}

fn raw_event(sequence: u64) -> String {
    format!(
        r#"{{"type": "snapshot", "sequence": {sequence},
            "bids": [["50000.0", "1.5"], ["49999.0", "2.0"], ["49998.0", "0.5"]],
            "asks": [["50001.0", "1.0"], ["50002.0", "2.5"], ["50003.0", "3.0"]]}}"#
    )
}

fn benchmark_upsert(c: &mut Criterion) {
    let store = Bookkeeper::new();
    let instrument = Instrument::new("BTC", "USD");
    let snapshot = create_snapshot(20);

    c.bench_function("bookkeeper_upsert_20_levels", |b| {
        b.iter(|| {
            store.upsert(ExchangeId::Kraken, instrument.clone(), black_box(snapshot.clone()));
        })
    });
}

fn benchmark_get(c: &mut Criterion) {
    let store = Bookkeeper::new();
    let instrument = Instrument::new("BTC", "USD");
    store.upsert(ExchangeId::Kraken, instrument.clone(), create_snapshot(20));

    c.bench_function("bookkeeper_get", |b| {
        b.iter(|| {
            black_box(store.get(ExchangeId::Kraken, &instrument));
        })
    });
}

fn benchmark_buffer_insert(c: &mut Criterion) {
    let store = Arc::new(Bookkeeper::new());
    let buffer = OrderBookBuffer::new(Arc::clone(&store));
    let instrument = Instrument::new("BTC", "USD");
    let mut sequence = 0u64;

    c.bench_function("buffer_insert_raw_snapshot", |b| {
        b.iter(|| {
            sequence += 1;
            let raw = raw_event(sequence);
            black_box(buffer.insert(&raw, ExchangeId::Bitfinex, instrument.clone()));
        })
    });
}

fn benchmark_buffer_delta(c: &mut Criterion) {
    let store = Arc::new(Bookkeeper::new());
    let buffer = OrderBookBuffer::new(Arc::clone(&store)).with_exchange(
        ExchangeId::Bitfinex,
        BookMode::Delta,
        100,
    );
    let instrument = Instrument::new("BTC", "USD");
    buffer.insert_event(
        BookEvent::snapshot(create_levels(100, 50000, -1), create_levels(100, 50001, 1)),
        ExchangeId::Bitfinex,
        instrument.clone(),
    );

    c.bench_function("buffer_apply_delta_100_levels", |b| {
        b.iter(|| {
            let delta = BookEvent::update(create_levels(1, 49999, 0), create_levels(1, 50001, 0));
            black_box(buffer.insert_event(delta, ExchangeId::Bitfinex, instrument.clone()));
        })
    });
}

criterion_group!(
    benches,
    benchmark_upsert,
    benchmark_get,
    benchmark_buffer_insert,
    benchmark_buffer_delta
);
criterion_main!(benches);
