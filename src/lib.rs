//! Market Aggregator Library
//!
//! This crate aggregates order books, fee schedules and account balances
//! from several exchanges into one concurrently readable view.

use std::sync::Arc;

pub mod buffer;
pub mod config;
pub mod connector;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod orderbook;
pub mod parser;
pub mod server;

pub use buffer::{BookMode, BufferStats, InsertOutcome, OrderBookBuffer};
pub use config::{Config, ExchangeConfig};
pub use connector::{ConnectorSet, RestConnector, StreamConnector, StreamItem, SubscriptionHandle};
pub use error::{AggregatorError, Result};
pub use identity::{BookKey, Currency, ExchangeId, Instrument};
pub use metadata::{
    AccountSnapshot, Balance, FeeSchedule, FeeSource, InstrumentMetadata, MetadataAggregator,
};
pub use orderbook::{Bookkeeper, Level, OrderBookSnapshot};
pub use parser::{BookEvent, EventKind};

/// Application state shared across components
pub struct AppState {
    pub bookkeeper: Arc<Bookkeeper>,
    pub metadata: Arc<MetadataAggregator>,
    pub buffer: Arc<OrderBookBuffer>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Empty stores wired together according to the configuration
    pub fn new(config: Config) -> Self {
        let bookkeeper = Arc::new(Bookkeeper::new());
        let buffer = Arc::new(OrderBookBuffer::from_config(Arc::clone(&bookkeeper), &config));

        Self {
            bookkeeper,
            metadata: Arc::new(MetadataAggregator::new()),
            buffer,
            config: Arc::new(config),
        }
    }
}
