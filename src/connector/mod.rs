//! Connector capabilities
//!
//! Venue adapters plug into the core through two traits: [`RestConnector`]
//! for periodic pulls of metadata, fees and account state, and
//! [`StreamConnector`] for pushed order book events. The core only drives
//! them; connection handling, authentication and reconnects belong to the
//! implementations.

mod manager;

pub use manager::{refresh_once, spawn_refresh, spawn_stream, ConnectorSet, SubscriptionHandle};

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identity::{ExchangeId, Instrument};
use crate::metadata::{AccountSnapshot, FeeSchedule, InstrumentMetadata};

/// Pull-based venue API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestConnector: Send + Sync {
    fn exchange(&self) -> ExchangeId;

    /// Whether `fetch_fees` reports account-specific fees. Venues without
    /// one get fees approximated from instrument metadata instead.
    fn has_dynamic_fees(&self) -> bool {
        true
    }

    async fn fetch_metadata(&self) -> Result<HashMap<Instrument, InstrumentMetadata>>;

    async fn fetch_fees(&self) -> Result<HashMap<Instrument, FeeSchedule>>;

    async fn fetch_account(&self) -> Result<AccountSnapshot>;
}

/// Item delivered by a stream subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Raw event text for the subscribed instrument
    Event(String),
    /// Error reported by the connector; the subscription may continue
    Error(String),
}

/// Push-based venue API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamConnector: Send + Sync {
    fn exchange(&self) -> ExchangeId;

    /// Open a book subscription. The connector closes the channel when the
    /// subscription ends.
    async fn subscribe(
        &self,
        instrument: &Instrument,
        depth: usize,
    ) -> Result<mpsc::Receiver<StreamItem>>;
}
