//! Ingestion counters

use prometheus::{IntCounterVec, Opts, Registry};
use serde::{Deserialize, Serialize};

use super::InsertOutcome;
use crate::identity::ExchangeId;

/// Per-exchange event counts, labelled by outcome
#[derive(Debug, Clone)]
pub struct IngestionMetrics {
    events: IntCounterVec,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        let events = IntCounterVec::new(
            Opts::new(
                "aggregator_ingested_events_total",
                "Order book events received by the ingestion buffer",
            ),
            &["exchange", "outcome"],
        )
        .expect("static metric definition is valid");

        Self { events }
    }

    /// Register the counters with a prometheus registry
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.events.clone()))
    }

    pub fn record(&self, exchange: ExchangeId, outcome: InsertOutcome) {
        self.events
            .with_label_values(&[exchange.as_str(), outcome.as_str()])
            .inc();
    }

    fn count(&self, exchange: ExchangeId, outcome: InsertOutcome) -> u64 {
        self.events
            .with_label_values(&[exchange.as_str(), outcome.as_str()])
            .get()
    }

    pub fn stats(&self, exchange: ExchangeId) -> BufferStats {
        BufferStats {
            applied: self.count(exchange, InsertOutcome::Applied),
            stale: self.count(exchange, InsertOutcome::Stale),
            malformed: self.count(exchange, InsertOutcome::Malformed),
            missing_base: self.count(exchange, InsertOutcome::MissingBase),
        }
    }
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time counts for one exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats {
    pub applied: u64,
    pub stale: u64,
    pub malformed: u64,
    pub missing_base: u64,
}

impl BufferStats {
    pub fn dropped(&self) -> u64 {
        self.stale + self.malformed + self.missing_base
    }
}
