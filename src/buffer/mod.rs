//! Ingestion buffer
//!
//! Landing zone for streamed order book events. Each event is parsed,
//! checked against the last applied event for its key, folded into a working
//! book and forwarded to the [`Bookkeeper`] as a fresh snapshot.

mod metrics;

pub use metrics::{BufferStats, IngestionMetrics};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::AggregatorError;
use crate::identity::{BookKey, ExchangeId, Instrument};
use crate::orderbook::{Bookkeeper, OrderBook};
use crate::parser::{BookEvent, EventKind};

const DEFAULT_DEPTH: usize = 20;

/// How a venue's stream is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookMode {
    /// Every event is a full book
    Snapshot,
    /// Snapshot events set the book, update events change levels on top of it
    Delta,
}

impl FromStr for BookMode {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snapshot" | "full" => Ok(BookMode::Snapshot),
            "delta" | "incremental" => Ok(BookMode::Delta),
            other => Err(AggregatorError::ConfigError(format!("Unknown book mode: {other}"))),
        }
    }
}

/// What happened to an inserted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Forwarded to the store
    Applied,
    /// Not newer than the last applied event for the key
    Stale,
    /// Could not be parsed or validated
    Malformed,
    /// Delta arrived before any snapshot for the key
    MissingBase,
}

impl InsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertOutcome::Applied => "applied",
            InsertOutcome::Stale => "stale",
            InsertOutcome::Malformed => "malformed",
            InsertOutcome::MissingBase => "missing_base",
        }
    }

    pub fn is_applied(&self) -> bool {
        *self == InsertOutcome::Applied
    }
}

impl fmt::Display for InsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct BufferSettings {
    mode: BookMode,
    depth: usize,
}

/// Ordering markers of the events applied so far for one key.
///
/// Sequences are only compared with sequences. A timestamp decides only
/// for an event that carries no sequence.
#[derive(Debug, Clone, Copy, Default)]
struct OrderingMarks {
    sequence: Option<u64>,
    timestamp_ms: Option<u64>,
}

impl OrderingMarks {
    fn is_stale(&self, event: &BookEvent) -> bool {
        match (event.sequence, event.timestamp_ms) {
            (Some(sequence), _) => self.sequence.is_some_and(|last| sequence <= last),
            (None, Some(timestamp)) => self.timestamp_ms.is_some_and(|last| timestamp <= last),
            (None, None) => false,
        }
    }

    fn advance(&mut self, event: &BookEvent) {
        if let Some(sequence) = event.sequence {
            self.sequence = Some(sequence);
        }
        if let Some(timestamp) = event.timestamp_ms {
            let last = self.timestamp_ms.map_or(timestamp, |last| last.max(timestamp));
            self.timestamp_ms = Some(last);
        }
    }
}

/// Working state kept per key
#[derive(Debug)]
struct BufferedBook {
    book: OrderBook,
    marks: OrderingMarks,
    has_base: bool,
}

impl BufferedBook {
    fn new(depth: usize) -> Self {
        Self {
            book: OrderBook::new(depth),
            marks: OrderingMarks::default(),
            has_base: false,
        }
    }
}

/// Sink for streamed order book events
pub struct OrderBookBuffer {
    bookkeeper: Arc<Bookkeeper>,
    books: DashMap<BookKey, BufferedBook>,
    settings: HashMap<ExchangeId, BufferSettings>,
    default_settings: BufferSettings,
    metrics: IngestionMetrics,
}

impl OrderBookBuffer {
    /// Buffer treating every venue as a snapshot stream
    pub fn new(bookkeeper: Arc<Bookkeeper>) -> Self {
        Self {
            bookkeeper,
            books: DashMap::new(),
            settings: HashMap::new(),
            default_settings: BufferSettings {
                mode: BookMode::Snapshot,
                depth: DEFAULT_DEPTH,
            },
            metrics: IngestionMetrics::new(),
        }
    }

    /// Buffer with mode and depth taken from each venue's settings
    pub fn from_config(bookkeeper: Arc<Bookkeeper>, config: &Config) -> Self {
        config
            .exchanges
            .iter()
            .fold(Self::new(bookkeeper), |buffer, (exchange, c)| {
                buffer.with_exchange(*exchange, c.book_mode, c.depth)
            })
    }

    pub fn with_exchange(mut self, exchange: ExchangeId, mode: BookMode, depth: usize) -> Self {
        self.settings.insert(exchange, BufferSettings { mode, depth });
        self
    }

    pub fn book_mode(&self, exchange: ExchangeId) -> BookMode {
        self.settings_for(exchange).mode
    }

    fn settings_for(&self, exchange: ExchangeId) -> BufferSettings {
        self.settings
            .get(&exchange)
            .copied()
            .unwrap_or(self.default_settings)
    }

    pub fn metrics(&self) -> &IngestionMetrics {
        &self.metrics
    }

    pub fn stats(&self, exchange: ExchangeId) -> BufferStats {
        self.metrics.stats(exchange)
    }

    /// Ingest one raw event for the key.
    ///
    /// Never fails: malformed events are logged, counted and dropped, and
    /// leave the stored snapshot untouched.
    pub fn insert(&self, raw: &str, exchange: ExchangeId, instrument: Instrument) -> InsertOutcome {
        match BookEvent::parse(raw) {
            Ok(event) => self.apply(event, exchange, instrument),
            Err(e) => {
                warn!(
                    exchange = %exchange,
                    instrument = %instrument,
                    error = %e,
                    "Dropping malformed event"
                );
                self.finish(exchange, InsertOutcome::Malformed)
            }
        }
    }

    /// Ingest an event that is already in canonical form
    pub fn insert_event(
        &self,
        event: BookEvent,
        exchange: ExchangeId,
        instrument: Instrument,
    ) -> InsertOutcome {
        if let Err(e) = event.validate() {
            warn!(
                exchange = %exchange,
                instrument = %instrument,
                error = %e,
                "Dropping malformed event"
            );
            return self.finish(exchange, InsertOutcome::Malformed);
        }
        self.apply(event, exchange, instrument)
    }

    /// Forget the working book and last sequence for the key, e.g. after a
    /// connector resubscribes and its sequence numbers restart. The stored
    /// snapshot stays readable.
    pub fn reset(&self, exchange: ExchangeId, instrument: &Instrument) {
        if self.books.remove(&(exchange, instrument.clone())).is_some() {
            debug!(exchange = %exchange, instrument = %instrument, "Buffered book reset");
        }
    }

    fn apply(
        &self,
        event: BookEvent,
        exchange: ExchangeId,
        instrument: Instrument,
    ) -> InsertOutcome {
        let settings = self.settings_for(exchange);

        // The entry guard serializes events of this key (and only its shard)
        // through check, apply and forward, so the store sees them in the
        // same order as the sequence check.
        let mut entry = self
            .books
            .entry((exchange, instrument.clone()))
            .or_insert_with(|| BufferedBook::new(settings.depth));
        let buffered = entry.value_mut();

        if buffered.marks.is_stale(&event) {
            trace!(
                exchange = %exchange,
                instrument = %instrument,
                sequence = ?event.sequence,
                timestamp_ms = ?event.timestamp_ms,
                "Dropping stale event"
            );
            drop(entry);
            return self.finish(exchange, InsertOutcome::Stale);
        }

        match (settings.mode, event.kind) {
            (BookMode::Delta, EventKind::Update) => {
                if !buffered.has_base {
                    debug!(
                        exchange = %exchange,
                        instrument = %instrument,
                        "Dropping delta without base snapshot"
                    );
                    drop(entry);
                    return self.finish(exchange, InsertOutcome::MissingBase);
                }
                buffered.book.apply_delta(&event.bids, &event.asks);
            }
            _ => {
                buffered.book.reset(&event.bids, &event.asks);
                buffered.has_base = true;
            }
        }

        buffered.book.set_markers(event.sequence, event.timestamp_ms);
        buffered.marks.advance(&event);

        self.bookkeeper
            .upsert(exchange, instrument, buffered.book.snapshot());
        drop(entry);

        self.finish(exchange, InsertOutcome::Applied)
    }

    fn finish(&self, exchange: ExchangeId, outcome: InsertOutcome) -> InsertOutcome {
        self.metrics.record(exchange, outcome);
        outcome
    }
}
