//! Connector task management
//!
//! Spawns one task per REST refresher and per stream subscription, each
//! stoppable through its own [`SubscriptionHandle`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{RestConnector, StreamConnector, StreamItem};
use crate::buffer::OrderBookBuffer;
use crate::config::Config;
use crate::error::{AggregatorError, Result};
use crate::identity::{ExchangeId, Instrument};
use crate::metadata::{approximate_fees, MetadataAggregator};

/// Handle to a running connector task.
///
/// Dropping the handle stops the task as well; `unsubscribe` additionally
/// waits for it to finish.
#[derive(Debug)]
pub struct SubscriptionHandle {
    exchange: ExchangeId,
    name: String,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    fn new(
        exchange: ExchangeId,
        name: String,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            exchange,
            name,
            shutdown,
            task: Some(task),
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Stop the task and wait for it to exit
    pub async fn unsubscribe(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    exchange = %self.exchange,
                    name = %self.name,
                    error = %e,
                    "Connector task ended abnormally"
                );
            }
        }
        debug!(exchange = %self.exchange, name = %self.name, "Unsubscribed");
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Pull metadata, fees and account state once and bulk-upsert each.
///
/// The three steps are independent: a failing step is logged and leaves
/// that kind's previous value in place.
pub async fn refresh_once(
    connector: &dyn RestConnector,
    aggregator: &MetadataAggregator,
) -> Result<()> {
    let exchange = connector.exchange();
    let mut failed = Vec::new();

    match connector.fetch_metadata().await {
        Ok(metadata) => {
            if !connector.has_dynamic_fees() {
                aggregator.upsert_fee_map(exchange, approximate_fees(&metadata));
            }
            aggregator.upsert_metadata(exchange, metadata);
        }
        Err(e) => {
            warn!(exchange = %exchange, error = %e, "Metadata refresh failed");
            failed.push("metadata");
        }
    }

    if connector.has_dynamic_fees() {
        match connector.fetch_fees().await {
            Ok(fees) => aggregator.upsert_fee_map(exchange, fees),
            Err(e) => {
                warn!(exchange = %exchange, error = %e, "Fee refresh failed");
                failed.push("fees");
            }
        }
    }

    match connector.fetch_account().await {
        Ok(account) => aggregator.upsert_account_info(exchange, account),
        Err(e) => {
            warn!(exchange = %exchange, error = %e, "Account refresh failed");
            failed.push("account");
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AggregatorError::Connector(format!(
            "{exchange} refresh failed for {}",
            failed.join(", ")
        )))
    }
}

/// Refresh on a fixed interval, starting immediately, until unsubscribed
pub fn spawn_refresh(
    connector: Arc<dyn RestConnector>,
    aggregator: Arc<MetadataAggregator>,
    period: Duration,
) -> SubscriptionHandle {
    let exchange = connector.exchange();
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(exchange = %exchange, period_secs = period.as_secs(), "Starting REST refresh");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = refresh_once(connector.as_ref(), &aggregator).await {
                        error!(exchange = %exchange, error = %e, "REST refresh incomplete");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        info!(exchange = %exchange, "REST refresh stopped");
    });

    SubscriptionHandle::new(exchange, "refresh".to_string(), shutdown, task)
}

/// Subscribe to one instrument and pump its events into the buffer.
///
/// Connector errors are logged and the pump keeps going; it exits when the
/// connector closes the channel or the handle is unsubscribed.
pub fn spawn_stream(
    connector: Arc<dyn StreamConnector>,
    buffer: Arc<OrderBookBuffer>,
    instrument: Instrument,
    depth: usize,
) -> SubscriptionHandle {
    let exchange = connector.exchange();
    let name = format!("book:{instrument}");
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut events = tokio::select! {
            subscribed = connector.subscribe(&instrument, depth) => match subscribed {
                Ok(events) => events,
                Err(e) => {
                    error!(
                        exchange = %exchange,
                        instrument = %instrument,
                        error = %e,
                        "Subscription failed"
                    );
                    return;
                }
            },
            _ = shutdown_rx.changed() => return,
        };

        // A new subscription may restart the venue's sequence numbers
        buffer.reset(exchange, &instrument);
        info!(exchange = %exchange, instrument = %instrument, depth, "Subscribed to order book");

        loop {
            tokio::select! {
                item = events.recv() => match item {
                    Some(StreamItem::Event(raw)) => {
                        buffer.insert(&raw, exchange, instrument.clone());
                    }
                    Some(StreamItem::Error(e)) => {
                        error!(
                            exchange = %exchange,
                            instrument = %instrument,
                            error = %e,
                            "Error in order book subscription"
                        );
                    }
                    None => {
                        warn!(
                            exchange = %exchange,
                            instrument = %instrument,
                            "Order book stream closed"
                        );
                        break;
                    }
                },
                _ = shutdown_rx.changed() => break,
            }
        }

        info!(exchange = %exchange, instrument = %instrument, "Order book subscription stopped");
    });

    SubscriptionHandle::new(exchange, name, shutdown, task)
}

/// Registered venue adapters, started according to the configuration
#[derive(Default)]
pub struct ConnectorSet {
    rest: Vec<Arc<dyn RestConnector>>,
    streams: Vec<Arc<dyn StreamConnector>>,
}

impl ConnectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rest(mut self, connector: Arc<dyn RestConnector>) -> Self {
        self.rest.push(connector);
        self
    }

    pub fn with_stream(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.streams.push(connector);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty() && self.streams.is_empty()
    }

    /// Spawn refreshers and one subscription per configured instrument for
    /// every enabled venue. Disabled venues are skipped with a warning.
    pub fn start(
        &self,
        config: &Config,
        aggregator: &Arc<MetadataAggregator>,
        buffer: &Arc<OrderBookBuffer>,
    ) -> Vec<SubscriptionHandle> {
        let period = Duration::from_secs(config.refresh_interval_secs.max(1));
        let mut handles = Vec::new();

        for connector in &self.rest {
            let exchange = connector.exchange();
            match config.exchange(exchange) {
                Ok(settings) if settings.enabled => {
                    handles.push(spawn_refresh(
                        Arc::clone(connector),
                        Arc::clone(aggregator),
                        period,
                    ));
                }
                _ => warn!(exchange = %exchange, "REST connector disabled"),
            }
        }

        for connector in &self.streams {
            let exchange = connector.exchange();
            match config.exchange(exchange) {
                Ok(settings) if settings.enabled => {
                    for instrument in &settings.instruments {
                        handles.push(spawn_stream(
                            Arc::clone(connector),
                            Arc::clone(buffer),
                            instrument.clone(),
                            settings.depth,
                        ));
                    }
                }
                _ => warn!(exchange = %exchange, "Stream connector disabled"),
            }
        }

        handles
    }
}
