//! Configuration module for the market aggregator

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use crate::buffer::BookMode;
use crate::error::AggregatorError;
use crate::identity::{ExchangeId, Instrument};

const DEFAULT_PAIRS: &str = "BTC/USD,ETH/USD";
const DEFAULT_DEPTH: usize = 20;

/// Per-venue settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeConfig {
    /// Disabled venues get no connectors
    pub enabled: bool,

    /// Instruments to track
    pub instruments: Vec<Instrument>,

    /// Order book depth levels to maintain
    pub depth: usize,

    /// Whether the venue streams full books or deltas
    pub book_mode: BookMode,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            instruments: vec![Instrument::new("BTC", "USD"), Instrument::new("ETH", "USD")],
            depth: DEFAULT_DEPTH,
            book_mode: BookMode::Snapshot,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Settings for every known venue, enabled or not
    pub exchanges: BTreeMap<ExchangeId, ExchangeConfig>,

    /// Interval between REST metadata/fee/account refreshes
    pub refresh_interval_secs: u64,

    /// Port of the health/metrics/query HTTP server
    pub http_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value source.
    ///
    /// Missing or unparseable scalars fall back to defaults; an invalid
    /// instrument or book mode is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut exchanges = BTreeMap::new();

        for exchange in ExchangeId::ALL {
            let prefix = exchange.env_prefix();
            let var = |name: &str| lookup(&format!("{prefix}_{name}"));

            let instruments = var("PAIRS")
                .unwrap_or_else(|| DEFAULT_PAIRS.to_string())
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(Instrument::from_str)
                .collect::<Result<Vec<_>, _>>()?;

            let book_mode = match var("BOOK_MODE") {
                Some(mode) => BookMode::from_str(&mode)?,
                None => BookMode::Snapshot,
            };

            exchanges.insert(
                exchange,
                ExchangeConfig {
                    enabled: var("ENABLED")
                        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                        .unwrap_or(true),
                    instruments,
                    depth: var("DEPTH")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_DEPTH),
                    book_mode,
                },
            );
        }

        Ok(Self {
            exchanges,
            refresh_interval_secs: lookup("REFRESH_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            http_port: lookup("HTTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(9090),
        })
    }

    /// Settings of one venue
    pub fn exchange(&self, exchange: ExchangeId) -> Result<&ExchangeConfig, AggregatorError> {
        self.exchanges
            .get(&exchange)
            .ok_or_else(|| AggregatorError::ConfigError(format!("No settings for {exchange}")))
    }

    /// Venues with `enabled` set
    pub fn enabled_exchanges(&self) -> Vec<ExchangeId> {
        self.exchanges
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(e, _)| *e)
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchanges: ExchangeId::ALL
                .into_iter()
                .map(|e| (e, ExchangeConfig::default()))
                .collect(),
            refresh_interval_secs: 60,
            http_port: 9090,
        }
    }
}
