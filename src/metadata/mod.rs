//! Exchange metadata module
//!
//! Fee schedules, instrument trading rules and account snapshots reported by
//! each venue's REST API, and the concurrent store that aggregates them.

mod aggregator;

pub use aggregator::MetadataAggregator;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::identity::{Currency, Instrument};

/// Where a fee schedule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSource {
    /// Reported by the venue's account-specific fee endpoint
    Dynamic,
    /// Derived from static instrument metadata; may not match the account's tier
    Approximated,
}

/// Maker/taker rates for one instrument, as fractions (0.0026 = 0.26%)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker: Decimal,
    pub taker: Decimal,
    pub source: FeeSource,
}

impl FeeSchedule {
    pub fn dynamic(maker: Decimal, taker: Decimal) -> Self {
        Self {
            maker,
            taker,
            source: FeeSource::Dynamic,
        }
    }

    /// Fee derived from the instrument's static trading fee, used for both
    /// sides. `None` when the venue reports no static fee.
    pub fn approximated_from(metadata: &InstrumentMetadata) -> Option<Self> {
        metadata.trading_fee.map(|fee| Self {
            maker: fee,
            taker: fee,
            source: FeeSource::Approximated,
        })
    }

    pub fn is_approximated(&self) -> bool {
        self.source == FeeSource::Approximated
    }
}

/// Build a full fee map from instrument metadata, for venues without a
/// dynamic fee endpoint. Instruments without a static fee are left out.
pub fn approximate_fees(
    metadata: &HashMap<Instrument, InstrumentMetadata>,
) -> HashMap<Instrument, FeeSchedule> {
    metadata
        .iter()
        .filter_map(|(instrument, meta)| {
            FeeSchedule::approximated_from(meta).map(|fee| (instrument.clone(), fee))
        })
        .collect()
}

/// Trading rules and limits reported for one instrument
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    /// Number of decimal places accepted for prices
    pub price_scale: Option<u32>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Static trading fee published with the instrument list
    pub trading_fee: Option<Decimal>,
}

/// Wallet balance for one currency
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub total: Decimal,
    pub available: Decimal,
    pub frozen: Decimal,
}

impl Balance {
    pub fn new(total: Decimal, available: Decimal) -> Self {
        Self {
            total,
            available,
            frozen: total - available,
        }
    }
}

/// Account state on one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balances: HashMap<Currency, Balance>,
    /// Account-level maker fee, if the venue reports one
    pub maker_fee: Option<Decimal>,
    /// Account-level taker fee, if the venue reports one
    pub taker_fee: Option<Decimal>,
    pub captured_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(balances: HashMap<Currency, Balance>) -> Self {
        Self {
            balances,
            maker_fee: None,
            taker_fee: None,
            captured_at: Utc::now(),
        }
    }

    pub fn balance(&self, currency: &Currency) -> Option<&Balance> {
        self.balances.get(currency)
    }
}
