//! Exchange and instrument identity
//!
//! Value types used as lookup keys by every store in the crate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::AggregatorError;

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeId {
    CoinbasePro,
    Kraken,
    Bitfinex,
    Gemini,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 4] = [
        ExchangeId::CoinbasePro,
        ExchangeId::Kraken,
        ExchangeId::Bitfinex,
        ExchangeId::Gemini,
    ];

    /// Display name of the venue
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::CoinbasePro => "CoinbasePro",
            ExchangeId::Kraken => "Kraken",
            ExchangeId::Bitfinex => "Bitfinex",
            ExchangeId::Gemini => "Gemini",
        }
    }

    /// Prefix used for this venue's environment variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ExchangeId::CoinbasePro => "COINBASE_PRO",
            ExchangeId::Kraken => "KRAKEN",
            ExchangeId::Bitfinex => "BITFINEX",
            ExchangeId::Gemini => "GEMINI",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        ExchangeId::ALL
            .into_iter()
            .find(|e| e.as_str().to_lowercase() == normalized)
            .ok_or_else(|| AggregatorError::UnknownExchange(s.to_string()))
    }
}

/// Uppercase currency code (e.g. "BTC").
///
/// Shared so that cloning a key on the lookup path does not allocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency(Arc<str>);

impl Currency {
    pub fn new(code: &str) -> Self {
        Self(Arc::from(code.trim().to_uppercase()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Currency::new(code)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Currency::new(&code))
    }
}

/// A tradable pair, e.g. BTC/USD
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instrument {
    pub base: Currency,
    pub quote: Currency,
}

impl Instrument {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: Currency::new(base),
            quote: Currency::new(quote),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Instrument {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| AggregatorError::InvalidInstrument(s.to_string()))?;

        if base.trim().is_empty() || quote.trim().is_empty() || quote.contains('/') {
            return Err(AggregatorError::InvalidInstrument(s.to_string()));
        }

        Ok(Instrument::new(base, quote))
    }
}

/// Composite key of every per-instrument store
pub type BookKey = (ExchangeId, Instrument);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exchange() {
        assert_eq!(ExchangeId::from_str("Kraken").unwrap(), ExchangeId::Kraken);
        assert_eq!(
            ExchangeId::from_str("COINBASE_PRO").unwrap(),
            ExchangeId::CoinbasePro
        );
        assert_eq!(
            ExchangeId::from_str("coinbasepro").unwrap(),
            ExchangeId::CoinbasePro
        );
        assert!(ExchangeId::from_str("binance").is_err());
    }

    #[test]
    fn test_exchange_display_matches_parse() {
        for exchange in ExchangeId::ALL {
            assert_eq!(ExchangeId::from_str(&exchange.to_string()).unwrap(), exchange);
        }
    }

    #[test]
    fn test_parse_instrument() {
        let instrument = Instrument::from_str(" btc/usd ").unwrap();
        assert_eq!(instrument, Instrument::new("BTC", "USD"));
        assert_eq!(instrument.to_string(), "BTC/USD");
    }

    #[test]
    fn test_parse_instrument_rejects_missing_component() {
        assert!(Instrument::from_str("BTCUSD").is_err());
        assert!(Instrument::from_str("BTC/").is_err());
        assert!(Instrument::from_str("/USD").is_err());
    }

    #[test]
    fn test_parse_instrument_rejects_extra_separator() {
        assert!(Instrument::from_str("BTC/USD/EUR").is_err());
        assert!(Instrument::from_str("BTC//USD").is_err());
    }

    #[test]
    fn test_currency_clone_shares_code() {
        let instrument = Instrument::new("btc", "usd");
        let key = instrument.clone();
        assert!(Arc::ptr_eq(&instrument.base.0, &key.base.0));
        assert!(Arc::ptr_eq(&instrument.quote.0, &key.quote.0));
    }

    #[test]
    fn test_currency_serializes_as_code() {
        let json = serde_json::to_string(&Instrument::new("BTC", "USD")).unwrap();
        assert_eq!(json, r#"{"base":"BTC","quote":"USD"}"#);

        let parsed: Instrument = serde_json::from_str(r#"{"base":"eth","quote":"usd"}"#).unwrap();
        assert_eq!(parsed, Instrument::new("ETH", "USD"));
    }
}
