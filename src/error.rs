//! Error types for the market aggregator

use thiserror::Error;

/// Aggregator errors
///
/// None of these ever escape the data plane (`upsert`, `get`, `insert`);
/// they are reported by the components that own the failing input.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for AggregatorError {
    fn from(err: serde_json::Error) -> Self {
        AggregatorError::MalformedEvent(err.to_string())
    }
}

impl From<std::io::Error> for AggregatorError {
    fn from(err: std::io::Error) -> Self {
        AggregatorError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
