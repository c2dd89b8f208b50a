use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that abort a single run before or during validation. Insufficient
/// indicator data and numeric degeneracies are not errors; they have defined
/// fallback values in the signal generator and metrics calculator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid date range: end {end} is not after start {start}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("No market data for {pair} between {start} and {end}")]
    NoMarketData {
        pair: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Unknown strategy type '{0}'")]
    UnknownStrategy(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
