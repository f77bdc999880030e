use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::ValidationError;

/// A validated, non-empty instrument symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        Ok(Symbol(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single executed trade, immutable once constructed.
///
/// Every numeric field is validated by [`TradeRecord::new`]; a value that
/// fails validation never reaches a downstream queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: Symbol,
    pub price: f64,
    pub volume: f64,
    /// Exchange wall clock, epoch milliseconds.
    pub source_timestamp: i64,
    /// Local wall clock when the record left the decoder, epoch milliseconds.
    pub received_timestamp: i64,
    pub latency_ms: i64,
    /// Venue-supplied trade condition codes, in reported order.
    pub conditions: Option<Vec<String>>,
}

impl TradeRecord {
    /// Build a validated record. `received` is clamped up to `source` so the
    /// latency invariant (`latency_ms >= 0`) holds under clock skew.
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        volume: f64,
        source_timestamp: i64,
        received: i64,
    ) -> Result<Self, ValidationError> {
        let symbol = Symbol::new(symbol)?;
        if !price.is_finite() || price < 0.0 {
            return Err(ValidationError::InvalidPrice(price));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(ValidationError::InvalidVolume(volume));
        }
        if source_timestamp <= 0 {
            return Err(ValidationError::InvalidTimestamp(source_timestamp));
        }
        if received <= 0 {
            return Err(ValidationError::InvalidTimestamp(received));
        }

        let received_timestamp = received.max(source_timestamp);
        Ok(Self {
            symbol,
            price,
            volume,
            source_timestamp,
            received_timestamp,
            latency_ms: received_timestamp - source_timestamp,
            conditions: None,
        })
    }

    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = Some(conditions);
        self
    }
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade(symbol={}, price={:.2}, volume={:.4}, ts={}, latency={}ms)",
            self.symbol, self.price, self.volume, self.source_timestamp, self.latency_ms
        )
    }
}
