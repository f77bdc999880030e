use std::fmt;

use serde::{Deserialize, Serialize};

/// A trading signal with a confidence strength in [0, 1]. `Hold` carries no
/// strength by definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Buy {
        strength: f64,
        timestamp: i64,
        reason: String,
    },
    Sell {
        strength: f64,
        timestamp: i64,
        reason: String,
    },
    Hold {
        timestamp: i64,
    },
}

impl Signal {
    pub fn buy(strength: f64, timestamp: i64, reason: impl Into<String>) -> Self {
        Signal::Buy {
            strength: strength.clamp(0.0, 1.0),
            timestamp,
            reason: reason.into(),
        }
    }

    pub fn sell(strength: f64, timestamp: i64, reason: impl Into<String>) -> Self {
        Signal::Sell {
            strength: strength.clamp(0.0, 1.0),
            timestamp,
            reason: reason.into(),
        }
    }

    pub fn hold(timestamp: i64) -> Self {
        Signal::Hold { timestamp }
    }

    pub fn strength(&self) -> f64 {
        match self {
            Signal::Buy { strength, .. } | Signal::Sell { strength, .. } => *strength,
            Signal::Hold { .. } => 0.0,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Signal::Buy { timestamp, .. }
            | Signal::Sell { timestamp, .. }
            | Signal::Hold { timestamp } => *timestamp,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Signal::Buy { reason, .. } | Signal::Sell { reason, .. } => Some(reason),
            Signal::Hold { .. } => None,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Signal::Hold { .. })
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy { strength, .. } => write!(f, "BUY({:.2})", strength),
            Signal::Sell { strength, .. } => write!(f, "SELL({:.2})", strength),
            Signal::Hold { .. } => write!(f, "HOLD"),
        }
    }
}
