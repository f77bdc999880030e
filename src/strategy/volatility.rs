use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::market::trade::TradeRecord;
use crate::strategy::indicator::{Indicator, IndicatorState};
use crate::strategy::signals::Signal;

const VOL_SIGNAL_STRENGTH: f64 = 0.6;

/// Annualization factor for per-observation returns: 252 trading days.
const ANNUALIZATION: f64 = 252.0;

/// Volatility estimator choice. `Atr` and `Parkinson` reduce to the
/// close-to-close estimate here: the trade stream carries no high/low range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolatilityMethod {
    StdDev,
    Atr,
    Parkinson,
}

/// Rolling simple-return volatility, annualized to percent, with a
/// rising/falling qualifier against the previous emission.
pub struct VolatilityIndicator {
    id: String,
    symbol: String,
    period: usize,
    method: VolatilityMethod,
    high_threshold: f64,
    prices: VecDeque<f64>,
    prev_value: Option<f64>,
}

impl VolatilityIndicator {
    pub fn new(
        symbol: impl Into<String>,
        period: usize,
        method: VolatilityMethod,
        high_threshold: f64,
    ) -> Self {
        let period = period.max(2);
        Self {
            id: format!("volatility_{period}"),
            symbol: symbol.into(),
            period,
            method,
            high_threshold,
            prices: VecDeque::with_capacity(period),
            prev_value: None,
        }
    }

    fn compute(&self) -> f64 {
        let returns: Vec<f64> = self
            .prices
            .iter()
            .zip(self.prices.iter().skip(1))
            .filter(|(prev, _)| **prev != 0.0)
            .map(|(prev, next)| next / prev - 1.0)
            .collect();
        if returns.is_empty() {
            return 0.0;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        variance.sqrt() * ANNUALIZATION.sqrt() * 100.0
    }
}

impl Indicator for VolatilityIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Volatility"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn update(&mut self, trade: &TradeRecord) -> Option<IndicatorState> {
        if trade.symbol.as_str() != self.symbol {
            return None;
        }

        self.prices.push_back(trade.price);
        if self.prices.len() > self.period {
            self.prices.pop_front();
        }
        if self.prices.len() < self.period {
            return None;
        }

        let value = self.compute();
        let rising = self.prev_value.map(|prev| value > prev);
        self.prev_value = Some(value);

        Some(IndicatorState {
            id: self.id.clone(),
            name: self.name().to_string(),
            symbol: self.symbol.clone(),
            last_update: trade.source_timestamp,
            value,
            metadata: [
                ("price".to_string(), serde_json::json!(trade.price)),
                ("volume".to_string(), serde_json::json!(trade.volume)),
                ("volatility".to_string(), serde_json::json!(value)),
                ("method".to_string(), serde_json::json!(self.method)),
                ("rising".to_string(), serde_json::json!(rising)),
                (
                    "threshold".to_string(),
                    serde_json::json!(self.high_threshold),
                ),
            ]
            .into(),
        })
    }

    fn signal(&self, state: &IndicatorState) -> Signal {
        let volatility = state.value;
        let rising = state
            .metadata
            .get("rising")
            .and_then(|v| v.as_bool());

        match rising {
            Some(true) if volatility > self.high_threshold => Signal::sell(
                VOL_SIGNAL_STRENGTH,
                state.last_update,
                format!(
                    "volatility {:.1}% above {:.1}% and rising",
                    volatility, self.high_threshold
                ),
            ),
            Some(false) if volatility < self.high_threshold / 2.0 => Signal::buy(
                VOL_SIGNAL_STRENGTH,
                state.last_update,
                format!(
                    "volatility {:.1}% below {:.1}% and falling",
                    volatility,
                    self.high_threshold / 2.0
                ),
            ),
            _ => Signal::hold(state.last_update),
        }
    }
}
