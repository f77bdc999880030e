use std::collections::VecDeque;

use crate::market::trade::TradeRecord;
use crate::strategy::indicator::{Indicator, IndicatorState};
use crate::strategy::signals::Signal;
use crate::strategy::sma::{MA_SIGNAL_BAND, MA_SIGNAL_STRENGTH};

/// Exponential moving average, alpha = 2 / (period + 1), seeded with the
/// simple mean of the first `period` prices.
pub struct EmaIndicator {
    id: String,
    symbol: String,
    period: usize,
    alpha: f64,
    warmup: VecDeque<f64>,
    ema: Option<f64>,
}

impl EmaIndicator {
    pub fn new(symbol: impl Into<String>, period: usize) -> Self {
        let period = period.max(1);
        Self {
            id: format!("ema_{period}"),
            symbol: symbol.into(),
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            warmup: VecDeque::with_capacity(period),
            ema: None,
        }
    }
}

impl Indicator for EmaIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Exponential Moving Average"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn update(&mut self, trade: &TradeRecord) -> Option<IndicatorState> {
        if trade.symbol.as_str() != self.symbol {
            return None;
        }

        let value = match self.ema {
            Some(prev) => {
                let next = trade.price * self.alpha + prev * (1.0 - self.alpha);
                self.ema = Some(next);
                next
            }
            None => {
                self.warmup.push_back(trade.price);
                if self.warmup.len() < self.period {
                    return None;
                }
                let seed = self.warmup.iter().sum::<f64>() / self.period as f64;
                self.warmup.clear();
                self.ema = Some(seed);
                seed
            }
        };

        Some(IndicatorState {
            id: self.id.clone(),
            name: self.name().to_string(),
            symbol: self.symbol.clone(),
            last_update: trade.source_timestamp,
            value,
            metadata: [
                ("price".to_string(), serde_json::json!(trade.price)),
                ("volume".to_string(), serde_json::json!(trade.volume)),
                ("period".to_string(), serde_json::json!(self.period)),
            ]
            .into(),
        })
    }

    fn signal(&self, state: &IndicatorState) -> Signal {
        let price = match state.metadata_f64("price") {
            Some(price) => price,
            None => return Signal::hold(state.last_update),
        };

        if price > state.value * (1.0 + MA_SIGNAL_BAND) {
            Signal::buy(
                MA_SIGNAL_STRENGTH,
                state.last_update,
                format!(
                    "price {:.2} above EMA({}) {:.2}",
                    price, self.period, state.value
                ),
            )
        } else if price < state.value * (1.0 - MA_SIGNAL_BAND) {
            Signal::sell(
                MA_SIGNAL_STRENGTH,
                state.last_update,
                format!(
                    "price {:.2} below EMA({}) {:.2}",
                    price, self.period, state.value
                ),
            )
        } else {
            Signal::hold(state.last_update)
        }
    }
}
