use std::collections::VecDeque;

use crate::market::trade::TradeRecord;
use crate::strategy::indicator::{Indicator, IndicatorState};
use crate::strategy::signals::Signal;

/// Band width around the moving average before a directional signal fires.
pub(crate) const MA_SIGNAL_BAND: f64 = 0.02;
pub(crate) const MA_SIGNAL_STRENGTH: f64 = 0.6;

/// Simple moving average over the last `period` trades of one symbol.
pub struct SmaIndicator {
    id: String,
    symbol: String,
    period: usize,
    prices: VecDeque<f64>,
}

impl SmaIndicator {
    pub fn new(symbol: impl Into<String>, period: usize) -> Self {
        Self {
            id: format!("sma_{period}"),
            symbol: symbol.into(),
            period: period.max(1),
            prices: VecDeque::with_capacity(period.max(1)),
        }
    }
}

impl Indicator for SmaIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Simple Moving Average"
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

        let value = self.prices.iter().sum::<f64>() / self.period as f64;
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
                    "price {:.2} above SMA({}) {:.2}",
                    price, self.period, state.value
                ),
            )
        } else if price < state.value * (1.0 - MA_SIGNAL_BAND) {
            Signal::sell(
                MA_SIGNAL_STRENGTH,
                state.last_update,
                format!(
                    "price {:.2} below SMA({}) {:.2}",
                    price, self.period, state.value
                ),
            )
        } else {
            Signal::hold(state.last_update)
        }
    }
}
