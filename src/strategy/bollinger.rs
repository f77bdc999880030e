use std::collections::VecDeque;

use crate::market::trade::TradeRecord;
use crate::strategy::indicator::{Indicator, IndicatorState};
use crate::strategy::signals::Signal;

/// Bollinger bands: SMA centerline with a k-sigma envelope.
pub struct BollingerIndicator {
    id: String,
    symbol: String,
    period: usize,
    k: f64,
    prices: VecDeque<f64>,
}

impl BollingerIndicator {
    pub fn new(symbol: impl Into<String>, period: usize) -> Self {
        Self::with_k(symbol, period, 2.0)
    }

    pub fn with_k(symbol: impl Into<String>, period: usize, k: f64) -> Self {
        let period = period.max(1);
        Self {
            id: format!("bollinger_{period}"),
            symbol: symbol.into(),
            period,
            k,
            prices: VecDeque::with_capacity(period),
        }
    }
}

impl Indicator for BollingerIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Bollinger Bands"
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

        let sma = self.prices.iter().sum::<f64>() / self.period as f64;
        let variance = self
            .prices
            .iter()
            .map(|p| (p - sma).powi(2))
            .sum::<f64>()
            / self.period as f64;
        let sigma = variance.sqrt();
        let upper = sma + self.k * sigma;
        let lower = sma - self.k * sigma;

        let percent_b = if upper == lower {
            0.5
        } else {
            (trade.price - lower) / (upper - lower)
        };
        let bandwidth = if sma == 0.0 {
            0.0
        } else {
            (upper - lower) / sma * 100.0
        };

        Some(IndicatorState {
            id: self.id.clone(),
            name: self.name().to_string(),
            symbol: self.symbol.clone(),
            last_update: trade.source_timestamp,
            value: sma,
            metadata: [
                ("price".to_string(), serde_json::json!(trade.price)),
                ("volume".to_string(), serde_json::json!(trade.volume)),
                ("upper".to_string(), serde_json::json!(upper)),
                ("lower".to_string(), serde_json::json!(lower)),
                ("percent_b".to_string(), serde_json::json!(percent_b)),
                ("bandwidth".to_string(), serde_json::json!(bandwidth)),
            ]
            .into(),
        })
    }

    fn signal(&self, state: &IndicatorState) -> Signal {
        let (price, lower, upper, percent_b) = match (
            state.metadata_f64("price"),
            state.metadata_f64("lower"),
            state.metadata_f64("upper"),
            state.metadata_f64("percent_b"),
        ) {
            (Some(p), Some(l), Some(u), Some(b)) => (p, l, u, b),
            _ => return Signal::hold(state.last_update),
        };

        if upper > lower && price <= lower {
            Signal::buy(
                percent_b.abs().min(1.0),
                state.last_update,
                format!("price {:.2} at/below lower band {:.2}", price, lower),
            )
        } else if upper > lower && price >= upper {
            Signal::sell(
                percent_b.min(1.0),
                state.last_update,
                format!("price {:.2} at/above upper band {:.2}", price, upper),
            )
        } else {
            Signal::hold(state.last_update)
        }
    }
}
