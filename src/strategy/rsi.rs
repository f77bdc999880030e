use crate::market::trade::TradeRecord;
use crate::strategy::indicator::{Indicator, IndicatorState};
use crate::strategy::signals::Signal;

/// Relative Strength Index with Wilder smoothing.
///
/// The first `period` deltas use simple means; after that
/// `avg' = (avg * (period - 1) + delta) / period`.
pub struct RsiIndicator {
    id: String,
    symbol: String,
    period: usize,
    oversold: f64,
    overbought: f64,
    prev_price: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
    deltas_seen: usize,
}

impl RsiIndicator {
    pub fn new(symbol: impl Into<String>, period: usize) -> Self {
        Self::with_bands(symbol, period, 30.0, 70.0)
    }

    pub fn with_bands(
        symbol: impl Into<String>,
        period: usize,
        oversold: f64,
        overbought: f64,
    ) -> Self {
        let period = period.max(1);
        Self {
            id: format!("rsi_{period}"),
            symbol: symbol.into(),
            period,
            oversold,
            overbought,
            prev_price: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            deltas_seen: 0,
        }
    }

    fn rsi(&self) -> f64 {
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Indicator for RsiIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Relative Strength Index"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn update(&mut self, trade: &TradeRecord) -> Option<IndicatorState> {
        if trade.symbol.as_str() != self.symbol {
            return None;
        }

        let prev = match self.prev_price.replace(trade.price) {
            Some(prev) => prev,
            None => return None,
        };

        let delta = trade.price - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.deltas_seen += 1;

        if self.deltas_seen <= self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            if self.deltas_seen < self.period {
                return None;
            }
            self.avg_gain = self.gain_sum / self.period as f64;
            self.avg_loss = self.loss_sum / self.period as f64;
        } else {
            let n = self.period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        let value = self.rsi();
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
                ("avg_gain".to_string(), serde_json::json!(self.avg_gain)),
                ("avg_loss".to_string(), serde_json::json!(self.avg_loss)),
            ]
            .into(),
        })
    }

    fn signal(&self, state: &IndicatorState) -> Signal {
        let rsi = state.value;
        if rsi < self.oversold {
            let strength = ((self.oversold - rsi) / self.oversold).min(1.0);
            Signal::buy(
                strength,
                state.last_update,
                format!("RSI {:.1} oversold (< {:.0})", rsi, self.oversold),
            )
        } else if rsi > self.overbought {
            let strength = ((rsi - self.overbought) / (100.0 - self.overbought)).min(1.0);
            Signal::sell(
                strength,
                state.last_update,
                format!("RSI {:.1} overbought (> {:.0})", rsi, self.overbought),
            )
        } else {
            Signal::hold(state.last_update)
        }
    }
}
