use chrono::{Local, NaiveDate, TimeZone};

use crate::market::trade::TradeRecord;
use crate::strategy::indicator::{Indicator, IndicatorState};
use crate::strategy::signals::Signal;

const VWAP_SIGNAL_BAND: f64 = 0.015;
const VWAP_SIGNAL_STRENGTH: f64 = 0.6;

/// Cumulative volume-weighted average price, optionally reset when the
/// trade's local calendar date changes.
pub struct VwapIndicator {
    id: String,
    symbol: String,
    reset_daily: bool,
    cumulative_pv: f64,
    cumulative_volume: f64,
    last_date: Option<NaiveDate>,
}

impl VwapIndicator {
    pub fn new(symbol: impl Into<String>, reset_daily: bool) -> Self {
        Self {
            id: "vwap".to_string(),
            symbol: symbol.into(),
            reset_daily,
            cumulative_pv: 0.0,
            cumulative_volume: 0.0,
            last_date: None,
        }
    }
}

fn trade_date(timestamp_ms: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.date_naive())
}

impl Indicator for VwapIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Volume Weighted Average Price"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn update(&mut self, trade: &TradeRecord) -> Option<IndicatorState> {
        if trade.symbol.as_str() != self.symbol {
            return None;
        }

        if self.reset_daily {
            let date = trade_date(trade.source_timestamp);
            if self.last_date.is_some() && self.last_date != date {
                self.cumulative_pv = 0.0;
                self.cumulative_volume = 0.0;
            }
            self.last_date = date;
        }

        self.cumulative_pv += trade.price * trade.volume;
        self.cumulative_volume += trade.volume;

        let value = if self.cumulative_volume == 0.0 {
            trade.price
        } else {
            self.cumulative_pv / self.cumulative_volume
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
                (
                    "cumulative_volume".to_string(),
                    serde_json::json!(self.cumulative_volume),
                ),
            ]
            .into(),
        })
    }

    fn signal(&self, state: &IndicatorState) -> Signal {
        let price = match state.metadata_f64("price") {
            Some(price) => price,
            None => return Signal::hold(state.last_update),
        };

        if price > state.value * (1.0 + VWAP_SIGNAL_BAND) {
            Signal::buy(
                VWAP_SIGNAL_STRENGTH,
                state.last_update,
                format!("price {:.2} above VWAP {:.2}", price, state.value),
            )
        } else if price < state.value * (1.0 - VWAP_SIGNAL_BAND) {
            Signal::sell(
                VWAP_SIGNAL_STRENGTH,
                state.last_update,
                format!("price {:.2} below VWAP {:.2}", price, state.value),
            )
        } else {
            Signal::hold(state.last_update)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(price: f64, volume: f64, ts: i64) -> TradeRecord {
        TradeRecord::new("AAPL", price, volume, ts, ts + 1).unwrap()
    }

    #[test]
    fn test_volume_weighted_mean() {
        let mut vwap = VwapIndicator::new("AAPL", false);
        vwap.update(&trade(100.0, 100.0, 1));
        vwap.update(&trade(110.0, 200.0, 2));
        let state = vwap.update(&trade(120.0, 100.0, 3)).unwrap();
        assert!((state.value - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_volume_falls_back_to_price() {
        let mut vwap = VwapIndicator::new("AAPL", false);
        let state = vwap.update(&trade(150.0, 0.0, 1)).unwrap();
        assert_eq!(state.value, 150.0);
    }

    #[test]
    fn test_daily_reset_clears_accumulators() {
        let day_ms: i64 = 24 * 60 * 60 * 1000;
        let mut vwap = VwapIndicator::new("AAPL", true);
        // Mid-day stamp so the +1 day step crosses exactly one local date line.
        let noon = day_ms * 400 + day_ms / 2;
        vwap.update(&trade(100.0, 1_000.0, noon));

        let state = vwap.update(&trade(200.0, 10.0, noon + day_ms)).unwrap();
        assert_eq!(state.value, 200.0);
    }

    #[test]
    fn test_without_reset_accumulation_spans_days() {
        let day_ms: i64 = 24 * 60 * 60 * 1000;
        let mut vwap = VwapIndicator::new("AAPL", false);
        vwap.update(&trade(100.0, 100.0, day_ms / 2));
        let state = vwap.update(&trade(200.0, 100.0, day_ms / 2 + day_ms)).unwrap();
        assert_eq!(state.value, 150.0);
    }

    #[test]
    fn test_signal_band() {
        let mut vwap = VwapIndicator::new("AAPL", false);
        vwap.update(&trade(100.0, 100.0, 1));

        let state = vwap.update(&trade(103.0, 1.0, 2)).unwrap();
        // vwap ~ 100.03, price 103: above the 1.5% band.
        match vwap.signal(&state) {
            Signal::Buy { reason, .. } => assert!(reason.contains("above VWAP")),
            other => panic!("expected buy, got {other}"),
        }
    }
}
