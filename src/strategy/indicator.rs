use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::market::trade::TradeRecord;
use crate::strategy::signals::Signal;
use crate::streaming::broker::TradeSubscription;

/// Public snapshot emitted by an indicator after each processed trade.
/// The indicator's running accumulator stays private.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorState {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub last_update: i64,
    pub value: f64,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IndicatorState {
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }
}

/// A condition evaluated against an indicator's current observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerCondition {
    PriceAbove(f64),
    PriceBelow(f64),
    VolumeAbove(f64),
    VolatilityAbove(f64),
    CrossOver { fast_period: usize, slow_period: usize },
}

/// A lazy stateful stream transformer over trades.
///
/// `update` filters to the configured symbol and emits nothing during
/// warm-up; once warm it emits one state per matching trade. `signal` maps a
/// state to Buy/Sell/Hold.
pub trait Indicator: Send {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn symbol(&self) -> &str;

    fn update(&mut self, trade: &TradeRecord) -> Option<IndicatorState>;

    fn signal(&self, state: &IndicatorState) -> Signal;

    /// Default evaluation reads the shared observation keys every indicator
    /// records (`price`, `volume`, `volatility`). Cross-over triggers need
    /// dual moving-average state and are only answered by indicators that
    /// maintain it.
    fn check_trigger(&self, state: &IndicatorState, condition: &TriggerCondition) -> bool {
        match condition {
            TriggerCondition::PriceAbove(threshold) => {
                state.metadata_f64("price").is_some_and(|p| p > *threshold)
            }
            TriggerCondition::PriceBelow(threshold) => {
                state.metadata_f64("price").is_some_and(|p| p < *threshold)
            }
            TriggerCondition::VolumeAbove(threshold) => {
                state.metadata_f64("volume").is_some_and(|v| v > *threshold)
            }
            TriggerCondition::VolatilityAbove(threshold) => state
                .metadata_f64("volatility")
                .is_some_and(|v| v > *threshold),
            TriggerCondition::CrossOver { .. } => false,
        }
    }
}

/// Drive one indicator from a broker subscription, forwarding each emitted
/// state with its derived signal. The task ends with the stream or when the
/// output side hangs up.
pub fn spawn_indicator(
    mut subscription: TradeSubscription,
    mut indicator: Box<dyn Indicator>,
    out: mpsc::Sender<(IndicatorState, Signal)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(trade) = subscription.recv().await {
            if let Some(state) = indicator.update(&trade) {
                let signal = indicator.signal(&state);
                if out.send((state, signal)).await.is_err() {
                    break;
                }
            }
        }
        debug!(id = indicator.id(), "Indicator stream ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Indicator for Probe {
        fn id(&self) -> &str {
            "probe"
        }
        fn name(&self) -> &str {
            "Probe"
        }
        fn symbol(&self) -> &str {
            "AAPL"
        }
        fn update(&mut self, _trade: &TradeRecord) -> Option<IndicatorState> {
            None
        }
        fn signal(&self, state: &IndicatorState) -> Signal {
            Signal::hold(state.last_update)
        }
    }

    fn state_with(entries: &[(&str, f64)]) -> IndicatorState {
        IndicatorState {
            id: "probe".into(),
            name: "Probe".into(),
            symbol: "AAPL".into(),
            last_update: 1,
            value: 0.0,
            metadata: entries
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
                .collect(),
        }
    }

    #[test]
    fn test_default_triggers_read_observation_metadata() {
        let probe = Probe;
        let state = state_with(&[("price", 101.0), ("volume", 500.0)]);

        assert!(probe.check_trigger(&state, &TriggerCondition::PriceAbove(100.0)));
        assert!(!probe.check_trigger(&state, &TriggerCondition::PriceBelow(100.0)));
        assert!(probe.check_trigger(&state, &TriggerCondition::VolumeAbove(499.0)));
        // No volatility observation recorded: the trigger cannot fire.
        assert!(!probe.check_trigger(&state, &TriggerCondition::VolatilityAbove(0.0)));
        assert!(!probe.check_trigger(
            &state,
            &TriggerCondition::CrossOver {
                fast_period: 5,
                slow_period: 20
            }
        ));
    }
}
