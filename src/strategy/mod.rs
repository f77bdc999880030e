pub mod bollinger;
pub mod consensus;
pub mod ema;
pub mod indicator;
pub mod rsi;
pub mod signals;
pub mod sma;
pub mod volatility;
pub mod vwap;

pub use bollinger::BollingerIndicator;
pub use consensus::SignalAggregator;
pub use ema::EmaIndicator;
pub use indicator::{spawn_indicator, Indicator, IndicatorState, TriggerCondition};
pub use rsi::RsiIndicator;
pub use signals::Signal;
pub use sma::SmaIndicator;
pub use volatility::{VolatilityIndicator, VolatilityMethod};
pub use vwap::VwapIndicator;

/// The stock indicator set wired per configured symbol.
pub fn default_indicators(symbol: &str) -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(SmaIndicator::new(symbol, 20)),
        Box::new(EmaIndicator::new(symbol, 12)),
        Box::new(RsiIndicator::new(symbol, 14)),
        Box::new(BollingerIndicator::new(symbol, 20)),
        Box::new(VwapIndicator::new(symbol, true)),
        Box::new(VolatilityIndicator::new(
            symbol,
            20,
            VolatilityMethod::StdDev,
            60.0,
        )),
    ]
}
