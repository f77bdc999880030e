pub mod broker;
pub mod metrics;

pub use broker::{BrokerConfig, TradeBroker, TradeSubscription};
pub use metrics::{PipelineMetrics, SymbolThroughput};
