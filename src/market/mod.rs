pub mod finnhub;
pub mod polygon;
pub mod provider;
pub mod trade;

pub use finnhub::FinnhubProvider;
pub use polygon::PolygonProvider;
pub use provider::{MarketDataProvider, TradeBatch, TradeStream};
pub use trade::{Symbol, TradeRecord};
