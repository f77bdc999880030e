pub mod collector;
pub mod rolling;
pub mod window;

pub use collector::StatsCollector;
pub use rolling::SymbolStats;
pub use window::{PricePoint, WindowConfig};
