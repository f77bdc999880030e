pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, ProviderKind};
pub use error::{BrokerClosed, ParseError, ProviderError, StatsError, ValidationError};
