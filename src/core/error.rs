use thiserror::Error;

/// Errors raised by a market-data provider.
///
/// `Unauthenticated` is fatal and non-retryable; the remaining variants are
/// connection-level and the operator may retry. Mid-stream transport failures
/// are not surfaced through this type at all: the trade stream simply ends.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected credentials: {0}")]
    Unauthenticated(String),

    #[error("failed to connect to provider: {0}")]
    ConnectFailed(String),

    #[error("provider transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Unauthenticated(_))
    }
}

/// A domain value failed its construction-time constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("symbol must be non-empty")]
    EmptySymbol,

    #[error("price must be finite and non-negative, got {0}")]
    InvalidPrice(f64),

    #[error("volume must be finite and non-negative, got {0}")]
    InvalidVolume(f64),

    #[error("timestamp must be a positive epoch-ms value, got {0}")]
    InvalidTimestamp(i64),
}

/// A provider frame could not be decoded. Recovered locally: the frame is
/// logged and dropped, the stream continues.
#[derive(Debug, Error)]
#[error("malformed provider frame: {0}")]
pub struct ParseError(pub String);

/// Errors from the rolling-statistics engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("not enough data points: need {required}, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid window config: {0}")]
    InvalidWindowConfig(String),
}

/// The broker refused a publish because it has been closed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("trade broker is closed")]
pub struct BrokerClosed;
