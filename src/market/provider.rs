use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::error::ProviderError;
use crate::market::trade::TradeRecord;

/// One decoded provider frame's worth of trades.
pub type TradeBatch = Vec<TradeRecord>;

/// Lazy sequence of trade batches from a provider.
///
/// Ends when the transport fails or closes; end-of-stream is a normal
/// terminal condition, not an error. A stream is not restartable — reopening
/// requires a fresh `subscribe`.
pub struct TradeStream {
    rx: mpsc::Receiver<TradeBatch>,
}

impl TradeStream {
    pub fn new(rx: mpsc::Receiver<TradeBatch>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<TradeBatch> {
        self.rx.recv().await
    }
}

/// A source of real-time trades.
///
/// `authenticate` establishes the connection and is fatal on credential
/// rejection. `subscribe` consumes the established connection and yields the
/// decoded stream; the consumer owns any reconnection policy.
#[async_trait]
pub trait MarketDataProvider: Send {
    async fn authenticate(&mut self) -> Result<(), ProviderError>;

    async fn subscribe(&mut self, symbols: &[String]) -> Result<TradeStream, ProviderError>;
}

/// Depth of the decoder → broker channel. Bounds memory at ingest while the
/// broker applies its own per-subscriber backpressure.
pub(crate) const INGEST_BUFFER: usize = 256;

/// Classify a websocket connect failure: an HTTP 401/403 during the upgrade
/// is a credential rejection, anything else is retryable.
pub(crate) fn classify_connect_error(err: tokio_tungstenite::tungstenite::Error) -> ProviderError {
    use tokio_tungstenite::tungstenite::Error;

    match err {
        Error::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            ProviderError::Unauthenticated(format!("HTTP {}", response.status()))
        }
        other => ProviderError::ConnectFailed(other.to_string()),
    }
}
