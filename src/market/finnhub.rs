use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use crate::core::error::{ParseError, ProviderError};
use crate::market::provider::{
    classify_connect_error, MarketDataProvider, TradeStream, INGEST_BUFFER,
};
use crate::market::trade::TradeRecord;

pub const DEFAULT_FINNHUB_WS_URL: &str = "wss://ws.finnhub.io";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Finnhub real-time trade provider.
///
/// The token rides on the connection URL; each symbol gets its own
/// subscribe frame once the socket is up.
pub struct FinnhubProvider {
    ws_url: String,
    token: String,
    socket: Option<WsStream>,
}

impl FinnhubProvider {
    pub fn new(ws_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            token: token.into(),
            socket: None,
        }
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    async fn authenticate(&mut self) -> Result<(), ProviderError> {
        let url = format!("{}?token={}", self.ws_url, self.token);
        info!(url = %self.ws_url, "Connecting to Finnhub");

        let (socket, _) = connect_async(&url).await.map_err(classify_connect_error)?;
        self.socket = Some(socket);
        info!("✅ Finnhub connection established");
        Ok(())
    }

    async fn subscribe(&mut self, symbols: &[String]) -> Result<TradeStream, ProviderError> {
        let socket = self.socket.take().ok_or_else(|| {
            ProviderError::Unauthenticated("authenticate() must be called before subscribe".into())
        })?;
        let (mut write, read) = socket.split();

        for symbol in symbols {
            let frame = serde_json::json!({"type": "subscribe", "symbol": symbol});
            write
                .send(Message::Text(frame.to_string()))
                .await
                .map_err(|e| ProviderError::Transport(e.to_string()))?;
        }
        info!(count = symbols.len(), symbols = ?symbols, "📡 Subscribed to Finnhub trades");

        let (tx, rx) = mpsc::channel(INGEST_BUFFER);
        tokio::spawn(run_stream(write, read, tx));
        Ok(TradeStream::new(rx))
    }
}

async fn run_stream(
    mut write: futures_util::stream::SplitSink<WsStream, Message>,
    mut read: futures_util::stream::SplitStream<WsStream>,
    tx: mpsc::Sender<Vec<TradeRecord>>,
) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let received = Utc::now().timestamp_millis();
                match decode_frame(&text, received) {
                    Ok(Decoded::Trades(batch)) => {
                        if batch.is_empty() {
                            continue;
                        }
                        if tx.send(batch).await.is_err() {
                            debug!("Trade consumer gone, stopping Finnhub stream");
                            break;
                        }
                    }
                    Ok(Decoded::Ping) => debug!("Finnhub keepalive ping"),
                    Ok(Decoded::ProviderError(msg)) => {
                        warn!(msg = %msg, "Finnhub reported an error, stream continues")
                    }
                    Ok(Decoded::Ignored(kind)) => debug!(kind = %kind, "Ignoring frame type"),
                    Err(e) => warn!(error = %e, "Dropping malformed frame"),
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) => {
                info!("Finnhub closed the connection");
                break;
            }
            Err(e) => {
                error!(error = %e, "Finnhub transport error, stream ending");
                break;
            }
            _ => {}
        }
    }
    // tx drops here: subscribers observe a normal end of stream.
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Vec<WireTrade>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTrade {
    s: String,
    p: f64,
    v: f64,
    t: i64,
    #[serde(default)]
    c: Option<Vec<String>>,
}

#[derive(Debug)]
enum Decoded {
    Trades(Vec<TradeRecord>),
    Ping,
    ProviderError(String),
    Ignored(String),
}

fn decode_frame(text: &str, received: i64) -> Result<Decoded, ParseError> {
    let frame: WireFrame =
        serde_json::from_str(text).map_err(|e| ParseError(e.to_string()))?;

    match frame.kind.as_str() {
        "trade" => {
            let mut trades = Vec::with_capacity(frame.data.len());
            for wire in frame.data {
                match TradeRecord::new(wire.s, wire.p, wire.v, wire.t, received) {
                    Ok(trade) => trades.push(match wire.c {
                        Some(conditions) => trade.with_conditions(conditions),
                        None => trade,
                    }),
                    Err(e) => warn!(error = %e, "Discarding invalid trade payload"),
                }
            }
            Ok(Decoded::Trades(trades))
        }
        "ping" => Ok(Decoded::Ping),
        "error" => Ok(Decoded::ProviderError(frame.msg.unwrap_or_default())),
        other => Ok(Decoded::Ignored(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_trade_frame() {
        let text = r#"{"type":"trade","data":[{"s":"AAPL","p":175.42,"v":100,"t":1699372845123,"c":["T","F"]}]}"#;
        let batch = match decode_frame(text, 1_699_372_845_150).unwrap() {
            Decoded::Trades(batch) => batch,
            other => panic!("expected trades, got {:?}", other),
        };

        assert_eq!(batch.len(), 1);
        let trade = &batch[0];
        assert_eq!(trade.symbol.as_str(), "AAPL");
        assert_eq!(trade.price, 175.42);
        assert_eq!(trade.volume, 100.0);
        assert_eq!(trade.source_timestamp, 1_699_372_845_123);
        assert_eq!(trade.latency_ms, 27);
        assert_eq!(
            trade.latency_ms,
            trade.received_timestamp - trade.source_timestamp
        );
        assert_eq!(trade.conditions.as_deref().unwrap(), ["T", "F"]);
    }

    #[test]
    fn test_decode_skips_invalid_trades_in_batch() {
        let text = r#"{"type":"trade","data":[{"s":"AAPL","p":-1.0,"v":100,"t":1000},{"s":"MSFT","p":350.0,"v":50,"t":1001}]}"#;
        let batch = match decode_frame(text, 2_000).unwrap() {
            Decoded::Trades(batch) => batch,
            other => panic!("expected trades, got {:?}", other),
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].symbol.as_str(), "MSFT");
    }

    #[test]
    fn test_decode_ping_and_error_frames() {
        assert!(matches!(
            decode_frame(r#"{"type":"ping"}"#, 1).unwrap(),
            Decoded::Ping
        ));
        match decode_frame(r#"{"type":"error","msg":"too many symbols"}"#, 1).unwrap() {
            Decoded::ProviderError(msg) => assert_eq!(msg, "too many symbols"),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_type_is_ignored() {
        assert!(matches!(
            decode_frame(r#"{"type":"news","data":[]}"#, 1).unwrap(),
            Decoded::Ignored(kind) if kind == "news"
        ));
    }

    #[test]
    fn test_decode_malformed_json_is_parse_error() {
        assert!(decode_frame("{not json", 1).is_err());
    }
}
