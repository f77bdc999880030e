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

pub const DEFAULT_POLYGON_WS_URL: &str = "wss://socket.polygon.io/stocks";

const NANOS_PER_MS: i64 = 1_000_000;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Polygon.io real-time trade provider.
///
/// Unlike Finnhub the credential travels in an explicit auth frame after
/// connect; `authenticate` waits for the auth status event before handing
/// the socket to `subscribe`.
pub struct PolygonProvider {
    ws_url: String,
    api_key: String,
    socket: Option<WsStream>,
}

impl PolygonProvider {
    pub fn new(ws_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_key: api_key.into(),
            socket: None,
        }
    }
}

#[async_trait]
impl MarketDataProvider for PolygonProvider {
    async fn authenticate(&mut self) -> Result<(), ProviderError> {
        info!(url = %self.ws_url, "Connecting to Polygon");
        let (mut socket, _) = connect_async(&self.ws_url)
            .await
            .map_err(classify_connect_error)?;

        let auth = serde_json::json!({"action": "auth", "params": self.api_key});
        socket
            .send(Message::Text(auth.to_string()))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        // Polygon acknowledges with status events; wait for the auth result.
        while let Some(msg) = socket.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => {
                    return Err(ProviderError::ConnectFailed(
                        "connection closed during auth".into(),
                    ))
                }
                Ok(_) => continue,
                Err(e) => return Err(ProviderError::Transport(e.to_string())),
            };

            for event in decode_status_events(&text) {
                match event.status.as_str() {
                    "auth_success" => {
                        info!("✅ Polygon authentication accepted");
                        self.socket = Some(socket);
                        return Ok(());
                    }
                    "auth_failed" => {
                        return Err(ProviderError::Unauthenticated(
                            event.message.unwrap_or_else(|| "auth_failed".into()),
                        ))
                    }
                    other => debug!(status = %other, "Polygon status"),
                }
            }
        }

        Err(ProviderError::ConnectFailed(
            "stream ended before auth completed".into(),
        ))
    }

    async fn subscribe(&mut self, symbols: &[String]) -> Result<TradeStream, ProviderError> {
        let socket = self.socket.take().ok_or_else(|| {
            ProviderError::Unauthenticated("authenticate() must be called before subscribe".into())
        })?;
        let (mut write, read) = socket.split();

        let params = symbols
            .iter()
            .map(|s| format!("T.{s}"))
            .collect::<Vec<_>>()
            .join(",");
        let frame = serde_json::json!({"action": "subscribe", "params": params});
        write
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        info!(count = symbols.len(), params = %params, "📡 Subscribed to Polygon trades");

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
                    Ok(batch) => {
                        if batch.is_empty() {
                            continue;
                        }
                        if tx.send(batch).await.is_err() {
                            debug!("Trade consumer gone, stopping Polygon stream");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping malformed frame"),
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) => {
                info!("Polygon closed the connection");
                break;
            }
            Err(e) => {
                error!(error = %e, "Polygon transport error, stream ending");
                break;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    ev: String,
    #[serde(default)]
    sym: Option<String>,
    #[serde(default)]
    p: Option<f64>,
    #[serde(default)]
    s: Option<f64>,
    /// Nanoseconds since epoch.
    #[serde(default)]
    t: Option<i64>,
    #[serde(default)]
    c: Option<Vec<i64>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug)]
struct StatusEvent {
    status: String,
    message: Option<String>,
}

fn decode_status_events(text: &str) -> Vec<StatusEvent> {
    let events: Vec<WireEvent> = match serde_json::from_str(text) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Dropping malformed frame during auth");
            return Vec::new();
        }
    };
    events
        .into_iter()
        .filter(|e| e.ev == "status")
        .map(|e| StatusEvent {
            status: e.status.unwrap_or_default(),
            message: e.message,
        })
        .collect()
}

/// A Polygon frame is a JSON array mixing trade (`ev:"T"`) and status events.
/// Status events are informational only.
fn decode_frame(text: &str, received: i64) -> Result<Vec<TradeRecord>, ParseError> {
    let events: Vec<WireEvent> =
        serde_json::from_str(text).map_err(|e| ParseError(e.to_string()))?;

    let mut trades = Vec::new();
    for event in events {
        match event.ev.as_str() {
            "T" => {
                let (sym, p, s, t) = match (event.sym, event.p, event.s, event.t) {
                    (Some(sym), Some(p), Some(s), Some(t)) => (sym, p, s, t),
                    _ => {
                        warn!("Discarding trade event with missing fields");
                        continue;
                    }
                };
                match TradeRecord::new(sym, p, s, t / NANOS_PER_MS, received) {
                    Ok(trade) => trades.push(match event.c {
                        Some(codes) => trade
                            .with_conditions(codes.iter().map(|c| c.to_string()).collect()),
                        None => trade,
                    }),
                    Err(e) => warn!(error = %e, "Discarding invalid trade payload"),
                }
            }
            "status" => {
                debug!(
                    status = event.status.as_deref().unwrap_or(""),
                    message = event.message.as_deref().unwrap_or(""),
                    "Polygon status"
                );
            }
            other => debug!(kind = %other, "Ignoring event type"),
        }
    }
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_trade_event_converts_nanoseconds() {
        let text = r#"[{"ev":"T","sym":"AAPL","p":175.42,"s":100,"t":1699372845123000000,"c":[12,37]}]"#;
        let batch = decode_frame(text, 1_699_372_845_150).unwrap();

        assert_eq!(batch.len(), 1);
        let trade = &batch[0];
        assert_eq!(trade.symbol.as_str(), "AAPL");
        assert_eq!(trade.source_timestamp, 1_699_372_845_123);
        assert_eq!(trade.latency_ms, 27);
        assert_eq!(trade.conditions.as_deref().unwrap(), ["12", "37"]);
    }

    #[test]
    fn test_status_events_are_informational() {
        let text = r#"[{"ev":"status","status":"connected","message":"Connected Successfully"}]"#;
        assert!(decode_frame(text, 1_000).unwrap().is_empty());

        let statuses = decode_status_events(text);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, "connected");
    }

    #[test]
    fn test_mixed_frame_keeps_only_trades() {
        let text = r#"[{"ev":"status","status":"success"},{"ev":"T","sym":"MSFT","p":350.0,"s":50,"t":2000000000}]"#;
        let batch = decode_frame(text, 5_000).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].symbol.as_str(), "MSFT");
        assert_eq!(batch[0].source_timestamp, 2_000);
    }

    #[test]
    fn test_malformed_frame_is_parse_error() {
        assert!(decode_frame(r#"{"not":"an array"}"#, 1).is_err());
    }
}
