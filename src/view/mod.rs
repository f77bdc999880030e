use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::market::trade::TradeRecord;
use crate::stats::collector::StatsCollector;
use crate::stats::rolling::SymbolStats;
use crate::streaming::broker::TradeSubscription;

pub const DEFAULT_REFRESH_MS: u64 = 100;
pub const DEFAULT_MAX_TRADES: usize = 20;

/// Snapshot handed to the UI layer: recent trades newest-first plus the
/// per-symbol statistics map. No persistence format.
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    pub symbols: Vec<String>,
    pub recent_trades: VecDeque<TradeRecord>,
    pub statistics: HashMap<String, SymbolStats>,
    pub max_trades: usize,
}

impl ViewModel {
    pub fn new(symbols: Vec<String>, max_trades: usize) -> Self {
        Self {
            symbols,
            recent_trades: VecDeque::with_capacity(max_trades),
            statistics: HashMap::new(),
            max_trades,
        }
    }

    /// Prepend a trade, evicting the oldest past the cap.
    pub fn push_trade(&mut self, trade: TradeRecord) {
        self.recent_trades.push_front(trade);
        self.recent_trades.truncate(self.max_trades);
    }
}

/// Owns the view model and keeps it current: each broker trade prepends to
/// `recent_trades`, and a periodic tick replaces the statistics map from the
/// collector.
pub struct ViewHost {
    model: Arc<RwLock<ViewModel>>,
    refresh: Duration,
}

impl ViewHost {
    pub fn new(symbols: Vec<String>, max_trades: usize, refresh_ms: u64) -> Self {
        Self {
            model: Arc::new(RwLock::new(ViewModel::new(symbols, max_trades))),
            refresh: Duration::from_millis(refresh_ms.max(1)),
        }
    }

    pub async fn snapshot(&self) -> ViewModel {
        self.model.read().await.clone()
    }

    /// Scan the two update sources into the shared model until the trade
    /// stream ends.
    pub fn spawn(
        &self,
        mut subscription: TradeSubscription,
        stats: StatsCollector,
    ) -> JoinHandle<()> {
        let model = self.model.clone();
        let refresh = self.refresh;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(refresh);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    maybe = subscription.recv() => match maybe {
                        Some(trade) => model.write().await.push_trade(trade),
                        None => break,
                    },
                    _ = tick.tick() => {
                        let snapshot = stats.snapshot().await;
                        model.write().await.statistics = snapshot;
                    }
                }
            }
            // One final refresh so the frozen view matches the last stats.
            let snapshot = stats.snapshot().await;
            model.write().await.statistics = snapshot;
            debug!("View host stream ended");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::window::WindowConfig;
    use crate::streaming::broker::{BrokerConfig, TradeBroker};

    fn trade(symbol: &str, price: f64, ts: i64) -> TradeRecord {
        TradeRecord::new(symbol, price, 10.0, ts, ts + 1).unwrap()
    }

    #[test]
    fn test_push_trade_is_newest_first_and_capped() {
        let mut model = ViewModel::new(vec!["AAPL".into()], 3);
        for i in 1..=5 {
            model.push_trade(trade("AAPL", i as f64, i));
        }

        let prices: Vec<f64> = model.recent_trades.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![5.0, 4.0, 3.0]);
    }

    #[test]
    fn test_cap_eviction_preserves_relative_order() {
        let mut model = ViewModel::new(vec!["AAPL".into()], 2);
        model.push_trade(trade("AAPL", 1.0, 1));
        model.push_trade(trade("AAPL", 2.0, 2));
        model.push_trade(trade("AAPL", 3.0, 3));

        // The surviving older trade keeps its position behind the newer one.
        let stamps: Vec<i64> = model.recent_trades.iter().map(|t| t.source_timestamp).collect();
        assert_eq!(stamps, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_view_host_combines_trades_and_stats() {
        let broker = TradeBroker::new(BrokerConfig::default());
        let collector = StatsCollector::new(WindowConfig::event_based(10).unwrap());
        let stats_task = collector.spawn(broker.subscribe());

        let host = ViewHost::new(vec!["AAPL".into()], 5, 10);
        let view_task = host.spawn(broker.subscribe(), collector.clone());

        broker.publish(trade("AAPL", 150.0, 1)).await.unwrap();
        broker.publish(trade("AAPL", 151.0, 2)).await.unwrap();
        broker.close();
        stats_task.await.unwrap();
        view_task.await.unwrap();

        let snapshot = host.snapshot().await;
        assert_eq!(snapshot.recent_trades.len(), 2);
        assert_eq!(snapshot.recent_trades[0].price, 151.0);
        assert_eq!(snapshot.statistics["AAPL"].count, 2);
    }
}
