use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::stats::rolling::SymbolStats;
use crate::stats::window::WindowConfig;
use crate::streaming::broker::TradeSubscription;

/// Broker subscriber that maintains per-symbol rolling statistics.
///
/// The map is the only state shared across tasks; every update is a single
/// read-modify-write under the lock so concurrent snapshots always see whole
/// states. No output side effects.
#[derive(Clone)]
pub struct StatsCollector {
    window: WindowConfig,
    stats: Arc<RwLock<HashMap<String, SymbolStats>>>,
}

impl StatsCollector {
    pub fn new(window: WindowConfig) -> Self {
        Self {
            window,
            stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Consume a subscription until its stream ends.
    pub fn spawn(&self, mut subscription: TradeSubscription) -> JoinHandle<()> {
        let window = self.window.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            while let Some(trade) = subscription.recv().await {
                let mut map = stats.write().await;
                map.entry(trade.symbol.as_str().to_string())
                    .or_insert_with(|| SymbolStats::new(window.clone()))
                    .update(trade.price, trade.volume, trade.source_timestamp);
            }
            debug!("Stats collector stream ended");
        })
    }

    pub async fn snapshot(&self) -> HashMap<String, SymbolStats> {
        self.stats.read().await.clone()
    }

    pub async fn symbol(&self, symbol: &str) -> Option<SymbolStats> {
        self.stats.read().await.get(symbol).cloned()
    }
}
