use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::market::trade::TradeRecord;

/// Counters for the ingest → broker path. Updated lock-free from the pump
/// task, read by the periodic reporter.
#[derive(Debug)]
pub struct PipelineMetrics {
    trades_published: AtomicU64,
    frames_dropped: AtomicU64,
    total_latency_ms: AtomicU64,
    latency_samples: AtomicUsize,
    per_symbol: Arc<RwLock<HashMap<String, SymbolThroughput>>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            trades_published: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            latency_samples: AtomicUsize::new(0),
            per_symbol: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    pub async fn record_trade(&self, trade: &TradeRecord) {
        self.trades_published.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(trade.latency_ms as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);

        let mut per_symbol = self.per_symbol.write().await;
        per_symbol
            .entry(trade.symbol.as_str().to_string())
            .or_insert_with(SymbolThroughput::new)
            .update(trade.latency_ms as u64);
    }

    pub fn record_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trades_published(&self) -> u64 {
        self.trades_published.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            0.0
        } else {
            total as f64 / samples as f64
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn trade_rate(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime == 0 {
            0.0
        } else {
            self.trades_published() as f64 / uptime as f64
        }
    }

    pub async fn stale_symbols(&self, timeout_secs: u64) -> Vec<String> {
        let per_symbol = self.per_symbol.read().await;
        per_symbol
            .iter()
            .filter(|(_, m)| m.is_stale(timeout_secs))
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    pub async fn report(&self) {
        let per_symbol = self.per_symbol.read().await;
        let mut rows: Vec<_> = per_symbol.iter().collect();
        rows.sort_by(|a, b| b.1.update_count.cmp(&a.1.update_count));

        tracing::info!(
            trades = self.trades_published(),
            dropped_frames = self.frames_dropped(),
            rate_per_sec = format!("{:.1}", self.trade_rate()),
            avg_latency_ms = format!("{:.2}", self.average_latency_ms()),
            uptime_secs = self.uptime_secs(),
            "📊 Pipeline metrics"
        );
        for (symbol, m) in rows.iter().take(10) {
            tracing::info!(
                symbol = %symbol,
                updates = m.update_count,
                avg_latency_ms = format!("{:.2}", m.average_latency_ms),
                "stream throughput"
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-symbol update counters with a running latency average.
#[derive(Debug, Clone)]
pub struct SymbolThroughput {
    pub last_update: Instant,
    pub update_count: u64,
    pub average_latency_ms: f64,
}

impl SymbolThroughput {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            update_count: 0,
            average_latency_ms: 0.0,
        }
    }

    pub fn update(&mut self, latency_ms: u64) {
        self.last_update = Instant::now();
        self.update_count += 1;
        self.average_latency_ms = (self.average_latency_ms * (self.update_count - 1) as f64
            + latency_ms as f64)
            / self.update_count as f64;
    }

    pub fn is_stale(&self, timeout_secs: u64) -> bool {
        self.last_update.elapsed().as_secs() > timeout_secs
    }
}

impl Default for SymbolThroughput {
    fn default() -> Self {
        Self::new()
    }
}
