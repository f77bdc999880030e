use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use marketflow::core::config::{Config, ProviderKind};
use marketflow::core::logging;
use marketflow::market::finnhub::FinnhubProvider;
use marketflow::market::polygon::PolygonProvider;
use marketflow::market::provider::MarketDataProvider;
use marketflow::stats::collector::StatsCollector;
use marketflow::strategy::consensus::SignalAggregator;
use marketflow::strategy::indicator::{spawn_indicator, IndicatorState};
use marketflow::strategy::signals::Signal;
use marketflow::strategy::default_indicators;
use marketflow::streaming::broker::TradeBroker;
use marketflow::streaming::metrics::PipelineMetrics;
use marketflow::view::ViewHost;

#[derive(Debug, Parser)]
#[clap(name = "marketflow", version, about = "Real-time trade fan-out and analytics")]
struct Cli {
    /// Provider credential (Finnhub token or Polygon API key)
    #[clap(long)]
    token: Option<String>,

    /// Symbols to subscribe, comma-separated
    #[clap(long, value_delimiter = ',')]
    symbol: Vec<String>,

    /// Override the provider WebSocket URL
    #[clap(long)]
    url: Option<String>,

    /// Recent-trade cap in the view model
    #[clap(long)]
    max_trades: Option<usize>,

    /// Event-window size for rolling statistics
    #[clap(long)]
    window_size: Option<usize>,

    /// Periodically log stream throughput and latency
    #[clap(long)]
    enhanced_metrics: bool,

    /// Market data provider: finnhub or polygon
    #[clap(long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    config.apply_cli(
        cli.provider.as_deref(),
        cli.token.as_deref(),
        &cli.symbol,
        cli.url.as_deref(),
        cli.max_trades,
        cli.window_size,
        cli.enhanced_metrics,
    )?;

    logging::init_logging(&config.log_level);
    info!("🚀 marketflow {} starting", env!("CARGO_PKG_VERSION"));
    info!(provider = ?config.provider, symbols = ?config.symbols, "Configuration loaded");

    if config.active_token().is_empty() {
        bail!("no credential configured: pass --token or set the provider env var");
    }
    if config.symbols.is_empty() {
        bail!("no symbols configured: pass --symbol or set SYMBOLS");
    }

    let mut provider: Box<dyn MarketDataProvider> = match config.provider {
        ProviderKind::Finnhub => Box::new(FinnhubProvider::new(
            config.finnhub.ws_url.clone(),
            config.finnhub.token.clone(),
        )),
        ProviderKind::Polygon => Box::new(PolygonProvider::new(
            config.polygon.ws_url.clone(),
            config.polygon.api_key.clone(),
        )),
    };

    provider
        .authenticate()
        .await
        .context("provider authentication failed")?;
    let mut stream = provider
        .subscribe(&config.symbols)
        .await
        .context("provider subscription failed")?;

    let broker = Arc::new(TradeBroker::new(config.broker.clone()));
    let metrics = Arc::new(PipelineMetrics::new());

    // Consumers attach before the pump publishes anything.
    let collector = StatsCollector::new(config.window.clone());
    let stats_task = collector.spawn(broker.subscribe());

    let view = ViewHost::new(
        config.symbols.clone(),
        config.view.max_trades,
        config.view.refresh_ms,
    );
    let view_task = view.spawn(broker.subscribe(), collector.clone());

    let (signal_tx, signal_rx) = mpsc::channel(256);
    for symbol in &config.symbols {
        for indicator in default_indicators(symbol) {
            spawn_indicator(
                broker.subscribe().filter_symbol(symbol.clone()),
                indicator,
                signal_tx.clone(),
            );
        }
    }
    drop(signal_tx);
    let consensus_task = tokio::spawn(run_consensus(signal_rx));

    if config.enhanced_metrics {
        let reporter = metrics.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                tick.tick().await;
                reporter.report().await;
            }
        });
    }

    let pump_broker = broker.clone();
    let pump_metrics = metrics.clone();
    let pump = tokio::spawn(async move {
        while let Some(batch) = stream.recv().await {
            for trade in &batch {
                pump_metrics.record_trade(trade).await;
            }
            if pump_broker.publish_batch(batch).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupt received, shutting down"),
        _ = pump => warn!("Provider stream ended, statistics frozen"),
    }

    broker.close();
    let _ = stats_task.await;
    let _ = view_task.await;
    let _ = consensus_task.await;

    let snapshot = view.snapshot().await;
    info!(
        trades_seen = metrics.trades_published(),
        symbols_tracked = snapshot.statistics.len(),
        "Shutdown complete"
    );
    Ok(())
}

/// Collect the latest signal per (symbol, indicator) and log the per-symbol
/// consensus whenever it leaves Hold.
async fn run_consensus(mut rx: mpsc::Receiver<(IndicatorState, Signal)>) {
    let mut latest: HashMap<String, HashMap<String, Signal>> = HashMap::new();

    while let Some((state, signal)) = rx.recv().await {
        let per_symbol = latest.entry(state.symbol.clone()).or_default();
        per_symbol.insert(state.id.clone(), signal);

        let signals: Vec<Signal> = per_symbol.values().cloned().collect();
        let consensus = SignalAggregator::aggregate(&signals);
        if !consensus.is_hold() {
            info!(
                symbol = %state.symbol,
                consensus = %consensus,
                reason = consensus.reason().unwrap_or(""),
                "📣 Consensus signal"
            );
        }
    }
}
