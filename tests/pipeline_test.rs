// End-to-end pipeline tests, no network connections:
//   TradeRecord → TradeBroker → { StatsCollector, indicators → consensus, ViewModel }
//
// Run with: cargo test --test pipeline_test

use std::sync::Arc;
use std::time::Duration;

use marketflow::market::trade::TradeRecord;
use marketflow::stats::collector::StatsCollector;
use marketflow::stats::window::WindowConfig;
use marketflow::strategy::consensus::SignalAggregator;
use marketflow::strategy::indicator::{spawn_indicator, Indicator};
use marketflow::strategy::rsi::RsiIndicator;
use marketflow::strategy::signals::Signal;
use marketflow::strategy::vwap::VwapIndicator;
use marketflow::streaming::broker::{BrokerConfig, TradeBroker};
use marketflow::view::ViewHost;
use tokio::sync::mpsc;

fn trade(symbol: &str, price: f64, volume: f64, ts: i64) -> TradeRecord {
    TradeRecord::new(symbol, price, volume, ts, ts + 1).unwrap()
}

// ============================================================================
// Broker fan-out
// ============================================================================

#[tokio::test]
async fn test_subscribe_before_publish_fanout() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let mut a = broker.subscribe();
    let mut b = broker.subscribe();

    for (symbol, price, ts) in [("AAPL", 150.0, 1), ("GOOGL", 2800.0, 2), ("MSFT", 350.0, 3)] {
        broker.publish(trade(symbol, price, 100.0, ts)).await.unwrap();
    }

    for sub in [&mut a, &mut b] {
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(sub.recv().await.unwrap().symbol.as_str().to_string());
        }
        assert_eq!(seen, vec!["AAPL", "GOOGL", "MSFT"]);
    }
}

#[tokio::test]
async fn test_symbol_set_filter() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let mut sub = broker.subscribe().filter_symbols(["AAPL", "GOOGL"]);

    for (i, symbol) in ["AAPL", "MSFT", "GOOGL", "TSLA", "AAPL"].iter().enumerate() {
        broker
            .publish(trade(symbol, 100.0, 10.0, i as i64 + 1))
            .await
            .unwrap();
    }
    broker.close();

    let mut seen = Vec::new();
    while let Some(t) = sub.recv().await {
        seen.push(t.symbol.as_str().to_string());
    }
    assert_eq!(seen, vec!["AAPL", "GOOGL", "AAPL"]);
}

#[tokio::test]
async fn test_per_subscriber_sequence_is_a_publish_order_subsequence() {
    let broker = Arc::new(TradeBroker::new(BrokerConfig::default()));
    let mut sub = broker.subscribe();

    let publisher = {
        let broker = broker.clone();
        tokio::spawn(async move {
            for i in 1..=200 {
                broker.publish(trade("AAPL", i as f64, 1.0, i)).await.unwrap();
            }
            broker.close();
        })
    };

    let mut last = 0;
    let mut count = 0;
    while let Some(t) = sub.recv().await {
        assert!(t.source_timestamp > last, "publish order violated");
        last = t.source_timestamp;
        count += 1;
    }
    assert_eq!(count, 200);
    publisher.await.unwrap();
}

// ============================================================================
// Rolling statistics through the broker
// ============================================================================

#[tokio::test]
async fn test_event_window_stats_through_collector() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let collector = StatsCollector::new(WindowConfig::event_based(3).unwrap());
    let task = collector.spawn(broker.subscribe());

    for (i, price) in [100.0, 110.0, 120.0, 130.0].iter().enumerate() {
        broker
            .publish(trade("AAPL", *price, 10.0, i as i64 * 1_000 + 1))
            .await
            .unwrap();
    }
    broker.close();
    task.await.unwrap();

    let stats = collector.symbol("AAPL").await.unwrap();
    assert_eq!(stats.recent_prices(), vec![110.0, 120.0, 130.0]);
    assert_eq!(stats.mean(), 120.0);
    assert_eq!(stats.min(), 110.0);
    assert_eq!(stats.max(), 130.0);
}

#[tokio::test]
async fn test_time_window_stats_through_collector() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let collector = StatsCollector::new(WindowConfig::time_based(5_000).unwrap());
    let task = collector.spawn(broker.subscribe());

    for (price, ts) in [(100.0, 1), (110.0, 2_000), (120.0, 6_000)] {
        broker.publish(trade("AAPL", price, 10.0, ts)).await.unwrap();
    }
    broker.close();
    task.await.unwrap();

    let stats = collector.symbol("AAPL").await.unwrap();
    assert_eq!(stats.recent_prices(), vec![110.0, 120.0]);
}

// ============================================================================
// Indicators and consensus over the stream
// ============================================================================

#[tokio::test]
async fn test_rsi_saturates_over_the_stream() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let (tx, mut rx) = mpsc::channel(64);
    spawn_indicator(
        broker.subscribe().filter_symbol("AAPL"),
        Box::new(RsiIndicator::new("AAPL", 14)),
        tx,
    );

    for i in 0..15 {
        broker
            .publish(trade("AAPL", 100.0 + i as f64, 10.0, i + 1))
            .await
            .unwrap();
    }
    broker.close();

    let (state, signal) = rx.recv().await.expect("one state after warm-up");
    assert_eq!(state.value, 100.0);
    match signal {
        Signal::Sell { strength, reason, .. } => {
            assert_eq!(strength, 1.0);
            assert!(reason.contains("overbought"));
        }
        other => panic!("expected sell, got {other}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_vwap_indicator_over_the_stream() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let (tx, mut rx) = mpsc::channel(64);
    spawn_indicator(
        broker.subscribe().filter_symbol("AAPL"),
        Box::new(VwapIndicator::new("AAPL", false)),
        tx,
    );

    for (price, volume, ts) in [(100.0, 100.0, 1), (110.0, 200.0, 2), (120.0, 100.0, 3)] {
        broker.publish(trade("AAPL", price, volume, ts)).await.unwrap();
    }
    broker.close();

    let mut last = None;
    while let Some((state, _)) = rx.recv().await {
        last = Some(state);
    }
    let state = last.unwrap();
    assert!((state.value - 110.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_indicator_warm_up_emits_nothing() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let (tx, mut rx) = mpsc::channel(64);
    spawn_indicator(
        broker.subscribe().filter_symbol("AAPL"),
        Box::new(RsiIndicator::new("AAPL", 14)),
        tx,
    );

    // 14 trades: only 13 deltas, still warming up.
    for i in 0..14 {
        broker
            .publish(trade("AAPL", 100.0 + i as f64, 10.0, i + 1))
            .await
            .unwrap();
    }
    broker.close();
    assert!(rx.recv().await.is_none());
}

#[test]
fn test_consensus_scenario() {
    let signals = [
        Signal::buy(0.8, 1, "a"),
        Signal::buy(0.6, 2, "b"),
        Signal::sell(0.3, 3, "c"),
    ];

    match SignalAggregator::aggregate(&signals) {
        Signal::Buy { strength, .. } => assert!((strength - 1.4 / 3.0).abs() < 1e-3),
        other => panic!("expected buy consensus, got {other}"),
    }
}

#[test]
fn test_trigger_conditions_against_live_state() {
    use marketflow::strategy::indicator::TriggerCondition;

    let mut vwap = VwapIndicator::new("AAPL", false);
    let state = vwap.update(&trade("AAPL", 150.0, 500.0, 1)).unwrap();

    assert!(vwap.check_trigger(&state, &TriggerCondition::PriceAbove(140.0)));
    assert!(!vwap.check_trigger(&state, &TriggerCondition::PriceBelow(140.0)));
    assert!(vwap.check_trigger(&state, &TriggerCondition::VolumeAbove(499.0)));
}

// ============================================================================
// View model
// ============================================================================

#[tokio::test]
async fn test_view_model_snapshot_is_newest_first_and_capped() {
    let broker = TradeBroker::new(BrokerConfig::default());
    let collector = StatsCollector::new(WindowConfig::event_based(10).unwrap());
    let stats_task = collector.spawn(broker.subscribe());

    let view = ViewHost::new(vec!["AAPL".into()], 3, 10);
    let view_task = view.spawn(broker.subscribe(), collector.clone());

    for i in 1..=5 {
        broker.publish(trade("AAPL", i as f64, 10.0, i)).await.unwrap();
    }
    broker.close();
    stats_task.await.unwrap();
    view_task.await.unwrap();

    let snapshot = view.snapshot().await;
    let prices: Vec<f64> = snapshot.recent_trades.iter().map(|t| t.price).collect();
    assert_eq!(prices, vec![5.0, 4.0, 3.0]);
    assert_eq!(snapshot.statistics["AAPL"].count, 5);
    assert_eq!(snapshot.max_trades, 3);
}

// ============================================================================
// Backpressure
// ============================================================================

#[tokio::test]
async fn test_slow_subscriber_backpressures_only_its_path() {
    const CAPACITY: usize = 4;
    const TOTAL: i64 = 20;

    let broker = Arc::new(TradeBroker::new(BrokerConfig {
        capacity: CAPACITY,
        sort_by_timestamp: false,
    }));
    // The stalled subscriber attaches first, so a fan-out that serialized in
    // insertion order would starve the fast one behind it.
    let mut slow = broker.subscribe();
    let mut fast = broker.subscribe();

    let publisher = {
        let broker = broker.clone();
        tokio::spawn(async move {
            for i in 1..=TOTAL {
                broker.publish(trade("AAPL", i as f64, 1.0, i)).await.unwrap();
            }
            broker.close();
        })
    };

    // Checkpoint: with the slow queue full and completely un-drained, the
    // fast subscriber must still receive capacity + 1 trades (its queue plus
    // the in-flight publish). A fan-out that waited on the stalled queue
    // first would never deliver the fifth trade here and the timeout fires.
    let mut fast_seen = Vec::new();
    for _ in 0..(CAPACITY + 1) {
        let t = tokio::time::timeout(Duration::from_secs(2), fast.recv())
            .await
            .expect("fast subscriber starved behind the stalled queue")
            .expect("stream ended before the checkpoint");
        fast_seen.push(t.source_timestamp);
    }
    assert_eq!(fast_seen, vec![1, 2, 3, 4, 5]);

    // Release the slow path and drain both to the end: each subscriber still
    // observes every trade in publish order.
    let fast_task = tokio::spawn(async move {
        let mut seen = fast_seen;
        while let Some(t) = fast.recv().await {
            seen.push(t.source_timestamp);
        }
        seen
    });

    let mut slow_seen = Vec::new();
    while let Some(t) = slow.recv().await {
        slow_seen.push(t.source_timestamp);
    }

    let all: Vec<i64> = (1..=TOTAL).collect();
    assert_eq!(slow_seen, all);
    assert_eq!(fast_task.await.unwrap(), all);
    publisher.await.unwrap();
}
