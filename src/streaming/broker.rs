use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::error::BrokerClosed;
use crate::market::trade::TradeRecord;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Bounded queue depth per subscriber.
    pub capacity: usize,
    /// Re-order each published batch by source timestamp. Chunk-local only:
    /// trades across batches are never re-ordered.
    pub sort_by_timestamp: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            sort_by_timestamp: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrokerState {
    Open,
    Closed,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<TradeRecord>,
}

struct BrokerInner {
    state: BrokerState,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

/// In-process multicast of trades with one bounded queue per subscriber.
///
/// `publish` completes once every live subscriber has accepted the trade; a
/// full queue backpressures the publisher for that subscriber only. Trades
/// published before a subscription are never replayed into it.
pub struct TradeBroker {
    config: BrokerConfig,
    inner: Arc<Mutex<BrokerInner>>,
}

impl TradeBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(BrokerInner {
                state: BrokerState::Open,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Attach a new subscriber. Its queue is released when the returned
    /// handle is dropped. Subscribing to a closed broker yields an
    /// already-terminated sequence.
    pub fn subscribe(&self) -> TradeSubscription {
        let (tx, rx) = mpsc::channel(self.config.capacity);
        let mut inner = self.inner.lock().expect("broker lock poisoned");

        let id = inner.next_id;
        inner.next_id += 1;
        if inner.state == BrokerState::Open {
            inner.subscribers.push(Subscriber { id, tx });
            debug!(subscriber_id = id, total = inner.subscribers.len(), "Subscriber attached");
        }
        // On a closed broker `tx` drops here and the receiver ends immediately.

        TradeSubscription {
            id,
            rx,
            inner: Arc::clone(&self.inner),
            symbols: None,
            tap: None,
        }
    }

    /// Fan one trade out to every subscriber attached at the start of the
    /// call. Sends run concurrently: a full queue backpressures this publish
    /// without delaying delivery to subscribers that still have capacity.
    pub async fn publish(&self, trade: TradeRecord) -> Result<(), BrokerClosed> {
        let targets: Vec<(u64, mpsc::Sender<TradeRecord>)> = {
            let inner = self.inner.lock().expect("broker lock poisoned");
            if inner.state == BrokerState::Closed {
                return Err(BrokerClosed);
            }
            inner
                .subscribers
                .iter()
                .map(|s| (s.id, s.tx.clone()))
                .collect()
        };

        let sends = targets.iter().map(|(id, tx)| {
            let trade = trade.clone();
            async move { (*id, tx.send(trade).await) }
        });

        // A failed send means that subscriber's scope ended mid-publish; only
        // it loses the in-flight trade.
        let dead: Vec<u64> = join_all(sends)
            .await
            .into_iter()
            .filter(|(_, result)| result.is_err())
            .map(|(id, _)| id)
            .collect();

        if !dead.is_empty() {
            let mut inner = self.inner.lock().expect("broker lock poisoned");
            inner.subscribers.retain(|s| !dead.contains(&s.id));
            debug!(removed = dead.len(), "Dropped dead subscribers");
        }

        Ok(())
    }

    /// Publish a decoded frame batch, applying chunk-local timestamp ordering
    /// when configured.
    pub async fn publish_batch(&self, mut batch: Vec<TradeRecord>) -> Result<(), BrokerClosed> {
        if self.config.sort_by_timestamp {
            batch.sort_by_key(|t| t.source_timestamp);
        }
        for trade in batch {
            self.publish(trade).await?;
        }
        Ok(())
    }

    /// Close the broker: all subscriber sequences drain their queues and then
    /// terminate normally. Further publishes fail.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("broker lock poisoned");
        if inner.state == BrokerState::Closed {
            return;
        }
        inner.state = BrokerState::Closed;
        let released = inner.subscribers.len();
        inner.subscribers.clear();
        if released > 0 {
            warn!(subscribers = released, "Broker closed, subscriber streams ending");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("broker lock poisoned").state == BrokerState::Closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("broker lock poisoned").subscribers.len()
    }
}

type TapFn = Arc<dyn Fn(&TradeRecord) + Send + Sync>;

/// A scoped subscriber handle. Dropping it detaches the queue from the
/// broker; `recv` yields `None` once the broker closes or this handle's
/// queue is released.
pub struct TradeSubscription {
    id: u64,
    rx: mpsc::Receiver<TradeRecord>,
    inner: Arc<Mutex<BrokerInner>>,
    symbols: Option<HashSet<String>>,
    tap: Option<TapFn>,
}

impl TradeSubscription {
    /// Restrict the sequence to a single symbol.
    pub fn filter_symbol(self, symbol: impl Into<String>) -> Self {
        self.filter_symbols([symbol.into()])
    }

    /// Restrict the sequence to a set of symbols. Repeated calls widen the
    /// set.
    pub fn filter_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.symbols.get_or_insert_with(HashSet::new);
        for s in symbols {
            set.insert(s.into());
        }
        self
    }

    /// Observe every delivered trade (before symbol filtering) without
    /// consuming it.
    pub fn tap<F>(mut self, f: F) -> Self
    where
        F: Fn(&TradeRecord) + Send + Sync + 'static,
    {
        self.tap = Some(Arc::new(f));
        self
    }

    /// Next trade in publish order, `None` at end of stream.
    pub async fn recv(&mut self) -> Option<TradeRecord> {
        loop {
            let trade = self.rx.recv().await?;
            if let Some(tap) = &self.tap {
                tap(&trade);
            }
            match &self.symbols {
                Some(set) if !set.contains(trade.symbol.as_str()) => continue,
                _ => return Some(trade),
            }
        }
    }
}

impl Drop for TradeSubscription {
    fn drop(&mut self) {
        // Never panic out of a destructor, even if the broker lock poisoned.
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.retain(|s| s.id != self.id);
        }
    }
}
