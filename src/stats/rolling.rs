use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::error::StatsError;
use crate::stats::window::{PricePoint, WindowConfig};

/// 252 trading days, in milliseconds. Used to annualize volatility.
pub const TRADING_YEAR_MS: f64 = 252.0 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Rolling statistics for one symbol.
///
/// The running `sum`/`sum_squares` and all-time min/max are maintained
/// incrementally but the derived accessors read only the retained ring,
/// so a shrinking window is always reflected in the metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolStats {
    window: WindowConfig,
    pub count: u64,
    pub sum: f64,
    pub sum_squares: f64,
    pub all_time_min: f64,
    pub all_time_max: f64,
    points: VecDeque<PricePoint>,
    pub last_update_time: i64,
}

impl SymbolStats {
    pub fn new(window: WindowConfig) -> Self {
        Self {
            window,
            count: 0,
            sum: 0.0,
            sum_squares: 0.0,
            all_time_min: f64::INFINITY,
            all_time_max: f64::NEG_INFINITY,
            points: VecDeque::new(),
            last_update_time: 0,
        }
    }

    pub fn update(&mut self, price: f64, volume: f64, timestamp: i64) {
        self.count += 1;
        self.sum += price;
        self.sum_squares += price * price;
        self.all_time_min = self.all_time_min.min(price);
        self.all_time_max = self.all_time_max.max(price);
        self.last_update_time = timestamp;

        self.points.push_back(PricePoint {
            price,
            volume,
            timestamp,
        });
        self.window.retain(&mut self.points, timestamp);
    }

    pub fn window_len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn recent_prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Mean over the retained ring; 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.price).sum::<f64>() / self.points.len() as f64
    }

    /// Population standard deviation over the ring; 0 when empty.
    pub fn stddev(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .points
            .iter()
            .map(|p| (p.price - mean).powi(2))
            .sum::<f64>()
            / self.points.len() as f64;
        variance.sqrt()
    }

    /// Minimum price in the ring (not all-time); 0 when empty.
    pub fn min(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points
            .iter()
            .map(|p| p.price)
            .fold(f64::INFINITY, f64::min)
    }

    /// Maximum price in the ring (not all-time); 0 when empty.
    pub fn max(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points
            .iter()
            .map(|p| p.price)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Annualized log-return volatility in percent.
    ///
    /// stddev of consecutive log returns, scaled by
    /// sqrt(trading_year / elapsed) * 100. 0 with fewer than two points or a
    /// non-positive elapsed span.
    pub fn volatility(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let elapsed = self.elapsed_ms();
        if elapsed <= 0 {
            return 0.0;
        }

        let mut returns = Vec::with_capacity(self.points.len() - 1);
        let mut prev: Option<f64> = None;
        for p in &self.points {
            if let Some(last) = prev {
                if last > 0.0 && p.price > 0.0 {
                    returns.push((p.price / last).ln());
                }
            }
            prev = Some(p.price);
        }
        if returns.is_empty() {
            return 0.0;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        variance.sqrt() * (TRADING_YEAR_MS / elapsed as f64).sqrt() * 100.0
    }

    /// Percent rate of change from the oldest to the newest retained price.
    pub fn momentum(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let first = self.points.front().unwrap().price;
        let last = self.points.back().unwrap().price;
        if first == 0.0 {
            return 0.0;
        }
        (last - first) / first * 100.0
    }

    /// Retained points per second of elapsed window time.
    pub fn trade_velocity(&self) -> f64 {
        let elapsed = self.elapsed_ms();
        if elapsed <= 0 {
            return 0.0;
        }
        self.points.len() as f64 / elapsed as f64 * 1000.0
    }

    /// Volume-weighted average price over the ring; 0 when total volume is 0.
    pub fn vwap(&self) -> f64 {
        let total_volume: f64 = self.points.iter().map(|p| p.volume).sum();
        if total_volume == 0.0 {
            return 0.0;
        }
        let pv: f64 = self.points.iter().map(|p| p.price * p.volume).sum();
        pv / total_volume
    }

    /// Window range as a percent of the mid price.
    pub fn spread_pct(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let min = self.min();
        let max = self.max();
        let mid = (min + max) / 2.0;
        if mid == 0.0 {
            return 0.0;
        }
        (max - min) / mid * 100.0
    }

    pub fn try_mean(&self) -> Result<f64, StatsError> {
        self.require(1)?;
        Ok(self.mean())
    }

    pub fn try_stddev(&self) -> Result<f64, StatsError> {
        self.require(1)?;
        Ok(self.stddev())
    }

    pub fn try_vwap(&self) -> Result<f64, StatsError> {
        self.require(1)?;
        Ok(self.vwap())
    }

    pub fn try_volatility(&self) -> Result<f64, StatsError> {
        self.require(2)?;
        Ok(self.volatility())
    }

    pub fn try_momentum(&self) -> Result<f64, StatsError> {
        self.require(2)?;
        Ok(self.momentum())
    }

    fn require(&self, required: usize) -> Result<(), StatsError> {
        if self.points.len() < required {
            return Err(StatsError::InsufficientData {
                required,
                actual: self.points.len(),
            });
        }
        Ok(())
    }

    fn elapsed_ms(&self) -> i64 {
        match (self.points.front(), self.points.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0,
        }
    }
}
