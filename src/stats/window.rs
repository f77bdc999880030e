use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::error::StatsError;

/// One retained observation in a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub volume: f64,
    pub timestamp: i64,
}

/// Retention policy for a ring of [`PricePoint`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowConfig {
    /// Keep the last `size` points.
    EventBased { size: usize },
    /// Keep points no older than `duration_ms` behind the newest update.
    TimeBased { duration_ms: i64 },
    /// Time filter first, then tail-truncate to `size`.
    Hybrid { size: usize, duration_ms: i64 },
}

impl WindowConfig {
    pub fn event_based(size: usize) -> Result<Self, StatsError> {
        if size == 0 {
            return Err(StatsError::InvalidWindowConfig(
                "event window size must be > 0".into(),
            ));
        }
        Ok(WindowConfig::EventBased { size })
    }

    pub fn time_based(duration_ms: i64) -> Result<Self, StatsError> {
        if duration_ms <= 0 {
            return Err(StatsError::InvalidWindowConfig(
                "window duration must be > 0 ms".into(),
            ));
        }
        Ok(WindowConfig::TimeBased { duration_ms })
    }

    pub fn hybrid(size: usize, duration_ms: i64) -> Result<Self, StatsError> {
        if size == 0 {
            return Err(StatsError::InvalidWindowConfig(
                "event window size must be > 0".into(),
            ));
        }
        if duration_ms <= 0 {
            return Err(StatsError::InvalidWindowConfig(
                "window duration must be > 0 ms".into(),
            ));
        }
        Ok(WindowConfig::Hybrid { size, duration_ms })
    }

    /// Apply the retention policy in place. `now` is the timestamp of the
    /// update that just appended; time-based eviction is relative to it.
    pub fn retain(&self, points: &mut VecDeque<PricePoint>, now: i64) {
        match *self {
            WindowConfig::EventBased { size } => Self::truncate_front(points, size),
            WindowConfig::TimeBased { duration_ms } => Self::evict_older(points, now - duration_ms),
            WindowConfig::Hybrid { size, duration_ms } => {
                Self::evict_older(points, now - duration_ms);
                Self::truncate_front(points, size);
            }
        }
    }

    fn truncate_front(points: &mut VecDeque<PricePoint>, size: usize) {
        while points.len() > size {
            points.pop_front();
        }
    }

    fn evict_older(points: &mut VecDeque<PricePoint>, cutoff: i64) {
        while let Some(front) = points.front() {
            if front.timestamp < cutoff {
                points.pop_front();
            } else {
                break;
            }
        }
    }
}
