use crate::strategy::signals::Signal;

/// Minimum share of total possible strength a side must reach before the
/// consensus commits to a direction.
const CONSENSUS_THRESHOLD: f64 = 0.3;

/// Weighted consensus across a batch of indicator signals.
pub struct SignalAggregator;

impl SignalAggregator {
    /// Score each side by summed strength; a side wins when it beats the
    /// other and clears `0.3 * |signals|`. Anything else is Hold at the
    /// latest input timestamp.
    pub fn aggregate(signals: &[Signal]) -> Signal {
        if signals.is_empty() {
            return Signal::hold(0);
        }

        let n = signals.len() as f64;
        let latest = signals.iter().map(Signal::timestamp).max().unwrap_or(0);

        let mut buy_score = 0.0;
        let mut sell_score = 0.0;
        let mut buy_reasons: Vec<&str> = Vec::new();
        let mut sell_reasons: Vec<&str> = Vec::new();

        for signal in signals {
            match signal {
                Signal::Buy { strength, reason, .. } => {
                    buy_score += strength;
                    if !reason.is_empty() {
                        buy_reasons.push(reason);
                    }
                }
                Signal::Sell { strength, reason, .. } => {
                    sell_score += strength;
                    if !reason.is_empty() {
                        sell_reasons.push(reason);
                    }
                }
                Signal::Hold { .. } => {}
            }
        }

        let threshold = CONSENSUS_THRESHOLD * n;
        if buy_score > sell_score && buy_score > threshold {
            Signal::buy(buy_score / n, latest, buy_reasons.join("; "))
        } else if sell_score > buy_score && sell_score > threshold {
            Signal::sell(sell_score / n, latest, sell_reasons.join("; "))
        } else {
            Signal::hold(latest)
        }
    }
}
