use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

/// Change of the book imbalance, in percent, needed to trade.
pub const DEFAULT_IMBALANCE_CHANGE: f64 = 4.0;

/// Fades sudden shifts of the resting book imbalance.
///
/// The imbalance is `(bid - ask) / (bid + ask)` over the resting liquidity of
/// each side. When it rises by more than the threshold since the previous
/// bar, the strategy sells; when it falls by more, it buys. A bar without a
/// known imbalance restarts the measure.
#[derive(Debug, Clone)]
pub struct OrderBook {
    threshold: f64,
    last_ratio: Option<f64>,
}

impl OrderBook {
    /// ### Arguments
    /// * `threshold` - Imbalance change, in percent, to trade on.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_ratio: None,
        }
    }

    /// Book imbalance of `bar`, `None` without liquidity on both sides.
    pub fn imbalance(bar: &Bar) -> Option<f64> {
        let bid = bar.bid_liquidity()?;
        let ask = bar.ask_liquidity()?;
        let total = bid + ask;
        (total != 0.0).then(|| (bid - ask) / total)
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new(DEFAULT_IMBALANCE_CHANGE)
    }
}

impl TakerStrategy for OrderBook {
    fn decide(&mut self, bar: &Bar, _inventory: f64) -> Result<Action> {
        let ratio = Self::imbalance(bar);
        let (Some(ratio), Some(last)) = (ratio, std::mem::replace(&mut self.last_ratio, ratio)) else {
            return Ok(Action::Nothing);
        };

        let change = (ratio - last) * 100.0;
        Ok(if change > self.threshold {
            Action::Sell
        } else if change < -self.threshold {
            Action::Buy
        } else {
            Action::Nothing
        })
    }

    fn name(&self) -> &str {
        "order-book"
    }
}
