use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

/// Flow imbalance, in absolute value, at or below which no trade is taken.
pub const DEFAULT_FLOW_THRESHOLD: f64 = 0.33;

/// Follows the aggressive order flow of each bar.
///
/// The flow is `(buys - sells) / (buys + sells)` over the bar's aggressive
/// volumes, a missing volume counting as zero. A strong buying flow buys, a
/// strong selling flow sells.
#[derive(Debug, Clone)]
pub struct TradeFlow {
    threshold: f64,
}

impl TradeFlow {
    /// ### Arguments
    /// * `threshold` - Minimum absolute flow, exclusive, to trade on.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Flow imbalance of `bar`, in `[-1, 1]`, `0` without volume.
    pub fn flow(bar: &Bar) -> f64 {
        let buys = bar.buy_volume().unwrap_or(0.0);
        let sells = bar.sell_volume().unwrap_or(0.0);
        let total = buys + sells;
        if total == 0.0 { 0.0 } else { (buys - sells) / total }
    }
}

impl Default for TradeFlow {
    fn default() -> Self {
        Self::new(DEFAULT_FLOW_THRESHOLD)
    }
}

impl TakerStrategy for TradeFlow {
    fn decide(&mut self, bar: &Bar, _inventory: f64) -> Result<Action> {
        let flow = Self::flow(bar);
        Ok(if flow.abs() <= self.threshold {
            Action::Nothing
        } else if flow >= 0.0 {
            Action::Buy
        } else {
            Action::Sell
        })
    }

    fn name(&self) -> &str {
        "trade-flow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BarBuilder;

    fn bar(buys: f64, sells: f64) -> Bar {
        BarBuilder::builder().close(100.0).flow_volumes(buys, sells).build().unwrap()
    }

    #[test]
    fn follows_strong_flow() {
        let mut flow = TradeFlow::default();
        assert_eq!(flow.decide(&bar(8.0, 2.0), 0.0).unwrap(), Action::Buy);
        assert_eq!(flow.decide(&bar(2.0, 8.0), 0.0).unwrap(), Action::Sell);
        assert_eq!(flow.decide(&bar(6.0, 4.0), 0.0).unwrap(), Action::Nothing);
    }

    #[test]
    fn missing_volume_is_no_flow() {
        let empty = BarBuilder::builder().close(100.0).build().unwrap();
        assert_eq!(TradeFlow::flow(&empty), 0.0);
        assert_eq!(TradeFlow::default().decide(&empty, 0.0).unwrap(), Action::Nothing);
        assert_eq!(TradeFlow::flow(&bar(0.0, 0.0)), 0.0);
        assert_eq!(TradeFlow::flow(&bar(0.0, 5.0)), -1.0);
    }

    #[test]
    fn threshold_is_exclusive() {
        // flow of exactly 0.5
        let mut flow = TradeFlow::new(0.5);
        assert_eq!(flow.decide(&bar(3.0, 1.0), 0.0).unwrap(), Action::Nothing);
        assert_eq!(flow.decide(&bar(4.0, 1.0), 0.0).unwrap(), Action::Buy);
    }
}
