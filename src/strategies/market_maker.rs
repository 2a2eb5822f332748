use crate::engine::{Bar, MakerStrategy, PlacedOrder};
use crate::errors::Result;
use tracing::trace;

/// Spread, in quote currency, used when none is configured.
pub const DEFAULT_SPREAD: f64 = 100.0;

/// Quotes one bid below the touch and one ask above it.
///
/// Quotes are refreshed every `skip_bars` bars; in between, the resting set
/// is kept as is. The side that would reduce an open position is sized to
/// unwind it entirely, the other side quotes one unit. A side whose price
/// would not be positive is left out of the refresh.
#[derive(Debug, Clone)]
pub struct MarketMaker {
    skip_bars: u32,
    spread: f64,
    bar_counter: u64,
}

impl MarketMaker {
    /// ### Arguments
    /// * `skip_bars` - Refresh period in bars, at least 1.
    /// * `spread` - Distance of each quote from the touch.
    pub fn new(skip_bars: u32, spread: f64) -> Self {
        Self {
            skip_bars: skip_bars.max(1),
            spread,
            bar_counter: 0,
        }
    }
}

impl Default for MarketMaker {
    fn default() -> Self {
        Self::new(1, DEFAULT_SPREAD)
    }
}

fn quotable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

impl MakerStrategy for MarketMaker {
    fn decide(&mut self, bar: &Bar, inventory: f64, resting: &[PlacedOrder]) -> Result<Vec<PlacedOrder>> {
        let counter = self.bar_counter;
        self.bar_counter += 1;
        if counter % self.skip_bars as u64 != 0 {
            return Ok(resting.to_vec());
        }

        let bid_amount = if inventory >= 0.0 { 1.0 } else { inventory.abs() };
        let ask_amount = if inventory <= 0.0 { 1.0 } else { inventory };
        let bid = bar.bid().unwrap_or_else(|| bar.current_price()) - self.spread;
        let ask = bar.ask().unwrap_or_else(|| bar.current_price()) + self.spread;

        let mut orders = Vec::with_capacity(2);
        if quotable(bid) {
            orders.push(PlacedOrder::bid(bid, Some(bid_amount))?);
        } else {
            trace!(bar = bar.index(), price = bid, "bid quote skipped");
        }
        if quotable(ask) {
            orders.push(PlacedOrder::ask(ask, Some(ask_amount))?);
        } else {
            trace!(bar = bar.index(), price = ask, "ask quote skipped");
        }
        Ok(orders)
    }

    fn name(&self) -> &str {
        "market-maker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BarBuilder, OrderSide};

    fn bar() -> Bar {
        BarBuilder::builder().bid(1000.0).ask(1002.0).build().unwrap()
    }

    #[test]
    fn quotes_around_the_touch() {
        let mut mm = MarketMaker::new(1, 10.0);
        let orders = mm.decide(&bar(), 0.0, &[]).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side(), OrderSide::Bid);
        assert_eq!(orders[0].price(), 990.0);
        assert_eq!(orders[0].amount(), Some(1.0));
        assert_eq!(orders[1].side(), OrderSide::Ask);
        assert_eq!(orders[1].price(), 1012.0);
        assert_eq!(orders[1].amount(), Some(1.0));
    }

    #[test]
    fn unwinds_open_inventory() {
        let mut mm = MarketMaker::new(1, 10.0);
        let orders = mm.decide(&bar(), 3.0, &[]).unwrap();
        assert_eq!(orders[0].amount(), Some(1.0));
        assert_eq!(orders[1].amount(), Some(3.0));

        let orders = mm.decide(&bar(), -2.0, &[]).unwrap();
        assert_eq!(orders[0].amount(), Some(2.0));
        assert_eq!(orders[1].amount(), Some(1.0));
    }

    #[test]
    fn keeps_resting_between_refreshes() {
        let mut mm = MarketMaker::new(3, 10.0);
        let first = mm.decide(&bar(), 0.0, &[]).unwrap();
        let kept = mm.decide(&bar(), 0.0, &first).unwrap();
        assert_eq!(kept, first);
        let kept = mm.decide(&bar(), 0.0, &first).unwrap();
        assert_eq!(kept, first);
        let refreshed = mm.decide(&bar(), 0.0, &first).unwrap();
        assert_ne!(refreshed[0], first[0]);
    }

    #[test]
    fn low_priced_asset_quotes_only_the_ask() {
        let cheap = BarBuilder::builder().bid(49.0).ask(51.0).build().unwrap();
        let mut mm = MarketMaker::default();
        let orders = mm.decide(&cheap, 0.0, &[]).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side(), OrderSide::Ask);
        assert_eq!(orders[0].price(), 151.0);
    }

    #[test]
    fn priceless_bar_quotes_nothing_below_zero() {
        let empty = BarBuilder::builder().build().unwrap();
        let mut mm = MarketMaker::new(1, 10.0);
        let orders = mm.decide(&empty, 0.0, &[]).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side(), OrderSide::Ask);
    }

    #[test]
    fn degenerate_bar_does_not_abort_the_run() {
        use crate::engine::{PositionSimulator, Strategy};

        let bars = vec![
            BarBuilder::builder().timestamp(0.0).bid(1000.0).ask(1002.0).build().unwrap(),
            BarBuilder::builder().timestamp(60.0).build().unwrap(),
            BarBuilder::builder().timestamp(120.0).bid(40.0).ask(42.0).build().unwrap(),
            BarBuilder::builder().timestamp(180.0).bid(1000.0).ask(1002.0).build().unwrap(),
        ];
        let mut simulator = PositionSimulator::new(Strategy::maker(MarketMaker::default()), 1.0, 0.0, None).unwrap();
        simulator.process_bars(bars).unwrap();
        assert_eq!(simulator.bars().len(), 4);
    }
}
