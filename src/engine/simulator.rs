use tracing::{debug, trace, warn};

use crate::{
    engine::*,
    errors::{Error, Result},
    metrics::{ProfitInfo, ReportMeta},
    report::PeriodReporter,
};

/// Mutable execution state, kept apart from the strategy so both can be borrowed at once.
#[derive(Debug, Default)]
struct Ledger {
    order_size: f64,
    inventory: Inventory,
    trades: Vec<Trade>,
    resting: Vec<PlacedOrder>,
}

impl Ledger {
    /// Executes a taker decision at the bar's ask (buy) or bid (sell).
    fn execute_action(&mut self, bar: &Bar, action: Action) {
        let buy = match action {
            Action::Nothing => return,
            Action::Buy => true,
            Action::Sell => false,
        };
        let price = if buy { bar.buy_price() } else { bar.sell_price() };

        let (amount, state) = if self.is_opposite(buy) {
            (self.inventory.close(), PositionState::Close)
        } else if self.inventory.is_capped() {
            trace!(bar = bar.index(), units = self.inventory.units(), "inventory cap reached, {action:?} refused");
            return;
        } else {
            (self.order_size, self.inventory.add(buy, self.order_size))
        };

        self.record(bar, buy, amount, price, state);
    }

    /// Fills the resting orders crossed by `bar` and drops the ones blocked by the cap.
    fn fill_resting_orders(&mut self, bar: &Bar) {
        if self.resting.is_empty() {
            return;
        }

        let (low, high) = (bar.maker_low(), bar.maker_high());
        let resting = std::mem::take(&mut self.resting);
        for order in resting {
            let buy = order.side() == OrderSide::Bid;
            let opposite = self.is_opposite(buy);

            if !opposite && self.inventory.is_capped() {
                trace!(bar = bar.index(), order = order.id(), "inventory cap reached, order removed");
                continue;
            }
            if !order.is_crossed(low, high) {
                self.resting.push(order);
                continue;
            }

            let (amount, state) = if opposite {
                (self.inventory.close(), PositionState::Close)
            } else {
                let amount = order.amount().unwrap_or(self.order_size);
                (amount, self.inventory.add(buy, amount))
            };
            self.record(bar, buy, amount, order.price(), state);
        }
    }

    /// Replaces the resting set; orders missing from `orders` are cancelled.
    fn replace_resting(&mut self, bar: &Bar, orders: Vec<PlacedOrder>) {
        for cancelled in self.resting.iter().filter(|o| !orders.contains(*o)) {
            trace!(bar = bar.index(), order = cancelled.id(), "order cancelled");
        }
        self.resting = orders;
    }

    /// Closes any open position at the bar's bid (long) or ask (short).
    fn flatten(&mut self, bar: &Bar) {
        if self.inventory.is_flat() {
            return;
        }
        let buy = self.inventory.is_short();
        let price = if buy { bar.buy_price() } else { bar.sell_price() };
        let amount = self.inventory.close();
        self.record(bar, buy, amount, price, PositionState::Close);
    }

    fn is_opposite(&self, buy: bool) -> bool {
        if buy {
            self.inventory.is_short()
        } else {
            self.inventory.is_long()
        }
    }

    fn record(&mut self, bar: &Bar, buy: bool, amount: f64, price: f64, state: PositionState) {
        if price <= 0.0 {
            warn!(bar = bar.index(), timestamp = bar.timestamp(), "no usable price on bar, trading at {price}");
        }
        let amount = if buy { amount } else { -amount };
        let trade = Trade::from((bar.timestamp(), amount, price, bar.index(), self.inventory.units(), state));
        debug!("{trade}");
        self.trades.push(trade);
    }
}

/// Replays bars through a strategy and records the resulting trades.
///
/// The simulator owns the strategy, the open inventory and the append-only
/// trade list. Reports are computed on demand from the trades.
#[derive(Debug)]
pub struct PositionSimulator {
    strategy: Strategy,
    fee: f64,
    base_symbol: String,
    quote_symbol: String,
    display_fee: bool,
    bars: Vec<Bar>,
    ledger: Ledger,
}

impl PositionSimulator {
    /// Creates a new simulator.
    ///
    /// ### Arguments
    /// * `strategy` - Taker or maker strategy driving the run.
    /// * `order_size` - Base amount of one inventory unit.
    /// * `fee` - Fee rate as a fraction (e.g. `0.001` for 0.1%), only used by reports.
    /// * `max_inventory` - Cap on the absolute inventory, unbounded when `None`.
    ///
    /// ### Returns
    /// The new simulator or an error.
    ///
    /// ### Example
    /// ```rust
    /// use simple_backtester::prelude::*;
    ///
    /// let strategy = Strategy::taker_fn(|_, _| Ok(Action::Buy));
    /// let mut sim = PositionSimulator::new(strategy, 1.0, 0.001, Some(2)).unwrap();
    ///
    /// let bars = (0..4).map(|i| {
    ///     BarBuilder::builder()
    ///         .timestamp(i as f64)
    ///         .bid(99.0)
    ///         .ask(101.0)
    ///         .build()
    ///         .unwrap()
    /// });
    /// sim.process_bars(bars).unwrap();
    /// assert_eq!(sim.trades().len(), 2);
    /// assert_eq!(sim.inventory(), 2);
    /// ```
    pub fn new(strategy: Strategy, order_size: f64, fee: f64, max_inventory: Option<u32>) -> Result<Self> {
        if order_size <= 0.0 || !order_size.is_finite() {
            return Err(Error::NegZeroOrderSize(order_size));
        }
        if fee < 0.0 || !fee.is_finite() {
            return Err(Error::NegativeFee(fee));
        }

        Ok(Self {
            strategy,
            fee,
            base_symbol: String::new(),
            quote_symbol: String::new(),
            display_fee: false,
            bars: Vec::new(),
            ledger: Ledger {
                order_size,
                inventory: Inventory::new(max_inventory),
                ..Default::default()
            },
        })
    }

    /// Sets the symbols shown in reports.
    pub fn with_symbols(mut self, base: impl Into<String>, quote: impl Into<String>) -> Self {
        self.base_symbol = base.into();
        self.quote_symbol = quote.into();
        self
    }

    /// Shows the fee-adjusted PnL in report lines.
    pub fn display_fee(mut self, display: bool) -> Self {
        self.display_fee = display;
        self
    }

    /// Returns the strategy name.
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Returns the fee rate.
    pub fn fee(&self) -> f64 {
        self.fee
    }

    /// Returns the base amount of one inventory unit.
    pub fn order_size(&self) -> f64 {
        self.ledger.order_size
    }

    /// Returns the executed trades in generation order.
    pub fn trades(&self) -> &[Trade] {
        &self.ledger.trades
    }

    /// Returns the processed bars.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Returns the open inventory in units.
    pub fn inventory(&self) -> i32 {
        self.ledger.inventory.units()
    }

    /// Returns the open position in base amount.
    pub fn position(&self) -> f64 {
        self.ledger.inventory.position()
    }

    /// Returns the largest absolute inventory seen.
    pub fn max_inventory(&self) -> u32 {
        self.ledger.inventory.max_seen()
    }

    /// Returns the inventory cap.
    pub fn max_inventory_limit(&self) -> Option<u32> {
        self.ledger.inventory.limit()
    }

    /// Returns the current price of the first processed bar, `0` before any bar.
    pub fn initial_price(&self) -> f64 {
        self.bars.first().map(Bar::current_price).unwrap_or(0.0)
    }

    /// Returns the orders currently resting (maker strategies only).
    pub fn resting_orders(&self) -> &[PlacedOrder] {
        &self.ledger.resting
    }

    /// Processes bars in order.
    ///
    /// Each bar is indexed, stored and handed to the strategy. Taker decisions
    /// execute immediately; maker strategies first see their resting orders
    /// evaluated against the bar, then replace them.
    ///
    /// ### Arguments
    /// * `bars` - Bars with non-decreasing timestamps.
    ///
    /// ### Returns
    /// Ok, or the first strategy error (the run stops there).
    pub fn process_bars<I>(&mut self, bars: I) -> Result<()>
    where
        I: IntoIterator<Item = Bar>,
    {
        for mut bar in bars {
            if let Some(last) = self.bars.last()
                && bar.timestamp() < last.timestamp()
            {
                return Err(Error::UnorderedBars(last.timestamp(), bar.timestamp()));
            }

            bar.set_index(self.bars.len());
            self.execute(&bar)?;
            self.ledger.inventory.track_max();
            self.bars.push(bar);
        }
        Ok(())
    }

    fn execute(&mut self, bar: &Bar) -> Result<()> {
        match &mut self.strategy {
            Strategy::Taker(strategy) => {
                let action = strategy.decide(bar, self.ledger.inventory.position())?;
                self.ledger.execute_action(bar, action);
            }
            Strategy::Maker(strategy) => {
                self.ledger.fill_resting_orders(bar);
                let orders = strategy.decide(bar, self.ledger.inventory.position(), &self.ledger.resting)?;
                self.ledger.replace_resting(bar, orders);
            }
        }
        Ok(())
    }

    /// Closes any open position on `bar`.
    ///
    /// A long is sold at the bid, a short bought back at the ask, both falling
    /// back to the current price. Does nothing when flat. Prefer
    /// [`PositionSimulator::finish`] to close on the last processed bar.
    ///
    /// ### Returns
    /// [`Error::UnorderedBars`] when `bar` is older than the last processed bar.
    pub fn process_last_bar(&mut self, bar: &Bar) -> Result<()> {
        if let Some(last) = self.bars.last()
            && bar.timestamp() < last.timestamp()
        {
            return Err(Error::UnorderedBars(last.timestamp(), bar.timestamp()));
        }
        self.ledger.flatten(bar);
        Ok(())
    }

    /// Closes any open position on the last processed bar.
    pub fn finish(&mut self) {
        if let Some(bar) = self.bars.last() {
            self.ledger.flatten(bar);
        }
    }

    fn report_meta(&self) -> ReportMeta {
        ReportMeta {
            base_symbol: self.base_symbol.clone(),
            quote_symbol: self.quote_symbol.clone(),
            display_fee: self.display_fee,
            order_size: self.ledger.order_size,
            current_inventory: self.inventory(),
            max_inventory: self.max_inventory(),
            max_inventory_limit: self.max_inventory_limit(),
        }
    }

    /// Returns a period reporter over the trades recorded so far.
    ///
    /// The drawdown series is seeded with `cap × initial price` (zero when unbounded).
    pub fn reporter(&self) -> PeriodReporter<'_> {
        let seed = self
            .max_inventory_limit()
            .map(|limit| f64::from(limit) * self.initial_price())
            .unwrap_or(0.0);
        PeriodReporter::new(&self.ledger.trades, self.fee, self.report_meta()).with_seed(seed)
    }

    /// Returns the report over the whole run.
    pub fn report(&self) -> ProfitInfo {
        self.reporter().report()
    }

    /// Returns one report per calendar month with trades.
    pub fn report_by_month(&self) -> Vec<ProfitInfo> {
        self.reporter().report_by_month()
    }

    /// Returns the day reports of one month.
    pub fn report_per_day(&self, year: i32, month: u32) -> Vec<ProfitInfo> {
        self.reporter().report_per_day(year, month)
    }

    /// Returns the day reports of the whole run.
    pub fn report_days(&self) -> Vec<ProfitInfo> {
        self.reporter().report_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(timestamp: f64, bid: f64, ask: f64) -> Bar {
        BarBuilder::builder().timestamp(timestamp).bid(bid).ask(ask).build().unwrap()
    }

    fn range(timestamp: f64, low: f64, high: f64) -> Bar {
        BarBuilder::builder()
            .timestamp(timestamp)
            .low(low)
            .high(high)
            .close((low + high) / 2.0)
            .build()
            .unwrap()
    }

    fn scripted(actions: Vec<Action>) -> Strategy {
        let mut actions = actions.into_iter();
        Strategy::taker_fn(move |_, _| Ok(actions.next().unwrap_or(Action::Nothing)))
    }

    #[test]
    fn rejects_invalid_construction() {
        let result = PositionSimulator::new(scripted(vec![]), 0.0, 0.0, None);
        assert!(matches!(result, Err(Error::NegZeroOrderSize(_))));

        let result = PositionSimulator::new(scripted(vec![]), 1.0, -0.1, None);
        assert!(matches!(result, Err(Error::NegativeFee(_))));
    }

    #[test]
    fn scenario_round_trip() {
        // buy 1 at 100, sell 1 at 105
        let strategy = scripted(vec![Action::Buy, Action::Sell]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        sim.process_bars(vec![quote(0.0, 99.0, 100.0), quote(60.0, 105.0, 106.0)])
            .unwrap();

        let trades = sim.trades();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].price(), 100.0);
        assert_eq!(trades[0].position_state(), PositionState::Open);
        assert_eq!(trades[0].bar_index(), 0);
        assert_eq!(trades[1].price(), 105.0);
        assert_eq!(trades[1].amount(), -1.0);
        assert_eq!(trades[1].position_state(), PositionState::Close);
        assert_eq!(trades[1].inventory(), 0);
        assert_eq!(sim.inventory(), 0);
        assert_eq!(sim.max_inventory(), 1);
    }

    #[test]
    fn closing_trade_trades_whole_position() {
        let strategy = scripted(vec![Action::Sell, Action::Sell, Action::Sell, Action::Buy]);
        let mut sim = PositionSimulator::new(strategy, 2.0, 0.0, None).unwrap();
        let bars = (0..4).map(|i| quote(i as f64, 100.0, 101.0));
        sim.process_bars(bars).unwrap();

        let states = sim.trades().iter().map(|t| t.position_state()).collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![
                PositionState::Open,
                PositionState::Increase,
                PositionState::Increase,
                PositionState::Close
            ]
        );
        let close = sim.trades().last().unwrap();
        assert_eq!(close.amount(), 6.0);
        assert_eq!(close.price(), 101.0);
        assert_eq!(sim.max_inventory(), 3);
    }

    #[test]
    fn cap_refuses_same_direction_only() {
        let strategy = scripted(vec![Action::Buy, Action::Buy, Action::Buy, Action::Sell]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, Some(2)).unwrap();
        let bars = (0..4).map(|i| quote(i as f64, 100.0, 101.0));
        sim.process_bars(bars).unwrap();

        assert_eq!(sim.trades().len(), 3);
        assert_eq!(sim.max_inventory(), 2);
        assert_eq!(sim.trades()[2].position_state(), PositionState::Close);
        assert_eq!(sim.trades()[2].amount(), -2.0);
    }

    #[test]
    fn zero_cap_never_trades() {
        let strategy = scripted(vec![Action::Buy, Action::Sell]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, Some(0)).unwrap();
        sim.process_bars(vec![quote(0.0, 100.0, 101.0), quote(1.0, 100.0, 101.0)])
            .unwrap();
        assert!(sim.trades().is_empty());
    }

    #[test]
    fn strategy_sees_signed_position() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut step = 0;
        let strategy = Strategy::taker_fn(move |_, inventory| {
            tx.send(inventory).ok();
            step += 1;
            Ok(if step == 1 { Action::Sell } else { Action::Nothing })
        });
        let mut sim = PositionSimulator::new(strategy, 0.5, 0.0, None).unwrap();
        sim.process_bars(vec![quote(0.0, 100.0, 101.0), quote(1.0, 100.0, 101.0)])
            .unwrap();
        let seen = rx.try_iter().collect::<Vec<f64>>();
        assert_eq!(seen, vec![0.0, -0.5]);
    }

    #[test]
    fn price_fallbacks() {
        // no bid/ask: both sides execute at close
        let strategy = scripted(vec![Action::Buy, Action::Sell]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        let bars = vec![
            BarBuilder::builder().timestamp(0.0).close(50.0).build().unwrap(),
            BarBuilder::builder().timestamp(1.0).close(55.0).build().unwrap(),
        ];
        sim.process_bars(bars).unwrap();
        assert_eq!(sim.trades()[0].price(), 50.0);
        assert_eq!(sim.trades()[1].price(), 55.0);
    }

    #[test]
    fn degenerate_bar_trades_at_zero() {
        let strategy = scripted(vec![Action::Buy]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        sim.process_bars(vec![BarBuilder::builder().build().unwrap()]).unwrap();
        assert_eq!(sim.trades()[0].price(), 0.0);
    }

    #[test]
    fn unordered_bars_are_rejected() {
        let mut sim = PositionSimulator::new(scripted(vec![]), 1.0, 0.0, None).unwrap();
        let result = sim.process_bars(vec![quote(10.0, 1.0, 2.0), quote(5.0, 1.0, 2.0)]);
        assert!(matches!(result, Err(Error::UnorderedBars(10.0, 5.0))));
        assert_eq!(sim.bars().len(), 1);
    }

    #[test]
    fn strategy_error_aborts() {
        let strategy = Strategy::taker_fn(|bar, _| {
            if bar.index() == 1 {
                Err(Error::Strategy("boom".into()))
            } else {
                Ok(Action::Buy)
            }
        });
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        let bars = (0..3).map(|i| quote(i as f64, 100.0, 101.0));
        let result = sim.process_bars(bars);
        assert!(matches!(result, Err(Error::Strategy(msg)) if msg == "boom"));
        assert_eq!(sim.trades().len(), 1);
        assert_eq!(sim.bars().len(), 1);
    }

    #[test]
    fn process_last_bar_flattens() {
        let strategy = scripted(vec![Action::Sell, Action::Sell]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        sim.process_bars(vec![quote(0.0, 100.0, 101.0), quote(1.0, 99.0, 100.0)])
            .unwrap();
        let last = sim.bars().last().cloned().unwrap();
        sim.process_last_bar(&last).unwrap();

        let close = sim.trades().last().unwrap();
        assert_eq!(close.position_state(), PositionState::Close);
        assert_eq!(close.amount(), 2.0);
        assert_eq!(close.price(), 100.0);
        assert_eq!(close.bar_index(), 1);
        assert_eq!(sim.inventory(), 0);

        // already flat
        sim.finish();
        assert_eq!(sim.trades().len(), 3);
    }

    #[test]
    fn process_last_bar_rejects_an_older_bar() {
        let strategy = scripted(vec![Action::Buy, Action::Buy]);
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        sim.process_bars(vec![quote(10.0, 100.0, 101.0), quote(20.0, 102.0, 103.0)])
            .unwrap();

        let stale = quote(15.0, 50.0, 51.0);
        let result = sim.process_last_bar(&stale);
        assert!(matches!(result, Err(Error::UnorderedBars(20.0, 15.0))));
        assert_eq!(sim.inventory(), 2);
        assert_eq!(sim.trades().len(), 2);

        // same timestamp is accepted
        sim.process_last_bar(&quote(20.0, 102.0, 103.0)).unwrap();
        assert_eq!(sim.inventory(), 0);
        assert_eq!(sim.trades().last().unwrap().price(), 102.0);
    }

    #[test]
    fn finish_without_bars() {
        let mut sim = PositionSimulator::new(scripted(vec![]), 1.0, 0.0, None).unwrap();
        sim.finish();
        assert!(sim.trades().is_empty());
        assert_eq!(sim.initial_price(), 0.0);
    }

    #[test]
    fn maker_fills_at_order_price() {
        let strategy = Strategy::maker_fn(|bar, _, _| {
            if bar.index() == 0 {
                Ok(vec![PlacedOrder::bid(95.0, None)?, PlacedOrder::ask(120.0, None)?])
            } else {
                Ok(vec![])
            }
        });
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        sim.process_bars(vec![range(0.0, 99.0, 101.0), range(1.0, 94.0, 100.0)])
            .unwrap();

        // the bid fills at its own price, the ask never did and was cancelled
        assert_eq!(sim.trades().len(), 1);
        let trade = &sim.trades()[0];
        assert_eq!(trade.price(), 95.0);
        assert_eq!(trade.amount(), 1.0);
        assert_eq!(trade.bar_index(), 1);
        assert!(sim.resting_orders().is_empty());
    }

    #[test]
    fn maker_keeps_unfilled_orders_until_replaced() {
        let strategy = Strategy::maker_fn(|bar, _, resting| {
            if bar.index() == 0 {
                Ok(vec![PlacedOrder::ask(150.0, Some(2.0))?])
            } else {
                Ok(resting.to_vec())
            }
        });
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        sim.process_bars(vec![range(0.0, 99.0, 101.0), range(1.0, 99.0, 101.0)])
            .unwrap();
        assert!(sim.trades().is_empty());
        assert_eq!(sim.resting_orders().len(), 1);

        sim.process_bars(vec![range(2.0, 140.0, 150.0)]).unwrap();
        assert_eq!(sim.trades().len(), 1);
        assert_eq!(sim.trades()[0].amount(), -2.0);
        assert_eq!(sim.position(), -2.0);
        assert_eq!(sim.inventory(), -1);
    }

    #[test]
    fn maker_opposite_fill_closes_position() {
        let strategy = Strategy::maker_fn(|bar, _, _| {
            Ok(match bar.index() {
                0 => vec![PlacedOrder::bid(100.0, None)?],
                1 => vec![PlacedOrder::bid(99.0, None)?],
                _ => vec![PlacedOrder::ask(105.0, None)?],
            })
        });
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        let bars = vec![
            range(0.0, 100.0, 102.0),
            range(1.0, 98.0, 101.0),
            range(2.0, 98.0, 101.0),
            range(3.0, 104.0, 106.0),
        ];
        sim.process_bars(bars).unwrap();

        let states = sim.trades().iter().map(|t| t.position_state()).collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![PositionState::Open, PositionState::Increase, PositionState::Close]
        );
        assert_eq!(sim.trades()[2].amount(), -2.0);
        assert_eq!(sim.trades()[2].price(), 105.0);
        assert_eq!(sim.inventory(), 0);
    }

    #[test]
    fn maker_cap_removes_order_without_trade() {
        let strategy = Strategy::maker_fn(|bar, _, _| {
            Ok(if bar.index() < 2 {
                vec![PlacedOrder::bid(100.0, None)?]
            } else {
                vec![]
            })
        });
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, Some(1)).unwrap();
        let bars = vec![range(0.0, 101.0, 102.0), range(1.0, 99.0, 101.0), range(2.0, 99.0, 101.0)];
        sim.process_bars(bars).unwrap();

        assert_eq!(sim.trades().len(), 1);
        assert_eq!(sim.inventory(), 1);
        assert!(sim.resting_orders().is_empty());
    }

    #[test]
    fn maker_high_buy_low_sell_take_precedence() {
        let strategy = Strategy::maker_fn(|bar, _, _| {
            Ok(if bar.index() == 0 {
                vec![PlacedOrder::ask(110.0, None)?]
            } else {
                vec![]
            })
        });
        let mut sim = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
        let bar = BarBuilder::builder()
            .timestamp(1.0)
            .high(112.0)
            .high_buy(109.0)
            .low(100.0)
            .build()
            .unwrap();
        sim.process_bars(vec![range(0.0, 100.0, 101.0), bar]).unwrap();
        assert!(sim.trades().is_empty());
    }
}
