use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use simple_backtester::prelude::*;
use simple_backtester::prelude::Strategy;

fn close_bars(prices: &[f64]) -> Vec<Bar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| {
            BarBuilder::builder()
                .timestamp(1_704_067_200.0 + i as f64 * 60.0)
                .close(*price)
                .build()
                .unwrap()
        })
        .collect()
}

fn bar_at(year: i32, month: u32, day: u32, hour: u32, minute: u32, price: f64) -> Bar {
    BarBuilder::builder()
        .datetime(Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap())
        .close(price)
        .build()
        .unwrap()
}

#[test]
fn alternating_round_trips_with_forced_close() {
    let mut simulator = PositionSimulator::new(Strategy::taker(Naive::new()), 1.0, 0.0, Some(1)).unwrap();
    simulator.process_bars(close_bars(&[100.0, 105.0, 110.0])).unwrap();
    assert_eq!(simulator.inventory(), 1);

    let last = simulator.bars().last().cloned().unwrap();
    simulator.process_last_bar(&last).unwrap();

    let states = simulator
        .trades()
        .iter()
        .map(|t| (t.amount(), t.price(), t.position_state()))
        .collect::<Vec<_>>();
    assert_eq!(
        states,
        vec![
            (1.0, 100.0, PositionState::Open),
            (-1.0, 105.0, PositionState::Close),
            (1.0, 110.0, PositionState::Open),
            (-1.0, 110.0, PositionState::Close),
        ]
    );

    let report = simulator.report();
    assert_eq!(report.pnl(), 5.0);
    assert_eq!(report.win_rate(), Some(0.5));
    assert_eq!(simulator.inventory(), 0);
}

#[test]
fn open_inventory_is_marked_to_market() {
    let strategy = Strategy::taker_fn(|_, _| Ok(Action::Buy));
    let mut simulator = PositionSimulator::new(strategy, 1.0, 0.0, None).unwrap();
    simulator.process_bars(close_bars(&[100.0, 110.0])).unwrap();

    let report = simulator.report();
    assert_eq!(report.excess_amount(), 2.0);
    assert_eq!(report.pnl(), 220.0);
    assert_eq!(report.pnl_no_excess(), 0.0);
    assert_eq!(report.meta().current_inventory, 2);
}

#[test]
fn month_keeps_position_closed_in_next_month() {
    let bars = vec![
        bar_at(2024, 1, 31, 23, 59, 100.0),
        bar_at(2024, 2, 1, 0, 1, 110.0),
        bar_at(2024, 2, 1, 10, 0, 100.0),
        bar_at(2024, 2, 1, 11, 0, 102.0),
    ];
    let mut simulator = PositionSimulator::new(Strategy::taker(Naive::new()), 1.0, 0.0, Some(1)).unwrap();
    simulator.process_bars(bars).unwrap();
    simulator.finish();

    let months = simulator.report_by_month();
    assert_eq!(months.len(), 2);
    assert_eq!(months[0].period(), Period::Month { year: 2024, month: 1 });
    assert_eq!(months[0].pnl(), 10.0);
    assert_eq!(months[0].trades_count(), 2);
    // the closing trade of January is not counted again in February
    assert_eq!(months[1].pnl(), 2.0);
    assert_eq!(months[1].trades_count(), 2);

    let total = ProfitInfo::total(&months);
    assert_eq!(total.pnl(), simulator.report().pnl());
}

#[test]
fn reports_are_idempotent() {
    let mut simulator = PositionSimulator::new(Strategy::taker(Kaufman::new(true)), 0.5, 0.001, Some(3)).unwrap();
    let prices = (0..200).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect::<Vec<_>>();
    simulator.process_bars(close_bars(&prices)).unwrap();
    simulator.finish();

    assert_eq!(simulator.report(), simulator.report());
    assert_eq!(simulator.report_by_month(), simulator.report_by_month());
    assert_eq!(simulator.report_days(), simulator.report_days());
}

#[test]
fn market_maker_round_trip() {
    let bars = vec![
        BarBuilder::builder().timestamp(0.0).bid(100.0).ask(101.0).build().unwrap(),
        BarBuilder::builder()
            .timestamp(60.0)
            .bid(95.0)
            .ask(96.0)
            .low(89.0)
            .high(100.0)
            .build()
            .unwrap(),
        BarBuilder::builder()
            .timestamp(120.0)
            .bid(110.0)
            .ask(111.0)
            .low(105.0)
            .high(112.0)
            .build()
            .unwrap(),
    ];
    let strategy = StrategyRegistry::default()
        .resolve("MarketMaker", &[StrategyParam::Int(1), StrategyParam::Float(10.0)])
        .unwrap();
    let mut simulator = PositionSimulator::new(strategy, 1.0, 0.0, Some(1)).unwrap();
    simulator.process_bars(bars).unwrap();
    simulator.finish();

    let trades = simulator.trades();
    assert_eq!(trades.len(), 2);
    assert_eq!((trades[0].price(), trades[0].position_state()), (90.0, PositionState::Open));
    assert_eq!((trades[1].price(), trades[1].position_state()), (106.0, PositionState::Close));
    assert_eq!(simulator.report().pnl(), 16.0);
    assert_eq!(simulator.resting_orders().len(), 2);
}

#[test]
fn ema_trend_strategy() {
    use ta::Next;
    use ta::indicators::ExponentialMovingAverage;

    let mut ema = ExponentialMovingAverage::new(5).unwrap();
    let strategy = Strategy::taker_fn(move |bar, inventory| {
        let price = bar.current_price();
        let average = ema.next(price);
        Ok(match (price > average, inventory > 0.0) {
            (true, false) => Action::Buy,
            (false, true) => Action::Sell,
            _ => Action::Nothing,
        })
    });

    let prices = (0..120).map(|i| 100.0 + (i as f64 / 10.0).sin() * 10.0).collect::<Vec<_>>();
    let mut simulator = PositionSimulator::new(strategy, 1.0, 0.0, Some(1)).unwrap();
    simulator.process_bars(close_bars(&prices)).unwrap();
    simulator.finish();

    let report = simulator.report();
    assert!(report.trades_count() > 0);
    assert_eq!(report.trades_count() % 2, 0);
    assert_eq!(report.buys_count(), report.sells_count());
    assert_eq!(report.excess_amount(), 0.0);
}

fn action(code: u8) -> Action {
    match code {
        0 => Action::Buy,
        1 => Action::Sell,
        _ => Action::Nothing,
    }
}

proptest! {
    #[test]
    fn inventory_stays_within_cap(
        prices in prop::collection::vec(1.0f64..1_000.0, 1..60),
        codes in prop::collection::vec(0u8..3, 60),
        cap in 0u32..5,
    ) {
        let mut actions = codes.into_iter().map(action);
        let strategy = Strategy::taker_fn(move |_, _| Ok(actions.next().unwrap_or(Action::Nothing)));
        let mut simulator = PositionSimulator::new(strategy, 1.0, 0.0, Some(cap)).unwrap();
        simulator.process_bars(close_bars(&prices)).unwrap();

        prop_assert!(simulator.max_inventory() <= cap);
        prop_assert!(simulator.trades().iter().all(|t| t.inventory().unsigned_abs() <= cap));

        simulator.finish();
        prop_assert_eq!(simulator.inventory(), 0);

        // once flat, everything is matched
        let report = simulator.report();
        prop_assert_eq!(report.excess_amount(), 0.0);
        prop_assert!((report.pnl() - report.pnl_no_excess()).abs() < 1e-6);
    }
}
