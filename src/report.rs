//! Calendar reports over the trades of a run.
//!
//! Trades are grouped by UTC month and by UTC day. A period only accounts for
//! the positions it opened: leading trades that close a position opened
//! earlier are dropped ([`remove_opened_trades`]), and the trades that close a
//! position still open at the end of the period are borrowed from the
//! following trades ([`closing_trades`]).

use crate::{
    engine::{PositionState, Trade},
    metrics::{Period, ProfitInfo, ReportMeta, compute_profit_complex},
};

/// Drops every trade before the first `Open` one.
///
/// Returns an empty slice when the period never opens a position.
pub fn remove_opened_trades(trades: &[Trade]) -> &[Trade] {
    match trades.iter().position(|t| t.position_state() == PositionState::Open) {
        Some(first) => &trades[first..],
        None => &[],
    }
}

/// Takes the trades up to, not including, the next `Open` one (all of them when none follows).
pub fn closing_trades(next: &[Trade]) -> &[Trade] {
    let end = next
        .iter()
        .position(|t| t.position_state() == PositionState::Open)
        .unwrap_or(next.len());
    &next[..end]
}

/// Splits time-ordered trades into consecutive groups sharing the same key.
///
/// Each group comes with the offset just past its last trade.
fn group_by<K, F>(trades: &[Trade], key: F) -> Vec<(K, &[Trade], usize)>
where
    K: PartialEq,
    F: Fn(&Trade) -> K,
{
    let mut groups = Vec::new();
    let mut end = 0;
    for group in trades.chunk_by(|a, b| key(a) == key(b)) {
        end += group.len();
        if let Some(first) = group.first() {
            groups.push((key(first), group, end));
        }
    }
    groups
}

/// Running cumulative PnL with its high-water mark.
#[derive(Debug, Clone, Copy)]
struct Watermark {
    total: f64,
    max_total: f64,
    min_total: f64,
}

impl Watermark {
    fn new(seed: f64) -> Self {
        Self {
            total: seed,
            max_total: seed,
            min_total: seed,
        }
    }

    /// Adds one period's PnL and returns its drawdown and profit percentage.
    fn push(&mut self, pnl: f64) -> (Option<f64>, Option<f64>) {
        let previous = self.total;
        self.total += pnl;

        if self.total > self.max_total {
            self.max_total = self.total;
            self.min_total = self.total;
        }
        self.min_total = self.min_total.min(self.total);

        let drawdown = (self.max_total > 0.0)
            .then(|| (self.min_total - self.max_total) / self.max_total)
            .filter(|drawdown| *drawdown < 0.0);
        let profit = (previous > 0.0).then(|| (self.total - previous) / previous);

        (drawdown, profit)
    }
}

/// Produces reports over a borrowed, time-ordered trade list.
#[derive(Debug, Clone)]
pub struct PeriodReporter<'a> {
    trades: &'a [Trade],
    fee: f64,
    meta: ReportMeta,
    seed: f64,
}

impl<'a> PeriodReporter<'a> {
    /// Creates a reporter.
    ///
    /// ### Arguments
    /// * `trades` - Trades in generation order.
    /// * `fee` - Fee rate used for the fee-adjusted PnL.
    /// * `meta` - Display metadata copied into every report.
    pub fn new(trades: &'a [Trade], fee: f64, meta: ReportMeta) -> Self {
        Self {
            trades,
            fee,
            meta,
            seed: 0.0,
        }
    }

    /// Sets the initial notional the cumulative PnL series starts from.
    pub fn with_seed(mut self, seed: f64) -> Self {
        self.seed = seed;
        self
    }

    /// Reports one period.
    ///
    /// ### Arguments
    /// * `trades` - The period's own trades.
    /// * `next` - Every trade after the period, closing trades are borrowed from it.
    ///
    /// ### Returns
    /// The report, or [`ProfitInfo::empty`] when the period opens no position.
    pub fn period_report(&self, trades: &[Trade], next: &[Trade]) -> ProfitInfo {
        let trimmed = remove_opened_trades(trades);
        if trimmed.is_empty() {
            return ProfitInfo::empty();
        }

        let window = trimmed
            .iter()
            .chain(closing_trades(next))
            .cloned()
            .collect::<Vec<_>>();

        let mut info = compute_profit_complex(&window, 0.0);
        info.pnl_with_fee = compute_profit_complex(&window, self.fee).pnl();
        info.meta = self.meta.clone();
        info
    }

    /// Reports the whole run.
    pub fn report(&self) -> ProfitInfo {
        self.period_report(self.trades, &[])
    }

    /// Reports every calendar day with trades, tracking drawdown and profit percentage.
    ///
    /// The cumulative PnL series runs across the whole run, starting from the seed.
    /// Days that open no position are skipped.
    pub fn report_days(&self) -> Vec<ProfitInfo> {
        let mut watermark = Watermark::new(self.seed);
        let mut reports = Vec::new();

        for (date, trades, end) in group_by(self.trades, |t| t.datetime().date_naive()) {
            let mut info = self.period_report(trades, &self.trades[end..]);
            if info.is_empty() {
                continue;
            }
            let (drawdown, profit) = watermark.push(info.pnl());
            info.max_drawdown = drawdown;
            info.profit_percentage = profit;
            info.period = Period::day_of(date);
            reports.push(info);
        }

        reports
    }

    /// Reports the days of one month.
    pub fn report_per_day(&self, year: i32, month: u32) -> Vec<ProfitInfo> {
        self.report_days()
            .into_iter()
            .filter(|r| r.period().is_in_month(year, month))
            .collect()
    }

    /// Reports every calendar month with trades.
    ///
    /// A month's drawdown is the worst drawdown of its days.
    pub fn report_by_month(&self) -> Vec<ProfitInfo> {
        let days = self.report_days();
        let mut reports = Vec::new();

        for (period, trades, end) in group_by(self.trades, |t| Period::month_of(t.datetime())) {
            let mut info = self.period_report(trades, &self.trades[end..]);
            if info.is_empty() {
                continue;
            }
            if let Period::Month { year, month } = period {
                info.max_drawdown = days
                    .iter()
                    .filter(|d| d.period().is_in_month(year, month))
                    .filter_map(ProfitInfo::max_drawdown)
                    .reduce(f64::min);
            }
            info.period = period;
            reports.push(info);
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: f64 = 86_400.0;

    fn trade(timestamp: f64, amount: f64, price: f64, state: PositionState) -> Trade {
        Trade::from((timestamp, amount, price, 0, 0, state))
    }

    fn reporter(trades: &[Trade]) -> PeriodReporter<'_> {
        PeriodReporter::new(trades, 0.0, ReportMeta::default())
    }

    #[test]
    fn trim_leading_closes() {
        let trades = vec![
            trade(0.0, -1.0, 100.0, PositionState::Close),
            trade(1.0, 1.0, 100.0, PositionState::Open),
            trade(2.0, -1.0, 101.0, PositionState::Close),
        ];
        assert_eq!(remove_opened_trades(&trades), &trades[1..]);
        assert!(remove_opened_trades(&trades[..1]).is_empty());
    }

    #[test]
    fn borrow_until_next_open() {
        let next = vec![
            trade(0.0, 1.0, 100.0, PositionState::Increase),
            trade(1.0, -2.0, 101.0, PositionState::Close),
            trade(2.0, 1.0, 100.0, PositionState::Open),
        ];
        assert_eq!(closing_trades(&next), &next[..2]);
        assert_eq!(closing_trades(&next[..2]), &next[..2]);
        assert!(closing_trades(&[]).is_empty());
    }

    #[test]
    fn empty_report() {
        assert!(reporter(&[]).report().is_empty());
        assert!(reporter(&[]).report_by_month().is_empty());
        assert!(reporter(&[]).report_days().is_empty());
    }

    #[test]
    fn day_borrows_closing_trade() {
        // opened late on day 0, closed on day 1, reopened and closed on day 1
        let trades = vec![
            trade(DAY - 10.0, 1.0, 100.0, PositionState::Open),
            trade(DAY + 10.0, -1.0, 110.0, PositionState::Close),
            trade(DAY + 20.0, 1.0, 100.0, PositionState::Open),
            trade(DAY + 30.0, -1.0, 102.0, PositionState::Close),
        ];
        let days = reporter(&trades).report_days();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].pnl(), 10.0);
        assert_eq!(days[0].trades_count(), 2);
        assert_eq!(days[1].pnl(), 2.0);
        assert_eq!(days[1].trades_count(), 2);
        assert_eq!(days[0].period(), Period::Day { year: 1970, month: 1, day: 1 });
    }

    #[test]
    fn day_without_open_is_skipped() {
        let trades = vec![
            trade(DAY - 10.0, -1.0, 100.0, PositionState::Open),
            trade(DAY + 10.0, 1.0, 90.0, PositionState::Close),
        ];
        let days = reporter(&trades).report_days();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].pnl(), 10.0);
    }

    #[test]
    fn drawdown_and_profit_from_seed() {
        // seed 1000, days: +100, -220, +50
        let trades = vec![
            trade(0.0, 1.0, 100.0, PositionState::Open),
            trade(10.0, -1.0, 200.0, PositionState::Close),
            trade(DAY, 1.0, 300.0, PositionState::Open),
            trade(DAY + 10.0, -1.0, 80.0, PositionState::Close),
            trade(2.0 * DAY, 1.0, 100.0, PositionState::Open),
            trade(2.0 * DAY + 10.0, -1.0, 150.0, PositionState::Close),
        ];
        let days = reporter(&trades).with_seed(1000.0).report_days();
        assert_eq!(days.len(), 3);

        assert_eq!(days[0].max_drawdown(), None);
        assert_eq!(days[0].profit_percentage(), Some(0.1));

        // 1100 -> 880
        assert_eq!(days[1].max_drawdown(), Some(-0.2));
        assert_eq!(days[1].profit_percentage(), Some(-0.2));

        // 880 -> 930, high-water mark still 1100
        let drawdown = days[2].max_drawdown().unwrap();
        assert!((drawdown + 0.2).abs() < 1e-12);

        let months = reporter(&trades).with_seed(1000.0).report_by_month();
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].max_drawdown(), Some(-0.2));
        assert_eq!(months[0].pnl(), -70.0);
        assert_eq!(months[0].profit_percentage(), None);
    }

    #[test]
    fn unseeded_series_has_no_ratios_until_positive() {
        let trades = vec![
            trade(0.0, 1.0, 100.0, PositionState::Open),
            trade(10.0, -1.0, 90.0, PositionState::Close),
        ];
        let days = reporter(&trades).report_days();
        assert_eq!(days[0].max_drawdown(), None);
        assert_eq!(days[0].profit_percentage(), None);
    }

    #[test]
    fn per_day_filters_month() {
        let feb = 31.0 * DAY;
        let trades = vec![
            trade(0.0, 1.0, 100.0, PositionState::Open),
            trade(10.0, -1.0, 101.0, PositionState::Close),
            trade(feb, 1.0, 100.0, PositionState::Open),
            trade(feb + 10.0, -1.0, 103.0, PositionState::Close),
        ];
        let reporter = reporter(&trades);
        let feb_days = reporter.report_per_day(1970, 2);
        assert_eq!(feb_days.len(), 1);
        assert_eq!(feb_days[0].pnl(), 3.0);
        assert!(reporter.report_per_day(1971, 1).is_empty());
    }

    #[test]
    fn fee_merged_into_report() {
        let trades = vec![
            trade(0.0, 1.0, 100.0, PositionState::Open),
            trade(10.0, -1.0, 110.0, PositionState::Close),
        ];
        let report = PeriodReporter::new(&trades, 0.01, ReportMeta::default()).report();
        assert_eq!(report.pnl(), 10.0);
        assert!((report.pnl_with_fee() - 7.9).abs() < 1e-9);
    }
}
