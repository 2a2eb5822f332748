//! Performance statistics over a set of trades.
//!
//! This module provides:
//! - [`compute_profit_complex`]: partial FIFO matching of buys against sells, with the
//!   unmatched excess marked to market at the last trade price of its side
//! - [`compute_profit_no_excess`]: the matched part only
//! - [`compute_win_rate`]: closed positions that ended in profit
//! - [`ProfitInfo`]: the resulting report, and [`ProfitInfo::total`] to fold several into one
//!
//! Every function is pure: the same trades always give the same report.

use std::{cmp::Ordering, fmt};

use chrono::Datelike;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{PositionState, Trade};

/// Calendar span a report covers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    /// The whole run.
    #[default]
    Total,
    /// One calendar month (UTC).
    Month {
        /// Year.
        year: i32,
        /// Month, `1..=12`.
        month: u32,
    },
    /// One calendar day (UTC).
    Day {
        /// Year.
        year: i32,
        /// Month, `1..=12`.
        month: u32,
        /// Day of month, `1..=31`.
        day: u32,
    },
}

impl Period {
    pub(crate) fn month_of<D: Datelike>(date: D) -> Self {
        Self::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub(crate) fn day_of<D: Datelike>(date: D) -> Self {
        Self::Day {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Returns true if the period falls within the given month.
    pub fn is_in_month(&self, y: i32, m: u32) -> bool {
        match *self {
            Self::Total => false,
            Self::Month { year, month } | Self::Day { year, month, .. } => year == y && month == m,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Total => write!(f, "total"),
            Self::Month { year, month } => write!(f, "month: {month:02}/{year}"),
            Self::Day { day, .. } => write!(f, "day:   {day:02}"),
        }
    }
}

/// Display metadata attached to every report of a run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportMeta {
    /// Traded asset symbol.
    pub base_symbol: String,
    /// Pricing asset symbol.
    pub quote_symbol: String,
    /// Show the fee-adjusted PnL in the report line.
    pub display_fee: bool,
    /// Base amount of one inventory unit.
    pub order_size: f64,
    /// Inventory in units when the report was produced.
    pub current_inventory: i32,
    /// Largest absolute inventory seen.
    pub max_inventory: u32,
    /// Inventory cap, unbounded when `None`.
    pub max_inventory_limit: Option<u32>,
}

/// Aggregated statistics over a set of trades.
///
/// Ratios that can be undefined are `Option`s: the win rate is `None` when no
/// position was closed, the drawdown and the profit percentage are `None` when
/// they were not computed or their denominator was not positive.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfitInfo {
    pub(crate) trades_count: usize,
    pub(crate) buys_count: usize,
    pub(crate) sells_count: usize,
    pub(crate) total_bought: f64,
    pub(crate) total_sold: f64,
    pub(crate) total_bought_quote: f64,
    pub(crate) total_sold_quote: f64,
    pub(crate) average_buy_price: f64,
    pub(crate) average_sell_price: f64,
    pub(crate) excess_amount: f64,
    pub(crate) pnl: f64,
    pub(crate) pnl_with_fee: f64,
    pub(crate) pnl_no_excess: f64,
    pub(crate) wins: usize,
    pub(crate) closed_positions: usize,
    pub(crate) max_drawdown: Option<f64>,
    pub(crate) profit_percentage: Option<f64>,
    pub(crate) period: Period,
    pub(crate) meta: ReportMeta,
}

impl ProfitInfo {
    /// The report of a period without any trade to account for.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the report covers no trade.
    pub fn is_empty(&self) -> bool {
        self.trades_count == 0
    }

    pub fn trades_count(&self) -> usize {
        self.trades_count
    }

    pub fn buys_count(&self) -> usize {
        self.buys_count
    }

    pub fn sells_count(&self) -> usize {
        self.sells_count
    }

    /// Total base amount bought.
    pub fn total_bought(&self) -> f64 {
        self.total_bought
    }

    /// Total base amount sold.
    pub fn total_sold(&self) -> f64 {
        self.total_sold
    }

    /// Total quote value bought.
    pub fn total_bought_quote(&self) -> f64 {
        self.total_bought_quote
    }

    /// Total quote value sold.
    pub fn total_sold_quote(&self) -> f64 {
        self.total_sold_quote
    }

    /// Volume-weighted average buy price, `0` without buys.
    pub fn average_buy_price(&self) -> f64 {
        self.average_buy_price
    }

    /// Volume-weighted average sell price, `0` without sells.
    pub fn average_sell_price(&self) -> f64 {
        self.average_sell_price
    }

    /// Base amount bought minus base amount sold.
    pub fn excess_amount(&self) -> f64 {
        self.excess_amount
    }

    /// Matched PnL plus the excess marked to market, without fees.
    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    /// Same as [`ProfitInfo::pnl`] with the fee applied to every matched value.
    pub fn pnl_with_fee(&self) -> f64 {
        self.pnl_with_fee
    }

    /// PnL of the matched amount only.
    pub fn pnl_no_excess(&self) -> f64 {
        self.pnl_no_excess
    }

    /// Number of closed positions that ended in profit.
    pub fn wins(&self) -> usize {
        self.wins
    }

    /// Number of closed positions.
    pub fn closed_positions(&self) -> usize {
        self.closed_positions
    }

    /// Share of closed positions that ended in profit, `None` when nothing was closed.
    pub fn win_rate(&self) -> Option<f64> {
        (self.closed_positions > 0).then(|| self.wins as f64 / self.closed_positions as f64)
    }

    /// Maximum drawdown as a negative fraction.
    pub fn max_drawdown(&self) -> Option<f64> {
        self.max_drawdown
    }

    /// Change of the cumulative PnL over the previous period, as a fraction.
    pub fn profit_percentage(&self) -> Option<f64> {
        self.profit_percentage
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn meta(&self) -> &ReportMeta {
        &self.meta
    }

    /// Returns the report prefixed with its period label.
    pub fn line(&self) -> String {
        match self.period {
            Period::Total => self.to_string(),
            period => format!("{period}, {self}"),
        }
    }

    /// Folds several reports into one.
    ///
    /// Counts, amounts and PnLs are summed. Average prices are recomputed from
    /// the summed quote and base totals, the win rate from the summed wins and
    /// closed positions. The drawdown is the worst one. Metadata is taken from
    /// the first report.
    pub fn total<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a ProfitInfo>,
    {
        let mut reports = reports.into_iter().peekable();
        let meta = reports.peek().map(|r| r.meta.clone()).unwrap_or_default();

        let mut total = reports.fold(Self::default(), |acc, r| Self {
            trades_count: acc.trades_count + r.trades_count,
            buys_count: acc.buys_count + r.buys_count,
            sells_count: acc.sells_count + r.sells_count,
            total_bought: acc.total_bought + r.total_bought,
            total_sold: acc.total_sold + r.total_sold,
            total_bought_quote: acc.total_bought_quote + r.total_bought_quote,
            total_sold_quote: acc.total_sold_quote + r.total_sold_quote,
            excess_amount: acc.excess_amount + r.excess_amount,
            pnl: acc.pnl + r.pnl,
            pnl_with_fee: acc.pnl_with_fee + r.pnl_with_fee,
            pnl_no_excess: acc.pnl_no_excess + r.pnl_no_excess,
            wins: acc.wins + r.wins,
            closed_positions: acc.closed_positions + r.closed_positions,
            max_drawdown: min_option(acc.max_drawdown, r.max_drawdown),
            ..acc
        });

        total.average_buy_price = ratio_or_zero(total.total_bought_quote, total.total_bought);
        total.average_sell_price = ratio_or_zero(total.total_sold_quote, total.total_sold);
        total.meta = meta;
        total
    }
}

impl fmt::Display for ProfitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = &self.meta.quote_symbol;
        write!(
            f,
            "trades {:>5} (b: {:>5}/{:>8.2} {quote}, s: {:>5}/{:>8.2} {quote}), ",
            self.trades_count, self.buys_count, self.average_buy_price, self.sells_count, self.average_sell_price
        )?;
        match self.win_rate() {
            Some(win_rate) => write!(f, "Win: {:>7.2}%, ", win_rate * 100.0)?,
            None => write!(f, "Win: {:>8}, ", "-")?,
        }
        match self.max_drawdown {
            Some(drawdown) => write!(f, "MDD: {:>7.2}%, ", drawdown * 100.0)?,
            None => write!(f, "MDD: {:>8}, ", "")?,
        }
        write!(f, "Pnl: {:>10.2} {quote}", self.pnl)?;
        if let Some(profit) = self.profit_percentage {
            write!(f, " ({:.2}%)", profit * 100.0)?;
        }
        if self.meta.display_fee {
            write!(f, " (with fee: {:.2} {quote})", self.pnl_with_fee)?;
        }
        Ok(())
    }
}

fn min_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 { 0.0 } else { numerator / denominator }
}

fn sorted_by_time(trades: &[Trade]) -> Vec<&Trade> {
    let mut sorted = trades.iter().collect::<Vec<_>>();
    // stable: equal timestamps keep generation order
    sorted.sort_by(|a, b| a.timestamp().partial_cmp(&b.timestamp()).unwrap_or(Ordering::Equal));
    sorted
}

fn split_sides(trades: &[Trade]) -> (Vec<&Trade>, Vec<&Trade>) {
    sorted_by_time(trades)
        .into_iter()
        .filter(|t| t.amount() != 0.0)
        .partition(|t| t.is_buy())
}

fn total_amount(side: &[&Trade]) -> f64 {
    side.iter().map(|t| t.amount().abs()).sum()
}

/// Quote value of a fill, fee added on a buy and deducted on a sell.
fn order_value(amount: f64, price: f64, fee: f64, is_bid: bool) -> f64 {
    let value = amount.abs() * price.abs();
    let fee = value * fee;
    if is_bid { value + fee } else { value - fee }
}

/// Walks one side in time order until `counter` base amount has been consumed.
fn matched_value(side: &[&Trade], mut counter: f64, fee: f64, is_bid: bool) -> f64 {
    let mut value = 0.0;
    for trade in side {
        let amount = trade.amount().abs();
        counter -= amount;
        if counter >= 0.0 {
            value += order_value(amount, trade.price(), fee, is_bid);
        } else {
            value += order_value(amount + counter, trade.price(), fee, is_bid);
            break;
        }
    }
    value
}

/// Volume-weighted average price of one side, `0` when the side is empty.
pub fn compute_average_price(side: &[&Trade]) -> f64 {
    let amount = total_amount(side);
    let quote = side.iter().map(|t| t.quote()).sum::<f64>();
    ratio_or_zero(quote, amount)
}

/// Replays positions and counts the profitable ones.
///
/// Non-closing trades are stacked; a `Close` trade settles every stacked trade:
/// a buy wins if the closing price is above its price, a sell if it is below.
///
/// ### Returns
/// `(wins, closed_positions)`.
pub fn compute_win_rate(trades: &[Trade]) -> (usize, usize) {
    let mut stack = Vec::new();
    let mut wins = 0;
    let mut closed = 0;

    for trade in sorted_by_time(trades) {
        if trade.position_state() != PositionState::Close {
            stack.push(trade);
            continue;
        }

        closed += stack.len();
        wins += stack
            .drain(..)
            .filter(|open| {
                if open.is_buy() {
                    trade.price() > open.price()
                } else {
                    trade.price() < open.price()
                }
            })
            .count();
    }

    (wins, closed)
}

/// PnL of the amount matched on both sides, without any mark-to-market term.
///
/// ### Arguments
/// * `trades` - Trades to account for.
/// * `fee` - Fee rate as a fraction, applied to every matched value.
pub fn compute_profit_no_excess(trades: &[Trade], fee: f64) -> f64 {
    let (bids, asks) = split_sides(trades);
    let matched = total_amount(&bids).min(total_amount(&asks));
    matched_value(&asks, matched, fee, false) - matched_value(&bids, matched, fee, true)
}

/// Computes the full statistics of a set of trades.
///
/// Buys and sells are walked in time order and valued (fee-adjusted). When
/// both sides exist their difference is the matched PnL; the unmatched excess
/// is then marked at the last buy price (net long) or the last sell price (net
/// short). With a single side there is nothing to match and only the
/// mark-to-market term remains.
///
/// ### Arguments
/// * `trades` - Trades to account for, in any order.
/// * `fee` - Fee rate as a fraction.
///
/// ### Returns
/// The report, with `pnl_with_fee` equal to `pnl` (the caller merges the
/// fee-adjusted run).
///
/// ### Example
/// ```rust
/// use simple_backtester::prelude::*;
///
/// let trades = vec![
///     Trade::from((0.0, 1.0, 100.0, 0, 1, PositionState::Open)),
///     Trade::from((1.0, -1.0, 105.0, 1, 0, PositionState::Close)),
/// ];
/// let info = compute_profit_complex(&trades, 0.0);
/// assert_eq!(info.pnl(), 5.0);
/// assert_eq!(info.win_rate(), Some(1.0));
/// ```
pub fn compute_profit_complex(trades: &[Trade], fee: f64) -> ProfitInfo {
    let (bids, asks) = split_sides(trades);

    let total_bid_amount = total_amount(&bids);
    let total_ask_amount = total_amount(&asks);
    let excess_amount = total_bid_amount - total_ask_amount;
    let (wins, closed_positions) = compute_win_rate(trades);

    let diff = if bids.is_empty() || asks.is_empty() {
        0.0
    } else {
        matched_value(&asks, total_ask_amount, fee, false) - matched_value(&bids, total_bid_amount, fee, true)
    };

    let last_price = if excess_amount > 0.0 { bids.last() } else { asks.last() }
        .map(|t| t.price())
        .unwrap_or(0.0);
    let pnl = diff + excess_amount * last_price;

    ProfitInfo {
        trades_count: trades.len(),
        buys_count: bids.len(),
        sells_count: asks.len(),
        total_bought: total_bid_amount,
        total_sold: total_ask_amount,
        total_bought_quote: bids.iter().map(|t| t.quote()).sum(),
        total_sold_quote: asks.iter().map(|t| t.quote()).sum(),
        average_buy_price: compute_average_price(&bids),
        average_sell_price: compute_average_price(&asks),
        excess_amount,
        pnl,
        pnl_with_fee: pnl,
        pnl_no_excess: compute_profit_no_excess(trades, fee),
        wins,
        closed_positions,
        ..Default::default()
    }
}

#[cfg(test)]
fn trade(timestamp: f64, amount: f64, price: f64, state: PositionState) -> Trade {
    Trade::from((timestamp, amount, price, timestamp as usize, 0, state))
}

#[cfg(test)]
#[test]
fn alternating_round_trips() {
    let trades = vec![
        trade(0.0, 1.0, 100.0, PositionState::Open),
        trade(1.0, -1.0, 105.0, PositionState::Close),
        trade(2.0, 1.0, 110.0, PositionState::Open),
        trade(3.0, -1.0, 110.0, PositionState::Close),
    ];
    let info = compute_profit_complex(&trades, 0.0);
    assert_eq!(info.pnl(), 5.0);
    assert_eq!(info.pnl_no_excess(), 5.0);
    assert_eq!(info.excess_amount(), 0.0);
    assert_eq!(info.win_rate(), Some(0.5));
    assert_eq!(info.average_buy_price(), 105.0);
    assert_eq!(info.average_sell_price(), 107.5);
    assert_eq!(info.trades_count(), 4);
}

#[cfg(test)]
#[test]
fn excess_marked_to_market() {
    let trades = vec![
        trade(0.0, 1.0, 100.0, PositionState::Open),
        trade(1.0, 1.0, 110.0, PositionState::Increase),
    ];
    let info = compute_profit_complex(&trades, 0.0);
    assert_eq!(info.excess_amount(), 2.0);
    assert_eq!(info.pnl(), 220.0);
    assert_eq!(info.pnl_no_excess(), 0.0);
    assert_eq!(info.average_sell_price(), 0.0);
    assert_eq!(info.win_rate(), None);
}

#[cfg(test)]
#[test]
fn partial_match_marks_remaining_excess() {
    // long 2, sell 1: matched 1, excess 1 marked at the last buy price
    let trades = vec![
        trade(0.0, 1.0, 100.0, PositionState::Open),
        trade(1.0, 1.0, 102.0, PositionState::Increase),
        trade(2.0, -1.0, 104.0, PositionState::Increase),
    ];
    let info = compute_profit_complex(&trades, 0.0);
    assert_eq!(info.excess_amount(), 1.0);
    // -(100 + 102) + 104 + 1 * 102
    assert_eq!(info.pnl(), 4.0);
    // only the first buy is matched: 104 - 100
    assert_eq!(info.pnl_no_excess(), 4.0);
}

#[cfg(test)]
#[test]
fn short_excess_uses_last_sell_price() {
    let trades = vec![
        trade(0.0, -2.0, 100.0, PositionState::Open),
        trade(1.0, 1.0, 95.0, PositionState::Increase),
    ];
    let info = compute_profit_complex(&trades, 0.0);
    assert_eq!(info.excess_amount(), -1.0);
    // -95 + 200 - 1 * 100
    assert_eq!(info.pnl(), 5.0);
}

#[cfg(test)]
#[test]
fn fee_reduces_matched_value() {
    let trades = vec![
        trade(0.0, 1.0, 100.0, PositionState::Open),
        trade(1.0, -1.0, 110.0, PositionState::Close),
    ];
    let info = compute_profit_complex(&trades, 0.01);
    // -(100 + 1) + (110 - 1.1)
    assert!((info.pnl() - 7.9).abs() < 1e-9);
    assert!((compute_profit_no_excess(&trades, 0.01) - 7.9).abs() < 1e-9);
}

#[cfg(test)]
#[test]
fn win_rate_of_shorts() {
    let trades = vec![
        trade(0.0, -1.0, 100.0, PositionState::Open),
        trade(1.0, -1.0, 90.0, PositionState::Increase),
        trade(2.0, 2.0, 95.0, PositionState::Close),
    ];
    assert_eq!(compute_win_rate(&trades), (1, 2));
}

#[cfg(test)]
#[test]
fn empty_trades() {
    let info = compute_profit_complex(&[], 0.0);
    assert!(info.is_empty());
    assert_eq!(info.pnl(), 0.0);
    assert_eq!(info.win_rate(), None);
    assert_eq!(compute_average_price(&[]), 0.0);
}

#[cfg(test)]
#[test]
fn total_recomputes_averages() {
    let a = compute_profit_complex(
        &[
            trade(0.0, 1.0, 100.0, PositionState::Open),
            trade(1.0, -1.0, 110.0, PositionState::Close),
        ],
        0.0,
    );
    let b = compute_profit_complex(
        &[
            trade(2.0, 3.0, 200.0, PositionState::Open),
            trade(3.0, -3.0, 190.0, PositionState::Close),
        ],
        0.0,
    );
    let mut b = b;
    b.max_drawdown = Some(-0.1);

    let total = ProfitInfo::total([&a, &b]);
    assert_eq!(total.trades_count(), 4);
    assert_eq!(total.pnl(), 10.0 - 30.0);
    // (100 + 600) / 4, not the mean of 100 and 200
    assert_eq!(total.average_buy_price(), 175.0);
    assert_eq!(total.win_rate(), Some(0.5));
    assert_eq!(total.max_drawdown(), Some(-0.1));
    assert_eq!(total.period(), Period::Total);

    assert!(ProfitInfo::total(Vec::<&ProfitInfo>::new()).is_empty());
}

#[cfg(test)]
#[test]
fn display_line() {
    let mut info = compute_profit_complex(
        &[
            trade(0.0, 1.0, 100.0, PositionState::Open),
            trade(1.0, -1.0, 105.0, PositionState::Close),
        ],
        0.0,
    );
    info.meta.quote_symbol = "USD".into();
    info.period = Period::Month { year: 2024, month: 3 };
    info.max_drawdown = Some(-0.05);

    let line = info.line();
    assert!(line.starts_with("month: 03/2024, trades     2 (b:     1/  100.00 USD"));
    assert!(line.contains("Win:  100.00%"));
    assert!(line.contains("MDD:   -5.00%"));
    assert!(line.ends_with("Pnl:       5.00 USD"));

    info.meta.display_fee = true;
    assert!(info.to_string().ends_with("(with fee: 5.00 USD)"));
}
