use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::utils::datetime_from_secs;

/// One price sample of the replayed series.
///
/// Every price field is optional: a bar may carry a full OHLC candle, only a
/// bid/ask snapshot, or both. The execution price for each role is resolved
/// through an ordered fallback chain (see [`Bar::buy_price`], [`Bar::sell_price`]
/// and [`Bar::current_price`]).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bar {
    #[cfg_attr(
        feature = "serde",
        serde(alias = "timestamp_unix", deserialize_with = "crate::utils::deserialize_timestamp")
    )]
    timestamp: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    bid: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    ask: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    open: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    high: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    low: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    close: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    high_buy: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    low_sell: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    volume: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    timestamp_diff_ms: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, alias = "volume_buy"))]
    buy_volume: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, alias = "volume_sell"))]
    sell_volume: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, alias = "trade_count_buy"))]
    buy_count: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default, alias = "trade_count_sell"))]
    sell_count: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    mid_change: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, alias = "ob_liquidity_bid"))]
    bid_liquidity: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, alias = "ob_liquidity_ask"))]
    ask_liquidity: Option<f64>,
}

impl Bar {
    /// Returns the timestamp in seconds since epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Returns the timestamp as a UTC date time.
    pub fn datetime(&self) -> DateTime<Utc> {
        datetime_from_secs(self.timestamp)
    }

    /// Returns the sequence index assigned by the simulator.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: f64) {
        self.timestamp = timestamp;
    }

    /// Best bid, used to execute taker sells.
    pub fn bid(&self) -> Option<f64> {
        self.bid
    }

    /// Best ask, used to execute taker buys.
    pub fn ask(&self) -> Option<f64> {
        self.ask
    }

    pub fn open(&self) -> Option<f64> {
        self.open
    }

    pub fn high(&self) -> Option<f64> {
        self.high
    }

    pub fn low(&self) -> Option<f64> {
        self.low
    }

    pub fn close(&self) -> Option<f64> {
        self.close
    }

    pub fn volume(&self) -> Option<f64> {
        self.volume
    }

    pub fn timestamp_diff_ms(&self) -> Option<f64> {
        self.timestamp_diff_ms
    }

    pub fn buy_volume(&self) -> Option<f64> {
        self.buy_volume
    }

    pub fn sell_volume(&self) -> Option<f64> {
        self.sell_volume
    }

    pub fn buy_count(&self) -> Option<u32> {
        self.buy_count
    }

    pub fn sell_count(&self) -> Option<u32> {
        self.sell_count
    }

    pub fn mid_change(&self) -> Option<f64> {
        self.mid_change
    }

    /// Resting volume on the bid side of the book.
    pub fn bid_liquidity(&self) -> Option<f64> {
        self.bid_liquidity
    }

    /// Resting volume on the ask side of the book.
    pub fn ask_liquidity(&self) -> Option<f64> {
        self.ask_liquidity
    }

    /// Middle of the spread, only when both sides are known.
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) * 0.5),
            _ => None,
        }
    }

    /// Canonical price of the bar: `close`, else `mid`, else `0`.
    pub fn current_price(&self) -> f64 {
        self.close.or_else(|| self.mid()).unwrap_or(0.0)
    }

    /// First price of the bar: `open`, else `mid`, else `0`.
    pub fn initial_price(&self) -> f64 {
        self.open.or_else(|| self.mid()).unwrap_or(0.0)
    }

    /// Execution price of a taker buy (and of flattening a short): `ask`, else [`Bar::current_price`].
    pub fn buy_price(&self) -> f64 {
        self.ask.unwrap_or_else(|| self.current_price())
    }

    /// Execution price of a taker sell (and of flattening a long): `bid`, else [`Bar::current_price`].
    pub fn sell_price(&self) -> f64 {
        self.bid.unwrap_or_else(|| self.current_price())
    }

    /// Highest price a resting ask can be lifted at: `high_buy`, else `high`.
    pub fn maker_high(&self) -> Option<f64> {
        self.high_buy.or(self.high)
    }

    /// Lowest price a resting bid can be hit at: `low_sell`, else `low`.
    pub fn maker_low(&self) -> Option<f64> {
        self.low_sell.or(self.low)
    }
}

/// Builder for [`Bar`].
///
/// ```rust
/// use simple_backtester::prelude::*;
///
/// let bar = BarBuilder::builder()
///     .timestamp(1_600_000_000.0)
///     .bid(99.5)
///     .ask(100.5)
///     .build()
///     .unwrap();
/// assert_eq!(bar.mid(), Some(100.0));
/// assert_eq!(bar.current_price(), 100.0);
/// ```
#[derive(Debug, Default)]
pub struct BarBuilder {
    bar: Bar,
}

impl BarBuilder {
    /// Starts an empty bar at timestamp `0`.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the timestamp (seconds since epoch).
    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.bar.timestamp = timestamp;
        self
    }

    /// Sets the timestamp from a date time.
    pub fn datetime(mut self, datetime: DateTime<Utc>) -> Self {
        self.bar.timestamp = datetime.timestamp_micros() as f64 / 1_000_000.0;
        self
    }

    pub fn bid(mut self, bid: f64) -> Self {
        self.bar.bid = Some(bid);
        self
    }

    pub fn ask(mut self, ask: f64) -> Self {
        self.bar.ask = Some(ask);
        self
    }

    pub fn open(mut self, open: f64) -> Self {
        self.bar.open = Some(open);
        self
    }

    pub fn high(mut self, high: f64) -> Self {
        self.bar.high = Some(high);
        self
    }

    pub fn low(mut self, low: f64) -> Self {
        self.bar.low = Some(low);
        self
    }

    pub fn close(mut self, close: f64) -> Self {
        self.bar.close = Some(close);
        self
    }

    pub fn high_buy(mut self, high_buy: f64) -> Self {
        self.bar.high_buy = Some(high_buy);
        self
    }

    pub fn low_sell(mut self, low_sell: f64) -> Self {
        self.bar.low_sell = Some(low_sell);
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.bar.volume = Some(volume);
        self
    }

    pub fn timestamp_diff_ms(mut self, diff: f64) -> Self {
        self.bar.timestamp_diff_ms = Some(diff);
        self
    }

    /// Sets the aggressive buy and sell volumes.
    pub fn flow_volumes(mut self, buy_volume: f64, sell_volume: f64) -> Self {
        self.bar.buy_volume = Some(buy_volume);
        self.bar.sell_volume = Some(sell_volume);
        self
    }

    /// Sets the aggressive buy and sell trade counts.
    pub fn flow_counts(mut self, buy_count: u32, sell_count: u32) -> Self {
        self.bar.buy_count = Some(buy_count);
        self.bar.sell_count = Some(sell_count);
        self
    }

    pub fn mid_change(mut self, mid_change: f64) -> Self {
        self.bar.mid_change = Some(mid_change);
        self
    }

    /// Sets the resting book volume of each side.
    pub fn liquidity(mut self, bid_liquidity: f64, ask_liquidity: f64) -> Self {
        self.bar.bid_liquidity = Some(bid_liquidity);
        self.bar.ask_liquidity = Some(ask_liquidity);
        self
    }

    /// Validates and returns the bar.
    pub fn build(self) -> Result<Bar> {
        if !self.bar.timestamp.is_finite() {
            return Err(Error::InvalidTimestamp(self.bar.timestamp));
        }
        Ok(self.bar)
    }
}

#[cfg(test)]
#[test]
fn current_price_prefers_close() {
    let bar = BarBuilder::builder().bid(9.0).ask(11.0).close(12.0).build().unwrap();
    assert_eq!(bar.current_price(), 12.0);
    assert_eq!(bar.mid(), Some(10.0));
}

#[cfg(test)]
#[test]
fn current_price_falls_back_to_mid_then_zero() {
    let bar = BarBuilder::builder().bid(9.0).ask(11.0).build().unwrap();
    assert_eq!(bar.current_price(), 10.0);

    // a single side is not enough for a mid
    let bar = BarBuilder::builder().bid(9.0).build().unwrap();
    assert_eq!(bar.mid(), None);
    assert_eq!(bar.current_price(), 0.0);
}

#[cfg(test)]
#[test]
fn execution_prices() {
    let bar = BarBuilder::builder().bid(99.0).ask(101.0).close(100.5).build().unwrap();
    assert_eq!(bar.buy_price(), 101.0);
    assert_eq!(bar.sell_price(), 99.0);

    let bar = BarBuilder::builder().close(100.5).build().unwrap();
    assert_eq!(bar.buy_price(), 100.5);
    assert_eq!(bar.sell_price(), 100.5);
}

#[cfg(test)]
#[test]
fn maker_range_fallbacks() {
    let bar = BarBuilder::builder().high(110.0).low(90.0).build().unwrap();
    assert_eq!(bar.maker_high(), Some(110.0));
    assert_eq!(bar.maker_low(), Some(90.0));

    let bar = BarBuilder::builder()
        .high(110.0)
        .low(90.0)
        .high_buy(108.0)
        .low_sell(92.0)
        .build()
        .unwrap();
    assert_eq!(bar.maker_high(), Some(108.0));
    assert_eq!(bar.maker_low(), Some(92.0));

    let bar = BarBuilder::builder().close(100.0).build().unwrap();
    assert_eq!(bar.maker_high(), None);
    assert_eq!(bar.maker_low(), None);
}

#[cfg(test)]
#[test]
fn initial_price() {
    let bar = BarBuilder::builder().open(95.0).close(100.0).build().unwrap();
    assert_eq!(bar.initial_price(), 95.0);
    let bar = BarBuilder::builder().bid(99.0).ask(101.0).build().unwrap();
    assert_eq!(bar.initial_price(), 100.0);
}

#[cfg(test)]
#[test]
fn invalid_timestamp() {
    let result = BarBuilder::builder().timestamp(f64::NAN).build();
    assert!(matches!(result, Err(Error::InvalidTimestamp(_))));
}

#[cfg(test)]
#[test]
fn datetime_conversion() {
    let bar = BarBuilder::builder().timestamp(86_400.5).build().unwrap();
    assert_eq!(bar.datetime().timestamp(), 86_400);
    assert_eq!(bar.datetime().timestamp_subsec_millis(), 500);
}
