use std::fmt;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::utils::datetime_from_secs;

/// Effect of a trade on the open position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionState {
    /// First unit of a new position, inventory leaves zero.
    Open,
    /// Same-direction addition to an open position.
    Increase,
    /// Inventory returns to exactly zero.
    Close,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Increase => write!(f, "Increase"),
            Self::Close => write!(f, "Close"),
        }
    }
}

/// An executed trade.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    timestamp: f64,
    amount: f64,
    price: f64,
    bar_index: usize,
    inventory: i32,
    position_state: PositionState,
}

type T1 = (f64, f64, f64, usize, i32, PositionState);
impl From<T1> for Trade {
    fn from((timestamp, amount, price, bar_index, inventory, position_state): T1) -> Self {
        Self {
            timestamp,
            amount,
            price,
            bar_index,
            inventory,
            position_state,
        }
    }
}

impl Trade {
    /// Returns the timestamp in seconds since epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Returns the timestamp as a UTC date time.
    pub fn datetime(&self) -> DateTime<Utc> {
        datetime_from_secs(self.timestamp)
    }

    /// Signed base amount: positive for a buy, negative for a sell.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Index of the bar the trade was generated on.
    pub fn bar_index(&self) -> usize {
        self.bar_index
    }

    /// Inventory units right after the trade.
    pub fn inventory(&self) -> i32 {
        self.inventory
    }

    pub fn position_state(&self) -> PositionState {
        self.position_state
    }

    pub fn is_buy(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_sell(&self) -> bool {
        self.amount < 0.0
    }

    /// Absolute quote value of the trade.
    pub fn quote(&self) -> f64 {
        (self.amount * self.price).abs()
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.is_buy() { "Buy" } else { "Sell" };
        write!(
            f,
            "{} {side} {} amount: {}, price: {}, inv: {}, time: {}",
            self.bar_index,
            self.position_state,
            self.amount,
            self.price,
            self.inventory,
            self.datetime().format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
#[test]
fn trade_sides() {
    let buy = Trade::from((0.0, 2.0, 100.0, 0, 1, PositionState::Open));
    assert!(buy.is_buy());
    assert!(!buy.is_sell());
    assert_eq!(buy.quote(), 200.0);

    let sell = Trade::from((1.0, -2.0, 110.0, 1, 0, PositionState::Close));
    assert!(sell.is_sell());
    assert_eq!(sell.quote(), 220.0);
}

#[cfg(test)]
#[test]
fn trade_display() {
    let trade = Trade::from((0.0, -1.0, 105.0, 3, 0, PositionState::Close));
    assert_eq!(
        trade.to_string(),
        "3 Sell Close amount: -1, price: 105, inv: 0, time: 1970-01-01 00:00:00"
    );
}
