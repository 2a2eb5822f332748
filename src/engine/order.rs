#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::utils::random_id;

/// Represents the side of a resting order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    /// Buy order, fills when the market trades down to it.
    Bid,
    /// Sell order, fills when the market trades up to it.
    Ask,
}

/// A resting limit order placed by a maker strategy.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy)]
pub struct PlacedOrder {
    id: u32,
    side: OrderSide,
    price: f64,
    amount: Option<f64>,
}

impl PartialEq for PlacedOrder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl PlacedOrder {
    /// Creates a resting order.
    ///
    /// ### Arguments
    /// * `side` - Bid or ask.
    /// * `price` - Absolute limit price.
    /// * `amount` - Base amount of the order, the simulator order size when `None`.
    ///
    /// ### Returns
    /// The order, or an error when the price or the amount is not positive.
    pub fn new(side: OrderSide, price: f64, amount: Option<f64>) -> Result<Self> {
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::NegZeroOrderPrice(price));
        }
        if let Some(amount) = amount
            && (amount <= 0.0 || !amount.is_finite())
        {
            return Err(Error::NegZeroOrderAmount(amount));
        }

        Ok(Self {
            id: random_id(),
            side,
            price,
            amount,
        })
    }

    /// Shortcut for a bid.
    pub fn bid(price: f64, amount: Option<f64>) -> Result<Self> {
        Self::new(OrderSide::Bid, price, amount)
    }

    /// Shortcut for an ask.
    pub fn ask(price: f64, amount: Option<f64>) -> Result<Self> {
        Self::new(OrderSide::Ask, price, amount)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn amount(&self) -> Option<f64> {
        self.amount
    }

    /// Returns true if a bar trading within `low..=high` reaches the order.
    pub(crate) fn is_crossed(&self, low: Option<f64>, high: Option<f64>) -> bool {
        match self.side {
            OrderSide::Bid => low.is_some_and(|low| low <= self.price),
            OrderSide::Ask => high.is_some_and(|high| high >= self.price),
        }
    }
}

#[cfg(test)]
#[test]
fn create_bid() {
    let order = PlacedOrder::bid(100.0, Some(2.0)).unwrap();
    assert_eq!(order.side(), OrderSide::Bid);
    assert_eq!(order.price(), 100.0);
    assert_eq!(order.amount(), Some(2.0));
}

#[cfg(test)]
#[test]
fn create_invalid_orders() {
    let result = PlacedOrder::ask(0.0, None);
    assert!(matches!(result, Err(Error::NegZeroOrderPrice(_))));

    let result = PlacedOrder::ask(f64::INFINITY, None);
    assert!(matches!(result, Err(Error::NegZeroOrderPrice(_))));

    let result = PlacedOrder::bid(100.0, Some(-1.0));
    assert!(matches!(result, Err(Error::NegZeroOrderAmount(_))));
}

#[cfg(test)]
#[test]
fn order_equality() {
    let order1 = PlacedOrder::bid(100.0, None).unwrap();
    let order2 = PlacedOrder::bid(100.0, None).unwrap();
    assert_ne!(order1, order2);
    assert_eq!(order1, order1);
}

#[cfg(test)]
#[test]
fn crossing() {
    let bid = PlacedOrder::bid(100.0, None).unwrap();
    assert!(bid.is_crossed(Some(100.0), Some(120.0)));
    assert!(bid.is_crossed(Some(99.0), None));
    assert!(!bid.is_crossed(Some(100.5), Some(120.0)));
    assert!(!bid.is_crossed(None, Some(120.0)));

    let ask = PlacedOrder::ask(110.0, None).unwrap();
    assert!(ask.is_crossed(None, Some(110.0)));
    assert!(!ask.is_crossed(Some(90.0), Some(109.9)));
    assert!(!ask.is_crossed(Some(90.0), None));
}
