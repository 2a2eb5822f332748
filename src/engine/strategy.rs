use std::fmt;

use super::{Bar, PlacedOrder};
use crate::errors::Result;

/// Decision of a taker strategy for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Do not trade.
    Nothing,
    /// Buy at the ask (or close a short).
    Buy,
    /// Sell at the bid (or close a long).
    Sell,
}

/// A strategy that trades immediately at the prevailing price.
pub trait TakerStrategy {
    /// Decides what to do on `bar`, given the signed base amount currently held.
    ///
    /// An error aborts the simulation.
    fn decide(&mut self, bar: &Bar, inventory: f64) -> Result<Action>;

    /// Name used in reports.
    fn name(&self) -> &str {
        "custom"
    }
}

/// A strategy that quotes resting limit orders.
pub trait MakerStrategy {
    /// Returns the complete new set of resting orders.
    ///
    /// `resting` holds the orders still resting after the bar was evaluated;
    /// any of them missing from the returned set is cancelled.
    fn decide(&mut self, bar: &Bar, inventory: f64, resting: &[PlacedOrder]) -> Result<Vec<PlacedOrder>>;

    /// Name used in reports.
    fn name(&self) -> &str {
        "custom"
    }
}

/// A strategy, tagged by its execution capability.
pub enum Strategy {
    /// Market orders decided bar by bar.
    Taker(Box<dyn TakerStrategy + Send>),
    /// Resting limit orders replaced bar by bar.
    Maker(Box<dyn MakerStrategy + Send>),
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Taker(s) => write!(f, "Taker({})", s.name()),
            Self::Maker(s) => write!(f, "Maker({})", s.name()),
        }
    }
}

impl Strategy {
    /// Wraps a taker strategy.
    pub fn taker<S: TakerStrategy + Send + 'static>(strategy: S) -> Self {
        Self::Taker(Box::new(strategy))
    }

    /// Wraps a maker strategy.
    pub fn maker<S: MakerStrategy + Send + 'static>(strategy: S) -> Self {
        Self::Maker(Box::new(strategy))
    }

    /// Wraps a closure as a taker strategy.
    ///
    /// ```rust
    /// use simple_backtester::prelude::*;
    ///
    /// let strategy = Strategy::taker_fn(|bar, inventory| {
    ///     Ok(if inventory > 0.0 || bar.current_price() > 100.0 {
    ///         Action::Sell
    ///     } else {
    ///         Action::Buy
    ///     })
    /// });
    /// assert_eq!(strategy.name(), "custom");
    /// ```
    pub fn taker_fn<F>(func: F) -> Self
    where
        F: FnMut(&Bar, f64) -> Result<Action> + Send + 'static,
    {
        Self::taker(TakerFn(func))
    }

    /// Wraps a closure as a maker strategy.
    pub fn maker_fn<F>(func: F) -> Self
    where
        F: FnMut(&Bar, f64, &[PlacedOrder]) -> Result<Vec<PlacedOrder>> + Send + 'static,
    {
        Self::maker(MakerFn(func))
    }

    /// Returns the strategy name.
    pub fn name(&self) -> &str {
        match self {
            Self::Taker(s) => s.name(),
            Self::Maker(s) => s.name(),
        }
    }

    pub fn is_maker(&self) -> bool {
        matches!(self, Self::Maker(_))
    }
}

struct TakerFn<F>(F);

impl<F> TakerStrategy for TakerFn<F>
where
    F: FnMut(&Bar, f64) -> Result<Action>,
{
    fn decide(&mut self, bar: &Bar, inventory: f64) -> Result<Action> {
        (self.0)(bar, inventory)
    }
}

struct MakerFn<F>(F);

impl<F> MakerStrategy for MakerFn<F>
where
    F: FnMut(&Bar, f64, &[PlacedOrder]) -> Result<Vec<PlacedOrder>>,
{
    fn decide(&mut self, bar: &Bar, inventory: f64, resting: &[PlacedOrder]) -> Result<Vec<PlacedOrder>> {
        (self.0)(bar, inventory, resting)
    }
}

#[cfg(test)]
#[test]
fn closures_are_tagged() {
    let taker = Strategy::taker_fn(|_, _| Ok(Action::Nothing));
    assert!(!taker.is_maker());
    assert_eq!(format!("{taker:?}"), "Taker(custom)");

    let maker = Strategy::maker_fn(|_, _, resting| Ok(resting.to_vec()));
    assert!(maker.is_maker());
    assert_eq!(format!("{maker:?}"), "Maker(custom)");
}
