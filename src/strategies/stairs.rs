use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

/// Trades against each step of the price: sells after a rise, buys after a fall.
#[derive(Debug, Clone, Default)]
pub struct Stairs {
    preserve_last_bar: bool,
    last_price: Option<f64>,
}

impl Stairs {
    /// ### Arguments
    /// * `preserve_last_bar` - Keep measuring steps from the last unchanged bar
    ///   instead of the previous bar.
    pub fn new(preserve_last_bar: bool) -> Self {
        Self {
            preserve_last_bar,
            last_price: None,
        }
    }
}

impl TakerStrategy for Stairs {
    fn decide(&mut self, bar: &Bar, _inventory: f64) -> Result<Action> {
        let close = bar.current_price();
        let Some(open) = self.last_price else {
            self.last_price = Some(close);
            return Ok(Action::Nothing);
        };

        if !self.preserve_last_bar {
            self.last_price = Some(close);
        }

        Ok(if close > open {
            Action::Sell
        } else if close < open {
            Action::Buy
        } else {
            self.last_price = Some(close);
            Action::Nothing
        })
    }

    fn name(&self) -> &str {
        "stairs"
    }
}

#[cfg(test)]
#[test]
fn steps_against_the_move() {
    let bars = super::bars_from_prices(&[10.0, 11.0, 11.0, 10.5]);
    let mut stairs = Stairs::new(false);
    let actions = bars.iter().map(|b| stairs.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions, vec![Action::Nothing, Action::Sell, Action::Nothing, Action::Buy]);
}

#[cfg(test)]
#[test]
fn preserved_reference() {
    // every step is measured from 10 until the price comes back to it
    let bars = super::bars_from_prices(&[10.0, 11.0, 12.0, 10.0, 9.0]);
    let mut stairs = Stairs::new(true);
    let actions = bars.iter().map(|b| stairs.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![Action::Nothing, Action::Sell, Action::Sell, Action::Nothing, Action::Buy]
    );
}
