use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

const DOWN_STEPS_TO_BUY: u32 = 4;
const UP_STEPS_TO_SELL: u32 = 5;
const MAX_BARS_IN_TRADE: u32 = 8;

/// Counts consecutive up and down moves of the current price.
///
/// Buys after 4 down moves (only when flat unless `larger_position`), sells a
/// long after 5 up moves or once it has been held for 8 bars.
#[derive(Debug, Clone, Default)]
pub struct Kaufman {
    larger_position: bool,
    previous: Option<f64>,
    up_score: u32,
    down_score: u32,
    bars_in_trade: u32,
}

impl Kaufman {
    /// ### Arguments
    /// * `larger_position` - Keep buying dips while already long.
    pub fn new(larger_position: bool) -> Self {
        Self {
            larger_position,
            ..Default::default()
        }
    }

    fn reset_scores(&mut self) {
        self.up_score = 0;
        self.down_score = 0;
    }
}

impl TakerStrategy for Kaufman {
    fn decide(&mut self, bar: &Bar, inventory: f64) -> Result<Action> {
        let price = bar.current_price();
        if let Some(previous) = self.previous.replace(price) {
            self.up_score = if price > previous { self.up_score + 1 } else { 0 };
            self.down_score = if price < previous { self.down_score + 1 } else { 0 };
        }

        let has_long = inventory > 0.0;
        if has_long {
            self.bars_in_trade += 1;
        }

        if has_long && self.bars_in_trade >= MAX_BARS_IN_TRADE {
            self.bars_in_trade = 0;
            return Ok(Action::Sell);
        }
        if self.down_score >= DOWN_STEPS_TO_BUY && (self.larger_position || !has_long) {
            self.reset_scores();
            return Ok(Action::Buy);
        }
        if has_long && self.up_score >= UP_STEPS_TO_SELL {
            self.reset_scores();
            return Ok(Action::Sell);
        }

        Ok(Action::Nothing)
    }

    fn name(&self) -> &str {
        "kaufman"
    }
}

#[cfg(test)]
#[test]
fn buys_after_four_down_moves() {
    let bars = super::bars_from_prices(&[10.0, 9.0, 8.0, 7.0, 6.0]);
    let mut strategy = Kaufman::new(false);
    let actions = bars.iter().map(|b| strategy.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions.last(), Some(&Action::Buy));
    assert!(actions[..4].iter().all(|a| *a == Action::Nothing));
}

#[cfg(test)]
#[test]
fn sells_long_after_five_up_moves() {
    let bars = super::bars_from_prices(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let mut strategy = Kaufman::new(false);
    let actions = bars.iter().map(|b| strategy.decide(b, 1.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions.last(), Some(&Action::Sell));
    assert!(actions[..5].iter().all(|a| *a == Action::Nothing));
}

#[cfg(test)]
#[test]
fn time_stop() {
    let bars = super::bars_from_prices(&[5.0; 8]);
    let mut strategy = Kaufman::new(false);
    let actions = bars.iter().map(|b| strategy.decide(b, 1.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions[7], Action::Sell);
    assert!(actions[..7].iter().all(|a| *a == Action::Nothing));
}

#[cfg(test)]
#[test]
fn no_dip_buying_while_long() {
    let bars = super::bars_from_prices(&[10.0, 9.0, 8.0, 7.0, 6.0]);
    let mut strategy = Kaufman::new(false);
    assert!(bars.iter().all(|b| strategy.decide(b, 1.0).unwrap() == Action::Nothing));

    let mut strategy = Kaufman::new(true);
    let actions = bars.iter().map(|b| strategy.decide(b, 1.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions.last(), Some(&Action::Buy));
}
