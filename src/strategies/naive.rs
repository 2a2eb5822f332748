use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

/// Alternates a buy and a sell on every bar, starting with a buy.
#[derive(Debug, Clone)]
pub struct Naive {
    last_sell: bool,
}

impl Default for Naive {
    fn default() -> Self {
        Self { last_sell: true }
    }
}

impl Naive {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TakerStrategy for Naive {
    fn decide(&mut self, _bar: &Bar, _inventory: f64) -> Result<Action> {
        self.last_sell = !self.last_sell;
        Ok(if self.last_sell { Action::Sell } else { Action::Buy })
    }

    fn name(&self) -> &str {
        "naive"
    }
}

#[cfg(test)]
#[test]
fn alternates_from_buy() {
    let bars = super::bars_from_prices(&[1.0, 2.0, 3.0]);
    let mut naive = Naive::new();
    let actions = bars.iter().map(|b| naive.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions, vec![Action::Buy, Action::Sell, Action::Buy]);
}
