use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

/// Buys when an uptrend starts and sells when it ends.
///
/// A trend flip needs at least `confirmation` bars since the previous flip.
#[derive(Debug, Clone)]
pub struct MeanReversion {
    confirmation: u32,
    confirmations: u32,
    uptrend: bool,
    previous: Option<f64>,
}

impl MeanReversion {
    /// ### Arguments
    /// * `confirmation` - Bars required between two flips, at least 1.
    pub fn new(confirmation: u32) -> Self {
        Self {
            confirmation: confirmation.max(1),
            confirmations: 0,
            uptrend: false,
            previous: None,
        }
    }
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TakerStrategy for MeanReversion {
    fn decide(&mut self, bar: &Bar, _inventory: f64) -> Result<Action> {
        let price = bar.current_price();
        let Some(previous) = self.previous.replace(price) else {
            return Ok(Action::Nothing);
        };

        let confirmed = self.confirmations >= self.confirmation;
        if price > previous && !self.uptrend && confirmed {
            self.uptrend = true;
            self.confirmations = 0;
            return Ok(Action::Buy);
        }
        if price < previous && self.uptrend && confirmed {
            self.uptrend = false;
            self.confirmations = 0;
            return Ok(Action::Sell);
        }

        self.confirmations += 1;
        Ok(Action::Nothing)
    }

    fn name(&self) -> &str {
        "mean-reversion"
    }
}

#[cfg(test)]
#[test]
fn flips_after_confirmation() {
    let bars = super::bars_from_prices(&[10.0, 11.0, 12.0, 11.0, 10.0, 9.0]);
    let mut strategy = MeanReversion::new(1);
    let actions = bars.iter().map(|b| strategy.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![
            Action::Nothing,
            Action::Nothing,
            Action::Buy,
            Action::Nothing,
            Action::Sell,
            Action::Nothing
        ]
    );
}

#[cfg(test)]
#[test]
fn zero_confirmation_is_one() {
    assert_eq!(MeanReversion::new(0).confirmation, 1);
}
