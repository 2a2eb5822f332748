use crate::engine::{Action, Bar, TakerStrategy};
use crate::errors::Result;

/// Trades in the direction of the last price change, or against it.
///
/// A flat change counts as an up move. The first bar only records the price.
#[derive(Debug, Clone, Default)]
pub struct NaiveFollower {
    against_trend: bool,
    last_price: Option<f64>,
}

impl NaiveFollower {
    /// ### Arguments
    /// * `against_trend` - Fade the last move instead of following it.
    pub fn new(against_trend: bool) -> Self {
        Self {
            against_trend,
            last_price: None,
        }
    }
}

impl TakerStrategy for NaiveFollower {
    fn decide(&mut self, bar: &Bar, _inventory: f64) -> Result<Action> {
        let price = bar.current_price();
        let Some(last) = self.last_price.replace(price) else {
            return Ok(Action::Nothing);
        };

        let up = price - last >= 0.0;
        Ok(match (up, self.against_trend) {
            (true, false) | (false, true) => Action::Buy,
            (true, true) | (false, false) => Action::Sell,
        })
    }

    fn name(&self) -> &str {
        if self.against_trend {
            "naive-follower-against"
        } else {
            "naive-follower"
        }
    }
}

#[cfg(test)]
#[test]
fn follows_and_fades() {
    let bars = super::bars_from_prices(&[10.0, 11.0, 9.0, 9.0]);

    let mut follower = NaiveFollower::new(false);
    let actions = bars.iter().map(|b| follower.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions, vec![Action::Nothing, Action::Buy, Action::Sell, Action::Buy]);

    let mut fader = NaiveFollower::new(true);
    let actions = bars.iter().map(|b| fader.decide(b, 0.0).unwrap()).collect::<Vec<_>>();
    assert_eq!(actions, vec![Action::Nothing, Action::Sell, Action::Buy, Action::Sell]);
}
