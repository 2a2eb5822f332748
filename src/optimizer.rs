//! Inventory cap optimization.
//!
//! This module replays the same bars once per inventory cap, in parallel.
//! Every run owns its simulator and a fresh strategy from the factory, so runs
//! never share state.

use rayon::prelude::*;
use tracing::info;

use crate::engine::{Bar, PositionSimulator, Strategy};
use crate::errors::Result;
use crate::metrics::ProfitInfo;

/// Runs one simulation per inventory cap over shared bars.
#[derive(Debug, Clone)]
pub struct Optimizer {
    bars: Vec<Bar>,
    order_size: f64,
    fee: f64,
}

impl From<&PositionSimulator> for Optimizer {
    fn from(value: &PositionSimulator) -> Self {
        Self {
            bars: value.bars().to_vec(),
            order_size: value.order_size(),
            fee: value.fee(),
        }
    }
}

impl Optimizer {
    /// Creates a new `Optimizer`.
    ///
    /// ### Arguments
    /// * `bars` - Bars replayed by every run, ordered by timestamp.
    /// * `order_size` - Base order size.
    /// * `fee` - Fee rate.
    pub fn new(bars: Vec<Bar>, order_size: f64, fee: f64) -> Self {
        Self { bars, order_size, fee }
    }

    /// Runs every cap and reports the whole run, flattened at the last bar.
    ///
    /// ### Arguments
    /// * `caps` - Inventory caps to try, `None` for unbounded.
    /// * `factory` - Builds a fresh strategy for each run.
    ///
    /// ### Returns
    /// `(cap, report)` pairs in the order of `caps`, or the first error of any run.
    pub fn with<F>(&self, caps: &[Option<u32>], factory: F) -> Result<Vec<(Option<u32>, ProfitInfo)>>
    where
        F: Fn() -> Result<Strategy> + Sync,
    {
        let num_cpus = num_cpus::get();
        let chunk_size = caps.len().div_ceil(num_cpus).max(1);

        caps.par_chunks(chunk_size)
            .map::<_, Result<_>>(|par_caps| {
                let mut local_results = Vec::with_capacity(par_caps.len());
                for &cap in par_caps {
                    let mut simulator = PositionSimulator::new(factory()?, self.order_size, self.fee, cap)?;
                    simulator.process_bars(self.bars.iter().cloned())?;
                    simulator.finish();
                    let report = simulator.report();
                    info!(?cap, pnl = report.pnl(), trades = report.trades_count(), "run finished");
                    local_results.push((cap, report));
                }
                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }

    /// Returns the cap with the highest PnL, the first one on ties.
    pub fn best(results: &[(Option<u32>, ProfitInfo)]) -> Option<&(Option<u32>, ProfitInfo)> {
        results
            .iter()
            .reduce(|best, candidate| if candidate.1.pnl() > best.1.pnl() { candidate } else { best })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Action, BarBuilder};
    use crate::errors::Error;

    fn bars() -> Vec<Bar> {
        [100.0, 101.0, 102.0, 103.0, 104.0, 105.0]
            .iter()
            .enumerate()
            .map(|(i, price)| {
                BarBuilder::builder()
                    .timestamp(1_600_000_000.0 + i as f64 * 60.0)
                    .close(*price)
                    .build()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn results_follow_cap_order() {
        let optimizer = Optimizer::new(bars(), 1.0, 0.0);
        let caps = [None, Some(0), Some(1), Some(3)];
        let results = optimizer
            .with(&caps, || Ok(Strategy::taker_fn(|_, _| Ok(Action::Buy))))
            .unwrap();

        assert_eq!(results.iter().map(|(cap, _)| *cap).collect::<Vec<_>>(), caps);
        // unbounded: 6 buys from 100 to 105, flattened at 105
        assert_eq!(results[0].1.pnl(), 15.0);
        assert!(results[1].1.is_empty());
        assert_eq!(results[2].1.pnl(), 5.0);
        assert_eq!(results[3].1.pnl(), 12.0);

        let (cap, _) = Optimizer::best(&results).unwrap();
        assert_eq!(*cap, None);
    }

    #[test]
    fn strategy_error_fails_the_sweep() {
        let optimizer = Optimizer::new(bars(), 1.0, 0.0);
        let result = optimizer.with(&[Some(1), Some(2)], || {
            Ok(Strategy::taker_fn(|_, _| Err(Error::Strategy("boom".into()))))
        });
        assert!(matches!(result, Err(Error::Strategy(_))));
    }

    #[test]
    fn ema_crossing() {
        use ta::Next;
        use ta::indicators::ExponentialMovingAverage;

        let optimizer = Optimizer::new(bars(), 0.5, 0.001);
        let results = optimizer
            .with(&[Some(1), Some(2)], || {
                let mut ema = ExponentialMovingAverage::new(3).map_err(|e| Error::Msg(e.to_string()))?;
                Ok(Strategy::taker_fn(move |bar, _| {
                    let price = bar.current_price();
                    Ok(if price > ema.next(price) { Action::Buy } else { Action::Nothing })
                }))
            })
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, report)| report.pnl() > 0.0));
    }
}
