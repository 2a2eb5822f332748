//! # simple-backtester: bar replay backtesting
//!
//! **simple-backtester** replays a time-ordered series of price bars through a
//! trading strategy, turns its decisions into trades under an inventory cap
//! and reports realized PnL, fees, win rate and drawdown for the whole run,
//! every month and every day.
//!
//! ## Core Components
//! | Component              | Description                                                                  |
//! |------------------------|------------------------------------------------------------------------------|
//! | **`Bar`**              | One price sample: bid/ask snapshot and/or OHLC, with optional flow fields.   |
//! | **`Strategy`**         | A taker (buy/sell/nothing per bar) or a maker (resting limit orders).        |
//! | **`PositionSimulator`**| Executes decisions, enforces the inventory cap, records trades.              |
//! | **`ProfitInfo`**       | Statistics over a set of trades: matched PnL, excess, fees, win rate.        |
//! | **`PeriodReporter`**   | Month and day reports, with position-boundary handling and drawdown.         |
//! | **`StrategyRegistry`** | Name-based strategy construction for configuration files.                    |
//! | **`Optimizer`**        | Parallel sweep over inventory caps *(feature `optimizer`)*.                  |
//! | **`Draw`**             | Price and daily PnL charts *(feature `draws`)*.                              |
//!
//! ## Execution rules
//! - A taker buy executes at the ask, a sell at the bid, both falling back to the current price.
//! - A decision opposite to the open position closes it entirely.
//! - Once the inventory cap is reached, same-direction decisions are refused.
//! - A resting maker order fills at its own price when the bar range crosses it.
//!
//! ## Getting Started
//! ```rust
//! use simple_backtester::prelude::*;
//!
//! let bars = [100.0, 102.0, 101.0, 104.0].iter().enumerate().map(|(i, price)| {
//!     BarBuilder::builder()
//!         .timestamp(1_700_000_000.0 + i as f64 * 60.0)
//!         .close(*price)
//!         .build()
//!         .unwrap()
//! });
//!
//! let mut simulator = PositionSimulator::new(Strategy::taker(Naive::new()), 1.0, 0.001, Some(1))
//!     .unwrap()
//!     .with_symbols("BTC", "USD");
//! simulator.process_bars(bars).unwrap();
//! simulator.finish();
//!
//! let report = simulator.report();
//! assert_eq!(report.trades_count(), 4);
//! // bought at 100 and 101, sold at 102 and 104
//! assert_eq!(report.pnl(), 5.0);
//! println!("{report}");
//! ```
//!
//! ## Command line
//! With the `cli` feature, the `simple-backtester` binary runs every backtest
//! of a JSON configuration (see [`config`]) and writes text reports next to
//! the bar directory.
#![warn(missing_docs)]

/// Bars, trades, orders, strategies and the position simulator.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Bar loading, timestamps and file helpers.
pub mod utils;

/// Trade statistics: PnL, averages, win rate.
pub mod metrics;

/// Whole-run, monthly and daily reports.
pub mod report;

/// Built-in strategies.
pub mod strategies;

/// Strategy lookup by name.
pub mod registry;

/// JSON run configuration.
#[cfg(feature = "serde")]
pub mod config;

/// Inventory cap optimization.
#[cfg(feature = "optimizer")]
pub mod optimizer;

/// Draw graphics with plotters backends: png and svg.
#[cfg(feature = "draws")]
pub mod draws;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::metrics::*;
    pub use crate::registry::*;
    pub use crate::report::*;
    pub use crate::strategies::*;
    pub use crate::utils::*;

    #[cfg(feature = "serde")]
    pub use crate::config::*;

    #[cfg(feature = "optimizer")]
    pub use crate::optimizer::*;

    #[cfg(feature = "draws")]
    pub use crate::draws::*;
}
