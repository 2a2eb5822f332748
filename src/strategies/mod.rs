//! Built-in strategies.
//!
//! | Strategy         | Kind  | Behavior                                                        |
//! |------------------|-------|-----------------------------------------------------------------|
//! | `Naive`          | taker | Alternates buy and sell, starting with a buy.                   |
//! | `NaiveFollower`  | taker | Follows (or fades) the last price change.                       |
//! | `Stairs`         | taker | Sells a green step, buys a red step.                            |
//! | `MeanReversion`  | taker | Flips trend after enough confirming bars.                       |
//! | `Kaufman`        | taker | Buys a run of down moves, sells a run of up moves or on timeout.|
//! | `TradeFlow`      | taker | Follows a strong aggressive buy or sell volume imbalance.       |
//! | `OrderBook`      | taker | Fades a sudden shift of the resting book imbalance.             |
//! | `MarketMaker`    | maker | Quotes a bid and an ask around the touch every few bars.        |

mod follower;
mod kaufman;
mod market_maker;
mod mean_reversion;
mod naive;
mod order_book;
mod stairs;
mod trade_flow;

pub use follower::*;
pub use kaufman::*;
pub use market_maker::*;
pub use mean_reversion::*;
pub use naive::*;
pub use order_book::*;
pub use stairs::*;
pub use trade_flow::*;

#[cfg(test)]
pub(crate) fn bars_from_prices(prices: &[f64]) -> Vec<crate::engine::Bar> {
    use crate::engine::BarBuilder;

    prices
        .iter()
        .enumerate()
        .map(|(i, price)| {
            BarBuilder::builder()
                .timestamp(i as f64 * 60.0)
                .close(*price)
                .build()
                .unwrap()
        })
        .collect()
}
