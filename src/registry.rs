//! Name-based strategy resolution.
//!
//! A configuration names its strategy with a string and a list of positional
//! parameters. The [`StrategyRegistry`] maps that name to a factory building a
//! fresh [`Strategy`], so every run starts from a clean strategy state.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::Strategy;
use crate::errors::{Error, Result};
use crate::strategies::*;

/// A positional strategy parameter, as written in a configuration file.
///
/// Text values are coerced on access: integer first, then float, then boolean.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyParam {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// Any other text.
    Text(String),
}

impl StrategyParam {
    /// Integer value, text is parsed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float value, integers are widened and text is parsed.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Boolean value, text is parsed case-insensitively.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Text(text) => text.trim().to_ascii_lowercase().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for StrategyParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for StrategyParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for StrategyParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for StrategyParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Builds a strategy from its positional parameters.
pub type StrategyFactory = fn(&[StrategyParam]) -> Result<Strategy>;

/// Reads an optional boolean parameter at `index`.
///
/// ### Returns
/// `default` when the parameter is absent, an error when it is not a boolean.
pub fn bool_param(params: &[StrategyParam], index: usize, strategy: &'static str, default: bool) -> Result<bool> {
    match params.get(index) {
        None => Ok(default),
        Some(param) => param.as_bool().ok_or(Error::StrategyParam {
            strategy,
            index,
            expected: "a boolean",
        }),
    }
}

/// Reads an optional non-negative integer parameter at `index`.
pub fn u32_param(params: &[StrategyParam], index: usize, strategy: &'static str, default: u32) -> Result<u32> {
    match params.get(index) {
        None => Ok(default),
        Some(param) => param
            .as_int()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or(Error::StrategyParam {
                strategy,
                index,
                expected: "a non-negative integer",
            }),
    }
}

/// Reads an optional number parameter at `index`.
pub fn f64_param(params: &[StrategyParam], index: usize, strategy: &'static str, default: f64) -> Result<f64> {
    match params.get(index) {
        None => Ok(default),
        Some(param) => param.as_float().ok_or(Error::StrategyParam {
            strategy,
            index,
            expected: "a number",
        }),
    }
}

/// Lower-cased name without separators nor a trailing `strategy`.
fn normalize(name: &str) -> String {
    let name = name
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();
    match name.strip_suffix("strategy") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => name,
    }
}

/// Case-insensitive map of strategy names to factories.
///
/// `MarketMaker`, `market-maker` and `MarketMakerStrategy` all resolve to the
/// same entry.
///
/// ```rust
/// use simple_backtester::prelude::*;
///
/// let registry = StrategyRegistry::default();
/// let strategy = registry.resolve("NaiveFollower", &[StrategyParam::Bool(true)]).unwrap();
/// assert_eq!(strategy.name(), "naive-follower-against");
/// assert!(registry.resolve("unknown", &[]).is_err());
/// ```
#[derive(Clone)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("naive", |_| Ok(Strategy::taker(Naive::new())));
        registry.register("naive-follower", |params| {
            let against_trend = bool_param(params, 0, "naive-follower", false)?;
            Ok(Strategy::taker(NaiveFollower::new(against_trend)))
        });
        registry.register("stairs", |params| {
            let preserve_last_bar = bool_param(params, 0, "stairs", false)?;
            Ok(Strategy::taker(Stairs::new(preserve_last_bar)))
        });
        registry.register("mean-reversion", |params| {
            let confirmation = u32_param(params, 0, "mean-reversion", 1)?;
            Ok(Strategy::taker(MeanReversion::new(confirmation)))
        });
        registry.register("kaufman", |params| {
            let larger_position = bool_param(params, 0, "kaufman", false)?;
            Ok(Strategy::taker(Kaufman::new(larger_position)))
        });
        registry.register("trade-flow", |params| {
            let threshold = f64_param(params, 0, "trade-flow", DEFAULT_FLOW_THRESHOLD)?;
            Ok(Strategy::taker(TradeFlow::new(threshold)))
        });
        registry.register("order-book", |params| {
            let threshold = f64_param(params, 0, "order-book", DEFAULT_IMBALANCE_CHANGE)?;
            Ok(Strategy::taker(OrderBook::new(threshold)))
        });
        registry.register("market-maker", |params| {
            let skip_bars = u32_param(params, 0, "market-maker", 1)?;
            let spread = f64_param(params, 1, "market-maker", DEFAULT_SPREAD)?;
            Ok(Strategy::maker(MarketMaker::new(skip_bars, spread)))
        });
        registry
    }
}

impl StrategyRegistry {
    /// Creates a registry without any strategy.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, factory: StrategyFactory) -> &mut Self {
        self.factories.insert(normalize(name), factory);
        self
    }

    /// Registered names, normalized.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds a fresh strategy.
    ///
    /// ### Arguments
    /// * `name` - Strategy name, matched case-insensitively.
    /// * `params` - Positional parameters; missing ones take their default.
    ///
    /// ### Returns
    /// The strategy, or [`Error::MissingStrategy`] for a blank name,
    /// [`Error::UnknownStrategy`] for an unregistered one.
    pub fn resolve(&self, name: &str, params: &[StrategyParam]) -> Result<Strategy> {
        if name.trim().is_empty() {
            return Err(Error::MissingStrategy);
        }
        let factory = self
            .factories
            .get(&normalize(name))
            .ok_or_else(|| Error::UnknownStrategy(name.to_string()))?;
        factory(params)
    }
}
