//! JSON run configuration.
//!
//! ```json
//! {
//!   "strategy": "MarketMaker",
//!   "strategy_params": [10, 50.0],
//!   "base": { "base_symbol": "BTC", "quote_symbol": "USD", "amount": 0.1, "max_inventory": [1, 5] },
//!   "backtests": [
//!     { "directory_path": "data/bitmex", "file_pattern": "range_10_*.json", "timestamp_type": "unix-ms" }
//!   ]
//! }
//! ```
//!
//! Every backtest field left unset falls back to the `base` section. A file
//! named `<name>.<env>.json` next to the configuration is merged over it when
//! an environment is given.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, map::Entry};
use tracing::debug;

use crate::errors::{Error, Result};
use crate::registry::StrategyParam;
use crate::utils::TimestampType;

/// Order size used when none is configured.
pub const DEFAULT_AMOUNT: f64 = 1.0;
/// Bar file pattern used when none is configured.
pub const DEFAULT_FILE_PATTERN: &str = "*.csv";

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktesterConfig {
    /// Strategy name, resolved through the strategy registry.
    pub strategy: String,
    /// Positional strategy parameters.
    pub strategy_params: Vec<StrategyParam>,
    /// Defaults shared by every backtest.
    pub base: Option<BacktestConfig>,
    /// Backtests to run, in order.
    pub backtests: Vec<BacktestConfig>,
}

/// One backtest: a set of bar files replayed under one or more inventory caps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Traded asset symbol.
    pub base_symbol: Option<String>,
    /// Pricing currency symbol.
    pub quote_symbol: Option<String>,
    /// Base order size.
    pub amount: Option<f64>,
    /// Root directory of the bar files, searched recursively.
    pub directory_path: Option<PathBuf>,
    /// `prefix*suffix` bar file name pattern.
    pub file_pattern: Option<String>,
    /// Encoding of the bar timestamps.
    pub timestamp_type: Option<TimestampType>,
    /// Decimals of `unix-ms` timestamps.
    pub timestamp_decimals: Option<u32>,
    /// Fee rate applied to the traded notional.
    pub fee_percentage: Option<f64>,
    /// Show the fee-adjusted PnL in reports.
    pub display_fee: Option<bool>,
    /// Inventory caps, one run per cap.
    pub max_inventory: Option<Vec<u32>>,
    /// Render a chart per run.
    pub visualize: Option<bool>,
    /// Maximum number of bars on a chart.
    pub visualize_limit_bars: Option<usize>,
    /// Number of leading bars left out of a chart.
    pub visualize_skip_bars: Option<usize>,
    /// Maximum number of bar files.
    pub limit_files: Option<usize>,
    /// Number of leading bar files to skip.
    pub skip_files: Option<usize>,
}

impl BacktestConfig {
    /// Returns a copy where every unset field is taken from `base`.
    pub fn merge_with_base(&self, base: &BacktestConfig) -> BacktestConfig {
        BacktestConfig {
            base_symbol: self.base_symbol.clone().or_else(|| base.base_symbol.clone()),
            quote_symbol: self.quote_symbol.clone().or_else(|| base.quote_symbol.clone()),
            amount: self.amount.or(base.amount),
            directory_path: self.directory_path.clone().or_else(|| base.directory_path.clone()),
            file_pattern: self.file_pattern.clone().or_else(|| base.file_pattern.clone()),
            timestamp_type: self.timestamp_type.or(base.timestamp_type),
            timestamp_decimals: self.timestamp_decimals.or(base.timestamp_decimals),
            fee_percentage: self.fee_percentage.or(base.fee_percentage),
            display_fee: self.display_fee.or(base.display_fee),
            max_inventory: self.max_inventory.clone().or_else(|| base.max_inventory.clone()),
            visualize: self.visualize.or(base.visualize),
            visualize_limit_bars: self.visualize_limit_bars.or(base.visualize_limit_bars),
            visualize_skip_bars: self.visualize_skip_bars.or(base.visualize_skip_bars),
            limit_files: self.limit_files.or(base.limit_files),
            skip_files: self.skip_files.or(base.skip_files),
        }
    }

    /// Inventory caps to run, a single unbounded run when none is configured.
    pub fn inventory_limits(&self) -> Vec<Option<u32>> {
        match self.max_inventory.as_deref() {
            None | Some([]) => vec![None],
            Some(caps) => caps.iter().copied().map(Some).collect(),
        }
    }

    pub fn amount(&self) -> f64 {
        self.amount.unwrap_or(DEFAULT_AMOUNT)
    }

    pub fn fee(&self) -> f64 {
        self.fee_percentage.unwrap_or(0.0)
    }

    pub fn directory(&self) -> &Path {
        self.directory_path.as_deref().unwrap_or(Path::new("."))
    }

    pub fn file_pattern(&self) -> &str {
        self.file_pattern.as_deref().unwrap_or(DEFAULT_FILE_PATTERN)
    }

    /// Charts are rendered unless disabled.
    pub fn visualize(&self) -> bool {
        self.visualize.unwrap_or(true)
    }
}

impl BacktesterConfig {
    /// Parses a configuration from a JSON string and validates it.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration at `path`, merged with its environment override.
    ///
    /// ### Arguments
    /// * `path` - Configuration file, e.g. `appsettings.json`.
    /// * `env` - Environment name; `appsettings.<env>.json` is merged over the file when it exists.
    pub fn from_file(path: impl AsRef<Path>, env: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let mut value: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;

        if let Some(env) = env.filter(|env| !env.trim().is_empty()) {
            let override_path = env_override_path(path, env);
            if override_path.is_file() {
                debug!(path = %override_path.display(), "merging environment configuration");
                let overlay: Value = serde_json::from_str(&std::fs::read_to_string(&override_path)?)?;
                merge_json(&mut value, overlay);
            }
        }

        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that a strategy is named and at least one backtest is configured.
    pub fn validate(&self) -> Result<()> {
        if self.backtests.is_empty() {
            return Err(Error::NoBacktests);
        }
        if self.strategy.trim().is_empty() {
            return Err(Error::MissingStrategy);
        }
        Ok(())
    }

    /// Backtests with the `base` section applied.
    pub fn merged_backtests(&self) -> Vec<BacktestConfig> {
        match &self.base {
            Some(base) => self.backtests.iter().map(|b| b.merge_with_base(base)).collect(),
            None => self.backtests.clone(),
        }
    }
}

/// `dir/name.json` -> `dir/name.<env>.json`
fn env_override_path(path: &Path, env: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_file_name(format!("{stem}.{env}.{ext}")),
        None => path.with_file_name(format!("{stem}.{env}")),
    }
}

/// Deep-merges objects; any other overlay value replaces the base one.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.entry(key) {
                    Entry::Occupied(mut existing) => merge_json(existing.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "strategy": "MarketMaker",
        "strategy_params": [10, "50.5"],
        "base": {
            "base_symbol": "BTC",
            "quote_symbol": "USD",
            "amount": 0.5,
            "timestamp_type": "unix-ms",
            "max_inventory": [1, 5]
        },
        "backtests": [
            { "directory_path": "data/a", "file_pattern": "range_*.json" },
            { "directory_path": "data/b", "amount": 2.0, "max_inventory": [], "visualize": false }
        ]
    }"#;

    #[test]
    fn base_fills_unset_fields() {
        let config = BacktesterConfig::from_json(CONFIG).unwrap();
        let backtests = config.merged_backtests();

        assert_eq!(backtests[0].base_symbol.as_deref(), Some("BTC"));
        assert_eq!(backtests[0].amount(), 0.5);
        assert_eq!(backtests[0].timestamp_type, Some(TimestampType::UnixMs));
        assert_eq!(backtests[0].inventory_limits(), vec![Some(1), Some(5)]);
        assert_eq!(backtests[0].file_pattern(), "range_*.json");
        assert!(backtests[0].visualize());

        assert_eq!(backtests[1].amount(), 2.0);
        assert_eq!(backtests[1].inventory_limits(), vec![None]);
        assert_eq!(backtests[1].file_pattern(), DEFAULT_FILE_PATTERN);
        assert!(!backtests[1].visualize());

        // merging leaves the parsed backtests untouched
        assert_eq!(config.backtests[0].base_symbol, None);
    }

    #[test]
    fn validation() {
        assert!(matches!(
            BacktesterConfig::from_json(r#"{"strategy": "naive"}"#),
            Err(Error::NoBacktests)
        ));
        assert!(matches!(
            BacktesterConfig::from_json(r#"{"backtests": [{}]}"#),
            Err(Error::MissingStrategy)
        ));
    }

    #[test]
    fn override_file_name() {
        assert_eq!(
            env_override_path(Path::new("conf/appsettings.json"), "dev"),
            PathBuf::from("conf/appsettings.dev.json")
        );
    }

    #[test]
    fn environment_override() {
        let dir = std::env::temp_dir().join(format!("simple-backtester-config-{}", crate::utils::random_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("appsettings.json");
        std::fs::write(&path, CONFIG).unwrap();
        std::fs::write(
            dir.join("appsettings.dev.json"),
            r#"{"strategy": "naive", "base": {"amount": 3.0}}"#,
        )
        .unwrap();

        let config = BacktesterConfig::from_file(&path, Some("dev")).unwrap();
        assert_eq!(config.strategy, "naive");
        let base = config.base.clone().unwrap();
        assert_eq!(base.amount, Some(3.0));
        assert_eq!(base.base_symbol.as_deref(), Some("BTC"));

        let config = BacktesterConfig::from_file(&path, Some("prod")).unwrap();
        assert_eq!(config.strategy, "MarketMaker");

        std::fs::remove_dir_all(&dir).ok();
    }
}
