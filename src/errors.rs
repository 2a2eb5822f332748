pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The bar data provided is empty. Reporting needs at least one processed bar.
    #[error("Bar data is empty: at least one bar is required")]
    BarDataEmpty,

    /// A bar timestamp is not a finite number of seconds.
    #[error("Invalid bar timestamp (got: {0})")]
    InvalidTimestamp(f64),

    /// A bar arrived with a timestamp earlier than the previous one: previous, then new.
    #[error("Bars must be ordered by timestamp: got {1} after {0}")]
    UnorderedBars(f64, f64),

    /// The base order size is not positive.
    #[error("Order size must be positive (got: {0})")]
    NegZeroOrderSize(f64),

    /// The fee rate is negative or not finite.
    #[error("Fee must be zero or positive (got: {0})")]
    NegativeFee(f64),

    /// A resting order price is not positive.
    #[error("Order price must be positive (got: {0})")]
    NegZeroOrderPrice(f64),

    /// A resting order amount is not positive.
    #[error("Order amount must be positive (got: {0})")]
    NegZeroOrderAmount(f64),

    /// No strategy is registered under the requested name.
    #[error("There is no strategy with name '{0}'")]
    UnknownStrategy(String),

    /// The configuration does not name a strategy.
    #[error("Strategy name is missing from the configuration")]
    MissingStrategy,

    /// A strategy parameter is missing or has the wrong type.
    #[error("Invalid parameter #{index} for strategy '{strategy}': expected {expected}")]
    StrategyParam {
        /// Strategy name.
        strategy: &'static str,
        /// Position of the parameter.
        index: usize,
        /// Expected type.
        expected: &'static str,
    },

    /// The configuration does not contain any backtest.
    #[error("Please configure at least one backtest")]
    NoBacktests,

    /// The strategy failed; the run is aborted.
    #[error("Strategy failed: {0}")]
    Strategy(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV reading error occurred.
    #[cfg(feature = "serde")]
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Chart rendering failed.
    #[cfg(feature = "draws")]
    #[error("Plotters error: {0}")]
    Plotters(String),

    /// Generic error message.
    #[error("{0}")]
    Msg(String),
}
