use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use simple_backtester::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Replays bar files through a strategy and reports PnL per run, month and day.
#[derive(Parser, Debug)]
#[command(name = "simple-backtester")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short = 'c', default_value = "appsettings.json")]
    config: PathBuf,

    /// Environment name, merges `<config>.<env>.json` over the configuration
    #[arg(long, short = 'e')]
    env: Option<String>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!("simple-backtester v{}", env!("CARGO_PKG_VERSION"));
    if let Some(env) = &cli.env {
        info!(env, "environment");
    }

    let config = BacktesterConfig::from_file(&cli.config, cli.env.as_deref())?;
    let registry = StrategyRegistry::default();
    let factory = || registry.resolve(&config.strategy, &config.strategy_params);

    let strategy = factory()?;
    let params = config
        .strategy_params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    println!("[STRATEGY] '{}'  params: [{params}]", strategy.name());

    for backtest in config.merged_backtests() {
        run_backtest(&backtest, &factory)?;
    }
    Ok(())
}

fn load_bars(backtest: &BacktestConfig, files: &[PathBuf]) -> Result<Vec<Vec<Bar>>> {
    let kind = backtest.timestamp_type.unwrap_or_default();
    files
        .iter()
        .map(|file| get_bars_from_file(file, kind, backtest.timestamp_decimals))
        .collect()
}

fn cap_label(cap: Option<u32>) -> String {
    cap.map_or_else(|| "unbounded".to_string(), |cap| cap.to_string())
}

/// `<dir>/../reports`
fn reports_dir(dir: &Path) -> PathBuf {
    dir.parent().unwrap_or(Path::new(".")).join("reports")
}

/// Pattern prefix, or the directory name when the pattern has none.
fn report_label(backtest: &BacktestConfig) -> String {
    match pattern_label(backtest.file_pattern()) {
        "" => backtest
            .directory()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("bars")
            .to_string(),
        label => label.to_string(),
    }
}

fn run_backtest<F>(backtest: &BacktestConfig, factory: &F) -> Result<()>
where
    F: Fn() -> Result<Strategy>,
{
    let dir = backtest.directory();
    let pattern = backtest.file_pattern();
    let files = list_bar_files(dir, pattern, backtest.skip_files, backtest.limit_files)?;
    if files.is_empty() {
        warn!(dir = %dir.display(), pattern, "no bar files found");
        return Ok(());
    }

    println!();
    println!("{}", "=".repeat(69));
    println!(
        "    Running for {} files from dir '{}' and pattern: '{pattern}'",
        files.len(),
        dir.display()
    );

    let bars = load_bars(backtest, &files)?;
    let mut top = String::new();
    let mut body = String::new();
    let mut strategy_name = String::new();

    for cap in backtest.inventory_limits() {
        let mut simulator = PositionSimulator::new(factory()?, backtest.amount(), backtest.fee(), cap)?
            .with_symbols(
                backtest.base_symbol.clone().unwrap_or_default(),
                backtest.quote_symbol.clone().unwrap_or_default(),
            )
            .display_fee(backtest.display_fee.unwrap_or(false));
        strategy_name = simulator.strategy_name().to_string();

        for file_bars in &bars {
            simulator.process_bars(file_bars.iter().cloned())?;
        }
        simulator.finish();

        let report = simulator.report();
        info!(cap = %cap_label(cap), pnl = report.pnl(), trades = report.trades_count(), "run finished");
        println!("    {report}");

        top.push_str(&format!("{report}\n"));
        body.push_str(&run_section(&simulator, cap, &report));

        #[cfg(feature = "draws")]
        if backtest.visualize() {
            visualize(backtest, &simulator, cap, &report)?;
        }
    }

    let target_dir = reports_dir(dir);
    std::fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(format!("{}__{strategy_name}.txt", report_label(backtest)));
    std::fs::write(&target, format!("{top}\n{body}"))?;
    info!(path = %target.display(), "report saved");

    println!();
    Ok(())
}

/// Run, month and day reports of one inventory cap, as written in the report file.
fn run_section(simulator: &PositionSimulator, cap: Option<u32>, report: &ProfitInfo) -> String {
    let mut section = format!("==== MAX INV: {} {}\n\n{report}\n", cap_label(cap), "=".repeat(133));
    for month_report in simulator.report_by_month() {
        section.push_str(&format!("    {}\n", month_report.line()));
        if let Period::Month { year, month } = month_report.period() {
            for day in simulator.report_per_day(year, month) {
                section.push_str(&format!("        {}\n", day.line()));
            }
        }
    }
    section.push_str("\n\n");
    section
}

#[cfg(feature = "draws")]
fn visualize(backtest: &BacktestConfig, simulator: &PositionSimulator, cap: Option<u32>, report: &ProfitInfo) -> Result<()> {
    let quote = backtest.quote_symbol.as_deref().unwrap_or_default();
    let title = format!(
        "{:.2} {quote} (with fee: {:.2} {quote}, max inv: {})",
        report.pnl(),
        report.pnl_with_fee(),
        cap_label(cap)
    );

    let target_dir = reports_dir(backtest.directory());
    std::fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(format!(
        "{}__{}__{}__{:.0}.svg",
        report_label(backtest),
        simulator.strategy_name(),
        cap_label(cap),
        report.pnl()
    ));

    Draw::with_simulator(simulator)
        .with_options(
            DrawOptions::default()
                .title(title)
                .skip_bars(backtest.visualize_skip_bars)
                .limit_bars(backtest.visualize_limit_bars)
                .show_pnl(true)
                .draw_output(DrawOutput::Svg(target.clone())),
        )
        .plot()?;
    info!(path = %target.display(), "chart saved");
    Ok(())
}
