//! Module for visualizing a finished run.
//!
//! The chart shows the current price of every bar with the trades on top
//! (buys in green, sells in red) and, optionally, a panel with the PnL of
//! each day.

use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use plotters::backend::{BitMapBackend, DrawingBackend, SVGBackend};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::WHITE;

use crate::engine::{Bar, PositionSimulator, Trade};
use crate::errors::{Error, Result};
use crate::metrics::{Period, ProfitInfo};

/// Aspect ratio for the generated charts.
const ASPECT_RATIO: f64 = 0.5625;
/// Size of the X-axis labels.
const X_LABEL_SIZE: i32 = 20;
/// Size of the Y-axis labels.
const Y_LABEL_SIZE: i32 = 20;

/// Output formats for the generated charts with output filename.
#[derive(Debug, Clone)]
pub enum DrawOutput {
    /// Save to the output SVG file.
    Svg(PathBuf),
    /// Save to the output PNG file.
    Png(PathBuf),
}

impl Default for DrawOutput {
    fn default() -> Self {
        Self::Svg(PathBuf::from("chart.svg"))
    }
}

/// Configuration options for chart generation.
#[derive(Debug, Clone, Default)]
pub struct DrawOptions {
    title: Option<String>,
    output: DrawOutput,
    skip_bars: Option<usize>,
    limit_bars: Option<usize>,
    show_pnl: bool,
}

impl DrawOptions {
    /// Sets the chart title.
    pub fn title(mut self, title: impl ToString) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Sets the output format and path.
    pub fn draw_output(mut self, output: DrawOutput) -> Self {
        self.output = output;
        self
    }

    /// Leaves the first `skip` bars out of the chart.
    pub fn skip_bars(mut self, skip: Option<usize>) -> Self {
        self.skip_bars = skip;
        self
    }

    /// Draws at most `limit` bars.
    pub fn limit_bars(mut self, limit: Option<usize>) -> Self {
        self.limit_bars = limit;
        self
    }

    /// Enables or disables the daily PnL panel.
    pub fn show_pnl(mut self, show: bool) -> Self {
        self.show_pnl = show;
        self
    }
}

/// Chart drawing utility for simulation runs.
#[derive(Debug)]
pub struct Draw<'d> {
    simulator: &'d PositionSimulator,
    options: DrawOptions,
}

impl<'d> Draw<'d> {
    /// Creates a new `Draw` instance over a finished run.
    pub fn with_simulator(simulator: &'d PositionSimulator) -> Self {
        Self {
            simulator,
            options: DrawOptions::default(),
        }
    }

    /// Sets the drawing options.
    pub fn with_options(mut self, options: DrawOptions) -> Self {
        self.options = options;
        self
    }

    /// Bars selected by the skip/limit options.
    fn visible_bars(&self) -> &'d [Bar] {
        let bars = self.simulator.bars();
        let start = self.options.skip_bars.unwrap_or(0).min(bars.len());
        let end = match self.options.limit_bars {
            Some(limit) => start.saturating_add(limit).min(bars.len()),
            None => bars.len(),
        };
        &bars[start..end]
    }

    /// Generates and saves the chart based on the configured options.
    pub fn plot(&self) -> Result<()> {
        let bars = self.visible_bars();
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::BarDataEmpty),
        };
        let trades = self
            .simulator
            .trades()
            .iter()
            .filter(|t| t.bar_index() >= first.index() && t.bar_index() <= last.index())
            .collect::<Vec<_>>();
        let days = if self.options.show_pnl {
            self.simulator.report_days()
        } else {
            Vec::new()
        };

        let title = self.options.title.as_deref().unwrap_or(self.simulator.strategy_name());
        let height_factor = if self.options.show_pnl { 1.4 } else { 1.0 };
        let width = 1280.max(2 * bars.len() as u32).min(8000);
        let height = ((width as f64 * ASPECT_RATIO * height_factor) as u32).min(1200);

        match &self.options.output {
            DrawOutput::Svg(path) => {
                let root = SVGBackend::new(path, (width, height)).into_drawing_area();
                root.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;
                self.draw_chart(&root, bars, &trades, &days, title)
            }
            DrawOutput::Png(path) => {
                let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
                root.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;
                self.draw_chart(&root, bars, &trades, &days, title)
            }
        }
    }

    /// Draws the price chart and the PnL panel.
    fn draw_chart<DB: DrawingBackend>(
        &self,
        drawing_area: &DrawingArea<DB, Shift>,
        bars: &[Bar],
        trades: &[&Trade],
        days: &[ProfitInfo],
        title: &str,
    ) -> Result<()> {
        if self.options.show_pnl {
            let total_height = drawing_area.dim_in_pixel().1 as f64;
            let (price_area, pnl_area) = drawing_area.split_vertically((total_height * 0.7) as u32);
            draw_price_chart(&price_area, bars, trades, title)?;
            draw_pnl_chart(&pnl_area, days)?;
        } else {
            draw_price_chart(drawing_area, bars, trades, title)?;
        }

        drawing_area.present().map_err(|e| Error::Plotters(e.to_string()))
    }
}

/// Time range of a series, widened by a second when it is a single instant.
fn time_range(first: DateTime<Utc>, last: DateTime<Utc>) -> std::ops::Range<DateTime<Utc>> {
    if last > first {
        first..last
    } else {
        first..first + Duration::seconds(1)
    }
}

/// Value range padded by 10%, or by 1 when flat.
fn padded_range(min: f64, max: f64) -> std::ops::Range<f64> {
    let padding = if max > min { (max - min) * 0.1 } else { 1.0 };
    min - padding..max + padding
}

fn draw_price_chart<DB: DrawingBackend>(
    drawing_area: &DrawingArea<DB, Shift>,
    bars: &[Bar],
    trades: &[&Trade],
    title: &str,
) -> Result<()> {
    let first_time = bars.first().ok_or(Error::BarDataEmpty)?.datetime();
    let last_time = bars.last().ok_or(Error::BarDataEmpty)?.datetime();
    let prices = bars
        .iter()
        .map(Bar::current_price)
        .chain(trades.iter().map(|t| t.price()))
        .filter(|price| *price > 0.0);
    let (min_price, max_price) = prices.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
        (min.min(p), max.max(p))
    });
    if !min_price.is_finite() {
        return Err(Error::Msg("no positive price to draw".to_string()));
    }

    let drawing_area = drawing_area.margin(10, 10, 70, 70);
    let mut chart = ChartBuilder::on(&drawing_area)
        .caption(title, ("sans-serif", 30).into_font())
        .x_label_area_size(X_LABEL_SIZE)
        .y_label_area_size(Y_LABEL_SIZE * 3)
        .build_cartesian_2d(time_range(first_time, last_time), padded_range(min_price, max_price))
        .map_err(|e| Error::Plotters(e.to_string()))?;

    chart
        .configure_mesh()
        .y_desc("Price")
        .x_desc("Time")
        .x_label_style(("sans-serif", X_LABEL_SIZE))
        .y_label_style(("sans-serif", Y_LABEL_SIZE))
        .x_labels(8)
        .y_labels(5)
        .draw()
        .map_err(|e| Error::Plotters(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(
            bars.iter()
                .filter(|b| b.current_price() > 0.0)
                .map(|b| (b.datetime(), b.current_price())),
            BLACK.mix(0.6),
        ))
        .map_err(|e| Error::Plotters(e.to_string()))?;

    let buys = trades
        .iter()
        .filter(|t| t.is_buy())
        .map(|t| Circle::new((t.datetime(), t.price()), 3, GREEN.filled()));
    let sells = trades
        .iter()
        .filter(|t| t.is_sell())
        .map(|t| Circle::new((t.datetime(), t.price()), 3, RED.filled()));

    chart.draw_series(buys).map_err(|e| Error::Plotters(e.to_string()))?;
    chart.draw_series(sells).map_err(|e| Error::Plotters(e.to_string()))?;

    Ok(())
}

fn day_start(period: Period) -> Option<DateTime<Utc>> {
    match period {
        Period::Day { year, month, day } => NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|datetime| datetime.and_utc()),
        _ => None,
    }
}

/// Draws one bar per day, green for a gain and red for a loss.
fn draw_pnl_chart<DB: DrawingBackend>(drawing_area: &DrawingArea<DB, Shift>, days: &[ProfitInfo]) -> Result<()> {
    let points = days
        .iter()
        .filter_map(|d| day_start(d.period()).map(|start| (start, d.pnl())))
        .collect::<Vec<_>>();
    let (Some((first_day, _)), Some((last_day, _))) = (points.first(), points.last()) else {
        return Ok(());
    };

    let min_pnl = points.iter().map(|(_, pnl)| *pnl).fold(0.0, f64::min);
    let max_pnl = points.iter().map(|(_, pnl)| *pnl).fold(0.0, f64::max);

    let drawing_area = drawing_area.margin(0, 10, 70, 70);
    let mut chart = ChartBuilder::on(&drawing_area)
        .x_label_area_size(X_LABEL_SIZE)
        .y_label_area_size(Y_LABEL_SIZE * 3)
        .build_cartesian_2d(*first_day..*last_day + Duration::days(1), padded_range(min_pnl, max_pnl))
        .map_err(|e| Error::Plotters(e.to_string()))?;

    chart
        .configure_mesh()
        .y_desc("Daily PnL")
        .x_label_style(("sans-serif", X_LABEL_SIZE))
        .y_label_style(("sans-serif", Y_LABEL_SIZE))
        .x_labels(8)
        .y_labels(3)
        .draw()
        .map_err(|e| Error::Plotters(e.to_string()))?;

    chart
        .draw_series(points.iter().map(|(start, pnl)| {
            let color = if *pnl >= 0.0 { GREEN.mix(0.5) } else { RED.mix(0.5) };
            Rectangle::new([(*start, 0.0), (*start + Duration::days(1), *pnl)], color.filled())
        }))
        .map(|_| ())
        .map_err(|e| Error::Plotters(e.to_string()))
}
