//! PNG charts for the insight report.

use crate::candle::CandleSeries;
use crate::config::{AnalysisConfig, ChartStyle};
use crate::indicators::Indicators;
use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PRICE_TRENDS_FILE: &str = "price_trends.png";
pub const PRICE_CHANGE_FILE: &str = "price_change_distribution.png";
pub const VOLATILITY_FILE: &str = "price_volatility.png";

/// One histogram bucket over `[start, end)`; the last bucket is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Paths of the three rendered charts.
#[derive(Debug, Clone)]
pub struct ChartPaths {
    pub price_trends: PathBuf,
    pub price_change: PathBuf,
    pub volatility: PathBuf,
}

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

fn x_of(ts: &DateTime<chrono::Utc>) -> f64 {
    ts.timestamp() as f64
}

fn date_label(x: &f64) -> String {
    DateTime::from_timestamp(*x as i64, 0)
        .map(|d| d.format("%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Min and max of `values`, widened when they coincide so the axis has
/// a non-empty span.
fn bounds(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return None;
    }
    if lo == hi {
        return Some((lo - 1.0, hi + 1.0));
    }
    let pad = (hi - lo) * 0.05;
    Some((lo - pad, hi + pad))
}

fn ma_label(window: usize) -> String {
    format!("{}-day MA", window)
}

fn volatility_caption(window: usize) -> String {
    format!("Price Volatility ({}-day)", window)
}

fn time_bounds(series: &CandleSeries) -> Result<(f64, f64)> {
    let start = series.first_timestamp().ok_or_else(|| anyhow!("no candles to plot"))?;
    let end = series.last_timestamp().ok_or_else(|| anyhow!("no candles to plot"))?;
    let (start, end) = (x_of(&start), x_of(&end));
    Ok(if start < end { (start, end) } else { (start, start + 3600.0) })
}

/// Splits `values` into `bins` equal-width buckets.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let Some((lo, hi)) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    else {
        return Vec::new();
    };
    let bins = bins.max(1);
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for v in values.iter().filter(|v| v.is_finite()) {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// Gaussian kernel density estimate with Scott's bandwidth, sampled at
/// `points` evenly spaced positions over the data range.
pub fn gaussian_kde(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let data: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = data.len();
    if n < 2 || points < 2 {
        return Vec::new();
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    let std = (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt();
    if std == 0.0 {
        return Vec::new();
    }
    let bandwidth = std * (n as f64).powf(-0.2);
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    let lo = data.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let step = (hi - lo) / (points - 1) as f64;

    (0..points)
        .map(|i| {
            let x = lo + i as f64 * step;
            let density = data
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

fn render_price_trends(
    path: &Path,
    series: &CandleSeries,
    ind: &Indicators,
    windows: &AnalysisConfig,
    style: &ChartStyle,
) -> Result<()> {
    let xs: Vec<f64> = series.candles.iter().map(|c| x_of(&c.timestamp)).collect();
    let closes = series.closes();
    let (x_lo, x_hi) = time_bounds(series)?;
    let (y_lo, y_hi) = bounds(
        closes
            .iter()
            .copied()
            .chain(ind.long_ma.iter().flatten().copied())
            .chain(ind.short_ma.iter().flatten().copied()),
    )
    .ok_or_else(|| anyhow!("no prices to plot"))?;

    let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Price Trends", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Price")
        .x_label_formatter(&date_label)
        .draw()?;

    let lines = [
        ("Price".to_string(), style.price_color, closes.iter().copied().map(Some).collect::<Vec<_>>()),
        (ma_label(windows.long_window), style.long_ma_color, ind.long_ma.clone()),
        (ma_label(windows.short_window), style.short_ma_color, ind.short_ma.clone()),
    ];
    for (label, color, values) in lines {
        let color = rgb(color);
        let points = xs
            .iter()
            .zip(values)
            .filter_map(|(&x, y)| y.map(|y| (x, y)));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn render_price_change(path: &Path, ind: &Indicators, style: &ChartStyle) -> Result<()> {
    let changes: Vec<f64> = ind.price_change.iter().flatten().copied().collect();
    let bins = histogram(&changes, style.histogram_bins);
    let first = bins.first().ok_or_else(|| anyhow!("no price changes to plot"))?;
    let last = bins.last().ok_or_else(|| anyhow!("no price changes to plot"))?;
    let (x_lo, x_hi) = (first.start, last.end);
    let bin_width = first.end - first.start;

    // Density scaled to counts so it overlays the bars.
    let kde: Vec<(f64, f64)> = gaussian_kde(&changes, 200)
        .into_iter()
        .map(|(x, d)| (x, d * changes.len() as f64 * bin_width))
        .collect();
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
    let y_hi = kde.iter().map(|(_, y)| *y).fold(max_count, f64::max).max(1.0) * 1.1;

    let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Price Change Distribution", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)?;
    chart
        .configure_mesh()
        .x_desc("Price Change")
        .y_desc("Frequency")
        .draw()?;

    let color = rgb(style.price_color);
    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], color.mix(0.5).filled())
    }))?;
    chart.draw_series(LineSeries::new(kde, color.stroke_width(2)))?;

    root.present()?;
    Ok(())
}

fn render_volatility(
    path: &Path,
    series: &CandleSeries,
    ind: &Indicators,
    windows: &AnalysisConfig,
    style: &ChartStyle,
) -> Result<()> {
    let (x_lo, x_hi) = time_bounds(series)?;
    let points: Vec<(f64, f64)> = series
        .candles
        .iter()
        .zip(&ind.volatility)
        .filter_map(|(c, v)| v.map(|v| (x_of(&c.timestamp), v)))
        .collect();
    let (y_lo, y_hi) = bounds(points.iter().map(|(_, y)| *y)).ok_or_else(|| anyhow!("no volatility to plot"))?;

    let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(volatility_caption(windows.volatility_window), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Volatility")
        .x_label_formatter(&date_label)
        .draw()?;

    let color = rgb(style.volatility_color);
    chart
        .draw_series(LineSeries::new(points, color.stroke_width(2)))?
        .label("Volatility")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

    root.present()?;
    Ok(())
}

/// Renders the three charts into `img_dir`, overwriting earlier files.
pub fn render_all(
    img_dir: &Path,
    series: &CandleSeries,
    ind: &Indicators,
    windows: &AnalysisConfig,
    style: &ChartStyle,
) -> Result<ChartPaths> {
    let paths = ChartPaths {
        price_trends: img_dir.join(PRICE_TRENDS_FILE),
        price_change: img_dir.join(PRICE_CHANGE_FILE),
        volatility: img_dir.join(VOLATILITY_FILE),
    };

    render_price_trends(&paths.price_trends, series, ind, windows, style)
        .with_context(|| format!("rendering {}", paths.price_trends.display()))?;
    render_price_change(&paths.price_change, ind, style)
        .with_context(|| format!("rendering {}", paths.price_change.display()))?;
    render_volatility(&paths.volatility, series, ind, windows, style)
        .with_context(|| format!("rendering {}", paths.volatility.display()))?;

    info!(dir = %img_dir.display(), "charts rendered");
    Ok(paths)
}
