//! This module contains the fetch → clean → analyze → report pipeline.

use crate::candle::CandleSeries;
use crate::charts::{self, ChartPaths};
use crate::cleaning::clean_klines;
use crate::config::PipelineConfig;
use crate::error::AnalysisError;
use crate::insights::{InsightReport, generate_insights};
use crate::klines;
use crate::report;
use crate::storage_utils::AsyncStorageManager;
use anyhow::Result;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything one analysis run wrote.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub report: InsightReport,
    pub charts: Option<ChartPaths>,
    pub pdf: PathBuf,
}

/// Fetches, cleans and saves the configured range. Returns the CSV path, or
/// `None` when there was nothing to save (fetch failure or no rows).
pub async fn run_ingestion(
    client: &Client,
    config: &PipelineConfig,
    storage: &AsyncStorageManager,
) -> Result<Option<PathBuf>> {
    let Some(rows) = klines::fetch_klines(
        client,
        &config.klines,
        &config.symbol,
        config.start_date,
        config.end_date,
    )
    .await
    else {
        warn!("no data fetched, stopping");
        return Ok(None);
    };

    if rows.is_empty() {
        info!(symbol = %config.symbol, "no candles in range, nothing to do");
        return Ok(None);
    }

    let series = clean_klines(&config.symbol, rows, &config.cleaning);
    if series.is_empty() {
        warn!(symbol = %config.symbol, "every row was dropped during cleaning");
        return Ok(None);
    }

    let path = storage
        .save_csv(&config.cleaned_data_name(), &series)
        .await?;
    info!(path = %path.display(), rows = series.len(), "cleaned data saved");
    Ok(Some(path))
}

/// Loads the cleaned CSV written by `run_ingestion` for the same config.
pub async fn load_cleaned(
    config: &PipelineConfig,
    storage: &AsyncStorageManager,
) -> Result<CandleSeries, AnalysisError> {
    storage
        .load_csv(&config.cleaned_data_name(), &config.symbol)
        .await
}

/// Computes insights for `series`, renders the charts and writes the PDF.
/// Any structural problem with the series aborts before anything is written.
pub async fn run_analysis(
    config: &PipelineConfig,
    storage: &AsyncStorageManager,
    series: &CandleSeries,
    stamp: &str,
) -> Result<AnalysisOutput> {
    let (report, indicators) = generate_insights(series, &config.analysis)?;

    let charts = if config.chart.enabled {
        let img_dir = storage.ensure_dir(Path::new("insights").join("imgs")).await?;
        Some(charts::render_all(
            &img_dir,
            series,
            &indicators,
            &config.analysis,
            &config.chart,
        )?)
    } else {
        None
    };

    let pdf = report::save_insights_as_pdf(storage, &report, &series.symbol, stamp).await?;

    Ok(AnalysisOutput { report, charts, pdf })
}
