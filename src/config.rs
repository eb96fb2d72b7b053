use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// CONFIGURATION STRUCTS
// Every field has a default matching the stock BTCUSDT January run, so a
// config file only needs the keys it wants to change.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KlineConfig {
    pub base_url: String,
    pub interval: String, // e.g., "1h"
    pub limit: u32,       // capped at 1000 by the API
}

impl Default for KlineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            interval: "1h".to_string(),
            limit: 1000,
        }
    }
}

/// How cleaning treats fields the API left empty.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Replace the missing value with `0.0`.
    #[default]
    ZeroFill,
    /// Drop the whole row.
    Drop,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    pub missing_values: MissingValuePolicy,
    pub outlier_sigma: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            missing_values: MissingValuePolicy::ZeroFill,
            outlier_sigma: 3.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub long_window: usize,
    pub short_window: usize,
    pub volatility_window: usize,
    pub volatility_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            long_window: 200,
            short_window: 20,
            volatility_window: 20,
            volatility_threshold: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChartStyle {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub histogram_bins: usize,
    pub price_color: [u8; 3],
    pub long_ma_color: [u8; 3],
    pub short_ma_color: [u8; 3],
    pub volatility_color: [u8; 3],
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1000,
            height: 600,
            histogram_bins: 30,
            price_color: [31, 119, 180],
            long_ma_color: [255, 127, 14],
            short_ma_color: [44, 160, 44],
            volatility_color: [214, 39, 40],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub output_root: PathBuf,
    pub klines: KlineConfig,
    pub cleaning: CleaningConfig,
    pub analysis: AnalysisConfig,
    pub chart: ChartStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 31).unwrap_or_default(),
            output_root: PathBuf::from("."),
            klines: KlineConfig::default(),
            cleaning: CleaningConfig::default(),
            analysis: AnalysisConfig::default(),
            chart: ChartStyle::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file. Keys that are left out keep their defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let config = serde_json::from_slice(&content)?;
        Ok(config)
    }

    /// File stem of the cleaned CSV, e.g. `cleaned_BTCUSDT_2023-01-01_2023-01-31`.
    pub fn cleaned_data_name(&self) -> String {
        format!(
            "cleaned_{}_{}_{}",
            self.symbol,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}
