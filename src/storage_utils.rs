use crate::candle::{Candle, CandleSeries};
use crate::error::AnalysisError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Root every output path is resolved against (e.g., "." or "/var/reports")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Resolves `sub_dir` under the root and creates it if it does not exist.
    pub async fn ensure_dir<P: AsRef<Path>>(&self, sub_dir: P) -> anyhow::Result<PathBuf> {
        let dir = self.base_dir.join(sub_dir);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            debug!(dir = %dir.display(), "created output directory");
        }
        Ok(dir)
    }

    /// Writes to a `.tmp` sibling first, then renames it over `final_path`,
    /// so readers never see a half-written file.
    pub async fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        let mut tmp_name = final_path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, bytes).await?;
        fs::rename(&tmp_path, final_path).await?;
        Ok(())
    }

    /// Path of the cleaned CSV called `name` (without extension).
    pub fn csv_path(&self, name: &str) -> PathBuf {
        self.base_dir.join("data").join(format!("{}.csv", name))
    }

    /// Saves `series` as `data/{name}.csv` and returns the written path.
    pub async fn save_csv(&self, name: &str, series: &CandleSeries) -> anyhow::Result<PathBuf> {
        self.ensure_dir("data").await?;
        let final_path = self.csv_path(name);

        let mut writer = csv::Writer::from_writer(Vec::new());
        for candle in &series.candles {
            writer.serialize(candle)?;
        }
        // An empty series still gets its header row.
        if series.is_empty() {
            writer.write_record(csv_header())?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;

        self.write_atomic(&final_path, &bytes).await?;
        Ok(final_path)
    }

    /// Loads `data/{name}.csv`. Missing columns or unparsable values are
    /// structural errors for the analysis stage.
    pub async fn load_csv(&self, name: &str, symbol: &str) -> Result<CandleSeries, AnalysisError> {
        let content = fs::read(self.csv_path(name)).await?;
        parse_csv(&content, symbol)
    }
}

pub fn parse_csv(content: &[u8], symbol: &str) -> Result<CandleSeries, AnalysisError> {
    let mut reader = csv::Reader::from_reader(content);
    let candles = reader
        .deserialize::<Candle>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CandleSeries::new(symbol, candles))
}

fn csv_header() -> [&'static str; 11] {
    [
        "Date",
        "Open",
        "High",
        "Low",
        "Close",
        "Volume",
        "close_time",
        "quote_asset_volume",
        "Trades",
        "taker_buy_base_asset_volume",
        "taker_buy_quote_asset_volume",
    ]
}
