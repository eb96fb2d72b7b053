use approx::assert_relative_eq;
use candle_insights::cleaning::clean_klines;
use candle_insights::config::PipelineConfig;
use candle_insights::error::AnalysisError;
use candle_insights::klines::parse_klines;
use candle_insights::pipeline::{load_cleaned, run_analysis, run_ingestion};
use candle_insights::storage_utils::AsyncStorageManager;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::path::Path;

const HOUR_MS: i64 = 3_600_000;
const START_MS: i64 = 1_672_531_200_000;
const STAMP: &str = "2023-02-01_12-00-00";
const PNG_MAGIC: &[u8] = b"\x89PNG";

fn close_at(i: i64) -> f64 {
    // Deterministic wave around 16800 with a slow drift.
    16800.0 + 40.0 * ((i as f64) * 0.3).sin() + 0.5 * i as f64
}

fn kline(i: i64, close: Value) -> Value {
    let prev = close_at(i - 1);
    let c = close_at(i);
    json!([
        START_MS + i * HOUR_MS,
        format!("{:.2}", prev),
        format!("{:.2}", c.max(prev) + 2.0),
        format!("{:.2}", c.min(prev) - 2.0),
        close,
        "105.25",
        START_MS + (i + 1) * HOUR_MS - 1,
        "1768000.0",
        1200,
        "52.1",
        "876000.0",
        "0"
    ])
}

/// 250 clean rows plus a duplicate, a non-numeric close and a spike.
fn synthetic_body() -> Vec<u8> {
    let mut rows: Vec<Value> = (0..250)
        .map(|i| kline(i, json!(format!("{:.2}", close_at(i)))))
        .collect();
    let duplicate = rows[9].clone();
    rows.insert(10, duplicate);
    rows.push(kline(250, json!("--")));
    rows.push(kline(251, json!("1000000.00")));
    serde_json::to_vec(&Value::Array(rows)).unwrap()
}

fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig {
        output_root: root.to_path_buf(),
        ..PipelineConfig::default()
    };
    config.chart.enabled = false;
    config.klines.base_url = "http://127.0.0.1:9".to_string();
    config
}

#[tokio::test]
async fn test_end_to_end_on_synthetic_series() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let storage = AsyncStorageManager::new(dir.path());

    // Ingestion: parse, clean, persist.
    let rows = parse_klines(&synthetic_body()).unwrap();
    assert_eq!(rows.len(), 253);
    let cleaned = clean_klines(&config.symbol, rows, &config.cleaning);
    assert_eq!(cleaned.len(), 250);

    let csv_path = storage
        .save_csv(&config.cleaned_data_name(), &cleaned)
        .await
        .unwrap();
    assert_eq!(
        csv_path,
        dir.path()
            .join("data")
            .join("cleaned_BTCUSDT_2023-01-01_2023-01-31.csv")
    );
    let text = tokio::fs::read_to_string(&csv_path).await.unwrap();
    assert_eq!(text.lines().count(), 251);
    assert!(text.starts_with("Date,Open,High,Low,Close,Volume,"));

    // Analysis: read the CSV back, never the in-memory value.
    let series = load_cleaned(&config, &storage).await.unwrap();
    assert_eq!(series, cleaned);

    let output = run_analysis(&config, &storage, &series, STAMP).await.unwrap();

    let support = series.lows().into_iter().fold(f64::INFINITY, f64::min);
    let resistance = series.highs().into_iter().fold(f64::NEG_INFINITY, f64::max);
    let closes = series.closes();
    let last_change = closes[249] - closes[248];

    let changes: Vec<f64> = closes[229..].windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(changes.len(), 20);
    let mean = changes.iter().sum::<f64>() / 20.0;
    let volatility = (changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / 19.0).sqrt();

    let lines: Vec<&str> = output.report.lines().collect();
    assert_eq!(lines[3], format!("- Support level: {:?}", support));
    assert_eq!(lines[4], format!("- Resistance level: {:?}", resistance));
    assert_eq!(lines[8], format!("- Price Change (Today): {:.2}", last_change));

    let reported: f64 = lines[9]
        .trim_start_matches("- Volatility (20-day): ")
        .parse()
        .unwrap();
    assert_relative_eq!(reported, volatility, epsilon = 0.006);

    assert!(output.charts.is_none());
    assert_eq!(
        output.pdf,
        dir.path()
            .join("insights")
            .join(format!("insight_BTCUSDT_{}.pdf", STAMP))
    );
    let pdf = tokio::fs::read(&output.pdf).await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_charts_are_written_and_replaced_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.chart.enabled = true;
    let storage = AsyncStorageManager::new(dir.path());

    let rows = parse_klines(&synthetic_body()).unwrap();
    let series = clean_klines(&config.symbol, rows, &config.cleaning);
    let img_dir = dir.path().join("insights").join("imgs");
    assert!(!img_dir.exists());

    let output = run_analysis(&config, &storage, &series, STAMP).await.unwrap();

    let charts = output.charts.expect("charts enabled");
    let expected = [
        (charts.price_trends, "price_trends.png"),
        (charts.price_change, "price_change_distribution.png"),
        (charts.volatility, "price_volatility.png"),
    ];
    for (path, name) in &expected {
        assert_eq!(*path, img_dir.join(name));
        let bytes = tokio::fs::read(path).await.unwrap();
        assert!(bytes.starts_with(PNG_MAGIC), "{} is not a png", name);
        tokio::fs::write(path, b"stale").await.unwrap();
    }

    run_analysis(&config, &storage, &series, STAMP).await.unwrap();

    for (path, name) in &expected {
        let bytes = tokio::fs::read(path).await.unwrap();
        assert!(bytes.starts_with(PNG_MAGIC), "{} was not replaced", name);
    }
}

#[tokio::test]
async fn test_same_start_and_end_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    let day = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
    config.start_date = day;
    config.end_date = day;
    let storage = AsyncStorageManager::new(dir.path());

    let saved = run_ingestion(&reqwest::Client::new(), &config, &storage)
        .await
        .unwrap();

    assert!(saved.is_none());
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn test_unreachable_api_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let storage = AsyncStorageManager::new(dir.path());

    let saved = run_ingestion(&reqwest::Client::new(), &config, &storage)
        .await
        .unwrap();

    assert!(saved.is_none());
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn test_short_series_aborts_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let storage = AsyncStorageManager::new(dir.path());

    let body: Vec<Value> = (0..150)
        .map(|i| kline(i, json!(format!("{:.2}", close_at(i)))))
        .collect();
    let rows = parse_klines(&serde_json::to_vec(&body).unwrap()).unwrap();
    let series = clean_klines(&config.symbol, rows, &config.cleaning);

    let err = run_analysis(&config, &storage, &series, STAMP).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AnalysisError>(),
        Some(AnalysisError::InsufficientData { actual: 150, .. })
    ));
    assert!(!dir.path().join("insights").exists());
}
