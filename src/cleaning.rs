//! Turns raw klines into a clean `CandleSeries`.
//!
//! Steps run in a fixed order: timestamp parse, missing-value handling,
//! duplicate removal, close coercion, outlier trimming, then mapping to the
//! public schema.

use crate::candle::{Candle, CandleSeries, RawKline, RawNumber, read_number};
use crate::config::{CleaningConfig, MissingValuePolicy};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// Fields that are filled (or cause a drop) when missing. `ignore` is left out
/// because it never reaches the output.
const NUMERIC_FIELDS: &[&str] = &[
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_asset_volume",
    "number_of_trades",
    "taker_buy_base_asset_volume",
    "taker_buy_quote_asset_volume",
];

/// Mean and sample standard deviation.
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Keeps candles whose close lies strictly inside `mean ± sigma·std` of the
/// given set. Sets with fewer than two rows or no spread pass unchanged.
pub fn remove_outliers(candles: Vec<Candle>, sigma: f64) -> Vec<Candle> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let Some((mean, std)) = mean_and_std(&closes) else {
        return candles;
    };
    if !std.is_finite() || std == 0.0 {
        return candles;
    }

    let upper = mean + sigma * std;
    let lower = mean - sigma * std;
    candles
        .into_iter()
        .filter(|c| c.close < upper && c.close > lower)
        .collect()
}

/// Drops later copies of fully identical candles, preserving order.
pub fn drop_duplicates(candles: Vec<Candle>) -> Vec<Candle> {
    let mut seen = HashSet::with_capacity(candles.len());
    candles
        .into_iter()
        .filter(|c| seen.insert(c.identity_key()))
        .collect()
}

/// Re-applies duplicate removal, close validation and outlier trimming to an
/// already typed series. The outlier band is recomputed from the rows that
/// survived, so a heavy-tailed series can lose more rows on a second pass.
pub fn clean_series(series: CandleSeries, config: &CleaningConfig) -> CandleSeries {
    let candles = drop_duplicates(series.candles);
    let candles: Vec<Candle> = candles.into_iter().filter(|c| c.close.is_finite()).collect();
    let candles = remove_outliers(candles, config.outlier_sigma);
    CandleSeries::new(series.symbol, candles)
}

fn log_dropped(step: &str, before: usize, after: usize) {
    if before != after {
        debug!(step, dropped = before - after, remaining = after, "cleaning step dropped rows");
    }
}

/// Replaces absent or null fields with zero, or drops the row under
/// `MissingValuePolicy::Drop`.
fn handle_missing(rows: Vec<RawKline>, policy: MissingValuePolicy) -> Vec<RawKline> {
    rows.into_iter()
        .filter_map(|mut row| {
            for &key in NUMERIC_FIELDS {
                let missing = matches!(row.get(key), None | Some(Value::Null));
                if missing {
                    match policy {
                        MissingValuePolicy::ZeroFill => {
                            row.insert(key.to_string(), Value::from(0));
                        }
                        MissingValuePolicy::Drop => return None,
                    }
                }
            }
            Some(row)
        })
        .collect()
}

fn parse_timestamp(row: &RawKline) -> Option<DateTime<Utc>> {
    match read_number(row, "timestamp") {
        RawNumber::Value(ms) => DateTime::from_timestamp_millis(ms as i64),
        _ => None,
    }
}

/// Reads a non-close field. Text that is not a number counts as missing.
fn field(row: &RawKline, key: &str, policy: MissingValuePolicy) -> Option<f64> {
    match read_number(row, key) {
        RawNumber::Value(v) => Some(v),
        RawNumber::Missing | RawNumber::Invalid => match policy {
            MissingValuePolicy::ZeroFill => Some(0.0),
            MissingValuePolicy::Drop => None,
        },
    }
}

fn to_candle(row: &RawKline, timestamp: DateTime<Utc>, close: f64, policy: MissingValuePolicy) -> Option<Candle> {
    Some(Candle {
        timestamp,
        open: field(row, "open", policy)?,
        high: field(row, "high", policy)?,
        low: field(row, "low", policy)?,
        close,
        volume: field(row, "volume", policy)?,
        close_time: field(row, "close_time", policy)? as i64,
        quote_asset_volume: field(row, "quote_asset_volume", policy)?,
        number_of_trades: field(row, "number_of_trades", policy)?.max(0.0) as u64,
        taker_buy_base_asset_volume: field(row, "taker_buy_base_asset_volume", policy)?,
        taker_buy_quote_asset_volume: field(row, "taker_buy_quote_asset_volume", policy)?,
    })
}

/// Runs the full cleaning pipeline over raw API rows.
pub fn clean_klines(symbol: &str, rows: Vec<RawKline>, config: &CleaningConfig) -> CandleSeries {
    let policy = config.missing_values;
    let fetched = rows.len();

    let rows = handle_missing(rows, policy);
    log_dropped("missing values", fetched, rows.len());

    // Whole-row duplicates, compared on the raw values.
    let before = rows.len();
    let mut seen = HashSet::with_capacity(rows.len());
    let rows: Vec<RawKline> = rows
        .into_iter()
        .filter(|row| seen.insert(Value::Object(row.clone()).to_string()))
        .collect();
    log_dropped("duplicates", before, rows.len());

    let before = rows.len();
    let candles: Vec<Candle> = rows
        .iter()
        .filter_map(|row| {
            let RawNumber::Value(close) = read_number(row, "close") else {
                return None;
            };
            let timestamp = parse_timestamp(row)?;
            to_candle(row, timestamp, close, policy)
        })
        .collect();
    log_dropped("non-numeric close", before, candles.len());

    let before = candles.len();
    let candles = remove_outliers(candles, config.outlier_sigma);
    log_dropped("outliers", before, candles.len());

    info!(symbol, fetched, kept = candles.len(), "cleaned klines");
    CandleSeries::new(symbol, candles)
}
