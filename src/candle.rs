use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Positional field names of a Binance kline row, in wire order.
pub const KLINE_KEYS: &[&str] = &[
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
    "ignore",
];

/// One kline exactly as the API returned it, keyed by `KLINE_KEYS`.
pub type RawKline = Map<String, Value>;

/// Zips a positional kline array with `KLINE_KEYS`. Short rows leave the
/// trailing keys absent, which cleaning treats as missing.
pub fn raw_kline_from_array(values: Vec<Value>) -> RawKline {
    KLINE_KEYS
        .iter()
        .zip(values)
        .map(|(&key, val)| (key.to_string(), val))
        .collect()
}

/// A cleaned hourly candle, serialized with the public CSV column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "Date", with = "csv_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(default)]
    pub close_time: i64,
    #[serde(default)]
    pub quote_asset_volume: f64,
    #[serde(rename = "Trades", default)]
    pub number_of_trades: u64,
    #[serde(default)]
    pub taker_buy_base_asset_volume: f64,
    #[serde(default)]
    pub taker_buy_quote_asset_volume: f64,
}

impl Candle {
    pub fn real_body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_white(&self) -> bool {
        self.close >= self.open
    }

    pub fn is_black(&self) -> bool {
        self.close < self.open
    }

    /// Bit-exact key over every field, used to spot fully duplicate rows.
    pub(crate) fn identity_key(&self) -> [u64; 11] {
        [
            self.timestamp.timestamp_millis() as u64,
            self.open.to_bits(),
            self.high.to_bits(),
            self.low.to_bits(),
            self.close.to_bits(),
            self.volume.to_bits(),
            self.close_time as u64,
            self.quote_asset_volume.to_bits(),
            self.number_of_trades,
            self.taker_buy_base_asset_volume.to_bits(),
            self.taker_buy_quote_asset_volume.to_bits(),
        ]
    }
}

/// Chronologically ordered candles for a single trading pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandleSeries {
    pub symbol: String,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            candles,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.candles.iter().map(|c| c.timestamp).collect()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.timestamp)
    }
}

// --- Lenient number decoding ---

/// Accepts JSON numbers and numeric strings. Null and blank strings decode
/// to `None`; any other text is an error.
struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.trim().parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

pub fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

/// Outcome of reading one raw field as a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawNumber {
    Value(f64),
    Missing,
    Invalid,
}

/// Reads `key` from a raw kline. Absent keys and nulls are `Missing`, text
/// that is not a number (or a non-finite value) is `Invalid`.
pub fn read_number(row: &RawKline, key: &str) -> RawNumber {
    match row.get(key) {
        None => RawNumber::Missing,
        Some(value) => match deserialize_f64_lenient(value) {
            Ok(Some(v)) if v.is_finite() => RawNumber::Value(v),
            Ok(Some(_)) => RawNumber::Invalid,
            Ok(None) => RawNumber::Missing,
            Err(_) => RawNumber::Invalid,
        },
    }
}

mod csv_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(s.trim(), FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
