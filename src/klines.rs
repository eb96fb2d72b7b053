use crate::candle::{RawKline, raw_kline_from_array};
use crate::config::KlineConfig;
use crate::error::FetchError;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Binance's cap on rows per klines request.
pub const MAX_LIMIT: u32 = 1000;

/// Error body Binance sends with non-2xx responses.
#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

fn calculate_request_weight(limit: u32) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}

/// Midnight UTC of `date` as epoch milliseconds.
pub fn date_to_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Query parameters for one klines request.
pub fn build_query(
    config: &KlineConfig,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(&'static str, String)>, FetchError> {
    if symbol.trim().is_empty() {
        return Err(FetchError::InvalidRequest("symbol is empty".to_string()));
    }
    if config.limit == 0 || config.limit > MAX_LIMIT {
        return Err(FetchError::InvalidRequest(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, config.limit
        )));
    }

    Ok(vec![
        ("symbol", symbol.to_string()),
        ("interval", config.interval.clone()),
        ("startTime", date_to_millis(start).to_string()),
        ("endTime", date_to_millis(end).to_string()),
        ("limit", config.limit.to_string()),
    ])
}

/// Decodes the array-of-arrays klines payload into keyed rows.
pub fn parse_klines(body: &[u8]) -> Result<Vec<RawKline>, FetchError> {
    let rows: Vec<Vec<Value>> = serde_json::from_slice(body)?;
    Ok(rows.into_iter().map(raw_kline_from_array).collect())
}

async fn request_klines(
    client: &Client,
    config: &KlineConfig,
    query: &[(&str, String)],
) -> Result<Vec<RawKline>, FetchError> {
    let url = format!("{}/api/v3/klines", config.base_url.trim_end_matches('/'));
    let response = client.get(&url).query(query).send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        if let Ok(api_error) = serde_json::from_slice::<ApiErrorBody>(&body) {
            return Err(FetchError::Api {
                status: status.as_u16(),
                code: api_error.code,
                msg: api_error.msg,
            });
        }
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    parse_klines(&body)
}

/// Fetches hourly klines for `symbol` between midnight of `start` and
/// midnight of `end`. Any failure is logged and reported as `None`; the
/// caller treats that as the end of the run. A range with `end <= start`
/// holds no candles and returns an empty list without a request.
pub async fn fetch_klines(
    client: &Client,
    config: &KlineConfig,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<Vec<RawKline>> {
    if end <= start {
        warn!(%symbol, %start, %end, "empty date range, nothing to fetch");
        return Some(Vec::new());
    }

    let query = match build_query(config, symbol, start, end) {
        Ok(query) => query,
        Err(e) => {
            error!("Error fetching Binance data: {}", e);
            return None;
        }
    };
    debug!(
        weight = calculate_request_weight(config.limit),
        "requesting klines"
    );

    match request_klines(client, config, &query).await {
        Ok(rows) => {
            info!(%symbol, rows = rows.len(), "fetched klines");
            if rows.len() as u32 >= config.limit {
                warn!(limit = config.limit, "row cap reached, later candles are missing");
            }
            Some(rows)
        }
        Err(e) => {
            error!("Error fetching Binance data: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_to_millis_is_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(date_to_millis(date), 1_672_531_200_000);
    }

    #[test]
    fn test_request_weight_bands() {
        assert_eq!(calculate_request_weight(50), 1);
        assert_eq!(calculate_request_weight(100), 2);
        assert_eq!(calculate_request_weight(1000), 5);
        assert_eq!(calculate_request_weight(1500), 10);
    }

    #[test]
    fn test_build_query_params() {
        let config = KlineConfig::default();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();

        let query = build_query(&config, "BTCUSDT", start, end).unwrap();

        assert_eq!(
            query,
            vec![
                ("symbol", "BTCUSDT".to_string()),
                ("interval", "1h".to_string()),
                ("startTime", "1672531200000".to_string()),
                ("endTime", "1675123200000".to_string()),
                ("limit", "1000".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_query_rejects_limit_over_cap() {
        let config = KlineConfig {
            limit: 1500,
            ..KlineConfig::default()
        };
        let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

        let err = build_query(&config, "BTCUSDT", day, day.succ_opt().unwrap()).unwrap_err();

        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_klines_maps_positional_fields() {
        let body = json!([[
            1672531200000i64,
            "16541.77",
            "16545.70",
            "16508.39",
            "16529.67",
            "4364.83",
            1672534799999i64,
            "72146486.41",
            95231,
            "2129.29",
            "35194777.15",
            "0"
        ]])
        .to_string();

        let rows = parse_klines(body.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["close"], json!("16529.67"));
        assert_eq!(rows[0]["number_of_trades"], json!(95231));
        assert_eq!(rows[0]["ignore"], json!("0"));
    }

    #[test]
    fn test_parse_klines_rejects_error_object() {
        let body = br#"{"code":-1121,"msg":"Invalid symbol."}"#;
        assert!(matches!(parse_klines(body), Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_same_start_and_end_is_empty_without_request() {
        // An unroutable base URL proves no request is made.
        let config = KlineConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..KlineConfig::default()
        };
        let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

        let rows = fetch_klines(&Client::new(), &config, "BTCUSDT", day, day).await;

        assert_eq!(rows.map(|r| r.len()), Some(0));
    }

    #[tokio::test]
    async fn test_transport_failure_is_no_data() {
        let config = KlineConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..KlineConfig::default()
        };
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();

        let rows = fetch_klines(&Client::new(), &config, "BTCUSDT", start, end).await;

        assert!(rows.is_none());
    }
}
