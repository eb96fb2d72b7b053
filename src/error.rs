//! Error types shared by the ingestion and analysis stages.

use thiserror::Error;

/// Failures while requesting or decoding klines. These never escape the
/// ingestion boundary: they are logged and turned into "no data".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("binance rejected the request ({status}): code {code}, {msg}")]
    Api {
        status: u16,
        code: i64,
        msg: String,
    },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode klines payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Structural problems in the analysis input. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{indicator} needs at least {required} rows, got {actual}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("malformed candle csv: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
