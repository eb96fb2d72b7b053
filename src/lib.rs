pub mod candle;
pub mod charts;
pub mod cleaning;
pub mod cli;
pub mod config;
pub mod error;
pub mod indicators;
pub mod insights;
pub mod klines;
pub mod patterns;
pub mod pipeline;
pub mod report;
pub mod storage_utils;
pub mod summary_table;
