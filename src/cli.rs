use crate::config::PipelineConfig;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Hourly candle insights for one trading pair", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// JSON config file; command-line values override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Trading pair, e.g. BTCUSDT
    #[arg(short, long, global = true)]
    pub symbol: Option<String>,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub start: Option<NaiveDate>,

    /// Day after the last full day of the range (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub end: Option<NaiveDate>,

    /// Directory that data/ and insights/ are written under
    #[arg(short, long, global = true)]
    pub output_root: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long, global = true)]
    pub no_charts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Fetch, clean and analyze (default)
    Run,
    /// Fetch and clean only, writing the CSV
    Fetch,
    /// Analyze a CSV written by an earlier fetch
    Analyze,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Applies the command-line overrides on top of `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(symbol) = &self.symbol {
            config.symbol = symbol.clone();
        }
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
        if let Some(root) = &self.output_root {
            config.output_root = root.clone();
        }
        if self.no_charts {
            config.chart.enabled = false;
        }
        config
    }
}
