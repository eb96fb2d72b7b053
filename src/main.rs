use anyhow::Context;
use candle_insights::cli::{Args, Command};
use candle_insights::config::PipelineConfig;
use candle_insights::pipeline;
use candle_insights::report::format_run_timestamp;
use candle_insights::storage_utils::AsyncStorageManager;
use candle_insights::summary_table;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Loads the saved CSV, analyzes it and prints the summary.
async fn analyze(config: &PipelineConfig, storage: &AsyncStorageManager, stamp: &str) -> anyhow::Result<()> {
    let series = pipeline::load_cleaned(config, storage)
        .await
        .with_context(|| format!("loading {}", storage.csv_path(&config.cleaned_data_name()).display()))?;
    let output = pipeline::run_analysis(config, storage, &series, stamp).await?;

    summary_table::run(&series, &output.report);
    if let Some(charts) = &output.charts {
        info!(
            trends = %charts.price_trends.display(),
            change = %charts.price_change.display(),
            volatility = %charts.volatility.display(),
            "charts saved"
        );
    }
    info!(pdf = %output.pdf.display(), "report saved");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = args.apply(config);
    let stamp = format_run_timestamp(&chrono::Local::now());
    let storage = AsyncStorageManager::new(&config.output_root);

    let client = reqwest::Client::new();

    let result = match args.command() {
        Command::Run => {
            // Step 1: Fetch, clean and save
            match pipeline::run_ingestion(&client, &config, &storage).await {
                // Step 2: Analyze what was saved
                Ok(Some(_)) => analyze(&config, &storage, &stamp).await,
                Ok(None) => {
                    info!("nothing to analyze");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Fetch => pipeline::run_ingestion(&client, &config, &storage)
            .await
            .map(|path| {
                if let Some(path) = path {
                    info!(path = %path.display(), "fetch complete");
                }
            }),
        Command::Analyze => analyze(&config, &storage, &stamp).await,
    };

    if let Err(e) = &result {
        error!("Error generating insights: {:#}", e);
    }
    result
}
