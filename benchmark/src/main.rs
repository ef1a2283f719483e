use clap::Parser;
use filedrop_benchmark::servers::ServerProcesses;
use filedrop_benchmark::{Args, BenchmarkConfig, report, run_rounds};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filedrop_benchmark=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = BenchmarkConfig::load(&args)?;
    tracing::debug!("Benchmark configuration: {:?}", config);

    let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;

    tracing::info!("Starting servers...");
    let processes = ServerProcesses::start(&config.servers, config.startup_delay, &client, &config.health_path).await?;

    let outcome = tokio::select! {
        outcome = run_rounds(&config, &client) => outcome,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("Interrupted by Ctrl+C")),
    };

    processes.shutdown().await;
    let results = outcome?;

    let (sequential, concurrent) = report::write_results(&config.results_dir, &results)?;
    tracing::info!(
        failures = results.failures,
        "Test rounds completed successfully. Results saved to {} and {}",
        sequential.display(),
        concurrent.display()
    );

    Ok(())
}
