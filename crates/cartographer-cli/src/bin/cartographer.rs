use cartographer_cli::cli::PredictCli;
use cartographer_cli::config::{FileConfig, build_predict_config};
use cartographer_cli::error::{CliError, Result};
use cartographer_cli::{commands, logging};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = PredictCli::parse_normalized();
    logging::init(&cli.logging)?;

    info!("🚀 Cartographer v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if let Some(num_threads) = cli.threads {
        info!("Setting Rayon global thread pool to {} threads.", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e)))?;
    }

    let file_config = FileConfig::load(cli.config.as_deref())?;
    let config = build_predict_config(&cli, file_config)?;

    let result = commands::predict::run(config).await;
    match &result {
        Ok(()) => info!("✅ Prediction completed successfully."),
        Err(e) => error!("❌ Prediction failed: {}", e),
    }
    result
}
