use cartographer_cli::cli::InstallCli;
use cartographer_cli::config::{FileConfig, build_install_config};
use cartographer_cli::error::Result;
use cartographer_cli::{commands, logging};
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = InstallCli::parse();
    logging::init(&cli.logging)?;

    info!("🚀 Cartographer installer v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let file_config = FileConfig::load(cli.config.as_deref())?;
    let config = build_install_config(&cli, file_config)?;

    let result = commands::install::run(config).await;
    match &result {
        Ok(()) => {
            info!("✅ Installation completed successfully.");
            println!("✅ Installation completed successfully.");
        }
        Err(e) => error!("❌ Installation failed: {}", e),
    }
    result
}
