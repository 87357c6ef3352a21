use anyhow::Result;
use clap::Parser;
use tracing::info;

use club_portal_client::{app::App, cli, config::Config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    logging::init_logging(&config.logging);

    info!("Starting Club Portal client v{}", env!("CARGO_PKG_VERSION"));

    let app = App::from_config(config)?;

    let mut stdout = std::io::stdout().lock();
    cli::execute(&app, cli.command, &mut stdout).await?;

    Ok(())
}
