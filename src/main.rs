mod anki;
mod config;
mod dispatcher;
mod error;
mod resources;
mod server;
mod smart;
mod tools;

use std::sync::Arc;

use anyhow::{Context, Result};
use anki::AnkiClient;
use config::Config;
use dispatcher::Dispatcher;
use server::Server;
use tokio::io::BufReader;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Logs go to stderr; stdout carries protocol messages only. RUST_LOG wins over the config level.
    let mut logger = pretty_env_logger::formatted_builder();
    logger.parse_filters(&config.logging.level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.try_init().context("Failed to initialise logger")?;

    log::info!("Starting Anki gateway...");
    log::info!("AnkiConnect endpoint: {}", config.anki_connect.url());

    let client = AnkiClient::new(config.anki_connect.clone());
    let dispatcher = Dispatcher::new(client);
    log::info!("{} tools registered", dispatcher.specs().len());

    let server = Arc::new(Server::new(dispatcher));
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    log::info!("Anki gateway stopped");
    Ok(())
}
