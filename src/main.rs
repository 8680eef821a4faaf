//! btcprice - caching HTTP proxy for Bitcoin prices
//!
//! Serves `/btc-data` (current prices, cached for five minutes) and
//! `/btc-price-history/{date}` (historical prices, cached on disk for a day).

use clap::Parser;

use btcprice::app;
use btcprice::cli::{Cli, ServerConfig};
use btcprice::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match ServerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(config.log_format);
    app::run(config).await?;

    Ok(())
}
