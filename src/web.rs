#![cfg(not(tarpaulin_include))]

use plotdash::app::{self, AppConfig};

/// Main entry point for the web application
///
/// Reads configuration from the environment (`PLOTDASH_DATA_DIR`,
/// `PLOTDASH_ADDR`), with an optional bind-address override as the first
/// command line argument.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = AppConfig::from_env();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 {
        config.bind_addr = args[1].clone();
    }

    app::run(config).await
}
