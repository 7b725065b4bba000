use clap::Parser;
use xlsx_vault::{Config, app};

/// Main entry point for the web application
///
/// Reads the configuration from the command line and environment, sets up
/// logging (`RUST_LOG`, defaulting to `info`) and runs the web server.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!("Starting xlsx-vault on {}", config.bind);

    app::run(config).await
}
