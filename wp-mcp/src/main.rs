use std::env;
use wp_mcp::{api, McpServer};
use std::sync::Arc;
use anyhow::Result;
use log::{info, error};
use std::process;

#[tokio::main]
async fn main() -> Result<()> {
    // Get configuration path from command line arguments
    let config_path = env::args().nth(1);
    let loaded = wp_mcp::config::load_config(config_path.as_deref());

    // Initialize logging, RUST_LOG overrides the configured level
    let log_level = loaded
        .as_ref()
        .map(|settings| settings.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(log_level));

    info!("Starting wp-mcp server version {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = match loaded {
        Ok(settings) => {
            info!("Loaded configuration successfully ({} environment)", settings.environment);
            settings
        },
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Wire stores, tools and the dispatcher
    let server = match McpServer::build(settings) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            process::exit(1);
        }
    };
    info!(
        "Exposing {} content types under {}://",
        server.catalog.types().len(),
        server.catalog.scheme()
    );

    // Start the API server
    match api::init_server(server).await {
        Ok(_) => {
            info!("wp-mcp server stopped gracefully");
            Ok(())
        },
        Err(e) => {
            error!("Error starting wp-mcp server: {}", e);
            process::exit(1);
        }
    }
}
