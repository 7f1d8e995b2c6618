mod api;
mod config;
mod error;
mod provider;
mod request;
mod updater;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use provider::cloudflare::CloudflareFactory;

#[derive(Parser, Debug)]
#[command(name = "cf-ddns")]
#[command(about = "A dynamic DNS update endpoint backed by the Cloudflare API")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = config::Config::load(&args.config)?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    if Path::new(&args.config).exists() {
        info!("Loaded configuration from: {}", args.config);
    } else {
        warn!("Config file {} not found, using defaults", args.config);
    }
    if config.update.token.is_none() {
        info!("No fallback API token configured; requests must supply their own");
    }
    if config.update.require_https {
        info!("HTTPS is required for update requests");
    }

    // Create router
    let app = api::create_router(config.clone(), Arc::new(CloudflareFactory::new()));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server listening on http://{}", addr);
    info!("DDNS endpoint: GET .../update?hostname=<hosts>&ip=<ips>");

    axum::serve(listener, app).await?;

    Ok(())
}
