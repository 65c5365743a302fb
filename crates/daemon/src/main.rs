use anyhow::Result;
use clap::Parser;
use portal_core::tracing::{config::InstrumentationConfig, init::init_tracing};
use portal_daemon::{ServerBuilder, Settings, server::shutdown_signal};
use tokio::net::TcpListener;
use tracing::info;

/// Portal edge daemon - auth session routes in front of the identity API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let mut instrumentation_config = InstrumentationConfig {
        service_name: "portal-daemon".to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        ..InstrumentationConfig::from_env()
    };
    if std::env::var("RUST_LOG").is_err() {
        instrumentation_config.log_level =
            "portal_daemon=debug,portal_http=debug,tower_http=debug".to_string();
    }
    init_tracing(&instrumentation_config)?;

    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
    }
    let settings = Settings::load(cli.config.as_deref())?;
    let builder = ServerBuilder::new(settings);

    let listener = TcpListener::bind(builder.settings().bind_address()).await?;
    println!("Server running at: http://{}/", listener.local_addr()?);

    builder.serve(listener, shutdown_signal()).await?;

    Ok(())
}
