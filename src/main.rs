//! DLC Server - an authenticated HTTP service skeleton.
//!
//! This binary parses configuration, starts the server and wires Ctrl-C to a
//! graceful stop.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dlc_server::{Config, DlcServer, StaticTokens};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let verifier = StaticTokens::new(&config.tokens);
    if verifier.is_empty() {
        warn!("No tokens configured: every authenticated request will be rejected with 403");
        warn!("Set --tokens or DLC_SERVER_TOKENS to accept requests");
    }

    let server_config = config.server_config();

    info!("Configuration:");
    info!("  Bind address: {}", config.bind_address());
    info!("  Environment: {}", config.environment());
    info!("  Debug level: {}", server_config.options.debug);
    info!("  Status endpoint: GET {}", server_config.endpoints.status);
    info!("  Change endpoint: POST {}", server_config.endpoints.change);
    info!("  Accepted tokens: {}", verifier.len());

    let server = DlcServer::new(verifier, server_config);

    let addr = match server.start(config.port).await {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Listening on {}", addr);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    server.stop().await;

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "dlc_server=debug,tower_http=debug"
    } else {
        "dlc_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
