//! RAX FTP Gateway - Entry Point

use std::sync::Arc;

use log::{error, info};

use rax_ftp_gateway::error::ServerError;
use rax_ftp_gateway::{BusinessHooks, GatewayConfig, LoggingHooks, Server, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching FTP gateway...");

    let config = GatewayConfig::load()?;
    let shutdown = ShutdownSignal::new();
    let hooks: Arc<dyn BusinessHooks> = Arc::new(LoggingHooks);
    let server = Server::bind(config, Some(hooks), shutdown.clone()).await?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, draining connections");
                shutdown.trigger();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    server.run().await
}
