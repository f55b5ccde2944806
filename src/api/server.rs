use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::errors::{Result, VigilError};

pub async fn start_api_server<F>(config: &ServerConfig, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| VigilError::config(format!("Invalid API address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| VigilError::internal(format!("Failed to bind API server: {}", e)))?;

    info!(address = %addr, "Starting HTTP API server");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| VigilError::internal(format!("API server error: {}", e)))?;

    info!("API server shutdown completed");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "API server shutdown listener failed");
    }
}
