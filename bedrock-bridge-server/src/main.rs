//! Bedrock Bridge - Headless Daemon
//!
//! A pure Rust HTTP server exposing an OpenAI-compatible surface
//! (/v1/completions, /v1/chat/completions, /v1/models) over the Bedrock
//! Claude runtime.
//!
//! Access via: http://localhost:8045

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bedrock_bridge_core::proxy::{AxumServer, ProxyConfig, ServerStartConfig};

const DEFAULT_PORT: u16 = 8045;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port: u16 = std::env::var("BRIDGE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let host = std::env::var("BRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let proxy_config = ProxyConfig::from_env();
    info!("Starting Bedrock Bridge on {}:{}", host, port);
    info!("Backend endpoint: {}", proxy_config.backend_base_url);

    let server = AxumServer::new(ServerStartConfig { host, port, proxy_config });
    server.run().await.map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}
