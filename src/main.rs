//! Unzip proxy.
//!
//! A reverse proxy that inflates gzip/zlib-encoded request bodies before
//! forwarding them upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ listener ──▶ request ID ──▶ unzip pipeline ──▶ upstream client ──▶ Upstream
//!                                             (blocking pool)
//!     Client ◀───────────────────────────────────────────────── response ◀───────── Upstream
//!
//!     Cross-cutting: config (TOML + CLI), tracing, metrics, graceful shutdown
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_unzip::config::{load_config, validation::validate_config, ProxyConfig};
use request_unzip::lifecycle::{shutdown_signal, Shutdown};
use request_unzip::observability::{logging::init_tracing, metrics::init_metrics};
use request_unzip::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "unzip-proxy", version, about = "Reverse proxy that inflates compressed request bodies")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the upstream address.
    #[arg(long)]
    upstream: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(upstream) = self.upstream {
            config.upstream.address = upstream;
        }
        if let Err(errors) = validate_config(&config) {
            let joined = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            return Err(format!("invalid configuration: {joined}").into());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    init_tracing(&config.observability);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Fatal error");
        return Err(e);
    }
    Ok(())
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "unzip-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        unzip_enabled = config.unzip.enabled,
        gzip_buffer = config.unzip.gzip_buffer,
        on_failure = ?config.unzip.on_failure,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_rx = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_rx));

    shutdown_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
