//! Multiplexing HTTP/HTTPS Gateway
//!
//! A single-process gateway built with Tokio and Axum that serves three
//! request classes from one listening socket.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                    GATEWAY                        │
//!                      │                                                   │
//!   Client Request     │  ┌─────────┐    ┌──────────────┐                 │
//!   ───────────────────┼─▶│  http   │───▶│   routing    │                 │
//!                      │  │ server  │    │  classifier  │                 │
//!                      │  └─────────┘    └──────┬───────┘                 │
//!                      │                        │                          │
//!                      │      ┌─────────────────┼──────────────────┐      │
//!                      │      ▼                 ▼                  ▼      │
//!                      │  ┌────────┐      ┌──────────┐      ┌──────────┐  │
//!                      │  │ proxy  │      │   api    │      │  static  │  │
//!                      │  │pipeline│      │ dispatch │      │  files   │  │
//!                      │  └───┬────┘      └──────────┘      └──────────┘  │
//!                      │      │                                           │
//!   Client Response    │  ┌───▼────┐    ┌─────────┐                      │
//!   ◀──────────────────┼──│ codec/ │◀───│upstream │◀─────────────────────┼──── Proxied
//!                      │  │rewrite │    │ client  │                      │     Origin
//!                      │  └────────┘    └─────────┘                      │
//!                      │                                                   │
//!                      │  ┌────────────────────────────────────────────┐  │
//!                      │  │           Cross-Cutting Concerns            │  │
//!                      │  │  ┌─────────┐  ┌──────────────┐  ┌───────┐  │  │
//!                      │  │  │ config  │  │observability │  │  net  │  │  │
//!                      │  │  └─────────┘  └──────────────┘  └───────┘  │  │
//!                      │  └────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod api;
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod routing;
pub mod static_files;

// Cross-cutting concerns
pub mod observability;

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use crate::api::HandlerRegistry;
use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::observability::logging;
use crate::observability::metrics;

#[derive(Parser)]
#[command(name = "proxy-gateway")]
#[command(about = "Multiplexing HTTP/HTTPS gateway", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init_tracing("proxy_gateway=debug,tower_http=debug");

    tracing::info!("proxy-gateway v0.1.0 starting");

    let config = match cli.config {
        Some(path) => config::loader::load_config(&path)?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        advertised_authority = %config.listener.advertised_authority,
        static_root = %config.static_files.root,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Resource handlers (cameras and the like) are registered here before
    // the server starts; the registry is read-only afterwards.
    let registry = HandlerRegistry::new();

    // TLS when the certificate material loads, plaintext otherwise.
    let tls_config = match &config.listener.tls {
        Some(tls) => match net::tls::load_tls_config(tls).await {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Unable to create secure HTTPS server, falling back to plaintext. \
                     Check if certificates and keys exist."
                );
                None
            }
        },
        None => None,
    };
    let tls_enabled = tls_config.is_some();

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, registry, tls_enabled)?;

    match tls_config {
        Some(tls) => {
            let addr = bind_address.parse()?;
            tracing::info!(address = %addr, "HTTPS server starting");
            axum_server::bind_rustls(addr, tls)
                .serve(server.router().into_make_service())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
