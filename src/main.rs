//! Mesh Health Web UI server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ security headers ─▶ host guard
//!                                                                   │
//!                                    body limit ◀─ timeout ◀────────┘
//!                                        │
//!                                        ▼
//!                                  rate limit ─▶ params ─▶ nodes directory
//!                                                              │
//!     Client Response                                          ▼
//!     ◀────────────── headers applied on the way out ◀─── page / JSON
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mesh_health_web::config::load_config;
use mesh_health_web::lifecycle::signals::watch_signals;
use mesh_health_web::net::tls::load_tls_config;
use mesh_health_web::nodes::NodeDirectory;
use mesh_health_web::observability::{logging, metrics};
use mesh_health_web::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "mesh-health-web")]
#[command(about = "Web UI for mesh network health", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mesh-health-web starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        debug = config.security.debug,
        debug_like = config.debug_like(),
        tls = config.listener.tls.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let nodes = NodeDirectory::load_or_empty(config.nodes.data_file.as_deref());

    let shutdown = Shutdown::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, nodes);

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(addr, rustls, shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
