//! Tessera WebSocket Gateway
//!
//! Serves the sync fabric to browser clients: sessions connect on `/ws`,
//! subscribe to chunks, and stream object updates.
//!
//! Usage:
//!   tessera-gateway --bind 0.0.0.0:4600 --types c:h,c:o
//!
//! Store and pub/sub endpoints are read from `TESSERA_STORE_URL` and
//! `TESSERA_BROKER_ADDR`; a host-only broker address gets the default port
//! appended.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tessera_gateway::config::Endpoints;
use tessera_gateway::{build_router, GatewayState};
use tessera_model::ObjectRegistry;
use tessera_sync::{NoopHooks, SessionConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tessera-gateway")]
#[command(about = "WebSocket gateway for the Tessera sync fabric")]
struct Args {
    /// Address to serve HTTP/WebSocket on
    #[arg(short, long, default_value = "0.0.0.0:4600")]
    bind: String,

    /// Comma-separated object type tags hydrated with the generic container
    #[arg(short, long, default_value = "")]
    types: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Tessera gateway starting...");

    let endpoints = Endpoints::from_env();
    if let Some(store) = &endpoints.store_url {
        info!(store = %store, "object store endpoint configured");
    }
    if let Some(broker) = &endpoints.broker_addr {
        info!(broker = %broker, "pub/sub endpoint configured");
    }

    let mut registry = ObjectRegistry::new();
    for tag in args.types.split(',').filter(|t| !t.is_empty()) {
        registry.register_json(tag);
        info!(tag, "registered object type");
    }

    let state = GatewayState::new(registry, Arc::new(NoopHooks), SessionConfig::default());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;

    println!("\n========================================");
    println!("  Tessera Gateway Running");
    println!("========================================");
    println!("  Bind:      {}", args.bind);
    println!("  WebSocket: ws://{}/ws", args.bind);
    println!("  Health:    http://{}/api/v1/health", args.bind);
    println!("========================================\n");

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
