//! `router serve` — runs the HTTP Webhook Bridge and the WebSocket Bridge
//! concurrently, shutting both down on Ctrl+C. Startup sequence and
//! shutdown shape are ported from `oxibot-cli::gateway::run`.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use router_transport::GatewayState;

use crate::setup;

pub async fn run() -> anyhow::Result<()> {
    let config = setup::load_config();
    let router = Arc::new(setup::build_router(&config)?);
    let state = GatewayState::new(&config, router);

    let http_addr = format!("{}:{}", config.http.host, config.http.port);
    let ws_addr = format!("{}:{}", config.ws.host, config.ws.port);

    let http_app = router_transport::http::build_router(state.clone());
    let ws_app = router_transport::ws::build_router(state);

    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP bridge on {http_addr}"))?;
    let ws_listener = tokio::net::TcpListener::bind(&ws_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket bridge on {ws_addr}"))?;

    info!(http = %http_addr, ws = %ws_addr, "gateway starting");
    println!("  HTTP bridge:      http://{http_addr}{}", config.http.webhook_base);
    println!("  WebSocket bridge: ws://{ws_addr}{}", config.ws.path);
    println!("  Ctrl+C to stop");
    println!();

    tokio::select! {
        result = axum::serve(http_listener, http_app.into_make_service()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP bridge exited with an error");
            }
        }
        result = axum::serve(ws_listener, ws_app.into_make_service()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "WebSocket bridge exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
            println!("  Shutting down...");
        }
    }

    println!("  Gateway stopped.");
    Ok(())
}
