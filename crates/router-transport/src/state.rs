//! Shared state for the HTTP and WebSocket bridges.

use std::sync::Arc;
use std::time::Duration;

use router_core::config::{Config, TelegramConfig};
use router_policy::Router;

use crate::dedup::DedupStore;

/// Everything an axum handler needs: the in-process Router, outbound chat
/// HTTP client, dedup state, and the slice of config the bridges read.
#[derive(Clone)]
pub struct GatewayState {
    pub router: Arc<Router>,
    pub dedup: Arc<DedupStore>,
    pub http_client: reqwest::Client,
    pub telegram: TelegramConfig,
    pub webhook_base: String,
    pub ws_path: String,
}

impl GatewayState {
    pub fn new(config: &Config, router: Arc<Router>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            router,
            dedup: Arc::new(DedupStore::new(config.telegram.dedup_ttl_seconds)),
            http_client,
            telegram: config.telegram.clone(),
            webhook_base: config.http.webhook_base.clone(),
            ws_path: config.ws.path.clone(),
        }
    }
}
