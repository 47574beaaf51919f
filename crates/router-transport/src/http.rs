//! HTTP Webhook Bridge (§4.8) — multi-channel ingress: parses channel-
//! specific payloads, deduplicates the chat-bot channel, ACKs fast, and
//! processes the workflow channel synchronously. Field names for the
//! telegram/n8n parsing fallbacks are grounded on
//! `run_http_webhook_bridge.py::parse_update` / `parse_n8n_request`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde_json::{json, Value};
use tracing::{info, warn};

use router_core::types::{Channel, Mode, RouterRequest, RouterResponse};
use router_policy::Router;

use crate::dedup::Reservation;
use crate::state::GatewayState;

pub fn build_router(state: GatewayState) -> axum::Router {
    let webhook_base = state.webhook_base.clone();
    axum::Router::new()
        .route("/health", get(health))
        .route(&format!("{webhook_base}/telegram"), post(telegram_webhook))
        .route(&format!("{webhook_base}/n8n"), post(n8n_webhook))
        .fallback(unknown_route)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "bridge": "http_webhook", "route": "health"}))
}

async fn unknown_route() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"status": "failed", "error": "Unknown route"})),
    )
}

// ───────────────────────────── telegram ─────────────────────────────

struct TelegramUpdate {
    dedup_key: String,
    chat_id: String,
    text: String,
}

fn parse_telegram_update(body: &Value) -> Option<TelegramUpdate> {
    let message = body.get("message")?;
    let text = message.get("text").and_then(Value::as_str)?.to_string();
    let chat_id = message.get("chat")?.get("id")?;
    let chat_id = chat_id.as_i64().map(|n| n.to_string()).or_else(|| chat_id.as_str().map(str::to_string))?;

    let dedup_key = match body.get("update_id").and_then(Value::as_i64) {
        Some(update_id) => format!("telegram:update:{update_id}"),
        None => {
            let message_id = message.get("message_id").and_then(Value::as_i64).unwrap_or(0);
            let date = message.get("date").and_then(Value::as_i64).unwrap_or(0);
            format!("telegram:fallback:{chat_id}:{message_id}:{date}")
        }
    };

    Some(TelegramUpdate { dedup_key, chat_id, text })
}

async fn telegram_webhook(State(state): State<GatewayState>, Json(body): Json<Value>) -> impl IntoResponse {
    let Some(update) = parse_telegram_update(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "failed", "error": "unrecognized telegram update shape"})),
        )
            .into_response();
    };

    if state.dedup.reserve(&update.dedup_key) == Reservation::Duplicate {
        return Json(json!({
            "status": "ok",
            "ok": true,
            "duplicate": true,
            "bridge": "http_webhook",
            "route": "telegram",
            "channel": "telegram",
        }))
        .into_response();
    }

    let request_id = format!("tg_{}", uuid::Uuid::new_v4().simple());
    let request = RouterRequest {
        request_id: request_id.clone(),
        session_id: format!("telegram:{}", update.chat_id),
        user_id: String::new(),
        text: update.text,
        channel: Channel::Telegram,
        mode: Mode::Auto,
        provider: None,
        metadata: None,
    };

    let dedup_key = update.dedup_key.clone();
    let chat_id = update.chat_id.clone();
    tokio::spawn(async move {
        let response = state.router.handle(request).await;
        if response.is_success() && !response.reply_text.is_empty() {
            match send_telegram_message(&state, &chat_id, &response.reply_text).await {
                Ok(()) => state.dedup.mark_processed(&dedup_key),
                Err(e) => {
                    warn!(error = %e, "failed to deliver telegram reply, releasing dedup key for retry");
                    state.dedup.release_inflight(&dedup_key);
                }
            }
        } else {
            warn!(error_code = ?response.error_code, "router failed for telegram update, releasing dedup key");
            state.dedup.release_inflight(&dedup_key);
        }
    });

    Json(json!({
        "status": "ok",
        "ok": true,
        "accepted": true,
        "bridge": "http_webhook",
        "route": "telegram",
        "channel": "telegram",
        "request_id": request_id,
    }))
    .into_response()
}

async fn send_telegram_message(state: &GatewayState, chat_id: &str, text: &str) -> anyhow::Result<()> {
    if state.telegram.bot_token.is_empty() {
        anyhow::bail!("no telegram bot token configured");
    }
    let url = format!(
        "https://api.telegram.org/bot{}/sendMessage",
        state.telegram.bot_token
    );
    let response = state
        .http_client
        .post(&url)
        .json(&json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": state.telegram.parse_mode,
            "disable_web_page_preview": state.telegram.disable_preview,
        }))
        .send()
        .await?;
    if !response.status().is_success() {
        anyhow::bail!("telegram sendMessage returned {}", response.status());
    }
    Ok(())
}

// ─────────────────────────────── n8n ────────────────────────────────

fn parse_n8n_payload(body: &Value) -> Option<(String, String, String)> {
    let text = if body.get("type").and_then(Value::as_str) == Some("request") {
        body.get("text").and_then(Value::as_str)
    } else {
        None
    }
    .or_else(|| body.get("text").and_then(Value::as_str))
    .or_else(|| body.get("message_text").and_then(Value::as_str))
    .or_else(|| body.get("message").and_then(Value::as_str))
    .or_else(|| body.get("body").and_then(|b| b.get("text")).and_then(Value::as_str))
    .or_else(|| body.get("body").and_then(|b| b.get("message_text")).and_then(Value::as_str))?;

    let request_id = body
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("n8n_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]));

    let session_id = body
        .get("session_id")
        .and_then(Value::as_str)
        .unwrap_or("n8n:default")
        .to_string();

    Some((request_id, session_id, text.to_string()))
}

async fn n8n_webhook(State(state): State<GatewayState>, Json(body): Json<Value>) -> impl IntoResponse {
    let Some((request_id, session_id, text)) = parse_n8n_payload(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "failed", "error": "unrecognized n8n payload shape"})),
        )
            .into_response();
    };

    let request = match Router::parse_request(
        &serde_json::to_string(&json!({
            "request_id": request_id,
            "session_id": session_id,
            "text": text,
            "channel": "n8n",
            "mode": "auto",
        }))
        .unwrap_or_default(),
    ) {
        Ok(req) => req,
        Err(response) => return merge_bridge_envelope(response).into_response(),
    };

    info!(request_id = %request.request_id, "processing n8n request synchronously");
    let response = state.router.handle(request).await;
    merge_bridge_envelope(response).into_response()
}

fn merge_bridge_envelope(response: RouterResponse) -> Json<Value> {
    let mut value = serde_json::to_value(&response).unwrap_or_else(|_| json!({}));
    if let Value::Object(ref mut map) = value {
        map.insert("bridge".to_string(), json!("http_webhook"));
        map.insert("route".to_string(), json!("n8n"));
    }
    Json(value)
}
